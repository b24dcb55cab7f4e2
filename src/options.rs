//! Injector options, loadable from the environment or a JSON document.

use std::env;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::DiResult;

/// Default environment prefix for [`InjectorOptions::from_env`].
pub const ENV_PREFIX: &str = "FERROUS_WEAVE";

/// Tunables of an injector.
///
/// # Examples
///
/// ```rust
/// use ferrous_weave::InjectorOptions;
///
/// let options = InjectorOptions::from_json(r#"{ "class_dir": "/tmp/weave", "max_depth": 16 }"#).unwrap();
/// assert_eq!(options.max_depth, 16);
/// assert_eq!(options.class_dir.unwrap().to_str(), Some("/tmp/weave"));
///
/// let defaults = InjectorOptions::default();
/// assert_eq!(defaults.max_depth, 64);
/// assert!(defaults.class_dir.is_none());
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct InjectorOptions {
    /// Directory where woven class manifests are persisted; `None` keeps them in memory
    pub class_dir: Option<PathBuf>,
    /// Maximum depth of nested resolutions
    pub max_depth: usize,
}

impl Default for InjectorOptions {
    fn default() -> Self {
        Self {
            class_dir: None,
            max_depth: 64,
        }
    }
}

impl InjectorOptions {
    pub fn with_class_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.class_dir = Some(dir.into());
        self
    }

    pub fn with_max_depth(mut self, depth: usize) -> Self {
        self.max_depth = depth;
        self
    }

    /// Reads `FERROUS_WEAVE_CLASS_DIR` and `FERROUS_WEAVE_MAX_DEPTH`.
    pub fn from_env() -> Self {
        Self::from_env_with_prefix(ENV_PREFIX)
    }

    /// Reads `<PREFIX>_CLASS_DIR` and `<PREFIX>_MAX_DEPTH`; unset or
    /// unparsable variables keep their defaults.
    pub fn from_env_with_prefix(prefix: &str) -> Self {
        let var = |key: &str| env::var(format!("{}_{}", prefix.to_uppercase(), key)).ok();
        let mut options = Self::default();
        if let Some(dir) = var("CLASS_DIR").filter(|d| !d.is_empty()) {
            options.class_dir = Some(PathBuf::from(dir));
        }
        if let Some(depth) = var("MAX_DEPTH").and_then(|d| d.parse().ok()) {
            options.max_depth = depth;
        }
        options
    }

    pub fn from_json(json: &str) -> DiResult<Self> {
        Ok(serde_json::from_str(json)?)
    }
}
