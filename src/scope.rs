//! Instance scope definitions.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::DiError;

/// Scopes controlling instance retention
///
/// A binding or a class annotation selects how many instances the injector
/// builds for a type. Either source marking a type singleton is sufficient.
///
/// # Examples
///
/// ```rust
/// use ferrous_weave::Scope;
///
/// assert_eq!(Scope::default(), Scope::Prototype);
/// assert_eq!("Singleton".parse::<Scope>().unwrap(), Scope::Singleton);
/// assert_eq!("prototype".parse::<Scope>().unwrap(), Scope::Prototype);
/// assert_eq!(Scope::Singleton.to_string(), "Singleton");
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum Scope {
    /// One instance per container
    ///
    /// Built on first resolution and retained in the injector's container
    /// under the resolved interface name until the container is forked.
    Singleton,
    /// New instance per resolution, never retained
    #[default]
    Prototype,
}

impl Scope {
    /// Name used in annotations and module renderings.
    pub fn as_str(&self) -> &'static str {
        match self {
            Scope::Singleton => "Singleton",
            Scope::Prototype => "Prototype",
        }
    }

    pub fn is_singleton(&self) -> bool {
        matches!(self, Scope::Singleton)
    }
}

impl fmt::Display for Scope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Scope {
    type Err = DiError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.eq_ignore_ascii_case("singleton") {
            Ok(Scope::Singleton)
        } else if s.eq_ignore_ascii_case("prototype") {
            Ok(Scope::Prototype)
        } else {
            Err(DiError::TypeMismatch(format!("scope '{}'", s)))
        }
    }
}
