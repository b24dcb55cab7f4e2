//! Binding key types for the binder.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Annotation qualifier used when a binding is not named.
pub const UNSPECIFIED: &str = "*";

/// Strips a leading namespace-root marker (`\` or `::`) from a type name.
///
/// Type names are looked up with and without the marker interchangeably, so
/// every public entry point normalizes through this function.
///
/// # Examples
///
/// ```rust
/// use ferrous_weave::key::normalize;
///
/// assert_eq!(normalize("\\App\\Logger"), "App\\Logger");
/// assert_eq!(normalize("::app::Logger"), "app::Logger");
/// assert_eq!(normalize("Logger"), "Logger");
/// ```
pub fn normalize(type_name: &str) -> &str {
    let trimmed = type_name.trim_start_matches('\\');
    trimmed.strip_prefix("::").unwrap_or(trimmed)
}

/// Key for binding storage and lookup.
///
/// A key pairs the bound type with an annotation name. Unnamed bindings use
/// [`UNSPECIFIED`] so that `Logger` and `Logger@test` are distinct entries
/// that never shadow one another.
///
/// # Examples
///
/// ```rust
/// use ferrous_weave::BindingKey;
///
/// let plain = BindingKey::new("\\Logger");
/// let named = BindingKey::named("Logger", "test");
///
/// assert_eq!(plain.type_name(), "Logger");
/// assert!(!plain.is_named());
/// assert_eq!(named.annotation(), "test");
/// assert_ne!(plain, named);
/// assert_eq!(named.to_string(), "Logger@test");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct BindingKey {
    type_name: String,
    annotation: String,
}

impl BindingKey {
    /// Key for an unnamed binding of `type_name`.
    pub fn new(type_name: impl AsRef<str>) -> Self {
        Self::named(type_name, UNSPECIFIED)
    }

    /// Key for a binding of `type_name` qualified by `annotation`.
    ///
    /// An empty annotation is treated as unspecified.
    pub fn named(type_name: impl AsRef<str>, annotation: impl Into<String>) -> Self {
        let annotation = annotation.into();
        Self {
            type_name: normalize(type_name.as_ref()).to_string(),
            annotation: if annotation.is_empty() {
                UNSPECIFIED.to_string()
            } else {
                annotation
            },
        }
    }

    /// The bound type name, without namespace-root marker.
    pub fn type_name(&self) -> &str {
        &self.type_name
    }

    /// The annotation qualifier, `*` when unnamed.
    pub fn annotation(&self) -> &str {
        &self.annotation
    }

    /// Whether this key carries a named annotation.
    pub fn is_named(&self) -> bool {
        self.annotation != UNSPECIFIED
    }
}

impl fmt::Display for BindingKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_named() {
            write!(f, "{}@{}", self.type_name, self.annotation)
        } else {
            f.write_str(&self.type_name)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_annotation_is_unspecified() {
        assert_eq!(BindingKey::named("A", ""), BindingKey::new("A"));
    }

    #[test]
    fn root_marker_is_ignored() {
        assert_eq!(BindingKey::new("\\App\\A"), BindingKey::new("App\\A"));
    }
}
