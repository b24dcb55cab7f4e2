//! Error types for the injector, binder and interceptor compiler.

use std::fmt;

use thiserror::Error;

/// Injection errors
///
/// Every variant is a configuration failure surfaced to the caller of
/// [`Injector::get_instance`](crate::Injector::get_instance),
/// [`Module::bind`](crate::Module::bind) or
/// [`Compiler::compile`](crate::Compiler::compile). Nothing is retried. The
/// only failure recovered internally is [`DiError::OptionalInjectionNotBound`],
/// which turns into "skip this setter".
///
/// # Examples
///
/// ```rust
/// use ferrous_weave::DiError;
///
/// let err = DiError::NotReadable("App\\Missing".to_string());
/// assert_eq!(err.to_string(), "class 'App\\Missing' is not readable");
///
/// let circular = DiError::Circular(vec!["A".into(), "B".into(), "A".into()]);
/// assert_eq!(circular.to_string(), "Circular dependency: A -> B -> A");
/// ```
#[derive(Debug, Clone, Error)]
pub enum DiError {
    /// No binding and no just-in-time fallback for a required dependency
    #[error("{0}")]
    NotBound(Box<NotBoundError>),
    /// Same as `NotBound` for an injection point declared optional
    #[error("optional injection not bound: {0}")]
    OptionalInjectionNotBound(Box<NotBoundError>),
    /// Type is not present in the class registry
    #[error("class '{0}' is not readable")]
    NotReadable(String),
    /// `to_provider` target lacks the provider capability
    #[error("'{0}' does not implement the provider capability")]
    InvalidProvider(String),
    /// External mutation of a module's read-only view
    #[error("module bindings are read-only")]
    ReadOnly,
    /// Two lifecycle annotations of the same kind on one class
    #[error("multiple @{annotation} annotations on '{class}' ({first}, {second})")]
    MultipleAnnotationNotAllowed {
        class: String,
        annotation: String,
        first: String,
        second: String,
    },
    /// A class-only matcher evaluated against a method
    #[error("matcher '{0}' cannot be applied to a method")]
    MatcherInvalidArgument(String),
    /// Binding or dependency cycle (includes path)
    #[error("Circular dependency: {}", .0.join(" -> "))]
    Circular(Vec<String>),
    /// Maximum resolution depth exceeded
    #[error("Max depth {0} exceeded")]
    DepthExceeded(usize),
    /// Method is not declared (or not public) on the class
    #[error("method '{method}' not found on '{class}'")]
    MethodNotFound { class: String, method: String },
    /// Mutating method invoked on a built, shared object
    #[error("method '{class}::{method}' needs a mutable receiver")]
    ReceiverNotMutable { class: String, method: String },
    /// Value could not be converted to the requested type
    #[error("Type mismatch for: {0}")]
    TypeMismatch(String),
    /// Writing or reading a woven class manifest failed
    #[error("io error at {path}: {message}")]
    Io { path: String, message: String },
    /// Snapshot or manifest (de)serialization failed
    #[error("serialization failed: {0}")]
    Serialization(String),
}

impl DiError {
    /// Returns the not-bound detail for both the required and optional variants.
    pub fn not_bound(&self) -> Option<&NotBoundError> {
        match self {
            DiError::NotBound(e) | DiError::OptionalInjectionNotBound(e) => Some(e),
            _ => None,
        }
    }

    pub(crate) fn io(path: &std::path::Path, err: std::io::Error) -> Self {
        DiError::Io {
            path: path.display().to_string(),
            message: err.to_string(),
        }
    }
}

impl From<serde_json::Error> for DiError {
    fn from(err: serde_json::Error) -> Self {
        DiError::Serialization(err.to_string())
    }
}

/// Diagnostic payload of a not-bound failure.
///
/// Carries the offending type and annotation, the parameter (name and
/// position) and its owning class/method when the failure happened at an
/// injection point, the resolution chain leading to it and a rendering of
/// the active module.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct NotBoundError {
    /// Requested (or declared) type; empty for untyped parameters
    pub type_name: String,
    /// Annotation qualifier, `*` when unspecified
    pub annotate: String,
    /// Parameter name, when raised at an injection point
    pub param: Option<String>,
    /// Zero-based parameter position
    pub position: Option<usize>,
    /// Owning `Class::method` of the injection point
    pub owner: Option<String>,
    /// Types being resolved when the failure happened, outermost first
    pub chain: Vec<String>,
    /// Rendering of the module that was consulted
    pub module: Option<String>,
}

impl NotBoundError {
    pub(crate) fn interface(type_name: impl Into<String>) -> Self {
        Self {
            type_name: type_name.into(),
            annotate: crate::key::UNSPECIFIED.to_string(),
            ..Default::default()
        }
    }
}

impl fmt::Display for NotBoundError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (&self.param, &self.owner) {
            (Some(param), Some(owner)) => {
                write!(
                    f,
                    "typehint='{}', annotate='{}' for ${} (#{}) in '{}' is not bound",
                    self.type_name,
                    self.annotate,
                    param,
                    self.position.unwrap_or_default(),
                    owner
                )?;
            }
            _ => write!(f, "Interface [{}] is not bound.", self.type_name)?,
        }
        if !self.chain.is_empty() {
            write!(f, " (resolving {})", self.chain.join(" -> "))?;
        }
        Ok(())
    }
}

/// Result type for injection operations
///
/// # Examples
///
/// ```rust
/// use ferrous_weave::{DiError, DiResult};
///
/// fn lookup(name: &str) -> DiResult<()> {
///     Err(DiError::NotReadable(name.to_string()))
/// }
///
/// assert!(lookup("Nope").is_err());
/// ```
pub type DiResult<T> = Result<T, DiError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn not_bound_renders_injection_point() {
        let err = NotBoundError {
            type_name: "Logger".into(),
            annotate: "*".into(),
            param: Some("logger".into()),
            position: Some(0),
            owner: Some("App::setLogger".into()),
            chain: vec!["App".into()],
            module: None,
        };
        assert_eq!(
            err.to_string(),
            "typehint='Logger', annotate='*' for $logger (#0) in 'App::setLogger' is not bound (resolving App)"
        );
    }

    #[test]
    fn not_bound_renders_interface() {
        let err = DiError::NotBound(Box::new(NotBoundError::interface("Logger")));
        assert_eq!(err.to_string(), "Interface [Logger] is not bound.");
        assert_eq!(err.not_bound().map(|e| e.type_name.as_str()), Some("Logger"));
    }
}
