//! Class and method matchers deciding where interceptors apply.

use std::fmt;

use once_cell::sync::Lazy;

use crate::reflect::annotation::AnnotationReader;
use crate::reflect::{ClassDescriptor, ClassRegistry, Method};
use crate::{Annotation, DiError, DiResult};

/// Method names `Matcher::any` never selects: dunder-prefixed names are
/// filtered separately; these are the container and formatting protocol.
static RESERVED_METHODS: Lazy<Vec<&'static str>> = Lazy::new(|| {
    vec![
        "clone", "drop", "fmt", "eq", "ne", "hash", "deref", "deref_mut", "index", "index_mut",
        "into_iter", "iter", "len", "is_empty", "serialize", "deserialize",
    ]
});

/// Everything a matcher may need to look at besides its target.
pub struct MatchContext<'a> {
    pub registry: &'a ClassRegistry,
    pub reader: &'a dyn AnnotationReader,
}

/// A method selected by an annotation-binding matcher.
#[derive(Debug, Clone, PartialEq)]
pub struct MatchedMethod {
    pub method: String,
    pub annotation: Annotation,
}

/// Boolean expression over classes and methods.
///
/// Combinators evaluate every operand, then fold left.
///
/// # Examples
///
/// ```rust
/// use ferrous_weave::{
///     Annotation, ClassDescriptor, ClassRegistry, DeclaredReader, MatchContext, Matcher, Method, Value,
/// };
///
/// struct Repo;
///
/// let registry = ClassRegistry::new()
///     .with(ClassDescriptor::interface("Repository"))
///     .with(
///         ClassDescriptor::concrete("UserRepository")
///             .implements("Repository")
///             .method(Method::shared("find", |_: &Repo, _| Ok(Value::null())))
///             .method(Method::shared("save", |_: &Repo, _| Ok(Value::null())).annotate(Annotation::new("Transactional"))),
///     );
/// let cx = MatchContext { registry: &registry, reader: &DeclaredReader };
/// let class = registry.get("UserRepository").unwrap();
///
/// let classes = Matcher::logical_and(Matcher::subclasses_of("Repository"), Matcher::starts_with("User"));
/// assert!(classes.matches_class(&class, &cx).unwrap());
///
/// let methods = Matcher::annotated_with("Transactional");
/// let matched = methods.annotated_methods(&class, &cx);
/// assert_eq!(matched.len(), 1);
/// assert_eq!(matched[0].method, "save");
/// assert_eq!(methods.to_string(), "annotatedWith:[\"Transactional\"]");
/// ```
#[derive(Debug, Clone, PartialEq)]
pub enum Matcher {
    Any,
    AnnotatedWith(String),
    SubclassesOf(String),
    StartsWith(String),
    Or(Vec<Matcher>),
    And(Vec<Matcher>),
    Xor(Vec<Matcher>),
    Not(Box<Matcher>),
}

impl Matcher {
    pub fn any() -> Self {
        Matcher::Any
    }

    pub fn annotated_with(annotation: impl Into<String>) -> Self {
        Matcher::AnnotatedWith(annotation.into())
    }

    pub fn subclasses_of(class: impl AsRef<str>) -> Self {
        Matcher::SubclassesOf(crate::key::normalize(class.as_ref()).to_string())
    }

    pub fn starts_with(prefix: impl Into<String>) -> Self {
        Matcher::StartsWith(prefix.into())
    }

    /// Alias of [`Matcher::starts_with`].
    pub fn start_with(prefix: impl Into<String>) -> Self {
        Self::starts_with(prefix)
    }

    pub fn logical_or(a: Matcher, b: Matcher) -> Self {
        Matcher::Or(vec![a, b])
    }

    pub fn logical_and(a: Matcher, b: Matcher) -> Self {
        Matcher::And(vec![a, b])
    }

    pub fn logical_xor(a: Matcher, b: Matcher) -> Self {
        Matcher::Xor(vec![a, b])
    }

    pub fn logical_not(m: Matcher) -> Self {
        Matcher::Not(Box::new(m))
    }

    /// Appends an operand to an `or`, or starts a new one.
    pub fn or(self, other: Matcher) -> Self {
        match self {
            Matcher::Or(mut operands) => {
                operands.push(other);
                Matcher::Or(operands)
            }
            first => Matcher::logical_or(first, other),
        }
    }

    pub fn and(self, other: Matcher) -> Self {
        match self {
            Matcher::And(mut operands) => {
                operands.push(other);
                Matcher::And(operands)
            }
            first => Matcher::logical_and(first, other),
        }
    }

    pub fn xor(self, other: Matcher) -> Self {
        match self {
            Matcher::Xor(mut operands) => {
                operands.push(other);
                Matcher::Xor(operands)
            }
            first => Matcher::logical_xor(first, other),
        }
    }

    /// Whether this matcher selects methods through their annotations, see
    /// [`Matcher::annotated_methods`].
    pub fn is_annotation_binding(&self) -> bool {
        matches!(self, Matcher::AnnotatedWith(_))
    }

    /// Evaluates against a class.
    pub fn matches_class(&self, class: &ClassDescriptor, cx: &MatchContext<'_>) -> DiResult<bool> {
        match self {
            Matcher::Any => Ok(true),
            Matcher::AnnotatedWith(name) => Ok(cx.reader.class_annotation(class, name).is_some()),
            Matcher::SubclassesOf(ancestor) => {
                Ok(class.name() == ancestor || cx.registry.is_subclass_of(class.name(), ancestor))
            }
            Matcher::StartsWith(prefix) => Ok(class.name().starts_with(prefix.as_str())),
            Matcher::Not(inner) => Ok(!inner.matches_class(class, cx)?),
            Matcher::Or(ops) | Matcher::And(ops) | Matcher::Xor(ops) => {
                let results = ops
                    .iter()
                    .map(|m| m.matches_class(class, cx))
                    .collect::<DiResult<Vec<_>>>()?;
                Ok(self.fold(&results))
            }
        }
    }

    /// Evaluates against one method of `class`.
    ///
    /// Fails with `MatcherInvalidArgument` for class-only predicates.
    pub fn matches_method(
        &self,
        class: &ClassDescriptor,
        method: &Method,
        cx: &MatchContext<'_>,
    ) -> DiResult<bool> {
        match self {
            Matcher::Any => Ok(!is_reserved(method.name())),
            Matcher::AnnotatedWith(name) => Ok(cx
                .reader
                .method_annotation(class, method.name(), name)
                .is_some()),
            Matcher::SubclassesOf(_) => Err(DiError::MatcherInvalidArgument(self.to_string())),
            Matcher::StartsWith(prefix) => Ok(method.name().starts_with(prefix.as_str())),
            Matcher::Not(inner) => Ok(!inner.matches_method(class, method, cx)?),
            Matcher::Or(ops) | Matcher::And(ops) | Matcher::Xor(ops) => {
                let results = ops
                    .iter()
                    .map(|m| m.matches_method(class, method, cx))
                    .collect::<DiResult<Vec<_>>>()?;
                Ok(self.fold(&results))
            }
        }
    }

    /// Public methods of `class` carrying the annotation, with the
    /// annotation instance. Empty unless [`Matcher::is_annotation_binding`].
    pub fn annotated_methods(&self, class: &ClassDescriptor, cx: &MatchContext<'_>) -> Vec<MatchedMethod> {
        let Matcher::AnnotatedWith(name) = self else {
            return Vec::new();
        };
        class
            .public_methods()
            .filter_map(|method| {
                cx.reader
                    .method_annotation(class, method.name(), name)
                    .map(|annotation| MatchedMethod {
                        method: method.name().to_string(),
                        annotation,
                    })
            })
            .collect()
    }

    fn fold(&self, results: &[bool]) -> bool {
        let mut iter = results.iter().copied();
        let first = iter.next().unwrap_or(false);
        match self {
            Matcher::Or(_) => iter.fold(first, |acc, r| acc || r),
            Matcher::And(_) => iter.fold(first, |acc, r| acc && r),
            Matcher::Xor(_) => iter.fold(first, |acc, r| acc ^ r),
            _ => first,
        }
    }

    fn predicate(&self) -> (&'static str, serde_json::Value) {
        let nested = |ops: &[Matcher]| {
            serde_json::Value::Array(ops.iter().map(|m| m.to_string().into()).collect())
        };
        match self {
            Matcher::Any => ("any", serde_json::json!([])),
            Matcher::AnnotatedWith(a) => ("annotatedWith", serde_json::json!([a])),
            Matcher::SubclassesOf(c) => ("subclassesOf", serde_json::json!([c])),
            Matcher::StartsWith(p) => ("startsWith", serde_json::json!([p])),
            Matcher::Or(ops) => ("logicalOr", nested(ops)),
            Matcher::And(ops) => ("logicalAnd", nested(ops)),
            Matcher::Xor(ops) => ("logicalXor", nested(ops)),
            Matcher::Not(m) => ("logicalNot", serde_json::json!([m.to_string()])),
        }
    }
}

fn is_reserved(method: &str) -> bool {
    method.starts_with("__") || RESERVED_METHODS.iter().any(|r| *r == method)
}

impl fmt::Display for Matcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let (name, args) = self.predicate();
        write!(f, "{}:{}", name, args)
    }
}
