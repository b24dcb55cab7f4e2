//! Declarative annotations and the reader abstraction over them.

use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::sync::Arc;

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};

use super::ClassDescriptor;
use crate::Scope;

/// Names of the annotations the injector itself interprets.
pub mod names {
    pub const INJECT: &str = "Inject";
    pub const NAMED: &str = "Named";
    pub const POST_CONSTRUCT: &str = "PostConstruct";
    pub const PRE_DESTROY: &str = "PreDestroy";
    pub const SCOPE: &str = "Scope";
    pub const IMPLEMENTED_BY: &str = "ImplementedBy";
    pub const PROVIDED_BY: &str = "ProvidedBy";
}

/// A declarative annotation attached to a class, constructor or method.
///
/// Annotations are plain data: a name, an optional primary value and named
/// attributes. Built-in helpers cover the ones interpreted by the injector;
/// anything else is a user annotation, indexed by the definition scanner and
/// matchable with [`Matcher::annotated_with`](crate::Matcher::annotated_with).
///
/// # Examples
///
/// ```rust
/// use ferrous_weave::Annotation;
///
/// let inject = Annotation::optional_inject();
/// assert_eq!(inject.name(), "Inject");
/// assert!(inject.attr_bool("optional"));
///
/// let named = Annotation::named("db=primary,log=audit");
/// assert_eq!(named.value_str(), Some("db=primary,log=audit"));
///
/// let custom = Annotation::new("Transactional").with_attr("isolation", "serializable");
/// assert_eq!(custom.to_string(), "@Transactional(isolation=\"serializable\")");
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Annotation {
    name: String,
    #[serde(default)]
    value: serde_json::Value,
    #[serde(default)]
    attributes: BTreeMap<String, serde_json::Value>,
}

impl Annotation {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: serde_json::Value::Null,
            attributes: BTreeMap::new(),
        }
    }

    pub fn with_value(mut self, value: impl Into<serde_json::Value>) -> Self {
        self.value = value.into();
        self
    }

    pub fn with_attr(mut self, key: impl Into<String>, value: impl Into<serde_json::Value>) -> Self {
        self.attributes.insert(key.into(), value.into());
        self
    }

    /// Marks a constructor or setter as an injection point.
    pub fn inject() -> Self {
        Self::new(names::INJECT)
    }

    /// Injection point that is skipped when its dependency is unbound.
    pub fn optional_inject() -> Self {
        Self::inject().with_attr("optional", true)
    }

    /// Qualifies injected parameters: a single name, or `param=name` pairs
    /// separated by commas.
    pub fn named(value: impl Into<String>) -> Self {
        Self::new(names::NAMED).with_value(value.into())
    }

    pub fn post_construct() -> Self {
        Self::new(names::POST_CONSTRUCT)
    }

    pub fn pre_destroy() -> Self {
        Self::new(names::PRE_DESTROY)
    }

    pub fn scope(scope: Scope) -> Self {
        Self::new(names::SCOPE).with_value(scope.as_str())
    }

    /// Default implementation used when the annotated type is unbound.
    pub fn implemented_by(class: impl Into<String>) -> Self {
        Self::new(names::IMPLEMENTED_BY).with_value(class.into())
    }

    /// Default provider used when the annotated type is unbound.
    pub fn provided_by(provider: impl Into<String>) -> Self {
        Self::new(names::PROVIDED_BY).with_value(provider.into())
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn is(&self, name: &str) -> bool {
        self.name == name
    }

    pub fn value(&self) -> &serde_json::Value {
        &self.value
    }

    pub fn value_str(&self) -> Option<&str> {
        self.value.as_str()
    }

    pub fn attr(&self, key: &str) -> Option<&serde_json::Value> {
        self.attributes.get(key)
    }

    pub fn attr_bool(&self, key: &str) -> bool {
        self.attr(key).and_then(|v| v.as_bool()).unwrap_or(false)
    }

    pub fn attributes(&self) -> &BTreeMap<String, serde_json::Value> {
        &self.attributes
    }
}

impl fmt::Display for Annotation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "@{}", self.name)?;
        let mut parts = Vec::new();
        if !self.value.is_null() {
            parts.push(self.value.to_string());
        }
        for (k, v) in &self.attributes {
            parts.push(format!("{}={}", k, v));
        }
        if !parts.is_empty() {
            write!(f, "({})", parts.join(", "))?;
        }
        Ok(())
    }
}

/// Source of annotations for classes, constructors and methods.
///
/// The default [`DeclaredReader`] returns what was declared on the
/// descriptors. Readers backed by another store (generated metadata, a
/// cache) can be plugged into the injector builder.
pub trait AnnotationReader: Send + Sync {
    fn class_annotations(&self, class: &ClassDescriptor) -> Vec<Annotation>;

    fn constructor_annotations(&self, class: &ClassDescriptor) -> Vec<Annotation>;

    fn method_annotations(&self, class: &ClassDescriptor, method: &str) -> Vec<Annotation>;

    /// First class annotation named `name`.
    fn class_annotation(&self, class: &ClassDescriptor, name: &str) -> Option<Annotation> {
        self.class_annotations(class).into_iter().find(|a| a.is(name))
    }

    /// First annotation named `name` on `method`.
    fn method_annotation(
        &self,
        class: &ClassDescriptor,
        method: &str,
        name: &str,
    ) -> Option<Annotation> {
        self.method_annotations(class, method)
            .into_iter()
            .find(|a| a.is(name))
    }
}

/// Reads the annotations declared on the descriptors.
#[derive(Debug, Default, Clone, Copy)]
pub struct DeclaredReader;

impl AnnotationReader for DeclaredReader {
    fn class_annotations(&self, class: &ClassDescriptor) -> Vec<Annotation> {
        class.annotations().to_vec()
    }

    fn constructor_annotations(&self, class: &ClassDescriptor) -> Vec<Annotation> {
        class
            .declared_constructor()
            .map(|c| c.annotations().to_vec())
            .unwrap_or_default()
    }

    fn method_annotations(&self, class: &ClassDescriptor, method: &str) -> Vec<Annotation> {
        class
            .find_method(method)
            .map(|m| m.annotations().to_vec())
            .unwrap_or_default()
    }
}

/// Fetch-or-compute cache in front of another reader.
pub struct CachedReader<R> {
    inner: R,
    cache: RwLock<HashMap<String, Arc<[Annotation]>>>,
}

impl<R: AnnotationReader> CachedReader<R> {
    pub fn new(inner: R) -> Self {
        Self {
            inner,
            cache: RwLock::new(HashMap::new()),
        }
    }

    /// Number of cached entries.
    pub fn len(&self) -> usize {
        self.cache.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.cache.read().is_empty()
    }

    fn fetch(&self, key: String, compute: impl FnOnce() -> Vec<Annotation>) -> Vec<Annotation> {
        if let Some(hit) = self.cache.read().get(&key) {
            return hit.to_vec();
        }
        let computed: Arc<[Annotation]> = compute().into();
        self.cache.write().entry(key).or_insert(computed).to_vec()
    }
}

impl<R: AnnotationReader> AnnotationReader for CachedReader<R> {
    fn class_annotations(&self, class: &ClassDescriptor) -> Vec<Annotation> {
        self.fetch(class.name().to_string(), || self.inner.class_annotations(class))
    }

    fn constructor_annotations(&self, class: &ClassDescriptor) -> Vec<Annotation> {
        self.fetch(format!("{}::new", class.name()), || {
            self.inner.constructor_annotations(class)
        })
    }

    fn method_annotations(&self, class: &ClassDescriptor, method: &str) -> Vec<Annotation> {
        self.fetch(format!("{}::{}()", class.name(), method), || {
            self.inner.method_annotations(class, method)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct CountingReader(AtomicUsize);

    impl AnnotationReader for CountingReader {
        fn class_annotations(&self, _: &ClassDescriptor) -> Vec<Annotation> {
            self.0.fetch_add(1, Ordering::SeqCst);
            vec![Annotation::new("Marker")]
        }
        fn constructor_annotations(&self, _: &ClassDescriptor) -> Vec<Annotation> {
            Vec::new()
        }
        fn method_annotations(&self, _: &ClassDescriptor, _: &str) -> Vec<Annotation> {
            Vec::new()
        }
    }

    #[test]
    fn cached_reader_computes_once() {
        let reader = CachedReader::new(CountingReader(AtomicUsize::new(0)));
        let class = ClassDescriptor::interface("Marked");
        assert_eq!(reader.class_annotations(&class).len(), 1);
        assert_eq!(reader.class_annotations(&class).len(), 1);
        assert_eq!(reader.inner.0.load(Ordering::SeqCst), 1);
        assert!(reader.class_annotation(&class, "Marker").is_some());
    }

    #[test]
    fn display_includes_value() {
        assert_eq!(Annotation::scope(Scope::Singleton).to_string(), "@Scope(\"Singleton\")");
        assert_eq!(Annotation::inject().to_string(), "@Inject");
    }
}
