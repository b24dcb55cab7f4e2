//! Per-class method -> interceptor mapping.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use sha2::{Digest, Sha256};

use super::{MethodInterceptor, Pointcut};
use crate::matcher::MatchContext;
use crate::reflect::ClassDescriptor;
use crate::{Annotation, DiResult};

/// Interceptors bound to the methods of one class.
///
/// Contributions of several pointcuts to the same method concatenate in
/// pointcut order, so the first registered interceptor wraps the others.
///
/// # Examples
///
/// ```rust
/// use std::sync::Arc;
/// use ferrous_weave::{Bind, FnInterceptor, MethodInterceptor};
///
/// let a: Arc<dyn MethodInterceptor> = Arc::new(FnInterceptor::new("A", |inv| inv.proceed()));
/// let b: Arc<dyn MethodInterceptor> = Arc::new(FnInterceptor::new("B", |inv| inv.proceed()));
///
/// let mut bind = Bind::new();
/// bind.bind_interceptors("save", vec![a], None);
/// bind.bind_interceptors("save", vec![b], None);
///
/// assert!(bind.has_binding());
/// assert_eq!(bind.interceptors("save").map(|c| c.len()), Some(2));
/// assert!(bind.interceptors("load").is_none());
/// assert_eq!(bind.to_string(), "save => A,B");
/// ```
#[derive(Clone, Default)]
pub struct Bind {
    methods: BTreeMap<String, Vec<Arc<dyn MethodInterceptor>>>,
    annotations: BTreeMap<String, Annotation>,
}

impl Bind {
    pub fn new() -> Self {
        Self::default()
    }

    /// Collects the interceptors of every pointcut matching `class`.
    ///
    /// Annotation-binding method matchers select the annotated public
    /// methods and record the triggering annotation; other method matchers
    /// are evaluated against each public method. Mutating methods only run
    /// while an object is being built and are never woven.
    pub fn bind(
        &mut self,
        class: &ClassDescriptor,
        pointcuts: &[Pointcut],
        cx: &MatchContext<'_>,
    ) -> DiResult<&mut Self> {
        for pointcut in pointcuts {
            if !pointcut.class_matcher().matches_class(class, cx)? {
                continue;
            }
            let method_matcher = pointcut.method_matcher();
            if method_matcher.is_annotation_binding() {
                for matched in method_matcher.annotated_methods(class, cx) {
                    if class.find_method(&matched.method).map_or(true, |m| m.is_mutating()) {
                        continue;
                    }
                    self.bind_interceptors(
                        &matched.method,
                        pointcut.interceptors().to_vec(),
                        Some(matched.annotation),
                    );
                }
                continue;
            }
            for method in class.public_methods().filter(|m| !m.is_mutating()) {
                if method_matcher.matches_method(class, method, cx)? {
                    self.bind_interceptors(method.name(), pointcut.interceptors().to_vec(), None);
                }
            }
        }
        Ok(self)
    }

    /// Appends interceptors to `method`.
    pub fn bind_interceptors(
        &mut self,
        method: &str,
        interceptors: Vec<Arc<dyn MethodInterceptor>>,
        annotation: Option<Annotation>,
    ) {
        self.methods
            .entry(method.to_string())
            .or_default()
            .extend(interceptors);
        if let Some(annotation) = annotation {
            self.annotations.insert(method.to_string(), annotation);
        }
    }

    pub fn has_binding(&self) -> bool {
        !self.methods.is_empty()
    }

    /// Interceptors bound to `method`, or `None` when the call should go
    /// straight to the method body.
    pub fn interceptors(&self, method: &str) -> Option<&[Arc<dyn MethodInterceptor>]> {
        self.methods
            .get(method)
            .filter(|chain| !chain.is_empty())
            .map(Vec::as_slice)
    }

    pub fn annotation(&self, method: &str) -> Option<&Annotation> {
        self.annotations.get(method)
    }

    /// Bound method names in sorted order.
    pub fn methods(&self) -> impl Iterator<Item = &str> {
        self.methods.keys().map(String::as_str)
    }

    pub(crate) fn interceptor_names(&self, method: &str) -> Vec<String> {
        self.methods
            .get(method)
            .map(|chain| chain.iter().map(|i| i.name().to_string()).collect())
            .unwrap_or_default()
    }

    /// Content hash of the rendering, triggering annotations included;
    /// equal binds hash equally.
    pub fn hash(&self) -> String {
        let digest = Sha256::digest(self.to_string().as_bytes());
        hex::encode(digest)[..32].to_string()
    }
}

impl fmt::Display for Bind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let entries: Vec<String> = self
            .methods
            .keys()
            .map(|method| {
                let chain = self.interceptor_names(method).join(",");
                match self.annotations.get(method) {
                    Some(annotation) => format!("{} {} => {}", method, annotation, chain),
                    None => format!("{} => {}", method, chain),
                }
            })
            .collect();
        f.write_str(&entries.join(","))
    }
}

impl fmt::Debug for Bind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let methods: BTreeMap<&str, Vec<String>> = self
            .methods
            .keys()
            .map(|m| (m.as_str(), self.interceptor_names(m)))
            .collect();
        f.debug_struct("Bind")
            .field("methods", &methods)
            .field("annotations", &self.annotations)
            .finish()
    }
}
