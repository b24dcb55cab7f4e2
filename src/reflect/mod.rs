//! Class registry: the statically-populated description of every type the
//! injector can build or match against.
//!
//! Instead of inspecting types at run time, applications register a
//! [`ClassDescriptor`] per class at start-up. A descriptor names the class,
//! its kind, its parent and interfaces, its annotations, a constructor
//! factory with parameter specs, and the methods its instances expose.

pub mod annotation;

use std::any::{type_name, Any};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use crate::key::normalize;
use crate::value::AnyBox;
use crate::{Annotation, Args, DiError, DiResult, Value};

type FactoryFn = Arc<dyn Fn(&Args) -> DiResult<AnyBox> + Send + Sync>;
type SharedFn = Arc<dyn Fn(&(dyn Any + Send + Sync), &Args) -> DiResult<Value> + Send + Sync>;
type MutatingFn = Arc<dyn Fn(&mut (dyn Any + Send + Sync), &Args) -> DiResult<()> + Send + Sync>;
type ProviderFn = Arc<dyn Fn(&(dyn Any + Send + Sync)) -> DiResult<Value> + Send + Sync>;

/// Provider capability, used by `to_provider` bindings and `ProvidedBy`.
///
/// # Examples
///
/// ```rust
/// use ferrous_weave::{ClassDescriptor, Constructor, DiResult, Provider, Value};
///
/// #[derive(Default)]
/// struct DsnProvider;
///
/// impl Provider for DsnProvider {
///     fn get(&self) -> DiResult<Value> {
///         Ok(Value::from("sqlite::memory:"))
///     }
/// }
///
/// let class = ClassDescriptor::concrete("DsnProvider")
///     .constructor(Constructor::default_of::<DsnProvider>())
///     .provider::<DsnProvider>();
/// assert!(class.is_provider());
/// ```
pub trait Provider: Send + Sync + 'static {
    /// Produces a fresh instance.
    fn get(&self) -> DiResult<Value>;
}

/// Kind of a registered class.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClassKind {
    /// Instantiable class
    Concrete,
    /// Class with a parent role only; must be bound to be resolved
    Abstract,
    /// Interface; must be bound (or carry a JIT default) to be resolved
    Interface,
}

/// Declared parameter of a constructor or method.
#[derive(Debug, Clone)]
pub struct Param {
    name: String,
    type_name: Option<String>,
    default: Option<Value>,
}

impl Param {
    /// Untyped (scalar) parameter.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            type_name: None,
            default: None,
        }
    }

    /// Parameter with a declared dependency type.
    pub fn of(name: impl Into<String>, type_name: impl AsRef<str>) -> Self {
        Self::new(name).typed(type_name)
    }

    pub fn typed(mut self, type_name: impl AsRef<str>) -> Self {
        self.type_name = Some(normalize(type_name.as_ref()).to_string());
        self
    }

    pub fn default(mut self, value: impl Into<Value>) -> Self {
        self.default = Some(value.into());
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn type_name(&self) -> Option<&str> {
        self.type_name.as_deref()
    }

    pub fn default_value(&self) -> Option<&Value> {
        self.default.as_ref()
    }
}

/// Constructor of a concrete class: a factory closure plus parameter specs.
#[derive(Clone)]
pub struct Constructor {
    params: Vec<Param>,
    annotations: Vec<Annotation>,
    factory: FactoryFn,
}

impl Constructor {
    pub fn new<T, F>(factory: F) -> Self
    where
        T: Any + Send + Sync,
        F: Fn(&Args) -> DiResult<T> + Send + Sync + 'static,
    {
        Self {
            params: Vec::new(),
            annotations: Vec::new(),
            factory: Arc::new(move |args: &Args| Ok(Box::new(factory(args)?) as AnyBox)),
        }
    }

    /// Parameterless constructor using `Default`.
    pub fn default_of<T: Any + Send + Sync + Default>() -> Self {
        Self::new(|_| Ok(T::default()))
    }

    pub fn param(mut self, param: Param) -> Self {
        self.params.push(param);
        self
    }

    pub fn annotate(mut self, annotation: Annotation) -> Self {
        self.annotations.push(annotation);
        self
    }

    pub fn params(&self) -> &[Param] {
        &self.params
    }

    pub fn annotations(&self) -> &[Annotation] {
        &self.annotations
    }

    pub(crate) fn build(&self, args: &Args) -> DiResult<AnyBox> {
        (self.factory)(args)
    }
}

impl fmt::Debug for Constructor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Constructor")
            .field("params", &self.params)
            .field("annotations", &self.annotations)
            .finish_non_exhaustive()
    }
}

/// Body of a method.
#[derive(Clone)]
pub enum MethodBody {
    /// Callable on a built object; interceptable
    Shared(SharedFn),
    /// Callable only while the object is being built (setters, post-construct)
    Mutating(MutatingFn),
}

/// A method exposed by instances of a class.
#[derive(Clone)]
pub struct Method {
    name: String,
    public: bool,
    params: Vec<Param>,
    annotations: Vec<Annotation>,
    body: MethodBody,
}

fn receiver_mismatch<T>() -> DiError {
    DiError::TypeMismatch(type_name::<T>().to_string())
}

impl Method {
    /// Method taking `&self`.
    pub fn shared<T, F>(name: impl Into<String>, body: F) -> Self
    where
        T: Any + Send + Sync,
        F: Fn(&T, &Args) -> DiResult<Value> + Send + Sync + 'static,
    {
        let body: SharedFn = Arc::new(move |this: &(dyn Any + Send + Sync), args: &Args| {
            let this = this.downcast_ref::<T>().ok_or_else(receiver_mismatch::<T>)?;
            body(this, args)
        });
        Self::with_body(name, MethodBody::Shared(body))
    }

    /// Method taking `&mut self`; only callable during construction.
    pub fn mutating<T, F>(name: impl Into<String>, body: F) -> Self
    where
        T: Any + Send + Sync,
        F: Fn(&mut T, &Args) -> DiResult<()> + Send + Sync + 'static,
    {
        let body: MutatingFn = Arc::new(move |this: &mut (dyn Any + Send + Sync), args: &Args| {
            let this = this.downcast_mut::<T>().ok_or_else(receiver_mismatch::<T>)?;
            body(this, args)
        });
        Self::with_body(name, MethodBody::Mutating(body))
    }

    fn with_body(name: impl Into<String>, body: MethodBody) -> Self {
        Self {
            name: name.into(),
            public: true,
            params: Vec::new(),
            annotations: Vec::new(),
            body,
        }
    }

    pub fn param(mut self, param: Param) -> Self {
        self.params.push(param);
        self
    }

    pub fn annotate(mut self, annotation: Annotation) -> Self {
        self.annotations.push(annotation);
        self
    }

    /// Hides the method from weaving and from `Object::invoke`.
    pub fn private(mut self) -> Self {
        self.public = false;
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn is_public(&self) -> bool {
        self.public
    }

    pub fn is_mutating(&self) -> bool {
        matches!(self.body, MethodBody::Mutating(_))
    }

    pub fn params(&self) -> &[Param] {
        &self.params
    }

    pub fn annotations(&self) -> &[Annotation] {
        &self.annotations
    }

    pub(crate) fn call_shared(
        &self,
        class: &str,
        this: &(dyn Any + Send + Sync),
        args: &Args,
    ) -> DiResult<Value> {
        match &self.body {
            MethodBody::Shared(body) => body(this, args),
            MethodBody::Mutating(_) => Err(DiError::ReceiverNotMutable {
                class: class.to_string(),
                method: self.name.clone(),
            }),
        }
    }

    pub(crate) fn call_mut(&self, this: &mut (dyn Any + Send + Sync), args: &Args) -> DiResult<Value> {
        match &self.body {
            MethodBody::Shared(body) => body(&*this, args),
            MethodBody::Mutating(body) => body(this, args).map(|_| Value::null()),
        }
    }
}

impl fmt::Debug for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Method")
            .field("name", &self.name)
            .field("public", &self.public)
            .field("mutating", &self.is_mutating())
            .field("params", &self.params)
            .field("annotations", &self.annotations)
            .finish()
    }
}

/// Description of one class.
///
/// # Examples
///
/// ```rust
/// use ferrous_weave::{Annotation, Args, ClassDescriptor, Constructor, Method, Param, Scope, Value};
///
/// struct Greeter { greeting: String }
///
/// let class = ClassDescriptor::concrete("App\\Greeter")
///     .implements("App\\GreeterInterface")
///     .annotate(Annotation::scope(Scope::Singleton))
///     .constructor(
///         Constructor::new(|args: &Args| Ok(Greeter { greeting: args.str(0)?.to_string() }))
///             .param(Param::new("greeting").default("hello")),
///     )
///     .method(Method::shared("greet", |g: &Greeter, args: &Args| {
///         Ok(Value::from(format!("{}, {}", g.greeting, args.str(0)?)))
///     }));
///
/// assert_eq!(class.name(), "App\\Greeter");
/// assert!(!class.is_abstract());
/// assert_eq!(class.public_methods().count(), 1);
/// ```
#[derive(Clone, Debug)]
pub struct ClassDescriptor {
    name: String,
    kind: ClassKind,
    parent: Option<String>,
    interfaces: Vec<String>,
    annotations: Vec<Annotation>,
    constructor: Option<Constructor>,
    methods: Vec<Method>,
    provider: Option<ProviderFnHandle>,
}

#[derive(Clone)]
struct ProviderFnHandle(ProviderFn);

impl fmt::Debug for ProviderFnHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Provider")
    }
}

impl ClassDescriptor {
    fn with_kind(name: impl AsRef<str>, kind: ClassKind) -> Self {
        Self {
            name: normalize(name.as_ref()).to_string(),
            kind,
            parent: None,
            interfaces: Vec::new(),
            annotations: Vec::new(),
            constructor: None,
            methods: Vec::new(),
            provider: None,
        }
    }

    pub fn concrete(name: impl AsRef<str>) -> Self {
        Self::with_kind(name, ClassKind::Concrete)
    }

    pub fn abstract_class(name: impl AsRef<str>) -> Self {
        Self::with_kind(name, ClassKind::Abstract)
    }

    pub fn interface(name: impl AsRef<str>) -> Self {
        Self::with_kind(name, ClassKind::Interface)
    }

    pub fn extends(mut self, parent: impl AsRef<str>) -> Self {
        self.parent = Some(normalize(parent.as_ref()).to_string());
        self
    }

    pub fn implements(mut self, interface: impl AsRef<str>) -> Self {
        self.interfaces.push(normalize(interface.as_ref()).to_string());
        self
    }

    pub fn annotate(mut self, annotation: Annotation) -> Self {
        self.annotations.push(annotation);
        self
    }

    pub fn constructor(mut self, constructor: Constructor) -> Self {
        self.constructor = Some(constructor);
        self
    }

    /// Adds a method, replacing any earlier one of the same name.
    pub fn method(mut self, method: Method) -> Self {
        self.methods.retain(|m| m.name != method.name);
        self.methods.push(method);
        self
    }

    /// Declares the provider capability, implemented by `P`.
    pub fn provider<P: Provider>(mut self) -> Self {
        let get: ProviderFn = Arc::new(|this: &(dyn Any + Send + Sync)| {
            this.downcast_ref::<P>()
                .ok_or_else(receiver_mismatch::<P>)?
                .get()
        });
        self.provider = Some(ProviderFnHandle(get));
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn kind(&self) -> ClassKind {
        self.kind
    }

    /// Interfaces and abstract classes cannot be instantiated.
    pub fn is_abstract(&self) -> bool {
        self.kind != ClassKind::Concrete
    }

    pub fn parent(&self) -> Option<&str> {
        self.parent.as_deref()
    }

    pub fn interfaces(&self) -> &[String] {
        &self.interfaces
    }

    pub fn annotations(&self) -> &[Annotation] {
        &self.annotations
    }

    pub fn declared_constructor(&self) -> Option<&Constructor> {
        self.constructor.as_ref()
    }

    pub fn constructor_params(&self) -> &[Param] {
        self.constructor.as_ref().map(|c| c.params()).unwrap_or(&[])
    }

    pub fn methods(&self) -> &[Method] {
        &self.methods
    }

    /// The method registered under `name`, public or not.
    pub fn find_method(&self, name: &str) -> Option<&Method> {
        self.methods.iter().find(|m| m.name == name)
    }

    pub fn public_methods(&self) -> impl Iterator<Item = &Method> {
        self.methods.iter().filter(|m| m.public)
    }

    pub fn is_provider(&self) -> bool {
        self.provider.is_some()
    }

    pub(crate) fn instantiate(&self, args: &Args) -> DiResult<AnyBox> {
        match (&self.constructor, self.kind) {
            (Some(constructor), ClassKind::Concrete) => constructor.build(args),
            _ => Err(DiError::MethodNotFound {
                class: self.name.clone(),
                method: "new".to_string(),
            }),
        }
    }

    pub(crate) fn provide(&self, this: &(dyn Any + Send + Sync)) -> DiResult<Value> {
        match &self.provider {
            Some(ProviderFnHandle(get)) => get(this),
            None => Err(DiError::InvalidProvider(self.name.clone())),
        }
    }
}

/// Registry of class descriptors keyed by normalized name.
///
/// # Examples
///
/// ```rust
/// use ferrous_weave::{ClassDescriptor, ClassRegistry, DiError};
///
/// let mut registry = ClassRegistry::new();
/// registry
///     .register(ClassDescriptor::interface("Logger"))
///     .register(ClassDescriptor::concrete("FileLogger").implements("Logger"));
///
/// assert!(registry.is_subclass_of("FileLogger", "Logger"));
/// assert!(matches!(registry.get("Missing"), Err(DiError::NotReadable(_))));
/// ```
#[derive(Clone, Debug, Default)]
pub struct ClassRegistry {
    classes: HashMap<String, Arc<ClassDescriptor>>,
}

impl ClassRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a class, replacing any earlier descriptor with the same name.
    pub fn register(&mut self, class: ClassDescriptor) -> &mut Self {
        self.classes.insert(class.name.clone(), Arc::new(class));
        self
    }

    /// Builder-style registration.
    pub fn with(mut self, class: ClassDescriptor) -> Self {
        self.register(class);
        self
    }

    /// Fails with `NotReadable` for unknown classes.
    pub fn get(&self, name: &str) -> DiResult<Arc<ClassDescriptor>> {
        self.find(name)
            .cloned()
            .ok_or_else(|| DiError::NotReadable(normalize(name).to_string()))
    }

    pub fn find(&self, name: &str) -> Option<&Arc<ClassDescriptor>> {
        self.classes.get(normalize(name))
    }

    pub fn contains(&self, name: &str) -> bool {
        self.find(name).is_some()
    }

    pub fn len(&self) -> usize {
        self.classes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.classes.is_empty()
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.classes.keys().map(String::as_str)
    }

    /// Parent chain of `name`, nearest parent first.
    pub fn ancestors(&self, name: &str) -> Vec<Arc<ClassDescriptor>> {
        let mut chain = Vec::new();
        let mut current = self.find(name).and_then(|c| c.parent.clone());
        while let Some(parent) = current {
            match self.find(&parent) {
                Some(class) if !chain.iter().any(|c: &Arc<ClassDescriptor>| c.name == class.name) => {
                    current = class.parent.clone();
                    chain.push(Arc::clone(class));
                }
                _ => break,
            }
        }
        chain
    }

    /// Whether `class` extends or implements `ancestor`, transitively.
    /// A class is not its own subclass.
    pub fn is_subclass_of(&self, class: &str, ancestor: &str) -> bool {
        let ancestor = normalize(ancestor);
        let mut pending = vec![normalize(class).to_string()];
        let mut seen = Vec::new();
        while let Some(current) = pending.pop() {
            let Some(desc) = self.find(&current) else {
                continue;
            };
            let supers = desc.parent.iter().chain(desc.interfaces.iter());
            for sup in supers {
                if sup == ancestor {
                    return true;
                }
                if !seen.contains(sup) {
                    seen.push(sup.clone());
                    pending.push(sup.clone());
                }
            }
        }
        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Counter {
        n: i64,
    }

    fn registry() -> ClassRegistry {
        ClassRegistry::new()
            .with(ClassDescriptor::interface("Countable"))
            .with(ClassDescriptor::abstract_class("Base").implements("Countable"))
            .with(
                ClassDescriptor::concrete("Counter")
                    .extends("Base")
                    .constructor(Constructor::new(|_| Ok(Counter { n: 1 })))
                    .method(Method::shared("get", |c: &Counter, _| Ok(Value::from(c.n))))
                    .method(Method::mutating("bump", |c: &mut Counter, _| {
                        c.n += 1;
                        Ok(())
                    })),
            )
    }

    #[test]
    fn subclass_walks_parents_and_interfaces() {
        let r = registry();
        assert!(r.is_subclass_of("Counter", "Base"));
        assert!(r.is_subclass_of("\\Counter", "Countable"));
        assert!(!r.is_subclass_of("Counter", "Counter"));
        assert_eq!(r.ancestors("Counter").len(), 1);
    }

    #[test]
    fn mutating_method_rejects_shared_receiver() {
        let r = registry();
        let class = r.get("Counter").unwrap();
        let mut built = class.instantiate(&Args::new()).unwrap();
        class.find_method("bump").unwrap().call_mut(built.as_mut(), &Args::new()).unwrap();
        let got = class.find_method("get").unwrap().call_shared("Counter", built.as_ref(), &Args::new()).unwrap();
        assert_eq!(got.as_i64(), Some(2));
        let err = class.find_method("bump").unwrap().call_shared("Counter", built.as_ref(), &Args::new());
        assert!(matches!(err, Err(DiError::ReceiverNotMutable { .. })));
    }

    #[test]
    fn builder_and_lookup_agree() {
        let r = registry();
        let class = r.get("Counter").unwrap();
        assert!(class.declared_constructor().is_some());
        assert!(r.get("Base").unwrap().declared_constructor().is_none());
        assert_eq!(class.find_method("get").map(|m| m.name()), Some("get"));
        assert!(class.find_method("missing").is_none());
    }

    #[test]
    fn abstract_class_cannot_be_instantiated() {
        let r = registry();
        assert!(r.get("Base").unwrap().instantiate(&Args::new()).is_err());
    }
}
