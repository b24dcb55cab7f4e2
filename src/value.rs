//! Runtime values flowing through injection: data, built objects and lazy thunks.

use std::any::{type_name, Any};
use std::fmt;
use std::sync::{Arc, Weak};

use crate::aop::{Bind, MethodInvocation, WovenClass};
use crate::reflect::ClassDescriptor;
use crate::{DiError, DiResult};

/// Type-erased shared instance.
pub(crate) type AnyArc = Arc<dyn Any + Send + Sync>;
/// Type-erased owned instance, used while an object is still being built.
pub(crate) type AnyBox = Box<dyn Any + Send + Sync>;

/// A deferred value, evaluated at the point of use.
///
/// Lazy values may be bound with `to_instance`, passed as parameter
/// overrides or returned by providers; the injector forces them right
/// before handing them to a constructor or setter.
///
/// # Examples
///
/// ```rust
/// use ferrous_weave::{Lazy, Value};
///
/// let lazy = Lazy::new(|| Ok(Value::from("computed")));
/// assert_eq!(lazy.evaluate().unwrap().as_str(), Some("computed"));
/// ```
#[derive(Clone)]
pub struct Lazy(Arc<dyn Fn() -> DiResult<Value> + Send + Sync>);

impl Lazy {
    pub fn new<F>(f: F) -> Self
    where
        F: Fn() -> DiResult<Value> + Send + Sync + 'static,
    {
        Self(Arc::new(f))
    }

    /// Invokes the thunk, forcing nested thunks as well.
    pub fn evaluate(&self) -> DiResult<Value> {
        (self.0)()?.force()
    }
}

impl fmt::Debug for Lazy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Lazy(..)")
    }
}

/// A value produced or consumed by the injector.
///
/// Scalars, arrays and maps are carried as JSON data so bindings stay
/// serializable; everything built by the injector is an [`Object`].
#[derive(Clone, Debug)]
pub enum Value {
    /// Plain data (scalars, lists, maps, null)
    Data(serde_json::Value),
    /// A built instance
    Object(Object),
    /// A thunk evaluated at the point of use
    Lazy(Lazy),
}

impl Value {
    pub fn null() -> Self {
        Value::Data(serde_json::Value::Null)
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Value::Data(serde_json::Value::Null))
    }

    pub fn as_data(&self) -> Option<&serde_json::Value> {
        match self {
            Value::Data(data) => Some(data),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        self.as_data().and_then(|d| d.as_str())
    }

    pub fn as_i64(&self) -> Option<i64> {
        self.as_data().and_then(|d| d.as_i64())
    }

    pub fn as_bool(&self) -> Option<bool> {
        self.as_data().and_then(|d| d.as_bool())
    }

    pub fn as_object(&self) -> Option<&Object> {
        match self {
            Value::Object(object) => Some(object),
            _ => None,
        }
    }

    /// Converts into an object, failing with `TypeMismatch` naming `expected`.
    pub fn into_object(self, expected: &str) -> DiResult<Object> {
        match self.force()? {
            Value::Object(object) => Ok(object),
            _ => Err(DiError::TypeMismatch(expected.to_string())),
        }
    }

    /// Downcasts an object value to its concrete type.
    pub fn downcast<T: Any + Send + Sync>(&self) -> Option<Arc<T>> {
        self.as_object().and_then(|o| o.downcast::<T>())
    }

    /// Evaluates a lazy value; other values are returned unchanged.
    pub fn force(self) -> DiResult<Value> {
        match self {
            Value::Lazy(lazy) => lazy.evaluate(),
            other => Ok(other),
        }
    }

    /// Short human-readable description used by logs and module renderings.
    pub fn describe(&self) -> String {
        match self {
            Value::Object(object) => format!("(object) {}", object.class_name()),
            Value::Lazy(_) => "(lazy)".to_string(),
            Value::Data(data) => match data {
                serde_json::Value::Null => "(null)".to_string(),
                serde_json::Value::Bool(b) => format!("(bool) {}", b),
                serde_json::Value::Number(n) => format!("(number) {}", n),
                serde_json::Value::String(s) => format!("'{}'", s),
                other => other.to_string(),
            },
        }
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Value::Data(a), Value::Data(b)) => a == b,
            (Value::Object(a), Value::Object(b)) => Object::ptr_eq(a, b),
            (Value::Lazy(a), Value::Lazy(b)) => Arc::ptr_eq(&a.0, &b.0),
            _ => false,
        }
    }
}

impl From<serde_json::Value> for Value {
    fn from(data: serde_json::Value) -> Self {
        Value::Data(data)
    }
}

impl From<Object> for Value {
    fn from(object: Object) -> Self {
        Value::Object(object)
    }
}

impl From<Lazy> for Value {
    fn from(lazy: Lazy) -> Self {
        Value::Lazy(lazy)
    }
}

macro_rules! data_from {
    ($($t:ty),*) => {
        $(impl From<$t> for Value {
            fn from(v: $t) -> Self {
                Value::Data(serde_json::Value::from(v))
            }
        })*
    };
}

data_from!(&str, String, bool, i32, i64, u32, u64, f64);

/// Per-instance weaving: the compiled class plus the bind it was built with.
#[derive(Clone)]
pub(crate) struct Weave {
    pub(crate) class: Arc<WovenClass>,
    pub(crate) bind: Arc<Bind>,
}

struct ObjectInner {
    class: Arc<ClassDescriptor>,
    instance: AnyArc,
    weave: Option<Weave>,
}

/// Non-owning counterpart of [`Object`].
#[derive(Clone)]
pub(crate) struct WeakObject(Weak<ObjectInner>);

impl WeakObject {
    pub(crate) fn is_alive(&self) -> bool {
        self.0.strong_count() > 0
    }
}

/// Handle to a built instance.
///
/// Cloning is cheap and preserves identity. Calls made through
/// [`Object::invoke`] are routed through the interceptor chain when the
/// object was woven, and straight to the method body otherwise, so callers
/// cannot tell the two apart.
///
/// # Examples
///
/// ```rust
/// use ferrous_weave::Object;
///
/// struct Config { port: u16 }
///
/// let a = Object::new(Config { port: 8080 });
/// let b = a.clone();
/// assert!(Object::ptr_eq(&a, &b));
/// assert_eq!(a.downcast::<Config>().unwrap().port, 8080);
/// assert!(!a.is_woven());
/// ```
#[derive(Clone)]
pub struct Object {
    inner: Arc<ObjectInner>,
}

impl Object {
    /// Wraps an arbitrary value, described by a bare class named after its Rust type.
    pub fn new<T: Any + Send + Sync>(value: T) -> Self {
        let class = Arc::new(ClassDescriptor::concrete(type_name::<T>()));
        Self::from_parts(class, Arc::new(value), None)
    }

    /// Wraps a value described by a registered class, making its methods invocable.
    pub fn with_class<T: Any + Send + Sync>(class: Arc<ClassDescriptor>, value: T) -> Self {
        Self::from_parts(class, Arc::new(value), None)
    }

    pub(crate) fn from_parts(
        class: Arc<ClassDescriptor>,
        instance: AnyArc,
        weave: Option<Weave>,
    ) -> Self {
        Self {
            inner: Arc::new(ObjectInner {
                class,
                instance,
                weave,
            }),
        }
    }

    /// Name of the original (unwoven) class.
    pub fn class_name(&self) -> &str {
        self.inner.class.name()
    }

    pub fn class(&self) -> &Arc<ClassDescriptor> {
        &self.inner.class
    }

    pub fn is_woven(&self) -> bool {
        self.inner.weave.is_some()
    }

    /// The compiled woven class, for woven objects.
    pub fn woven_class(&self) -> Option<&Arc<WovenClass>> {
        self.inner.weave.as_ref().map(|w| &w.class)
    }

    /// The interceptor bind attached at construction, for woven objects.
    pub fn bind(&self) -> Option<&Bind> {
        self.inner.weave.as_ref().map(|w| w.bind.as_ref())
    }

    pub fn downcast<T: Any + Send + Sync>(&self) -> Option<Arc<T>> {
        Arc::clone(&self.inner.instance).downcast::<T>().ok()
    }

    pub fn downcast_ref<T: Any + Send + Sync>(&self) -> Option<&T> {
        self.inner.instance.downcast_ref::<T>()
    }

    /// Identity comparison.
    pub fn ptr_eq(a: &Object, b: &Object) -> bool {
        Arc::ptr_eq(&a.inner, &b.inner)
    }

    /// Handle that does not keep the object alive.
    pub(crate) fn downgrade(&self) -> WeakObject {
        WeakObject(Arc::downgrade(&self.inner))
    }

    /// Address-based identity, stable for the lifetime of the object.
    pub fn identity(&self) -> usize {
        Arc::as_ptr(&self.inner) as *const () as usize
    }

    pub(crate) fn instance(&self) -> &(dyn Any + Send + Sync) {
        self.inner.instance.as_ref()
    }

    /// Calls a public method by name.
    ///
    /// Fails with `MethodNotFound` when the class does not declare a public
    /// method of that name.
    pub fn invoke(&self, method: &str, args: impl Into<Args>) -> DiResult<Value> {
        let class = &self.inner.class;
        let target = class
            .find_method(method)
            .filter(|m| m.is_public())
            .ok_or_else(|| DiError::MethodNotFound {
                class: class.name().to_string(),
                method: method.to_string(),
            })?;
        let args = args.into();
        if let Some(weave) = &self.inner.weave {
            if let Some(chain) = weave.bind.interceptors(method) {
                let annotation = weave.bind.annotation(method);
                let mut invocation = MethodInvocation::new(self, target, args, chain, annotation);
                return invocation.proceed();
            }
        }
        target.call_shared(class.name(), self.instance(), &args)
    }

    /// Calls a declared method directly, bypassing interceptors; used for
    /// lifecycle hooks.
    pub(crate) fn call_unintercepted(&self, method: &str, args: &Args) -> DiResult<Value> {
        let class = &self.inner.class;
        let target = class.find_method(method).ok_or_else(|| DiError::MethodNotFound {
            class: class.name().to_string(),
            method: method.to_string(),
        })?;
        target.call_shared(class.name(), self.instance(), args)
    }

    /// Invokes the provider capability of this object.
    pub fn provide(&self) -> DiResult<Value> {
        self.inner.class.provide(self.instance())?.force()
    }
}

impl fmt::Debug for Object {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut s = f.debug_struct("Object");
        s.field("class", &self.class_name());
        if let Some(woven) = self.woven_class() {
            s.field("woven", &woven.name());
        }
        s.finish()
    }
}

/// An instance under construction.
///
/// Setters and post-construct hooks run here, with exclusive access and
/// without interception; [`Building::finish`] freezes it into an [`Object`].
pub struct Building {
    class: Arc<ClassDescriptor>,
    instance: AnyBox,
    weave: Option<Weave>,
}

impl Building {
    pub(crate) fn new(class: Arc<ClassDescriptor>, instance: AnyBox, weave: Option<Weave>) -> Self {
        Self {
            class,
            instance,
            weave,
        }
    }

    pub fn class_name(&self) -> &str {
        self.class.name()
    }

    /// Calls any declared method, mutating or shared, public or not.
    pub fn call(&mut self, method: &str, args: &Args) -> DiResult<Value> {
        let class = Arc::clone(&self.class);
        let target = class.find_method(method).ok_or_else(|| DiError::MethodNotFound {
            class: class.name().to_string(),
            method: method.to_string(),
        })?;
        target.call_mut(self.instance.as_mut(), args)
    }

    pub fn finish(self) -> Object {
        Object::from_parts(self.class, Arc::from(self.instance), self.weave)
    }
}

impl fmt::Debug for Building {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Building")
            .field("class", &self.class_name())
            .field("woven", &self.weave.is_some())
            .finish()
    }
}

/// Positional call arguments with typed accessors.
///
/// # Examples
///
/// ```rust
/// use ferrous_weave::{Args, Value};
///
/// let args = Args::from(vec![Value::from("hi"), Value::from(3)]);
/// assert_eq!(args.str(0).unwrap(), "hi");
/// assert_eq!(args.i64(1).unwrap(), 3);
/// assert!(args.str(2).is_err());
/// ```
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Args(Vec<Value>);

impl Args {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&Value> {
        self.0.get(index)
    }

    pub fn value(&self, index: usize) -> DiResult<&Value> {
        self.0
            .get(index)
            .ok_or_else(|| DiError::TypeMismatch(format!("argument #{}", index)))
    }

    pub fn object(&self, index: usize) -> DiResult<&Object> {
        self.value(index)?
            .as_object()
            .ok_or_else(|| DiError::TypeMismatch(format!("argument #{} (object)", index)))
    }

    pub fn downcast<T: Any + Send + Sync>(&self, index: usize) -> DiResult<Arc<T>> {
        self.object(index)?
            .downcast::<T>()
            .ok_or_else(|| DiError::TypeMismatch(type_name::<T>().to_string()))
    }

    pub fn str(&self, index: usize) -> DiResult<&str> {
        self.value(index)?
            .as_str()
            .ok_or_else(|| DiError::TypeMismatch(format!("argument #{} (string)", index)))
    }

    pub fn i64(&self, index: usize) -> DiResult<i64> {
        self.value(index)?
            .as_i64()
            .ok_or_else(|| DiError::TypeMismatch(format!("argument #{} (integer)", index)))
    }

    pub fn bool(&self, index: usize) -> DiResult<bool> {
        self.value(index)?
            .as_bool()
            .ok_or_else(|| DiError::TypeMismatch(format!("argument #{} (bool)", index)))
    }

    /// Replaces an argument; interceptors use this to rewrite calls.
    pub fn set(&mut self, index: usize, value: impl Into<Value>) {
        if index < self.0.len() {
            self.0[index] = value.into();
        }
    }

    pub fn push(&mut self, value: impl Into<Value>) {
        self.0.push(value.into());
    }

    pub fn iter(&self) -> impl Iterator<Item = &Value> {
        self.0.iter()
    }

    pub fn into_vec(self) -> Vec<Value> {
        self.0
    }
}

impl From<Vec<Value>> for Args {
    fn from(values: Vec<Value>) -> Self {
        Args(values)
    }
}

impl From<()> for Args {
    fn from(_: ()) -> Self {
        Args::default()
    }
}

impl<const N: usize> From<[Value; N]> for Args {
    fn from(values: [Value; N]) -> Self {
        Args(values.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn nested_lazy_is_forced() {
        let inner = Lazy::new(|| Ok(Value::from(7)));
        let outer = Lazy::new(move || Ok(Value::Lazy(inner.clone())));
        assert_eq!(Value::Lazy(outer).force().unwrap(), Value::from(7));
    }

    #[test]
    fn describe_formats_scalars() {
        assert_eq!(Value::from("x").describe(), "'x'");
        assert_eq!(Value::from(true).describe(), "(bool) true");
        assert_eq!(Value::null().describe(), "(null)");
        assert_eq!(Value::from(serde_json::json!([1, 2])).describe(), "[1,2]");
    }

    #[test]
    fn into_object_rejects_data() {
        let err = Value::from(1).into_object("Logger").unwrap_err();
        assert!(matches!(err, DiError::TypeMismatch(name) if name == "Logger"));
    }
}
