//! Binding directives and the ordered binding store.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use crate::{BindingKey, DiError, DiResult, Scope, Value};

#[cfg(feature = "ahash")]
pub(crate) type FastMap<K, V> = ahash::AHashMap<K, V>;
#[cfg(not(feature = "ahash"))]
pub(crate) type FastMap<K, V> = std::collections::HashMap<K, V>;

/// Factory bound with `to_callable`.
pub type Callable = Arc<dyn Fn() -> DiResult<Value> + Send + Sync>;

/// What a binding resolves to.
#[derive(Clone)]
pub enum BindingTarget {
    /// Build this class
    Class(String),
    /// Return this value as is
    Instance(Value),
    /// Build this provider class and call its `get`
    Provider(String),
    /// Call this factory
    Callable(Callable),
    /// Constructor arguments by parameter name, for the bound class itself
    Constructor(BTreeMap<String, Value>),
}

impl BindingTarget {
    pub fn kind(&self) -> &'static str {
        match self {
            BindingTarget::Class(_) => "class",
            BindingTarget::Instance(_) => "instance",
            BindingTarget::Provider(_) => "provider",
            BindingTarget::Callable(_) => "callable",
            BindingTarget::Constructor(_) => "constructor",
        }
    }

    /// Whether the target holds run-time state that cannot be exported as data.
    pub fn is_live(&self) -> bool {
        match self {
            BindingTarget::Instance(value) => value.as_data().is_none(),
            BindingTarget::Callable(_) => true,
            BindingTarget::Constructor(params) => params.values().any(|v| v.as_data().is_none()),
            BindingTarget::Class(_) | BindingTarget::Provider(_) => false,
        }
    }
}

impl fmt::Display for BindingTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BindingTarget::Class(class) => write!(f, "to:{}", class),
            BindingTarget::Instance(value) => write!(f, "toInstance:{}", value.describe()),
            BindingTarget::Provider(provider) => write!(f, "toProvider:{}", provider),
            BindingTarget::Callable(_) => f.write_str("toCallable"),
            BindingTarget::Constructor(params) => {
                let rendered: serde_json::Map<String, serde_json::Value> = params
                    .iter()
                    .map(|(name, value)| {
                        let data = value
                            .as_data()
                            .cloned()
                            .unwrap_or_else(|| serde_json::Value::String(value.describe()));
                        (name.clone(), data)
                    })
                    .collect();
                write!(f, "toConstructor:{}", serde_json::Value::Object(rendered))
            }
        }
    }
}

impl fmt::Debug for BindingTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "BindingTarget({})", self)
    }
}

/// One binding entry: its target, if terminated, and its scope.
#[derive(Clone, Debug, Default)]
pub struct Binding {
    pub target: Option<BindingTarget>,
    pub scope: Option<Scope>,
}

impl Binding {
    pub fn new(target: BindingTarget) -> Self {
        Self {
            target: Some(target),
            scope: None,
        }
    }

    pub fn in_scope(mut self, scope: Scope) -> Self {
        self.scope = Some(scope);
        self
    }

    /// An entry opened by `annotated_with` but never terminated.
    pub fn is_empty(&self) -> bool {
        self.target.is_none() && self.scope.is_none()
    }

    pub fn is_singleton(&self) -> bool {
        self.scope.map_or(false, |s| s.is_singleton())
    }

    /// Field-wise merge where `self` wins and `other` fills the gaps.
    pub fn or(&self, other: &Binding) -> Binding {
        Binding {
            target: self.target.clone().or_else(|| other.target.clone()),
            scope: self.scope.or(other.scope),
        }
    }
}

impl fmt::Display for Binding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.target {
            Some(target) => write!(f, "{}", target)?,
            None => f.write_str("to:(none)")?,
        }
        if let Some(scope) = self.scope {
            write!(f, " ({})", scope)?;
        }
        Ok(())
    }
}

/// Binding entries in declaration order, one per key.
///
/// # Examples
///
/// ```rust
/// use ferrous_weave::{Binding, BindingKey, BindingTarget, Bindings, Scope};
///
/// let mut bindings = Bindings::new();
/// bindings.insert(BindingKey::new("Logger"), Binding::new(BindingTarget::Class("FileLogger".into())));
/// bindings.insert(
///     BindingKey::named("Logger", "test"),
///     Binding::new(BindingTarget::Class("StubLogger".into())).in_scope(Scope::Prototype),
/// );
///
/// assert_eq!(bindings.len(), 2);
/// assert!(bindings.target("Logger", "*").is_some());
/// assert_eq!(bindings.keys().next().unwrap().to_string(), "Logger");
/// ```
#[derive(Clone, Debug, Default)]
pub struct Bindings {
    order: Vec<BindingKey>,
    entries: FastMap<BindingKey, Binding>,
}

impl Bindings {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    pub fn get(&self, key: &BindingKey) -> Option<&Binding> {
        self.entries.get(key)
    }

    pub fn contains(&self, key: &BindingKey) -> bool {
        self.entries.contains_key(key)
    }

    /// Whether any annotation of `type_name` is bound.
    pub fn contains_type(&self, type_name: &str) -> bool {
        let type_name = crate::key::normalize(type_name);
        self.order.iter().any(|k| k.type_name() == type_name)
    }

    /// The target bound for `(type_name, annotation)`, if terminated.
    pub fn target(&self, type_name: &str, annotation: &str) -> Option<&BindingTarget> {
        self.get(&BindingKey::named(type_name, annotation))
            .and_then(|b| b.target.as_ref())
    }

    /// Replaces the entry, keeping its original position.
    pub fn insert(&mut self, key: BindingKey, binding: Binding) {
        if !self.entries.contains_key(&key) {
            self.order.push(key.clone());
        }
        self.entries.insert(key, binding);
    }

    pub(crate) fn entry(&mut self, key: BindingKey) -> &mut Binding {
        if !self.entries.contains_key(&key) {
            self.order.push(key.clone());
        }
        self.entries.entry(key).or_default()
    }

    pub fn remove(&mut self, key: &BindingKey) -> Option<Binding> {
        self.order.retain(|k| k != key);
        self.entries.remove(key)
    }

    pub fn keys(&self) -> impl Iterator<Item = &BindingKey> {
        self.order.iter()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&BindingKey, &Binding)> {
        self.order
            .iter()
            .filter_map(move |k| self.entries.get(k).map(|b| (k, b)))
    }

    /// Merges `installed` under `self`: shared keys keep this store's fields
    /// and take missing ones from `installed`; new keys are appended.
    pub fn merge_installed(&mut self, installed: &Bindings) {
        for (key, theirs) in installed.iter() {
            match self.entries.get_mut(key) {
                Some(ours) => *ours = ours.or(theirs),
                None => self.insert(key.clone(), theirs.clone()),
            }
        }
    }
}

/// Read-only view over a module's bindings.
///
/// # Examples
///
/// ```rust
/// use std::sync::Arc;
/// use ferrous_weave::{Binding, BindingKey, ClassRegistry, DiError, Module};
///
/// let mut module = Module::new(Arc::new(ClassRegistry::new()));
/// module.bind("Dsn").to_instance("sqlite::memory:");
///
/// let mut view = module.bindings();
/// assert!(view.contains("Dsn", "*"));
/// assert!(matches!(view.insert(BindingKey::new("Other"), Binding::default()), Err(DiError::ReadOnly)));
/// ```
#[derive(Clone, Copy, Debug)]
pub struct BindingsView<'a> {
    inner: &'a Bindings,
}

impl<'a> BindingsView<'a> {
    pub(crate) fn new(inner: &'a Bindings) -> Self {
        Self { inner }
    }

    pub fn get(&self, type_name: &str, annotation: &str) -> Option<&'a Binding> {
        self.inner.get(&BindingKey::named(type_name, annotation))
    }

    pub fn contains(&self, type_name: &str, annotation: &str) -> bool {
        self.get(type_name, annotation).is_some()
    }

    pub fn len(&self) -> usize {
        self.inner.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&'a BindingKey, &'a Binding)> {
        self.inner.iter()
    }

    /// Always fails with `ReadOnly`.
    pub fn insert(&mut self, _key: BindingKey, _binding: Binding) -> DiResult<()> {
        Err(DiError::ReadOnly)
    }

    /// Always fails with `ReadOnly`.
    pub fn remove(&mut self, _key: &BindingKey) -> DiResult<Binding> {
        Err(DiError::ReadOnly)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn class(name: &str) -> Binding {
        Binding::new(BindingTarget::Class(name.to_string()))
    }

    #[test]
    fn insert_keeps_declaration_order() {
        let mut bindings = Bindings::new();
        bindings.insert(BindingKey::new("A"), class("A1"));
        bindings.insert(BindingKey::new("B"), class("B1"));
        bindings.insert(BindingKey::new("A"), class("A2"));
        let keys: Vec<String> = bindings.keys().map(|k| k.to_string()).collect();
        assert_eq!(keys, vec!["A", "B"]);
        assert!(matches!(bindings.target("A", "*"), Some(BindingTarget::Class(c)) if c == "A2"));
    }

    #[test]
    fn installer_fields_win() {
        let mut own = Bindings::new();
        own.insert(BindingKey::new("K"), class("Mine"));
        let mut installed = Bindings::new();
        installed.insert(BindingKey::new("K"), class("Theirs").in_scope(Scope::Singleton));
        installed.insert(BindingKey::new("Extra"), class("X"));

        own.merge_installed(&installed);
        let merged = own.get(&BindingKey::new("K")).unwrap();
        assert!(matches!(&merged.target, Some(BindingTarget::Class(c)) if c == "Mine"));
        assert_eq!(merged.scope, Some(Scope::Singleton));
        assert!(own.contains(&BindingKey::new("Extra")));
    }

    #[test]
    fn live_targets_are_flagged() {
        assert!(!BindingTarget::Instance(Value::from(1)).is_live());
        assert!(BindingTarget::Instance(Value::from(crate::Object::new(1u8))).is_live());
        assert!(BindingTarget::Callable(Arc::new(|| Ok(Value::null()))).is_live());
    }

    #[test]
    fn display_renders_target_and_scope() {
        let b = class("FileLogger").in_scope(Scope::Singleton);
        assert_eq!(b.to_string(), "to:FileLogger (Singleton)");
        let mut params = BTreeMap::new();
        params.insert("dsn".to_string(), Value::from("x"));
        assert_eq!(BindingTarget::Constructor(params).to_string(), "toConstructor:{\"dsn\":\"x\"}");
    }
}
