//! Fluent `bind(..).annotated_with(..).to*(..).in_scope(..)` builder.

use std::collections::BTreeMap;
use std::sync::Arc;

use super::Module;
use crate::binding::{Binding, BindingTarget};
use crate::key::normalize;
use crate::{BindingKey, DiError, DiResult, Scope, Value};

/// Builder for one binding, returned by [`Module::bind`].
///
/// Each terminal (`to`, `to_instance`, `to_provider`, `to_callable`,
/// `to_constructor`) replaces the whole entry for the key. A named entry
/// opened by [`BindingBuilder::annotated_with`] starts as a singleton; only
/// `to_instance` keeps that scope, the other terminals reset it. Call
/// [`BindingBuilder::in_scope`] after the terminal to set it explicitly.
///
/// # Examples
///
/// ```rust
/// use std::sync::Arc;
/// use ferrous_weave::{BindingTarget, ClassRegistry, Module, Scope};
///
/// let mut module = Module::new(Arc::new(ClassRegistry::new()));
/// module.bind("Logger").to("FileLogger").in_scope(Scope::Singleton);
/// module.bind("Logger").annotated_with("test").to("StubLogger");
/// module.bind("Dsn").annotated_with("main").to_instance("sqlite::memory:");
///
/// let view = module.bindings();
/// assert_eq!(view.get("Logger", "*").unwrap().scope, Some(Scope::Singleton));
/// assert_eq!(view.get("Logger", "test").unwrap().scope, None);
/// assert_eq!(view.get("Dsn", "main").unwrap().scope, Some(Scope::Singleton));
/// ```
pub struct BindingBuilder<'m> {
    module: &'m mut Module,
    key: BindingKey,
    opened_scope: Option<Scope>,
}

impl<'m> BindingBuilder<'m> {
    pub(crate) fn new(module: &'m mut Module, type_name: &str) -> Self {
        Self {
            module,
            key: BindingKey::new(type_name),
            opened_scope: None,
        }
    }

    /// Narrows the binding to a named qualifier and opens it as a singleton.
    pub fn annotated_with(mut self, name: impl Into<String>) -> Self {
        self.key = BindingKey::named(self.key.type_name(), name);
        self.opened_scope = Some(Scope::Singleton);
        self.module.bindings.insert(
            self.key.clone(),
            Binding {
                target: None,
                scope: self.opened_scope,
            },
        );
        self
    }

    fn terminate(self, target: BindingTarget, scope: Option<Scope>) -> Self {
        tracing::trace!(key = %self.key, target = %target, "bind");
        self.module
            .bindings
            .insert(self.key.clone(), Binding { target: Some(target), scope });
        self
    }

    /// Binds to a class built by the injector.
    pub fn to(self, class: impl AsRef<str>) -> Self {
        let class = normalize(class.as_ref()).to_string();
        self.terminate(BindingTarget::Class(class), None)
    }

    /// Binds to a ready value.
    pub fn to_instance(self, value: impl Into<Value>) -> Self {
        let scope = self.opened_scope;
        self.terminate(BindingTarget::Instance(value.into()), scope)
    }

    /// Binds to a provider class.
    ///
    /// Fails with `InvalidProvider` unless the class is registered with the
    /// provider capability.
    pub fn to_provider(self, provider: impl AsRef<str>) -> DiResult<Self> {
        let provider = normalize(provider.as_ref()).to_string();
        let valid = self
            .module
            .registry
            .find(&provider)
            .map_or(false, |class| class.is_provider());
        if !valid {
            return Err(DiError::InvalidProvider(provider));
        }
        Ok(self.terminate(BindingTarget::Provider(provider), None))
    }

    /// Binds to a factory closure, called on every resolution.
    pub fn to_callable<F>(self, f: F) -> Self
    where
        F: Fn() -> DiResult<Value> + Send + Sync + 'static,
    {
        self.terminate(BindingTarget::Callable(Arc::new(f)), None)
    }

    /// Supplies constructor arguments of the bound class by parameter name.
    pub fn to_constructor<I, K, V>(self, params: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<Value>,
    {
        let params: BTreeMap<String, Value> = params
            .into_iter()
            .map(|(k, v)| (k.into(), v.into()))
            .collect();
        self.terminate(BindingTarget::Constructor(params), None)
    }

    /// Sets the scope of the entry.
    pub fn in_scope(self, scope: Scope) -> Self {
        self.module.bindings.entry(self.key.clone()).scope = Some(scope);
        self
    }

    pub fn key(&self) -> &BindingKey {
        &self.key
    }
}

impl std::fmt::Debug for BindingBuilder<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BindingBuilder")
            .field("module", &self.module.name())
            .field("key", &self.key)
            .field("binding", &self.module.bindings.get(&self.key))
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use crate::reflect::ClassRegistry;
    use crate::{Module, Scope};

    #[test]
    fn debug_shows_key_and_entry() {
        let mut module = Module::named(Arc::new(ClassRegistry::new()), "App");
        let builder = module.bind("Logger").annotated_with("test");
        let rendered = format!("{:?}", builder);
        assert!(rendered.contains("App"));
        assert!(rendered.contains("test"));
        assert!(rendered.contains(&format!("{:?}", Some(Scope::Singleton))));
    }
}
