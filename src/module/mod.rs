//! The binder DSL: bindings, pointcuts and module composition.

mod builder;
mod configure;

use std::fmt;
use std::sync::Arc;

pub use builder::BindingBuilder;
pub use configure::Configure;

use crate::aop::{MethodInterceptor, Pointcut};
use crate::binding::{Bindings, BindingsView};
use crate::key::normalize;
use crate::reflect::ClassRegistry;
use crate::{DiResult, Matcher};

/// A set of bindings and pointcuts consumed by the injector.
///
/// # Examples
///
/// ```rust
/// use std::sync::Arc;
/// use ferrous_weave::{ClassRegistry, Matcher, Module, PerformanceInterceptor};
///
/// let registry = Arc::new(ClassRegistry::new());
///
/// let mut infra = Module::named(Arc::clone(&registry), "InfraModule");
/// infra.bind("Cache").to("MemoryCache");
/// infra.bind("Logger").to("SyslogLogger");
///
/// let mut app = Module::named(registry, "AppModule");
/// app.bind("Logger").to("FileLogger");
/// app.bind_interceptor(Matcher::any(), Matcher::starts_with("get"), vec![Arc::new(PerformanceInterceptor::new())]);
/// app.install(infra);
///
/// let rendered = app.to_string();
/// assert!(rendered.contains("bind:Logger to:FileLogger"));
/// assert!(rendered.contains("bind:Cache to:MemoryCache"));
/// assert!(rendered.contains("pointcut:any:[] startsWith:[\"get\"] => PerformanceInterceptor"));
/// ```
#[derive(Clone)]
pub struct Module {
    name: String,
    pub(crate) registry: Arc<ClassRegistry>,
    pub(crate) bindings: Bindings,
    pub(crate) pointcuts: Vec<Pointcut>,
    pub(crate) requested: Vec<String>,
    pub(crate) installed: Vec<String>,
}

impl Module {
    pub fn new(registry: Arc<ClassRegistry>) -> Self {
        Self::named(registry, "Module")
    }

    pub fn named(registry: Arc<ClassRegistry>, name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            registry,
            bindings: Bindings::new(),
            pointcuts: Vec::new(),
            requested: Vec::new(),
            installed: Vec::new(),
        }
    }

    /// Starts a binding for `type_name`.
    pub fn bind(&mut self, type_name: impl AsRef<str>) -> BindingBuilder<'_> {
        BindingBuilder::new(self, type_name.as_ref())
    }

    /// Applies `interceptors`, in order, to methods selected by both matchers.
    pub fn bind_interceptor(
        &mut self,
        class_matcher: Matcher,
        method_matcher: Matcher,
        interceptors: Vec<Arc<dyn MethodInterceptor>>,
    ) -> &mut Self {
        self.pointcuts
            .push(Pointcut::new(class_matcher, method_matcher, interceptors));
        self
    }

    /// Resolves `type_name` eagerly when the injector is built.
    pub fn request_injection(&mut self, type_name: impl AsRef<str>) -> &mut Self {
        let type_name = normalize(type_name.as_ref()).to_string();
        if !self.requested.contains(&type_name) {
            self.requested.push(type_name);
        }
        self
    }

    /// Merges `other` into this module.
    ///
    /// Keys bound by both keep this module's fields; fields this module left
    /// unset come from `other`. Pointcuts of `other` run before this
    /// module's own.
    pub fn install(&mut self, other: Module) -> &mut Self {
        tracing::debug!(module = %self.name, installed = %other.name, "install");
        self.bindings.merge_installed(&other.bindings);

        let mut pointcuts = other.pointcuts;
        pointcuts.append(&mut self.pointcuts);
        self.pointcuts = pointcuts;

        for requested in other.requested {
            if !self.requested.contains(&requested) {
                self.requested.push(requested);
            }
        }
        self.installed.push(other.name);
        self.installed.extend(other.installed);
        self
    }

    /// Builds a module from `config` and installs it.
    pub fn install_with<C: Configure>(&mut self, config: C) -> DiResult<&mut Self> {
        let mut module = Module::named(Arc::clone(&self.registry), config.name());
        config.configure(&mut module)?;
        Ok(self.install(module))
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn registry(&self) -> &Arc<ClassRegistry> {
        &self.registry
    }

    pub fn bindings(&self) -> BindingsView<'_> {
        BindingsView::new(&self.bindings)
    }

    pub fn pointcuts(&self) -> &[Pointcut] {
        &self.pointcuts
    }

    /// Names of every module installed here, transitively, in install order.
    pub fn installed_modules(&self) -> &[String] {
        &self.installed
    }

    pub fn requested_injections(&self) -> &[String] {
        &self.requested
    }
}

impl fmt::Display for Module {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut lines = Vec::new();
        for (key, binding) in self.bindings.iter() {
            let mut line = format!("bind:{}", key.type_name());
            if key.is_named() {
                line.push_str(&format!(" annotatedWith:{}", key.annotation()));
            }
            line.push_str(&format!(" {}", binding));
            lines.push(line);
        }
        for pointcut in &self.pointcuts {
            lines.push(format!("pointcut:{}", pointcut));
        }
        f.write_str(&lines.join("\n"))
    }
}

impl fmt::Debug for Module {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Module")
            .field("name", &self.name)
            .field("bindings", &self.bindings.len())
            .field("pointcuts", &self.pointcuts)
            .field("installed", &self.installed)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::binding::BindingTarget;
    use crate::reflect::{ClassDescriptor, Constructor, Provider};
    use crate::{DiError, Scope, Value};

    #[derive(Default)]
    struct DsnProvider;

    impl Provider for DsnProvider {
        fn get(&self) -> DiResult<Value> {
            Ok(Value::from("dsn"))
        }
    }

    fn registry() -> Arc<ClassRegistry> {
        Arc::new(
            ClassRegistry::new()
                .with(
                    ClassDescriptor::concrete("DsnProvider")
                        .constructor(Constructor::default_of::<DsnProvider>())
                        .provider::<DsnProvider>(),
                )
                .with(ClassDescriptor::concrete("Plain")),
        )
    }

    #[test]
    fn to_provider_requires_capability() {
        let mut module = Module::new(registry());
        assert!(module.bind("Dsn").to_provider("DsnProvider").is_ok());
        assert!(matches!(
            module.bind("Dsn").to_provider("Plain"),
            Err(DiError::InvalidProvider(p)) if p == "Plain"
        ));
        assert!(matches!(module.bind("Dsn").to_provider("Missing"), Err(DiError::InvalidProvider(_))));
    }

    #[test]
    fn rebinding_replaces_the_entry() {
        let mut module = Module::new(registry());
        module.bind("Logger").to("A").in_scope(Scope::Singleton);
        module.bind("\\Logger").to("B");
        let binding = module.bindings().get("Logger", "*").unwrap();
        assert!(matches!(&binding.target, Some(BindingTarget::Class(c)) if c == "B"));
        assert_eq!(binding.scope, None);
        assert_eq!(module.bindings().len(), 1);
    }

    #[test]
    fn install_records_nested_module_names() {
        let registry = registry();
        let mut inner = Module::named(Arc::clone(&registry), "Inner");
        inner.request_injection("Plain");
        let mut middle = Module::named(Arc::clone(&registry), "Middle");
        middle.install(inner);
        let mut outer = Module::named(registry, "Outer");
        outer.install(middle);
        assert_eq!(outer.installed_modules(), ["Middle".to_string(), "Inner".to_string()]);
        assert_eq!(outer.requested_injections(), ["Plain".to_string()]);
    }

    #[test]
    fn display_lists_named_bindings() {
        let mut module = Module::new(registry());
        module.bind("Logger").annotated_with("test").to("Stub").in_scope(Scope::Prototype);
        module.bind("Clock").to_callable(|| Ok(Value::from(0)));
        assert_eq!(
            module.to_string(),
            "bind:Logger annotatedWith:test to:Stub (Prototype)\nbind:Clock toCallable"
        );
    }
}
