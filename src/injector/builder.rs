//! Injector assembly.

use std::sync::Arc;

use super::{Core, Injector, ResolutionContext};
use crate::aop::Compiler;
use crate::binding::BindingTarget;
use crate::key::UNSPECIFIED;
use crate::observer::{DiObserver, Observers};
use crate::reflect::annotation::{AnnotationReader, CachedReader, DeclaredReader};
use crate::reflect::ClassRegistry;
use crate::{Config, Configure, DiError, DiResult, InjectorOptions, Module, Value};

enum ConfigOp {
    Param { class: String, name: String, value: Value },
    ParamAt { class: String, position: usize, value: Value },
    Setter { class: String, method: String, values: Vec<Value> },
}

/// Collects modules, parameter overrides, observers and options, then
/// builds an [`Injector`].
///
/// Modules are installed into a root module in the order given, so the
/// first module binding a key wins.
///
/// # Examples
///
/// ```rust
/// use std::sync::Arc;
/// use ferrous_weave::{
///     ClassDescriptor, ClassRegistry, Configure, Constructor, DiResult, InjectionLog, Injector, InjectorOptions, Module,
/// };
///
/// #[derive(Default)]
/// struct MemoryCache;
///
/// struct CacheModule;
///
/// impl Configure for CacheModule {
///     fn configure(self, module: &mut Module) -> DiResult<()> {
///         module.bind("Cache").to("MemoryCache");
///         Ok(())
///     }
/// }
///
/// let registry = Arc::new(
///     ClassRegistry::new()
///         .with(ClassDescriptor::interface("Cache"))
///         .with(ClassDescriptor::concrete("MemoryCache").implements("Cache").constructor(Constructor::default_of::<MemoryCache>())),
/// );
/// let log = Arc::new(InjectionLog::new());
///
/// let injector = Injector::builder(registry)
///     .install(CacheModule).unwrap()
///     .observer(log.clone())
///     .options(InjectorOptions::default().with_max_depth(16))
///     .build()
///     .unwrap();
///
/// injector.get_instance("Cache").unwrap();
/// assert_eq!(log.lines(), vec!["class:MemoryCache"]);
/// assert_eq!(injector.module().installed_modules(), ["CacheModule"]);
/// ```
pub struct InjectorBuilder {
    registry: Arc<ClassRegistry>,
    module: Module,
    reader: Option<Arc<dyn AnnotationReader>>,
    ops: Vec<ConfigOp>,
    observers: Observers,
    options: InjectorOptions,
}

impl InjectorBuilder {
    pub(crate) fn new(registry: Arc<ClassRegistry>) -> Self {
        Self {
            module: Module::named(Arc::clone(&registry), "Root"),
            registry,
            reader: None,
            ops: Vec::new(),
            observers: Observers::default(),
            options: InjectorOptions::default(),
        }
    }

    pub(crate) fn from_module(registry: Arc<ClassRegistry>, module: Module) -> Self {
        Self {
            module,
            ..Self::new(registry)
        }
    }

    /// Installs `module`; bindings already present keep priority.
    pub fn module(mut self, module: Module) -> Self {
        self.module.install(module);
        self
    }

    /// Builds a module from `config` and installs it.
    pub fn install<C: Configure>(mut self, config: C) -> DiResult<Self> {
        self.module.install_with(config)?;
        Ok(self)
    }

    /// Overrides constructor parameter `name` of `class`.
    pub fn param(mut self, class: impl Into<String>, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.ops.push(ConfigOp::Param {
            class: class.into(),
            name: name.into(),
            value: value.into(),
        });
        self
    }

    /// Overrides the constructor parameter of `class` at `position`.
    pub fn param_at(mut self, class: impl Into<String>, position: usize, value: impl Into<Value>) -> Self {
        self.ops.push(ConfigOp::ParamAt {
            class: class.into(),
            position,
            value: value.into(),
        });
        self
    }

    /// Calls `method` with `values` on every new `class` instance, in place
    /// of any injection of the same method.
    pub fn setter(mut self, class: impl Into<String>, method: impl Into<String>, values: Vec<Value>) -> Self {
        self.ops.push(ConfigOp::Setter {
            class: class.into(),
            method: method.into(),
            values,
        });
        self
    }

    /// Annotation source; defaults to declared annotations behind a cache.
    pub fn reader<R: AnnotationReader + 'static>(mut self, reader: R) -> Self {
        self.reader = Some(Arc::new(reader));
        self
    }

    pub fn observer(mut self, observer: Arc<dyn DiObserver>) -> Self {
        self.observers.add(observer);
        self
    }

    pub fn options(mut self, options: InjectorOptions) -> Self {
        self.options = options;
        self
    }

    /// Root module as assembled so far.
    pub fn root(&self) -> &Module {
        &self.module
    }

    /// Builds the injector and resolves every requested injection.
    ///
    /// Fails with `Circular` when unnamed bindings chain back to a type
    /// already on the chain.
    pub fn build(self) -> DiResult<Injector> {
        check_binding_cycles(&self.module)?;

        let reader = self
            .reader
            .unwrap_or_else(|| Arc::new(CachedReader::new(DeclaredReader)));
        let mut config = Config::new(Arc::clone(&self.registry), reader);
        for op in self.ops {
            match op {
                ConfigOp::Param { class, name, value } => config.set_param(&class, name, value),
                ConfigOp::ParamAt { class, position, value } => config.set_param_at(&class, position, value),
                ConfigOp::Setter { class, method, values } => config.set_setter(&class, method, values),
            };
        }

        let requested = self.module.requested.clone();
        let injector = Injector::from_core(Core {
            compiler: Compiler::new(self.options.class_dir.clone()),
            registry: self.registry,
            module: self.module,
            config,
            observers: self.observers,
            options: self.options,
        });
        for type_name in &requested {
            let mut cx = ResolutionContext::new(injector.core.options.max_depth);
            injector.resolve(type_name, &mut cx)?;
        }
        tracing::debug!(
            module = injector.core.module.name(),
            bindings = injector.core.module.bindings.len(),
            pointcuts = injector.core.module.pointcuts().len(),
            requested = requested.len(),
            "injector built"
        );
        Ok(injector)
    }
}

/// Follows unnamed `to` bindings through abstract targets looking for a
/// type that leads back to itself.
fn check_binding_cycles(module: &Module) -> DiResult<()> {
    let next = |type_name: &str| -> Option<&str> {
        match module.bindings.target(type_name, UNSPECIFIED)? {
            BindingTarget::Class(class) => Some(class.as_str()),
            _ => None,
        }
    };
    let is_abstract = |type_name: &str| {
        module
            .registry
            .find(type_name)
            .map_or(false, |c| c.is_abstract())
    };

    for start in module.bindings.keys().filter(|k| !k.is_named()) {
        let mut path = vec![start.type_name().to_string()];
        let mut current = start.type_name();
        while let Some(target) = next(current) {
            if !is_abstract(target) {
                break;
            }
            if path.iter().any(|t| t == target) {
                path.push(target.to_string());
                return Err(DiError::Circular(path));
            }
            path.push(target.to_string());
            current = target;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reflect::ClassDescriptor;

    fn registry() -> Arc<ClassRegistry> {
        Arc::new(
            ClassRegistry::new()
                .with(ClassDescriptor::interface("A"))
                .with(ClassDescriptor::interface("B"))
                .with(ClassDescriptor::interface("C")),
        )
    }

    #[test]
    fn interface_rebinding_loop_is_rejected() {
        let registry = registry();
        let mut module = Module::new(Arc::clone(&registry));
        module.bind("A").to("B");
        module.bind("B").to("C");
        module.bind("C").to("A");
        let err = check_binding_cycles(&module).unwrap_err();
        assert!(matches!(err, DiError::Circular(path) if path == ["A", "B", "C", "A"]));
    }

    #[test]
    fn chain_ending_in_unregistered_type_is_accepted() {
        let registry = registry();
        let mut module = Module::new(Arc::clone(&registry));
        module.bind("A").to("B");
        module.bind("B").to("Concrete");
        assert!(check_binding_cycles(&module).is_ok());
    }

    #[test]
    fn first_module_wins() {
        let registry = registry();
        let mut first = Module::new(Arc::clone(&registry));
        first.bind("A").to("B");
        let mut second = Module::new(Arc::clone(&registry));
        second.bind("A").to("C");
        let builder = InjectorBuilder::new(registry).module(first).module(second);
        assert_eq!(
            builder.root().bindings().get("A", UNSPECIFIED).and_then(|b| b.target.as_ref()).map(|t| t.to_string()),
            Some("to:B".to_string())
        );
    }
}
