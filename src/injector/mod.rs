//! The injector: resolves types against a module's bindings, builds
//! objects, weaves interceptors and applies lifecycle hooks.
//!
//! A request for a type runs through these steps:
//!
//! 1. **Binding lookup**: the unnamed binding of the type may answer
//!    directly (instances, callables, providers, retained singletons) or
//!    name the class to build. Unbound abstract types fall back to their
//!    `ImplementedBy`/`ProvidedBy` declaration.
//! 2. **Constructor parameters**: explicit and inherited overrides first,
//!    then `to_constructor` values, `@Inject` resolution, declared defaults
//!    and finally concrete parameter types, recursively.
//! 3. **Weaving**: pointcuts matching the class produce a [`Bind`]; when it
//!    is not empty the class is built through the [`Compiler`].
//! 4. **Setters and lifecycle**: `@Inject` setters, post-construct, then
//!    pre-destroy registration and singleton retention.

mod builder;
mod context;
mod lifecycle;
mod snapshot;

use std::any::Any;
use std::fmt;
use std::sync::Arc;
use std::time::Instant;

pub use builder::InjectorBuilder;
pub use snapshot::{BindingRecord, InjectorSnapshot, TargetRecord};

use self::context::ResolutionContext;
use self::lifecycle::ShutdownHooks;
use crate::aop::{Bind, Compiler};
use crate::binding::BindingTarget;
use crate::config::{Config, Unified, UnifiedParam};
use crate::definition::{Definition, InjectionDescriptor, InjectionPoint, JitHint, ParamDescriptor};
use crate::error::NotBoundError;
use crate::key::{normalize, UNSPECIFIED};
use crate::matcher::MatchContext;
use crate::observer::{InjectionRecord, Observers};
use crate::reflect::{ClassDescriptor, ClassKind, ClassRegistry, Param};
use crate::value::Building;
use crate::{Args, BindingKey, Container, DiError, DiResult, InjectorOptions, Module, Object, Scope, Value};

/// Immutable wiring shared by an injector, its clones and its forks.
pub(crate) struct Core {
    pub(crate) registry: Arc<ClassRegistry>,
    pub(crate) module: Module,
    pub(crate) config: Config,
    pub(crate) compiler: Compiler,
    pub(crate) observers: Observers,
    pub(crate) options: InjectorOptions,
}

/// Outcome of the binding lookup for one type.
enum Bound {
    /// Resolved without building anything
    Value(Value),
    /// Build this class
    Class { class: String, singleton: bool },
    /// No target; a scope-only binding may still ask for a singleton
    Unbound { singleton: bool },
}

/// Dependency injector.
///
/// Built with [`Injector::builder`]. Cloning copies the retained
/// singletons and shares everything else; [`Injector::fork`] starts with
/// no singletons at all.
///
/// # Examples
///
/// ```rust
/// use std::sync::Arc;
/// use ferrous_weave::{
///     Annotation, Args, ClassDescriptor, ClassRegistry, Constructor, Injector, Method, Module, Object, Param, Scope, Value,
/// };
///
/// struct FileLogger;
/// struct Greeter { logger: Arc<FileLogger>, greeting: String }
///
/// let registry = Arc::new(
///     ClassRegistry::new()
///         .with(ClassDescriptor::interface("Logger"))
///         .with(ClassDescriptor::concrete("FileLogger").implements("Logger").constructor(Constructor::new(|_| Ok(FileLogger))))
///         .with(
///             ClassDescriptor::concrete("Greeter")
///                 .constructor(
///                     Constructor::new(|args: &Args| {
///                         Ok(Greeter { logger: args.downcast::<FileLogger>(0)?, greeting: args.str(1)?.to_string() })
///                     })
///                     .annotate(Annotation::inject())
///                     .param(Param::of("logger", "Logger"))
///                     .param(Param::new("greeting").default("hello")),
///                 )
///                 .method(Method::shared("greet", |g: &Greeter, args: &Args| {
///                     Ok(Value::from(format!("{}, {}", g.greeting, args.str(0)?)))
///                 })),
///         ),
/// );
///
/// let mut module = Module::new(Arc::clone(&registry));
/// module.bind("Logger").to("FileLogger").in_scope(Scope::Singleton);
///
/// let injector = Injector::builder(registry).module(module).build().unwrap();
/// let greeter = injector.get_instance("Greeter").unwrap();
/// assert_eq!(greeter.invoke("greet", [Value::from("world")]).unwrap().as_str(), Some("hello, world"));
///
/// let a = injector.get_instance("Logger").unwrap();
/// let b = injector.get_instance("Logger").unwrap();
/// assert!(Object::ptr_eq(&a, &b));
/// ```
pub struct Injector {
    core: Arc<Core>,
    container: Arc<Container>,
    hooks: Arc<ShutdownHooks>,
}

impl Injector {
    pub fn builder(registry: Arc<ClassRegistry>) -> InjectorBuilder {
        InjectorBuilder::new(registry)
    }

    /// Injector for `module` with default options.
    pub fn new(module: Module) -> DiResult<Self> {
        Self::builder(Arc::clone(module.registry())).module(module).build()
    }

    pub(crate) fn from_core(core: Core) -> Self {
        Self {
            core: Arc::new(core),
            container: Arc::new(Container::new()),
            hooks: Arc::new(ShutdownHooks::new()),
        }
    }

    /// Resolves `type_name` to an object.
    ///
    /// Fails with `TypeMismatch` when the binding yields plain data; use
    /// [`Injector::get_value`] for those.
    pub fn get_instance(&self, type_name: &str) -> DiResult<Object> {
        self.get_value(type_name)?.into_object(normalize(type_name))
    }

    /// Resolves `type_name` to whatever its binding yields.
    pub fn get_value(&self, type_name: &str) -> DiResult<Value> {
        let mut cx = ResolutionContext::new(self.core.options.max_depth);
        self.resolve(type_name, &mut cx)
    }

    /// Resolves the binding of `type_name` qualified by `annotation`.
    ///
    /// Use an empty `type_name` for named scalar bindings.
    pub fn get_named(&self, type_name: &str, annotation: &str) -> DiResult<Value> {
        let type_name = normalize(type_name);
        let param = ParamDescriptor {
            position: 0,
            name: annotation.to_string(),
            type_name: (!type_name.is_empty()).then(|| type_name.to_string()),
            annotate: annotation.to_string(),
            default: None,
            optional: false,
            jit: self.core.config.scanner().jit_hint(type_name),
        };
        let mut cx = ResolutionContext::new(self.core.options.max_depth);
        self.bind_parameter(&param, "Injector::get_named", &mut cx)
            .map_err(|e| cx.annotate(e, &self.core.module))
    }

    /// Resolves `type_name` and downcasts the object to `T`.
    pub fn get<T: Any + Send + Sync>(&self, type_name: &str) -> DiResult<Arc<T>> {
        self.get_instance(type_name)?
            .downcast::<T>()
            .ok_or_else(|| DiError::TypeMismatch(std::any::type_name::<T>().to_string()))
    }

    pub fn module(&self) -> &Module {
        &self.core.module
    }

    pub fn registry(&self) -> &Arc<ClassRegistry> {
        &self.core.registry
    }

    pub fn config(&self) -> &Config {
        &self.core.config
    }

    pub fn compiler(&self) -> &Compiler {
        &self.core.compiler
    }

    pub fn container(&self) -> &Container {
        &self.container
    }

    pub fn options(&self) -> &InjectorOptions {
        &self.core.options
    }

    /// Injector sharing this one's wiring and pre-destroy registry, with
    /// no retained singletons.
    pub fn fork(&self) -> Self {
        Self {
            core: Arc::clone(&self.core),
            container: Arc::new(self.container.fork()),
            hooks: Arc::clone(&self.hooks),
        }
    }

    /// Runs pending pre-destroy hooks once, in registration order, and
    /// returns how many ran.
    pub fn shutdown(&self) -> usize {
        let ran = self.hooks.run_all();
        tracing::debug!(hooks = ran, "injector shut down");
        ran
    }

    pub fn pending_shutdown_hooks(&self) -> usize {
        self.hooks.len()
    }

    fn resolve(&self, type_name: &str, cx: &mut ResolutionContext) -> DiResult<Value> {
        let type_name = normalize(type_name);
        cx.enter(type_name)?;
        let observers = &self.core.observers;
        if observers.has_observers() {
            observers.resolving(type_name);
        }
        let start = Instant::now();
        let result = self
            .resolve_type(type_name, cx)
            .map_err(|e| cx.annotate(e, &self.core.module));
        cx.leave();

        match &result {
            Ok(_) => {
                let elapsed = start.elapsed();
                tracing::debug!(type_name, ?elapsed, "resolved");
                if observers.has_observers() {
                    observers.resolved(type_name, elapsed);
                }
            }
            Err(error) => {
                if observers.has_observers() {
                    observers.failed(type_name, error);
                }
            }
        }
        result
    }

    fn resolve_type(&self, type_name: &str, cx: &mut ResolutionContext) -> DiResult<Value> {
        // Bound names need not be registered classes.
        let requested = self.core.config.fetch(type_name);
        let definition = requested
            .as_ref()
            .map(|u| Arc::clone(&u.definition))
            .unwrap_or_default();
        let requested_singleton = definition.scope().is_singleton();

        let (class, bound_singleton) = match self.bound(type_name, &definition, cx)? {
            Bound::Value(value) => return Ok(value),
            Bound::Class { class, singleton } => (class, singleton),
            Bound::Unbound { singleton } => {
                let requested = requested.as_ref().map_err(Clone::clone)?;
                if !requested.class.is_abstract() {
                    (type_name.to_string(), singleton)
                } else {
                    match &definition.jit {
                        Some(JitHint::ImplementedBy(class)) => (class.clone(), singleton),
                        Some(JitHint::ProvidedBy(provider)) => {
                            let scope = (singleton || requested_singleton).then_some(Scope::Singleton);
                            return self.provide(type_name, provider, scope, cx);
                        }
                        None => return Err(DiError::NotBound(Box::new(NotBoundError::interface(type_name)))),
                    }
                }
            }
        };

        let unified = if class == type_name {
            requested?
        } else {
            self.core.config.fetch(&class)?
        };

        // Rebinding chain: the target is itself abstract.
        if unified.class.is_abstract() {
            let value = self.resolve(&class, cx)?;
            if bound_singleton {
                self.container.set(type_name, value.clone());
            }
            return Ok(value);
        }

        let singleton =
            bound_singleton || requested_singleton || unified.definition.scope().is_singleton();
        if singleton {
            if let Some(hit) = self.container.get(type_name) {
                return Ok(hit);
            }
        }

        let object = self.build(&unified, cx)?;
        if singleton {
            self.container.set(type_name, Value::Object(object.clone()));
        }
        Ok(Value::Object(object))
    }

    fn bound(&self, type_name: &str, definition: &Definition, cx: &mut ResolutionContext) -> DiResult<Bound> {
        let Some(binding) = self.core.module.bindings.get(&BindingKey::new(type_name)) else {
            return Ok(Bound::Unbound { singleton: false });
        };
        let Some(target) = &binding.target else {
            return Ok(Bound::Unbound {
                singleton: binding.is_singleton(),
            });
        };
        if let BindingTarget::Provider(provider) = target {
            return self.provide(type_name, provider, binding.scope, cx).map(Bound::Value);
        }

        let singleton = binding.is_singleton() || definition.scope().is_singleton();
        if singleton {
            if let Some(hit) = self.container.get(type_name) {
                return Ok(Bound::Value(hit));
            }
        }
        match target {
            BindingTarget::Instance(value) => Ok(Bound::Value(value.clone().force()?)),
            BindingTarget::Callable(factory) => {
                let value = factory()?.force()?;
                if singleton {
                    self.container.set(type_name, value.clone());
                }
                Ok(Bound::Value(value))
            }
            BindingTarget::Class(class) => Ok(Bound::Class {
                class: class.clone(),
                singleton,
            }),
            BindingTarget::Constructor(_) | BindingTarget::Provider(_) => Ok(Bound::Class {
                class: type_name.to_string(),
                singleton,
            }),
        }
    }

    /// Value of a provider class, retained under `key` for singleton scope.
    fn provide(
        &self,
        key: &str,
        provider: &str,
        scope: Option<Scope>,
        cx: &mut ResolutionContext,
    ) -> DiResult<Value> {
        let singleton = scope.map_or(false, |s| s.is_singleton());
        if singleton {
            if let Some(hit) = self.container.get(key) {
                return Ok(hit);
            }
        }
        let value = self.resolve(provider, cx)?.into_object(provider)?.provide()?;
        if singleton {
            self.container.set(key, value.clone());
        }
        Ok(value)
    }

    fn build(&self, unified: &Unified, cx: &mut ResolutionContext) -> DiResult<Object> {
        let class = &unified.class;
        let definition = &unified.definition;

        let mut args = Vec::with_capacity(class.constructor_params().len());
        for (position, param) in class.constructor_params().iter().enumerate() {
            let declared = unified.params.get(position);
            let value = match declared.and_then(|u| u.supplied.clone()) {
                Some(value) => value,
                None => self.constructor_param(class, definition, position, param, declared, cx)?,
            };
            args.push(value.force()?);
        }
        let args = Args::from(args);

        let setters = self.setter_values(unified, cx)?;

        let bind = self.bind_for(class)?;
        let mut building = if bind.has_binding() {
            self.core.compiler.new_instance(class, &args, bind)?
        } else {
            Building::new(Arc::clone(class), class.instantiate(&args)?, None)
        };

        for (method, values) in &setters {
            tracing::trace!(class = class.name(), method = %method, "setter injection");
            building.call(method, &Args::from(values.clone()))?;
        }
        if let Some(method) = &definition.post_construct {
            tracing::trace!(class = class.name(), method = %method, "post-construct");
            building.call(method, &Args::new())?;
        }

        let object = building.finish();
        if let Some(method) = &definition.pre_destroy {
            self.hooks.register(object.clone(), method.clone());
        }

        let observers = &self.core.observers;
        if observers.has_observers() {
            observers.injected(&InjectionRecord {
                class: class.name().to_string(),
                params: args.into_vec(),
                setters,
                woven: object.woven_class().map(|w| w.name().to_string()),
                object: object.clone(),
            });
        }
        Ok(object)
    }

    /// Value of a constructor parameter nothing was supplied for.
    fn constructor_param(
        &self,
        class: &ClassDescriptor,
        definition: &Definition,
        position: usize,
        param: &Param,
        declared: Option<&UnifiedParam>,
        cx: &mut ResolutionContext,
    ) -> DiResult<Value> {
        if let Some(BindingTarget::Constructor(params)) =
            self.core.module.bindings.target(class.name(), UNSPECIFIED)
        {
            if let Some(value) = params.get(param.name()) {
                return Ok(value.clone());
            }
        }

        let owner = format!("{}::new", class.name());
        if let Some(descriptor) = definition
            .constructor_injection()
            .and_then(|injection| injection.params.get(position))
        {
            return match self.bind_parameter(descriptor, &owner, cx) {
                Err(DiError::OptionalInjectionNotBound(_)) => Ok(Value::null()),
                other => other,
            };
        }

        if let Some(default) = declared.and_then(|u| u.default.clone()) {
            return Ok(default);
        }

        match param.type_name() {
            Some(dependency)
                if self
                    .core
                    .registry
                    .find(dependency)
                    .map_or(false, |c| c.kind() != ClassKind::Interface) =>
            {
                self.resolve(dependency, cx)
            }
            dependency => Err(DiError::NotBound(Box::new(NotBoundError {
                type_name: dependency.unwrap_or_default().to_string(),
                annotate: UNSPECIFIED.to_string(),
                param: Some(param.name().to_string()),
                position: Some(position),
                owner: Some(owner),
                ..Default::default()
            }))),
        }
    }

    /// Arguments of every setter to call: `@Inject` setters whose
    /// dependencies resolve (optional ones may be skipped), then explicit
    /// setter overrides, which replace injection for the same method.
    fn setter_values(
        &self,
        unified: &Unified,
        cx: &mut ResolutionContext,
    ) -> DiResult<Vec<(String, Vec<Value>)>> {
        let class = unified.class.name();
        let mut setters = Vec::new();
        for injection in unified.definition.setter_injections() {
            let InjectionPoint::Method(method) = &injection.point else {
                continue;
            };
            if unified.setters.iter().any(|(m, _)| m == method) {
                continue;
            }
            let owner = format!("{}::{}", class, method);
            match self.injection_values(injection, &owner, cx) {
                Ok(values) => setters.push((method.clone(), values)),
                Err(DiError::OptionalInjectionNotBound(detail)) => {
                    tracing::trace!(owner = %owner, missing = %detail.type_name, "optional injection skipped");
                }
                Err(error) => return Err(error),
            }
        }
        for (method, values) in &unified.setters {
            let values = values
                .iter()
                .cloned()
                .map(Value::force)
                .collect::<DiResult<Vec<_>>>()?;
            setters.push((method.clone(), values));
        }
        Ok(setters)
    }

    fn injection_values(
        &self,
        injection: &InjectionDescriptor,
        owner: &str,
        cx: &mut ResolutionContext,
    ) -> DiResult<Vec<Value>> {
        let mut values = Vec::with_capacity(injection.params.len());
        for param in &injection.params {
            values.push(self.bind_parameter(param, owner, cx)?.force()?);
        }
        Ok(values)
    }

    /// Resolves one injectable parameter.
    ///
    /// Order: the binding for (declared type, qualifier); the declared
    /// default; the type's just-in-time default; otherwise not bound
    /// (optional parameters report `OptionalInjectionNotBound`).
    fn bind_parameter(&self, param: &ParamDescriptor, owner: &str, cx: &mut ResolutionContext) -> DiResult<Value> {
        let type_hint = param.type_name.as_deref().unwrap_or_default();
        let key = BindingKey::named(type_hint, param.annotate.as_str());
        let found = self
            .core
            .module
            .bindings
            .get(&key)
            .and_then(|b| b.target.as_ref().map(|t| (t, b.scope)));

        let Some((target, scope)) = found else {
            if let Some(default) = &param.default {
                return Ok(default.clone());
            }
            let target = match &param.jit {
                Some(JitHint::ImplementedBy(class)) => BindingTarget::Class(class.clone()),
                Some(JitHint::ProvidedBy(provider)) => BindingTarget::Provider(provider.clone()),
                None => return Err(Self::not_bound(param, owner)),
            };
            let scope = self.type_scope(type_hint)?;
            return self.with_container(scope, &target, type_hint, None, cx);
        };

        match target {
            BindingTarget::Instance(value) => return value.clone().force(),
            BindingTarget::Callable(factory) => return factory()?.force(),
            _ => {}
        }
        if !key.is_named() && !type_hint.is_empty() {
            return self.resolve(type_hint, cx);
        }
        let scope = match scope {
            Some(scope) => scope,
            None => self.type_scope(type_hint)?,
        };
        self.with_container(scope, target, type_hint, Some(&key), cx)
    }

    fn type_scope(&self, type_hint: &str) -> DiResult<Scope> {
        if type_hint.is_empty() {
            return Ok(Scope::Prototype);
        }
        Ok(self.core.config.fetch(type_hint)?.definition.scope())
    }

    /// Builds `target`, retaining it for singleton scope under the binding
    /// key, or under the target class for just-in-time targets.
    fn with_container(
        &self,
        scope: Scope,
        target: &BindingTarget,
        type_hint: &str,
        key: Option<&BindingKey>,
        cx: &mut ResolutionContext,
    ) -> DiResult<Value> {
        let name = match target {
            BindingTarget::Class(class) | BindingTarget::Provider(class) => class.as_str(),
            _ => type_hint,
        };
        let retain_as = key.map_or_else(|| name.to_string(), |k| k.to_string());
        if scope.is_singleton() {
            if let Some(hit) = self.container.get(&retain_as) {
                return Ok(hit);
            }
        }
        let value = match target {
            BindingTarget::Provider(provider) => {
                self.resolve(provider, cx)?.into_object(provider)?.provide()?
            }
            _ => self.resolve(name, cx)?,
        };
        if scope.is_singleton() {
            self.container.set(&retain_as, value.clone());
        }
        Ok(value)
    }

    fn not_bound(param: &ParamDescriptor, owner: &str) -> DiError {
        let detail = Box::new(NotBoundError {
            type_name: param.type_name.clone().unwrap_or_default(),
            annotate: param.annotate.clone(),
            param: Some(param.name.clone()),
            position: Some(param.position),
            owner: Some(owner.to_string()),
            ..Default::default()
        });
        if param.optional {
            DiError::OptionalInjectionNotBound(detail)
        } else {
            DiError::NotBound(detail)
        }
    }

    /// Interceptors of every pointcut matching `class`.
    fn bind_for(&self, class: &ClassDescriptor) -> DiResult<Bind> {
        let mut bind = Bind::new();
        let pointcuts = self.core.module.pointcuts();
        if pointcuts.is_empty() {
            return Ok(bind);
        }
        let cx = MatchContext {
            registry: &self.core.registry,
            reader: self.core.config.scanner().reader().as_ref(),
        };
        bind.bind(class, pointcuts, &cx)?;
        Ok(bind)
    }
}

impl Clone for Injector {
    /// Copies retained singletons; wiring and pre-destroy registry are shared.
    fn clone(&self) -> Self {
        Self {
            core: Arc::clone(&self.core),
            container: Arc::new((*self.container).clone()),
            hooks: Arc::clone(&self.hooks),
        }
    }
}

impl fmt::Display for Injector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.core.module, f)
    }
}

impl fmt::Debug for Injector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Injector")
            .field("module", &self.core.module.name())
            .field("singletons", &self.container.len())
            .field("pending_hooks", &self.hooks.len())
            .field("options", &self.core.options)
            .finish()
    }
}
