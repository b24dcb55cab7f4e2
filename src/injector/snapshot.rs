//! Export and re-import of an injector's binding configuration.
//!
//! Only data crosses the boundary: class and provider names, scalar
//! instances and constructor arguments. Objects, callables and
//! interceptors are recorded as `live` markers and must be supplied again
//! on restore. Retained singletons are never exported; a restored injector
//! rebuilds them (and re-registers their pre-destroy hooks) on demand.

use std::collections::BTreeMap;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use super::{Injector, InjectorBuilder};
use crate::binding::{Binding, BindingTarget};
use crate::error::NotBoundError;
use crate::reflect::ClassRegistry;
use crate::{BindingKey, DiError, DiResult, InjectorOptions, Module, Scope, Value};

/// Exported form of a binding target.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum TargetRecord {
    Class { class: String },
    Instance { data: serde_json::Value },
    Provider { provider: String },
    Constructor { params: BTreeMap<String, serde_json::Value> },
    /// Run-time value that has to be re-supplied
    Live,
    /// Scope-only entry
    None,
}

impl TargetRecord {
    fn export(target: Option<&BindingTarget>) -> Self {
        let Some(target) = target else {
            return TargetRecord::None;
        };
        if target.is_live() {
            return TargetRecord::Live;
        }
        match target {
            BindingTarget::Class(class) => TargetRecord::Class { class: class.clone() },
            BindingTarget::Provider(provider) => TargetRecord::Provider {
                provider: provider.clone(),
            },
            BindingTarget::Instance(value) => TargetRecord::Instance {
                data: value.as_data().cloned().unwrap_or_default(),
            },
            BindingTarget::Constructor(params) => TargetRecord::Constructor {
                params: params
                    .iter()
                    .filter_map(|(name, value)| value.as_data().map(|d| (name.clone(), d.clone())))
                    .collect(),
            },
            BindingTarget::Callable(_) => TargetRecord::Live,
        }
    }

    fn import(self) -> Option<BindingTarget> {
        match self {
            TargetRecord::Class { class } => Some(BindingTarget::Class(class)),
            TargetRecord::Provider { provider } => Some(BindingTarget::Provider(provider)),
            TargetRecord::Instance { data } => Some(BindingTarget::Instance(Value::Data(data))),
            TargetRecord::Constructor { params } => Some(BindingTarget::Constructor(
                params.into_iter().map(|(name, data)| (name, Value::Data(data))).collect(),
            )),
            TargetRecord::Live | TargetRecord::None => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BindingRecord {
    pub type_name: String,
    pub annotation: String,
    pub target: TargetRecord,
    pub scope: Option<Scope>,
}

/// Data-only export of an injector.
///
/// # Examples
///
/// ```rust
/// use std::sync::Arc;
/// use ferrous_weave::{ClassDescriptor, ClassRegistry, Constructor, Injector, InjectorSnapshot, Module, Scope, TargetRecord, Value};
///
/// #[derive(Default)]
/// struct FileLogger;
///
/// let registry = Arc::new(
///     ClassRegistry::new()
///         .with(ClassDescriptor::interface("Logger"))
///         .with(ClassDescriptor::concrete("FileLogger").implements("Logger").constructor(Constructor::default_of::<FileLogger>())),
/// );
/// let mut module = Module::new(Arc::clone(&registry));
/// module.bind("Logger").to("FileLogger").in_scope(Scope::Singleton);
/// module.bind("").annotated_with("clock").to_callable(|| Ok(Value::from(0)));
/// let injector = Injector::new(module).unwrap();
///
/// let bytes = injector.snapshot().to_bytes().unwrap();
/// let snapshot = InjectorSnapshot::from_bytes(&bytes).unwrap();
/// assert_eq!(snapshot.bindings[1].target, TargetRecord::Live);
///
/// let mut live = Module::new(Arc::clone(&registry));
/// live.bind("").annotated_with("clock").to_callable(|| Ok(Value::from(1)));
/// let restored = Injector::restore(registry, snapshot, live).unwrap();
/// assert_eq!(restored.get_named("", "clock").unwrap().as_i64(), Some(1));
/// assert!(restored.container().is_empty());
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InjectorSnapshot {
    pub module: String,
    pub bindings: Vec<BindingRecord>,
    pub installed: Vec<String>,
    pub requested: Vec<String>,
    /// Rendered pointcuts, for inspection; interceptors come back with the live module
    pub pointcuts: Vec<String>,
    pub options: InjectorOptions,
    /// Woven class identities compiled so far
    pub woven: Vec<String>,
}

impl InjectorSnapshot {
    pub fn to_bytes(&self) -> DiResult<Vec<u8>> {
        Ok(serde_json::to_vec_pretty(self)?)
    }

    pub fn from_bytes(bytes: &[u8]) -> DiResult<Self> {
        Ok(serde_json::from_slice(bytes)?)
    }

    /// Records that have to be supplied by the live module on restore.
    pub fn live_keys(&self) -> impl Iterator<Item = BindingKey> + '_ {
        self.bindings
            .iter()
            .filter(|r| r.target == TargetRecord::Live)
            .map(|r| BindingKey::named(&r.type_name, r.annotation.as_str()))
    }
}

impl Injector {
    /// Exports the binding configuration.
    pub fn snapshot(&self) -> InjectorSnapshot {
        let module = &self.core.module;
        InjectorSnapshot {
            module: module.name().to_string(),
            bindings: module
                .bindings
                .iter()
                .map(|(key, binding)| BindingRecord {
                    type_name: key.type_name().to_string(),
                    annotation: key.annotation().to_string(),
                    target: TargetRecord::export(binding.target.as_ref()),
                    scope: binding.scope,
                })
                .collect(),
            installed: module.installed.clone(),
            requested: module.requested.clone(),
            pointcuts: module.pointcuts().iter().map(|p| p.to_string()).collect(),
            options: self.core.options.clone(),
            woven: self.core.compiler.woven_names(),
        }
    }

    /// Rebuilds an injector from `snapshot`, see [`Injector::restore_builder`].
    pub fn restore(registry: Arc<ClassRegistry>, snapshot: InjectorSnapshot, live: Module) -> DiResult<Self> {
        Self::restore_builder(registry, snapshot, live)?.build()
    }

    /// Builder primed with the restored module and options.
    ///
    /// Bindings of `live` win over recorded ones and it provides the
    /// pointcuts. Fails with `NotBound` when a `live` record is left
    /// unsupplied.
    pub fn restore_builder(
        registry: Arc<ClassRegistry>,
        snapshot: InjectorSnapshot,
        live: Module,
    ) -> DiResult<InjectorBuilder> {
        let missing: Vec<BindingKey> = snapshot
            .live_keys()
            .filter(|key| live.bindings.get(key).map_or(true, |b| b.target.is_none()))
            .collect();
        if let Some(key) = missing.first() {
            return Err(DiError::NotBound(Box::new(NotBoundError {
                type_name: key.type_name().to_string(),
                annotate: key.annotation().to_string(),
                module: Some(live.to_string()),
                ..Default::default()
            })));
        }

        let mut module = Module::named(Arc::clone(&registry), snapshot.module);
        for record in snapshot.bindings {
            let key = BindingKey::named(&record.type_name, record.annotation);
            module.bindings.insert(
                key,
                Binding {
                    target: record.target.import(),
                    scope: record.scope,
                },
            );
        }
        for (key, binding) in live.bindings.iter() {
            let merged = match module.bindings.get(key) {
                Some(recorded) => binding.or(recorded),
                None => binding.clone(),
            };
            module.bindings.insert(key.clone(), merged);
        }
        module.pointcuts = live.pointcuts;
        module.requested = snapshot.requested;
        module.installed = snapshot.installed;

        tracing::debug!(
            module = module.name(),
            bindings = module.bindings.len(),
            "injector restored"
        );
        Ok(InjectorBuilder::from_module(registry, module).options(snapshot.options))
    }
}
