//! Constructor parameter and setter unification across inheritance chains.
//!
//! [`Config::fetch`] answers "what does the injector already know about
//! building this class": the constructor parameter values (explicit
//! overrides or inherited values, plus declared defaults), the setter overrides
//! and the merged [`Definition`]. Results are memoized per class.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::RwLock;

use crate::definition::{Definition, DefinitionScanner};
use crate::key::normalize;
use crate::reflect::annotation::AnnotationReader;
use crate::reflect::{ClassDescriptor, ClassRegistry};
use crate::{DiError, DiResult, Value};

#[derive(Debug, Clone, Default)]
struct ParamOverrides {
    named: HashMap<String, Value>,
    positional: HashMap<usize, Value>,
}

/// A constructor parameter with what is known about its value.
#[derive(Debug, Clone)]
pub struct UnifiedParam {
    pub name: String,
    /// Explicit override, or the value a parent class was given
    pub supplied: Option<Value>,
    /// Declared default, the nearest class's first
    pub default: Option<Value>,
}

impl UnifiedParam {
    /// Supplied value, else the default.
    pub fn value(&self) -> Option<&Value> {
        self.supplied.as_ref().or(self.default.as_ref())
    }
}

/// Result of [`Config::fetch`].
#[derive(Debug)]
pub struct Unified {
    pub class: Arc<ClassDescriptor>,
    pub params: Vec<UnifiedParam>,
    /// Setter overrides: method name and its arguments, parent's first
    pub setters: Vec<(String, Vec<Value>)>,
    pub definition: Arc<Definition>,
}

/// Per-class parameter unifier.
///
/// # Examples
///
/// ```rust
/// use std::sync::Arc;
/// use ferrous_weave::{Args, ClassDescriptor, ClassRegistry, Config, Constructor, DeclaredReader, Param};
///
/// struct Db;
///
/// let registry = Arc::new(
///     ClassRegistry::new()
///         .with(ClassDescriptor::abstract_class("Base").constructor(
///             Constructor::new(|_: &Args| Ok(Db)).param(Param::new("dsn")).param(Param::new("pool").default(4)),
///         ))
///         .with(ClassDescriptor::concrete("Db").extends("Base").constructor(
///             Constructor::new(|_: &Args| Ok(Db)).param(Param::new("dsn")).param(Param::new("pool").default(8)),
///         )),
/// );
/// let mut config = Config::new(registry, Arc::new(DeclaredReader));
/// config.set_param("Base", "dsn", "sqlite::memory:");
///
/// let unified = config.fetch("Db").unwrap();
/// assert_eq!(unified.params[0].value().and_then(|v| v.as_str()), Some("sqlite::memory:"));
/// assert!(unified.params[1].supplied.is_none());
/// assert_eq!(unified.params[1].value().and_then(|v| v.as_i64()), Some(8));
/// ```
pub struct Config {
    registry: Arc<ClassRegistry>,
    scanner: DefinitionScanner,
    params: HashMap<String, ParamOverrides>,
    setters: HashMap<String, Vec<(String, Vec<Value>)>>,
    unified: RwLock<HashMap<String, Arc<Unified>>>,
}

impl Config {
    pub fn new(registry: Arc<ClassRegistry>, reader: Arc<dyn AnnotationReader>) -> Self {
        Self {
            scanner: DefinitionScanner::new(Arc::clone(&registry), reader),
            registry,
            params: HashMap::new(),
            setters: HashMap::new(),
            unified: RwLock::new(HashMap::new()),
        }
    }

    /// Overrides constructor parameter `name` of `class`.
    pub fn set_param(&mut self, class: &str, name: impl Into<String>, value: impl Into<Value>) -> &mut Self {
        self.overrides(class).named.insert(name.into(), value.into());
        self.unified.get_mut().clear();
        self
    }

    /// Overrides the constructor parameter at `position`; wins over named overrides.
    pub fn set_param_at(&mut self, class: &str, position: usize, value: impl Into<Value>) -> &mut Self {
        self.overrides(class).positional.insert(position, value.into());
        self.unified.get_mut().clear();
        self
    }

    /// Calls `method` with `values` after construction of `class` and its subclasses.
    pub fn set_setter(&mut self, class: &str, method: impl Into<String>, values: Vec<Value>) -> &mut Self {
        let method = method.into();
        let setters = self.setters.entry(normalize(class).to_string()).or_default();
        setters.retain(|(m, _)| *m != method);
        setters.push((method, values));
        self.unified.get_mut().clear();
        self
    }

    fn overrides(&mut self, class: &str) -> &mut ParamOverrides {
        self.params.entry(normalize(class).to_string()).or_default()
    }

    pub fn registry(&self) -> &Arc<ClassRegistry> {
        &self.registry
    }

    pub fn scanner(&self) -> &DefinitionScanner {
        &self.scanner
    }

    /// Unified parameters, setters and definition of `class`.
    ///
    /// Fails with `NotReadable` for unknown classes.
    pub fn fetch(&self, class: &str) -> DiResult<Arc<Unified>> {
        let desc = self.registry.get(class)?;
        if let Some(hit) = self.unified.read().get(desc.name()) {
            return Ok(Arc::clone(hit));
        }

        let mut lineage = self.registry.ancestors(desc.name());
        lineage.reverse();
        lineage.push(desc);

        let mut parent: Option<Arc<Unified>> = None;
        for class in lineage {
            let cached = self.unified.read().get(class.name()).cloned();
            let unified = match cached {
                Some(hit) => hit,
                None => {
                    let unified = Arc::new(self.unify(&class, parent.as_deref())?);
                    Arc::clone(
                        self.unified
                            .write()
                            .entry(class.name().to_string())
                            .or_insert(unified),
                    )
                }
            };
            parent = Some(unified);
        }
        parent.ok_or_else(|| DiError::NotReadable(class.to_string()))
    }

    fn unify(&self, class: &Arc<ClassDescriptor>, parent: Option<&Unified>) -> DiResult<Unified> {
        let own = self.scanner.get_definition(class.name())?;
        let definition = match parent {
            Some(p) => Arc::new(own.merged_onto(&p.definition)),
            None => own,
        };

        let overrides = self.params.get(class.name());
        let params = if class.declared_constructor().is_some() {
            class
                .constructor_params()
                .iter()
                .enumerate()
                .map(|(position, param)| {
                    let explicit = overrides.and_then(|o| {
                        o.positional
                            .get(&position)
                            .or_else(|| o.named.get(param.name()))
                    });
                    let inherited = parent.and_then(|p| p.params.iter().find(|u| u.name == param.name()));
                    UnifiedParam {
                        name: param.name().to_string(),
                        supplied: explicit
                            .or_else(|| inherited.and_then(|u| u.supplied.as_ref()))
                            .cloned(),
                        default: param
                            .default_value()
                            .or_else(|| inherited.and_then(|u| u.default.as_ref()))
                            .cloned(),
                    }
                })
                .collect()
        } else {
            parent.map(|p| p.params.clone()).unwrap_or_default()
        };

        let mut setters = parent.map(|p| p.setters.clone()).unwrap_or_default();
        for (method, values) in self.setters.get(class.name()).into_iter().flatten() {
            setters.retain(|(m, _)| m != method);
            setters.push((method.clone(), values.clone()));
        }

        Ok(Unified {
            class: Arc::clone(class),
            params,
            setters,
            definition,
        })
    }
}

impl Clone for Config {
    /// Shares overrides; memoized state starts empty.
    fn clone(&self) -> Self {
        Self {
            registry: Arc::clone(&self.registry),
            scanner: DefinitionScanner::new(Arc::clone(&self.registry), Arc::clone(self.scanner.reader())),
            params: self.params.clone(),
            setters: self.setters.clone(),
            unified: RwLock::new(HashMap::new()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reflect::annotation::DeclaredReader;
    use crate::reflect::{Constructor, Param};
    use crate::{Annotation, Args, Scope};

    struct Svc;

    fn registry() -> Arc<ClassRegistry> {
        Arc::new(
            ClassRegistry::new()
                .with(
                    ClassDescriptor::abstract_class("Base")
                        .annotate(Annotation::scope(Scope::Singleton))
                        .constructor(Constructor::new(|_: &Args| Ok(Svc)).param(Param::new("a")).param(Param::new("b"))),
                )
                .with(ClassDescriptor::concrete("Child").extends("Base").constructor(
                    Constructor::new(|_: &Args| Ok(Svc))
                        .param(Param::new("a"))
                        .param(Param::new("b").default("b-default"))
                        .param(Param::new("c")),
                )),
        )
    }

    #[test]
    fn positional_beats_named() {
        let mut config = Config::new(registry(), Arc::new(DeclaredReader));
        config.set_param("Child", "a", "named").set_param_at("Child", 0, "positional");
        let unified = config.fetch("Child").unwrap();
        assert_eq!(unified.params[0].value().unwrap().as_str(), Some("positional"));
    }

    #[test]
    fn child_inherits_parent_values_and_definition() {
        let mut config = Config::new(registry(), Arc::new(DeclaredReader));
        config.set_param("Base", "b", "from-parent");
        config.set_setter("Base", "setMode", vec![Value::from("fast")]);
        let unified = config.fetch("\\Child").unwrap();
        assert_eq!(unified.params[1].supplied.as_ref().unwrap().as_str(), Some("from-parent"));
        assert_eq!(unified.params[1].default.as_ref().unwrap().as_str(), Some("b-default"));
        assert!(unified.params[2].value().is_none());
        assert_eq!(unified.setters[0].0, "setMode");
        assert_eq!(unified.definition.scope(), Scope::Singleton);
    }

    #[test]
    fn fetch_is_memoized() {
        let config = Config::new(registry(), Arc::new(DeclaredReader));
        let a = config.fetch("Child").unwrap();
        let b = config.fetch("Child").unwrap();
        assert!(Arc::ptr_eq(&a, &b));
        assert!(!Arc::ptr_eq(&a, &config.clone().fetch("Child").unwrap()));
    }
}
