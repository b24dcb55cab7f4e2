//! Per-class injection and lifecycle metadata derived from annotations.

use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::sync::Arc;

use parking_lot::RwLock;

use crate::reflect::annotation::{names, AnnotationReader};
use crate::reflect::{ClassDescriptor, ClassRegistry, Param};
use crate::{Annotation, DiError, DiResult, Scope, Value};

/// Just-in-time default for an unbound type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JitHint {
    /// Build this concrete class
    ImplementedBy(String),
    /// Ask this provider class
    ProvidedBy(String),
}

/// Where a dependency is injected.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum InjectionPoint {
    /// The constructor, when annotated `@Inject`
    Constructor,
    /// A setter method
    Method(String),
}

impl fmt::Display for InjectionPoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            InjectionPoint::Constructor => f.write_str("new"),
            InjectionPoint::Method(name) => f.write_str(name),
        }
    }
}

/// One injectable parameter.
#[derive(Debug, Clone)]
pub struct ParamDescriptor {
    pub position: usize,
    pub name: String,
    /// Declared dependency type; `None` for scalars
    pub type_name: Option<String>,
    /// `@Named` qualifier, `*` when unspecified
    pub annotate: String,
    pub default: Option<Value>,
    pub optional: bool,
    pub jit: Option<JitHint>,
}

/// An injection point with its parameters.
#[derive(Debug, Clone)]
pub struct InjectionDescriptor {
    pub point: InjectionPoint,
    pub optional: bool,
    pub params: Vec<ParamDescriptor>,
}

/// Unified injection and lifecycle metadata of one class.
///
/// Created once per class by the [`DefinitionScanner`] and immutable
/// afterwards. Merging with a parent definition yields a new value.
#[derive(Debug, Clone, Default)]
pub struct Definition {
    /// Explicit `@Scope`; `None` means prototype
    pub scope: Option<Scope>,
    pub post_construct: Option<String>,
    pub pre_destroy: Option<String>,
    /// Constructor first, then setters in declaration order
    pub injections: Vec<InjectionDescriptor>,
    pub jit: Option<JitHint>,
    /// User class annotations by name
    pub class_annotations: BTreeMap<String, Annotation>,
    /// User annotation name -> methods carrying it
    pub by_name: BTreeMap<String, Vec<String>>,
    /// Method -> every annotation on it
    pub by_method: BTreeMap<String, Vec<Annotation>>,
}

impl Definition {
    /// Effective scope.
    pub fn scope(&self) -> Scope {
        self.scope.unwrap_or_default()
    }

    /// Whether anything differs from an unannotated class.
    pub fn has_definition(&self) -> bool {
        self.scope.is_some()
            || self.post_construct.is_some()
            || self.pre_destroy.is_some()
            || !self.injections.is_empty()
            || self.jit.is_some()
            || !self.class_annotations.is_empty()
            || !self.by_name.is_empty()
    }

    pub fn constructor_injection(&self) -> Option<&InjectionDescriptor> {
        self.injections
            .iter()
            .find(|i| i.point == InjectionPoint::Constructor)
    }

    pub fn setter_injections(&self) -> impl Iterator<Item = &InjectionDescriptor> {
        self.injections
            .iter()
            .filter(|i| i.point != InjectionPoint::Constructor)
    }

    /// Overlays `self` (the child) on `parent`; the child wins.
    pub fn merged_onto(&self, parent: &Definition) -> Definition {
        let mut injections: Vec<InjectionDescriptor> = parent
            .injections
            .iter()
            .filter(|p| !self.injections.iter().any(|c| c.point == p.point))
            .cloned()
            .collect();
        injections.extend(self.injections.iter().cloned());
        if let Some(pos) = injections
            .iter()
            .position(|i| i.point == InjectionPoint::Constructor)
        {
            let ctor = injections.remove(pos);
            injections.insert(0, ctor);
        }

        let mut class_annotations = parent.class_annotations.clone();
        class_annotations.extend(self.class_annotations.clone());
        let mut by_name = parent.by_name.clone();
        by_name.extend(self.by_name.clone());
        let mut by_method = parent.by_method.clone();
        by_method.extend(self.by_method.clone());

        Definition {
            scope: self.scope.or(parent.scope),
            post_construct: self.post_construct.clone().or_else(|| parent.post_construct.clone()),
            pre_destroy: self.pre_destroy.clone().or_else(|| parent.pre_destroy.clone()),
            injections,
            jit: self.jit.clone().or_else(|| parent.jit.clone()),
            class_annotations,
            by_name,
            by_method,
        }
    }
}

/// Parses a `@Named` value into per-parameter qualifiers.
///
/// `"name"` qualifies every parameter; `"a=x,b=y"` qualifies parameters
/// `a` and `b`. Parameters not mentioned stay unspecified.
pub(crate) fn parse_named(value: &str) -> NamedQualifier {
    if !value.contains('=') {
        return NamedQualifier::All(value.trim().to_string());
    }
    let pairs = value
        .split(',')
        .filter_map(|pair| {
            let (param, name) = pair.split_once('=')?;
            let param = param.trim().trim_start_matches('$');
            Some((param.to_string(), name.trim().to_string()))
        })
        .collect();
    NamedQualifier::Each(pairs)
}

#[derive(Debug, PartialEq)]
pub(crate) enum NamedQualifier {
    All(String),
    Each(HashMap<String, String>),
}

impl NamedQualifier {
    fn for_param(&self, param: &str) -> String {
        match self {
            NamedQualifier::All(name) => name.clone(),
            NamedQualifier::Each(pairs) => pairs
                .get(param)
                .cloned()
                .unwrap_or_else(|| crate::key::UNSPECIFIED.to_string()),
        }
    }
}

/// Scans class annotations into cached [`Definition`]s.
///
/// # Examples
///
/// ```rust
/// use std::sync::Arc;
/// use ferrous_weave::{
///     Annotation, ClassDescriptor, ClassRegistry, DeclaredReader, DefinitionScanner, Method, Scope,
/// };
///
/// struct Greeter;
///
/// let registry = Arc::new(ClassRegistry::new().with(
///     ClassDescriptor::concrete("Greeter")
///         .annotate(Annotation::scope(Scope::Singleton))
///         .method(Method::mutating("init", |_: &mut Greeter, _| Ok(())).annotate(Annotation::post_construct())),
/// ));
/// let scanner = DefinitionScanner::new(registry, Arc::new(DeclaredReader));
///
/// let definition = scanner.get_definition("Greeter").unwrap();
/// assert_eq!(definition.scope(), Scope::Singleton);
/// assert_eq!(definition.post_construct.as_deref(), Some("init"));
/// assert!(scanner.get_definition("Nope").is_err());
/// ```
pub struct DefinitionScanner {
    registry: Arc<ClassRegistry>,
    reader: Arc<dyn AnnotationReader>,
    cache: RwLock<HashMap<String, Arc<Definition>>>,
}

impl DefinitionScanner {
    pub fn new(registry: Arc<ClassRegistry>, reader: Arc<dyn AnnotationReader>) -> Self {
        Self {
            registry,
            reader,
            cache: RwLock::new(HashMap::new()),
        }
    }

    pub fn reader(&self) -> &Arc<dyn AnnotationReader> {
        &self.reader
    }

    /// Definition of the class's own annotations (no parent merge).
    ///
    /// Fails with `NotReadable` for unknown classes and with
    /// `MultipleAnnotationNotAllowed` for duplicated lifecycle hooks.
    pub fn get_definition(&self, class: &str) -> DiResult<Arc<Definition>> {
        let desc = self.registry.get(class)?;
        if let Some(hit) = self.cache.read().get(desc.name()) {
            return Ok(Arc::clone(hit));
        }
        let definition = Arc::new(self.scan(&desc)?);
        tracing::trace!(class = desc.name(), "scanned definition");
        Ok(Arc::clone(
            self.cache
                .write()
                .entry(desc.name().to_string())
                .or_insert(definition),
        ))
    }

    fn scan(&self, class: &ClassDescriptor) -> DiResult<Definition> {
        let mut def = Definition::default();

        for annotation in self.reader.class_annotations(class) {
            match annotation.name() {
                names::SCOPE => {
                    def.scope = annotation.value_str().map(str::parse::<Scope>).transpose()?;
                }
                names::IMPLEMENTED_BY => {
                    def.jit = annotation
                        .value_str()
                        .map(|c| JitHint::ImplementedBy(crate::key::normalize(c).to_string()));
                }
                names::PROVIDED_BY => {
                    def.jit = annotation
                        .value_str()
                        .map(|p| JitHint::ProvidedBy(crate::key::normalize(p).to_string()));
                }
                name => {
                    def.class_annotations.insert(name.to_string(), annotation.clone());
                }
            }
        }

        let ctor_annotations = self.reader.constructor_annotations(class);
        if let Some(inject) = ctor_annotations.iter().find(|a| a.is(names::INJECT)) {
            let named = ctor_annotations.iter().find(|a| a.is(names::NAMED));
            def.injections.push(self.injection(
                InjectionPoint::Constructor,
                class.constructor_params(),
                inject,
                named,
            ));
        }

        for method in class.methods() {
            let annotations = self.reader.method_annotations(class, method.name());
            let named = annotations.iter().find(|a| a.is(names::NAMED));
            for annotation in &annotations {
                match annotation.name() {
                    names::POST_CONSTRUCT => {
                        set_lifecycle(&mut def.post_construct, class, names::POST_CONSTRUCT, method.name())?
                    }
                    names::PRE_DESTROY => {
                        set_lifecycle(&mut def.pre_destroy, class, names::PRE_DESTROY, method.name())?
                    }
                    names::INJECT => def.injections.push(self.injection(
                        InjectionPoint::Method(method.name().to_string()),
                        method.params(),
                        annotation,
                        named,
                    )),
                    names::NAMED => {}
                    other => def
                        .by_name
                        .entry(other.to_string())
                        .or_default()
                        .push(method.name().to_string()),
                }
            }
            if !annotations.is_empty() {
                def.by_method.insert(method.name().to_string(), annotations.clone());
            }
        }
        Ok(def)
    }

    fn injection(
        &self,
        point: InjectionPoint,
        params: &[Param],
        inject: &Annotation,
        named: Option<&Annotation>,
    ) -> InjectionDescriptor {
        let optional = inject.attr_bool("optional");
        let qualifier = named
            .and_then(|n| n.value_str())
            .map(parse_named)
            .unwrap_or_else(|| NamedQualifier::All(crate::key::UNSPECIFIED.to_string()));
        let params = params
            .iter()
            .enumerate()
            .map(|(position, param)| ParamDescriptor {
                position,
                name: param.name().to_string(),
                type_name: param.type_name().map(str::to_string),
                annotate: qualifier.for_param(param.name()),
                default: param.default_value().cloned(),
                optional,
                jit: param.type_name().and_then(|t| self.jit_hint(t)),
            })
            .collect();
        InjectionDescriptor {
            point,
            optional,
            params,
        }
    }

    /// JIT default for a dependency type: its own `ImplementedBy`/`ProvidedBy`,
    /// else the type itself when it is a concrete class.
    pub fn jit_hint(&self, type_name: &str) -> Option<JitHint> {
        let desc = self.registry.find(type_name)?;
        let annotations = self.reader.class_annotations(desc);
        for annotation in &annotations {
            let target = annotation.value_str().map(|v| crate::key::normalize(v).to_string());
            match (annotation.name(), target) {
                (names::IMPLEMENTED_BY, Some(class)) => return Some(JitHint::ImplementedBy(class)),
                (names::PROVIDED_BY, Some(provider)) => return Some(JitHint::ProvidedBy(provider)),
                _ => {}
            }
        }
        (!desc.is_abstract()).then(|| JitHint::ImplementedBy(desc.name().to_string()))
    }
}

fn set_lifecycle(
    slot: &mut Option<String>,
    class: &ClassDescriptor,
    annotation: &str,
    method: &str,
) -> DiResult<()> {
    if let Some(first) = slot {
        return Err(DiError::MultipleAnnotationNotAllowed {
            class: class.name().to_string(),
            annotation: annotation.to_string(),
            first: first.clone(),
            second: method.to_string(),
        });
    }
    *slot = Some(method.to_string());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reflect::annotation::DeclaredReader;
    use crate::reflect::{Constructor, Method};

    struct Svc;

    fn scanner(classes: Vec<ClassDescriptor>) -> DefinitionScanner {
        let mut registry = ClassRegistry::new();
        for class in classes {
            registry.register(class);
        }
        DefinitionScanner::new(Arc::new(registry), Arc::new(DeclaredReader))
    }

    #[test]
    fn named_pairs_are_parsed() {
        assert_eq!(parse_named("test"), NamedQualifier::All("test".into()));
        let each = parse_named("db=primary, $log=audit");
        assert_eq!(each.for_param("db"), "primary");
        assert_eq!(each.for_param("log"), "audit");
        assert_eq!(each.for_param("other"), "*");
    }

    #[test]
    fn duplicate_post_construct_is_rejected() {
        let s = scanner(vec![ClassDescriptor::concrete("Svc")
            .method(Method::mutating("a", |_: &mut Svc, _| Ok(())).annotate(Annotation::post_construct()))
            .method(Method::mutating("b", |_: &mut Svc, _| Ok(())).annotate(Annotation::post_construct()))]);
        let err = s.get_definition("Svc").unwrap_err();
        assert!(matches!(err, DiError::MultipleAnnotationNotAllowed { first, second, .. } if first == "a" && second == "b"));
    }

    #[test]
    fn setter_params_carry_jit_hints() {
        let s = scanner(vec![
            ClassDescriptor::interface("Logger").annotate(Annotation::implemented_by("FileLogger")),
            ClassDescriptor::concrete("FileLogger"),
            ClassDescriptor::interface("Cache"),
            ClassDescriptor::concrete("Svc")
                .constructor(Constructor::new(|_| Ok(Svc)))
                .method(
                    Method::mutating("setLogger", |_: &mut Svc, _| Ok(()))
                        .param(Param::of("logger", "Logger"))
                        .annotate(Annotation::inject())
                        .annotate(Annotation::new("Audited")),
                )
                .method(
                    Method::mutating("setCache", |_: &mut Svc, _| Ok(()))
                        .param(Param::of("cache", "Cache"))
                        .annotate(Annotation::optional_inject())
                        .annotate(Annotation::named("hot")),
                ),
        ]);
        let def = s.get_definition("Svc").unwrap();
        let setters: Vec<_> = def.setter_injections().collect();
        assert_eq!(setters.len(), 2);
        assert_eq!(setters[0].params[0].jit, Some(JitHint::ImplementedBy("FileLogger".into())));
        assert!(setters[1].optional);
        assert_eq!(setters[1].params[0].annotate, "hot");
        assert_eq!(setters[1].params[0].jit, None);
        assert_eq!(def.by_name["Audited"], vec!["setLogger".to_string()]);
        assert_eq!(def.by_method["setLogger"].len(), 2);
        assert!(def.has_definition());
    }

    #[test]
    fn child_wins_on_merge() {
        let parent = Definition {
            scope: Some(Scope::Singleton),
            pre_destroy: Some("close".into()),
            ..Default::default()
        };
        let child = Definition {
            pre_destroy: Some("shutdown".into()),
            ..Default::default()
        };
        let merged = child.merged_onto(&parent);
        assert_eq!(merged.scope(), Scope::Singleton);
        assert_eq!(merged.pre_destroy.as_deref(), Some("shutdown"));
    }
}
