//! Compiles per-class interceptor binds into woven classes.
//!
//! Nothing is generated or loaded at run time: a woven class is the
//! original [`ClassDescriptor`] plus a manifest of its intercepted public
//! methods, and woven instances dispatch through their [`Bind`]. The
//! compiler gives every (class, bind) pair a deterministic identity,
//! compiles each identity once and, when a class directory is configured,
//! persists the manifest so later processes reuse it.

use std::collections::{BTreeMap, HashMap};
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tempfile::NamedTempFile;

use super::Bind;
use crate::reflect::ClassDescriptor;
use crate::value::{Building, Weave};
use crate::{Args, DiError, DiResult};

/// Persisted description of a woven class.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WovenManifest {
    pub identity: String,
    /// Original class name
    pub class: String,
    /// Hash of the bind this class was compiled for
    pub bind: String,
    /// Every public method with its interceptor names; empty lists delegate
    /// straight to the original body
    pub methods: BTreeMap<String, Vec<String>>,
    /// Triggering annotation of annotation-bound methods
    pub annotations: BTreeMap<String, String>,
}

impl WovenManifest {
    fn new(identity: String, class: &ClassDescriptor, bind: &Bind) -> Self {
        let methods = class
            .public_methods()
            .map(|m| (m.name().to_string(), bind.interceptor_names(m.name())))
            .collect();
        let annotations = bind
            .methods()
            .filter_map(|m| bind.annotation(m).map(|a| (m.to_string(), a.to_string())))
            .collect();
        Self {
            identity,
            class: class.name().to_string(),
            bind: bind.hash(),
            methods,
            annotations,
        }
    }
}

/// A compiled woven class.
#[derive(Debug)]
pub struct WovenClass {
    manifest: WovenManifest,
    path: Option<PathBuf>,
}

impl WovenClass {
    /// Deterministic identity, `<Class>_<hash>Weave`.
    pub fn name(&self) -> &str {
        &self.manifest.identity
    }

    /// The original class this one extends.
    pub fn parent(&self) -> &str {
        &self.manifest.class
    }

    pub fn manifest(&self) -> &WovenManifest {
        &self.manifest
    }

    /// Location of the persisted manifest, if any.
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// Whether calls to `method` go through interceptors.
    pub fn intercepts(&self, method: &str) -> bool {
        self.manifest
            .methods
            .get(method)
            .map_or(false, |chain| !chain.is_empty())
    }
}

/// Compiler counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompilerStats {
    /// Identities compiled in this process
    pub compiled: u64,
    /// Manifests written to the class directory
    pub emitted: u64,
    /// Manifests found on disk and reused
    pub loaded: u64,
    /// Compilations answered from memory
    pub cache_hits: u64,
}

/// Woven class compiler.
///
/// # Examples
///
/// ```rust
/// use std::sync::Arc;
/// use ferrous_weave::{Bind, ClassDescriptor, Compiler, FnInterceptor, MethodInterceptor, Method, Value};
///
/// struct Svc;
///
/// let class = ClassDescriptor::concrete("App\\Svc").method(Method::shared("run", |_: &Svc, _| Ok(Value::null())));
/// let mut bind = Bind::new();
/// let noop: Arc<dyn MethodInterceptor> = Arc::new(FnInterceptor::new("Noop", |inv| inv.proceed()));
/// bind.bind_interceptors("run", vec![noop], None);
///
/// let compiler = Compiler::new(None);
/// let first = compiler.compile(&class, &bind).unwrap();
/// let second = compiler.compile(&class, &bind).unwrap();
///
/// assert!(Arc::ptr_eq(&first, &second));
/// assert!(first.name().starts_with("App_Svc_"));
/// assert!(first.name().ends_with("Weave"));
/// assert_eq!(compiler.stats().compiled, 1);
/// assert_eq!(compiler.stats().cache_hits, 1);
/// ```
#[derive(Debug)]
pub struct Compiler {
    class_dir: Option<PathBuf>,
    woven: Mutex<HashMap<String, Arc<WovenClass>>>,
    stats: Mutex<CompilerStats>,
}

impl Compiler {
    pub fn new(class_dir: Option<PathBuf>) -> Self {
        Self {
            class_dir,
            woven: Mutex::new(HashMap::new()),
            stats: Mutex::new(CompilerStats::default()),
        }
    }

    /// Identity of the woven class for `class` and `bind`.
    pub fn identity(class: &str, bind: &Bind) -> String {
        format!("{}_{}Weave", class.replace('\\', "_").replace("::", "_"), bind.hash())
    }

    /// Compiles `class` for `bind`, once per identity.
    ///
    /// The compile lock is held for the whole call, so concurrent requests
    /// for one identity observe a single compilation.
    pub fn compile(&self, class: &ClassDescriptor, bind: &Bind) -> DiResult<Arc<WovenClass>> {
        let identity = Self::identity(class.name(), bind);
        let mut woven = self.woven.lock();
        if let Some(hit) = woven.get(&identity) {
            self.stats.lock().cache_hits += 1;
            return Ok(Arc::clone(hit));
        }

        let manifest = WovenManifest::new(identity.clone(), class, bind);
        let path = match &self.class_dir {
            Some(dir) => Some(self.persist(dir, &manifest)?),
            None => None,
        };
        tracing::trace!(class = class.name(), identity = %identity, "compiled woven class");

        let compiled = Arc::new(WovenClass { manifest, path });
        woven.insert(identity, Arc::clone(&compiled));
        self.stats.lock().compiled += 1;
        Ok(compiled)
    }

    /// Writes the manifest unless an identical one is already on disk.
    fn persist(&self, dir: &Path, manifest: &WovenManifest) -> DiResult<PathBuf> {
        let path = dir.join(format!("{}.json", manifest.identity));
        if path.exists() {
            let existing = fs::read(&path)
                .map_err(|e| DiError::io(&path, e))
                .and_then(|bytes| Ok(serde_json::from_slice::<WovenManifest>(&bytes)?));
            match existing {
                Ok(found) if found == *manifest => {
                    self.stats.lock().loaded += 1;
                    return Ok(path);
                }
                Ok(_) => tracing::debug!(path = %path.display(), "stale woven manifest, rewriting"),
                Err(error) => tracing::warn!(path = %path.display(), %error, "unreadable woven manifest, rewriting"),
            }
        }

        fs::create_dir_all(dir).map_err(|e| DiError::io(dir, e))?;
        let mut file = NamedTempFile::new_in(dir).map_err(|e| DiError::io(dir, e))?;
        let body = serde_json::to_vec_pretty(manifest)?;
        file.write_all(&body).map_err(|e| DiError::io(file.path(), e))?;
        file.persist(&path).map_err(|e| DiError::io(&path, e.error))?;
        self.stats.lock().emitted += 1;
        Ok(path)
    }

    /// Compiles `class` for `bind`, then constructs an instance carrying the bind.
    pub fn new_instance(&self, class: &Arc<ClassDescriptor>, args: &Args, bind: Bind) -> DiResult<Building> {
        let woven = self.compile(class, &bind)?;
        let instance = class.instantiate(args)?;
        Ok(Building::new(
            Arc::clone(class),
            instance,
            Some(Weave {
                class: woven,
                bind: Arc::new(bind),
            }),
        ))
    }

    pub fn stats(&self) -> CompilerStats {
        *self.stats.lock()
    }

    pub fn class_dir(&self) -> Option<&Path> {
        self.class_dir.as_deref()
    }

    /// Identities compiled so far, sorted.
    pub fn woven_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.woven.lock().keys().cloned().collect();
        names.sort();
        names
    }
}
