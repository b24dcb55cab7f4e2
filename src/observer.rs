//! Resolution observers.
//!
//! Observers see every resolution the injector performs: when it starts,
//! when it completes (with its duration), each object built along the way
//! and each failure. [`TracingObserver`] forwards events to `tracing`;
//! [`InjectionLog`] keeps a readable record of what was injected where.

use std::collections::{HashMap, VecDeque};
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;

use crate::value::WeakObject;
use crate::{DiError, Object, Value};

/// What was injected into one freshly built object.
#[derive(Debug, Clone)]
pub struct InjectionRecord {
    /// Class that was built
    pub class: String,
    /// Constructor arguments, in position order
    pub params: Vec<Value>,
    /// Setters called, with their arguments
    pub setters: Vec<(String, Vec<Value>)>,
    /// Name of the woven class, when interceptors apply
    pub woven: Option<String>,
    pub object: Object,
}

/// Hooks into resolution events.
///
/// All methods but [`DiObserver::resolving`] and [`DiObserver::resolved`]
/// have empty defaults.
///
/// # Examples
///
/// ```rust
/// use std::sync::atomic::{AtomicUsize, Ordering};
/// use std::time::Duration;
/// use ferrous_weave::DiObserver;
///
/// #[derive(Default)]
/// struct Counting(AtomicUsize);
///
/// impl DiObserver for Counting {
///     fn resolving(&self, _type_name: &str) {}
///     fn resolved(&self, _type_name: &str, _duration: Duration) {
///         self.0.fetch_add(1, Ordering::Relaxed);
///     }
/// }
/// ```
pub trait DiObserver: Send + Sync {
    /// Called before `type_name` is resolved.
    fn resolving(&self, type_name: &str);

    /// Called after `type_name` resolved successfully.
    fn resolved(&self, type_name: &str, duration: Duration);

    /// Called once per object built, after setters and post-construct ran.
    fn injected(&self, _record: &InjectionRecord) {}

    /// Called when resolving `type_name` failed.
    fn failed(&self, _type_name: &str, _error: &DiError) {}
}

#[derive(Default, Clone)]
pub(crate) struct Observers {
    observers: Vec<Arc<dyn DiObserver>>,
}

impl Observers {
    pub(crate) fn add(&mut self, observer: Arc<dyn DiObserver>) {
        self.observers.push(observer);
    }

    #[inline]
    pub(crate) fn has_observers(&self) -> bool {
        !self.observers.is_empty()
    }

    #[inline]
    pub(crate) fn resolving(&self, type_name: &str) {
        for observer in &self.observers {
            observer.resolving(type_name);
        }
    }

    #[inline]
    pub(crate) fn resolved(&self, type_name: &str, duration: Duration) {
        for observer in &self.observers {
            observer.resolved(type_name, duration);
        }
    }

    pub(crate) fn injected(&self, record: &InjectionRecord) {
        for observer in &self.observers {
            observer.injected(record);
        }
    }

    pub(crate) fn failed(&self, type_name: &str, error: &DiError) {
        for observer in &self.observers {
            observer.failed(type_name, error);
        }
    }
}

/// Forwards resolution events to `tracing` at debug level, failures at warn.
#[derive(Debug, Clone, Default)]
pub struct TracingObserver {
    prefix: Option<String>,
}

impl TracingObserver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_prefix(prefix: impl Into<String>) -> Self {
        Self {
            prefix: Some(prefix.into()),
        }
    }

    fn prefix(&self) -> &str {
        self.prefix.as_deref().unwrap_or("ferrous-weave")
    }
}

impl DiObserver for TracingObserver {
    fn resolving(&self, type_name: &str) {
        tracing::debug!(target: "ferrous_weave::resolve", prefix = self.prefix(), type_name, "resolving");
    }

    fn resolved(&self, type_name: &str, duration: Duration) {
        tracing::debug!(target: "ferrous_weave::resolve", prefix = self.prefix(), type_name, ?duration, "resolved");
    }

    fn injected(&self, record: &InjectionRecord) {
        tracing::debug!(
            target: "ferrous_weave::resolve",
            prefix = self.prefix(),
            class = %record.class,
            woven = record.woven.as_deref().unwrap_or("-"),
            setters = record.setters.len(),
            "injected"
        );
    }

    fn failed(&self, type_name: &str, error: &DiError) {
        tracing::warn!(target: "ferrous_weave::resolve", prefix = self.prefix(), type_name, %error, "resolution failed");
    }
}

/// One entry of an [`InjectionLog`], detached from the object it describes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoggedInjection {
    pub class: String,
    pub woven: Option<String>,
    pub line: String,
}

#[derive(Default)]
struct LogState {
    entries: VecDeque<LoggedInjection>,
    seen: HashMap<usize, WeakObject>,
}

impl LogState {
    fn render(&mut self, value: &Value) -> String {
        let Value::Object(object) = value else {
            return value.describe();
        };
        let known = self
            .seen
            .get(&object.identity())
            .map_or(false, WeakObject::is_alive);
        if !known {
            self.seen.insert(object.identity(), object.downgrade());
        }
        format!("{}#{}", object.class_name(), if known { "singleton" } else { "prototype" })
    }
}

/// Human-readable log of injections.
///
/// Each built object adds one line,
/// `class:<Class> $<param>:<arg> ... <setter>:<arg>, <arg> ...`, where object arguments are
/// rendered `<Class>#prototype` the first time an instance is seen and
/// `<Class>#singleton` afterwards. Only the most recent `capacity` lines are
/// kept and logged objects are not kept alive.
///
/// # Examples
///
/// ```rust
/// use ferrous_weave::InjectionLog;
///
/// let log = InjectionLog::with_capacity(16);
/// assert!(log.is_empty());
/// assert_eq!(log.capacity(), 16);
/// assert_eq!(log.to_string(), "");
/// ```
pub struct InjectionLog {
    state: Mutex<LogState>,
    capacity: usize,
}

impl Default for InjectionLog {
    fn default() -> Self {
        Self::with_capacity(Self::DEFAULT_CAPACITY)
    }
}

impl InjectionLog {
    pub const DEFAULT_CAPACITY: usize = 1024;

    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            state: Mutex::new(LogState::default()),
            capacity: capacity.max(1),
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn len(&self) -> usize {
        self.state.lock().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn lines(&self) -> Vec<String> {
        self.state.lock().entries.iter().map(|e| e.line.clone()).collect()
    }

    pub fn records(&self) -> Vec<LoggedInjection> {
        self.state.lock().entries.iter().cloned().collect()
    }
}

impl DiObserver for InjectionLog {
    fn resolving(&self, _type_name: &str) {}

    fn resolved(&self, _type_name: &str, _duration: Duration) {}

    fn injected(&self, record: &InjectionRecord) {
        let mut state = self.state.lock();
        let names = record.object.class().constructor_params();
        let mut parts = vec![format!("class:{}", record.class)];
        for (position, value) in record.params.iter().enumerate() {
            let name = names.get(position).map_or("_", |p| p.name());
            parts.push(format!("${}:{}", name, state.render(value)));
        }
        for (method, values) in &record.setters {
            let args: Vec<String> = values.iter().map(|v| state.render(v)).collect();
            parts.push(format!("{}:{}", method, args.join(", ")));
        }

        if state.entries.len() == self.capacity {
            state.entries.pop_front();
        }
        state.entries.push_back(LoggedInjection {
            class: record.class.clone(),
            woven: record.woven.clone(),
            line: parts.join(" "),
        });
        if state.seen.len() > self.capacity {
            state.seen.retain(|_, weak| weak.is_alive());
        }
    }
}

impl fmt::Display for InjectionLog {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.state.lock();
        let lines: Vec<&str> = state.entries.iter().map(|e| e.line.as_str()).collect();
        f.write_str(&lines.join("\n"))
    }
}

impl fmt::Debug for InjectionLog {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("InjectionLog")
            .field("lines", &self.len())
            .field("capacity", &self.capacity)
            .finish()
    }
}
