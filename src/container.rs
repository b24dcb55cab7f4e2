//! Singleton retention keyed by resolved type name.

use parking_lot::Mutex;

use crate::binding::FastMap;
use crate::key::normalize;
use crate::Value;

/// Flat store of singleton-scoped instances.
///
/// `Clone` copies the retained entries into a new store; the copies then
/// evolve independently. [`Container::fork`] starts empty.
///
/// # Examples
///
/// ```rust
/// use ferrous_weave::{Container, Value};
///
/// let container = Container::new();
/// container.set("Logger", Value::from("file"));
///
/// let copy = container.clone();
/// copy.set("Clock", Value::from(0));
///
/// assert!(container.has("\\Logger"));
/// assert!(!container.has("Clock"));
/// assert!(copy.has("Logger"));
/// assert!(container.fork().is_empty());
/// ```
#[derive(Debug, Default)]
pub struct Container {
    instances: Mutex<FastMap<String, Value>>,
}

impl Container {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn has(&self, type_name: &str) -> bool {
        self.instances.lock().contains_key(normalize(type_name))
    }

    pub fn get(&self, type_name: &str) -> Option<Value> {
        self.instances.lock().get(normalize(type_name)).cloned()
    }

    pub fn set(&self, type_name: &str, value: Value) {
        self.instances
            .lock()
            .insert(normalize(type_name).to_string(), value);
    }

    pub fn len(&self) -> usize {
        self.instances.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.instances.lock().is_empty()
    }

    /// Retained type names, sorted.
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.instances.lock().keys().cloned().collect();
        names.sort();
        names
    }

    /// A new, empty container.
    pub fn fork(&self) -> Self {
        Self::new()
    }
}

impl Clone for Container {
    fn clone(&self) -> Self {
        Self {
            instances: Mutex::new(self.instances.lock().clone()),
        }
    }
}
