//! Pre-destroy hook registry.

use parking_lot::Mutex;

use crate::{Args, DiResult, Object};

struct Hook {
    object: Object,
    method: String,
}

/// Pending pre-destroy calls, run once in registration order.
///
/// Shared by an injector and its clones and forks; hooks still pending
/// when the last holder drops run at that point.
#[derive(Default)]
pub(crate) struct ShutdownHooks {
    pending: Mutex<Vec<Hook>>,
}

impl ShutdownHooks {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn register(&self, object: Object, method: impl Into<String>) {
        let method = method.into();
        tracing::trace!(class = object.class_name(), method = %method, "pre-destroy registered");
        self.pending.lock().push(Hook { object, method });
    }

    pub(crate) fn len(&self) -> usize {
        self.pending.lock().len()
    }

    /// Runs every pending hook; failures are logged and do not stop the
    /// remaining hooks. Returns the number of hooks run.
    pub(crate) fn run_all(&self) -> usize {
        let hooks = std::mem::take(&mut *self.pending.lock());
        let count = hooks.len();
        for hook in hooks {
            if let Err(error) = Self::run(&hook) {
                tracing::warn!(
                    class = hook.object.class_name(),
                    method = %hook.method,
                    %error,
                    "pre-destroy hook failed"
                );
            }
        }
        count
    }

    fn run(hook: &Hook) -> DiResult<()> {
        hook.object
            .call_unintercepted(&hook.method, &Args::new())
            .map(|_| ())
    }
}

impl Drop for ShutdownHooks {
    fn drop(&mut self) {
        self.run_all();
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::reflect::{ClassDescriptor, Method};
    use crate::Value;

    struct Res(Arc<Mutex<Vec<String>>>, &'static str);

    fn object(log: &Arc<Mutex<Vec<String>>>, name: &'static str) -> Object {
        let class = Arc::new(ClassDescriptor::concrete(name).method(Method::shared(
            "close",
            |r: &Res, _| {
                r.0.lock().push(r.1.to_string());
                Ok(Value::null())
            },
        )));
        Object::with_class(class, Res(Arc::clone(log), name))
    }

    #[test]
    fn hooks_run_once_in_registration_order() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let hooks = ShutdownHooks::new();
        hooks.register(object(&log, "first"), "close");
        hooks.register(object(&log, "second"), "close");
        assert_eq!(hooks.run_all(), 2);
        assert_eq!(hooks.run_all(), 0);
        assert_eq!(*log.lock(), vec!["first", "second"]);
    }

    #[test]
    fn drop_runs_pending_hooks_and_survives_failures() {
        let log = Arc::new(Mutex::new(Vec::new()));
        {
            let hooks = ShutdownHooks::new();
            hooks.register(object(&log, "broken"), "missing");
            hooks.register(object(&log, "ok"), "close");
        }
        assert_eq!(*log.lock(), vec!["ok"]);
    }
}
