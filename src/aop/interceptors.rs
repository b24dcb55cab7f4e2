//! Ready-made interceptors.

use std::collections::HashMap;
use std::time::{Duration, Instant};

use parking_lot::Mutex;

use super::{MethodInterceptor, MethodInvocation};
use crate::{DiResult, Value};

type InterceptFn = Box<dyn Fn(&mut MethodInvocation<'_>) -> DiResult<Value> + Send + Sync>;

/// Interceptor backed by a closure.
///
/// # Examples
///
/// ```rust
/// use ferrous_weave::{FnInterceptor, MethodInterceptor, Value};
///
/// let double = FnInterceptor::new("Double", |invocation| {
///     let n = invocation.proceed()?.as_i64().unwrap_or_default();
///     Ok(Value::from(n * 2))
/// });
/// assert_eq!(double.name(), "Double");
/// ```
pub struct FnInterceptor {
    name: String,
    f: InterceptFn,
}

impl FnInterceptor {
    pub fn new<F>(name: impl Into<String>, f: F) -> Self
    where
        F: Fn(&mut MethodInvocation<'_>) -> DiResult<Value> + Send + Sync + 'static,
    {
        Self {
            name: name.into(),
            f: Box::new(f),
        }
    }
}

impl MethodInterceptor for FnInterceptor {
    fn invoke(&self, invocation: &mut MethodInvocation<'_>) -> DiResult<Value> {
        (self.f)(invocation)
    }

    fn name(&self) -> &str {
        &self.name
    }
}

impl std::fmt::Debug for FnInterceptor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FnInterceptor").field("name", &self.name).finish()
    }
}

/// Logs every intercepted call with `tracing`.
#[derive(Debug, Clone)]
pub struct TracingInterceptor {
    log_arguments: bool,
}

impl TracingInterceptor {
    pub fn new() -> Self {
        Self { log_arguments: false }
    }

    /// Also log argument and result descriptions.
    pub fn with_details(mut self) -> Self {
        self.log_arguments = true;
        self
    }
}

impl Default for TracingInterceptor {
    fn default() -> Self {
        Self::new()
    }
}

impl MethodInterceptor for TracingInterceptor {
    fn invoke(&self, invocation: &mut MethodInvocation<'_>) -> DiResult<Value> {
        let class = invocation.this().class_name().to_string();
        let method = invocation.method_name().to_string();
        if self.log_arguments {
            let args: Vec<String> = invocation.arguments().iter().map(Value::describe).collect();
            tracing::debug!(%class, %method, args = ?args, "calling");
        } else {
            tracing::debug!(%class, %method, "calling");
        }

        let start = Instant::now();
        let result = invocation.proceed();
        let elapsed = start.elapsed();
        match &result {
            Ok(value) if self.log_arguments => {
                tracing::debug!(%class, %method, ?elapsed, result = %value.describe(), "returned")
            }
            Ok(_) => tracing::debug!(%class, %method, ?elapsed, "returned"),
            Err(error) => tracing::warn!(%class, %method, ?elapsed, %error, "failed"),
        }
        result
    }

    fn name(&self) -> &str {
        "TracingInterceptor"
    }
}

/// Call statistics of one `Class::method`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PerformanceStats {
    pub call_count: u64,
    pub error_count: u64,
    pub total_time: Duration,
    pub average_time: Duration,
}

#[derive(Debug, Default)]
struct Totals {
    calls: u64,
    errors: u64,
    time: Duration,
}

/// Times intercepted calls, keyed by `Class::method`.
///
/// # Examples
///
/// ```rust
/// use ferrous_weave::PerformanceInterceptor;
///
/// let perf = PerformanceInterceptor::new();
/// assert!(perf.stats().is_empty());
/// ```
#[derive(Debug, Default)]
pub struct PerformanceInterceptor {
    totals: Mutex<HashMap<String, Totals>>,
}

impl PerformanceInterceptor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn stats(&self) -> HashMap<String, PerformanceStats> {
        self.totals
            .lock()
            .iter()
            .map(|(key, t)| {
                let average_time = if t.calls > 0 {
                    t.time / t.calls as u32
                } else {
                    Duration::ZERO
                };
                (
                    key.clone(),
                    PerformanceStats {
                        call_count: t.calls,
                        error_count: t.errors,
                        total_time: t.time,
                        average_time,
                    },
                )
            })
            .collect()
    }

    pub fn reset(&self) {
        self.totals.lock().clear();
    }
}

impl MethodInterceptor for PerformanceInterceptor {
    fn invoke(&self, invocation: &mut MethodInvocation<'_>) -> DiResult<Value> {
        let key = format!("{}::{}", invocation.this().class_name(), invocation.method_name());
        let start = Instant::now();
        let result = invocation.proceed();
        let elapsed = start.elapsed();

        let mut totals = self.totals.lock();
        let entry = totals.entry(key).or_default();
        entry.calls += 1;
        entry.time += elapsed;
        if result.is_err() {
            entry.errors += 1;
        }
        result
    }

    fn name(&self) -> &str {
        "PerformanceInterceptor"
    }
}
