//! Method interception: interceptors, pointcuts, per-class binds and the
//! compiler producing woven classes.
//!
//! A [`Pointcut`] pairs a class matcher and a method matcher with an ordered
//! interceptor list. For each class the injector builds, [`Bind`] collects
//! the interceptors of every matching pointcut per method; when the bind is
//! non-empty the [`Compiler`] weaves the class and the built object routes
//! calls through a [`MethodInvocation`] chain.

pub mod bind;
pub mod compiler;
pub mod interceptors;
mod invocation;

use std::fmt;
use std::sync::Arc;

pub use bind::Bind;
pub use compiler::{Compiler, CompilerStats, WovenClass, WovenManifest};
pub use interceptors::{FnInterceptor, PerformanceInterceptor, PerformanceStats, TracingInterceptor};
pub use invocation::MethodInvocation;

use crate::{DiResult, Matcher, Value};

/// Behavior run around a matched method call.
///
/// An interceptor may inspect or rewrite the arguments, call
/// [`MethodInvocation::proceed`] to continue with the next link (the last
/// link calls the original method), or return without proceeding to
/// short-circuit the call.
///
/// # Examples
///
/// ```rust
/// use ferrous_weave::{DiResult, MethodInterceptor, MethodInvocation, Value};
///
/// struct Uppercase;
///
/// impl MethodInterceptor for Uppercase {
///     fn invoke(&self, invocation: &mut MethodInvocation<'_>) -> DiResult<Value> {
///         let result = invocation.proceed()?;
///         Ok(result.as_str().map(|s| Value::from(s.to_uppercase())).unwrap_or(result))
///     }
/// }
///
/// assert_eq!(Uppercase.name(), "Uppercase");
/// ```
pub trait MethodInterceptor: Send + Sync {
    fn invoke(&self, invocation: &mut MethodInvocation<'_>) -> DiResult<Value>;

    /// Name used in bind renderings and woven class identities.
    fn name(&self) -> &str {
        let full = std::any::type_name::<Self>();
        full.rsplit("::").next().unwrap_or(full)
    }
}

/// Where interceptors apply: a class matcher, a method matcher and the
/// interceptors, in order.
#[derive(Clone)]
pub struct Pointcut {
    class_matcher: Matcher,
    method_matcher: Matcher,
    interceptors: Vec<Arc<dyn MethodInterceptor>>,
}

impl Pointcut {
    pub fn new(
        class_matcher: Matcher,
        method_matcher: Matcher,
        interceptors: Vec<Arc<dyn MethodInterceptor>>,
    ) -> Self {
        Self {
            class_matcher,
            method_matcher,
            interceptors,
        }
    }

    pub fn class_matcher(&self) -> &Matcher {
        &self.class_matcher
    }

    pub fn method_matcher(&self) -> &Matcher {
        &self.method_matcher
    }

    pub fn interceptors(&self) -> &[Arc<dyn MethodInterceptor>] {
        &self.interceptors
    }

    pub(crate) fn interceptor_names(&self) -> Vec<String> {
        self.interceptors.iter().map(|i| i.name().to_string()).collect()
    }
}

impl fmt::Display for Pointcut {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} {} => {}",
            self.class_matcher,
            self.method_matcher,
            self.interceptor_names().join(",")
        )
    }
}

impl fmt::Debug for Pointcut {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Pointcut")
            .field("class_matcher", &self.class_matcher)
            .field("method_matcher", &self.method_matcher)
            .field("interceptors", &self.interceptor_names())
            .finish()
    }
}
