//! User-defined module configuration.

use super::Module;
use crate::DiResult;

/// A reusable piece of binding configuration.
///
/// Implement this for a type that groups related bindings and pointcuts,
/// then hand it to [`Module::install_with`] or
/// [`InjectorBuilder::install`](crate::InjectorBuilder::install).
///
/// # Examples
///
/// ```rust
/// use std::sync::Arc;
/// use ferrous_weave::{ClassRegistry, Configure, DiResult, Module, Scope};
///
/// struct LoggingModule;
///
/// impl Configure for LoggingModule {
///     fn configure(self, module: &mut Module) -> DiResult<()> {
///         module.bind("Logger").to("FileLogger").in_scope(Scope::Singleton);
///         Ok(())
///     }
/// }
///
/// let mut app = Module::named(Arc::new(ClassRegistry::new()), "AppModule");
/// app.install_with(LoggingModule).unwrap();
///
/// assert!(app.bindings().contains("Logger", "*"));
/// assert_eq!(app.installed_modules(), ["LoggingModule".to_string()]);
/// ```
pub trait Configure {
    /// Declares bindings and pointcuts on `module`.
    fn configure(self, module: &mut Module) -> DiResult<()>;

    /// Name recorded in [`Module::installed_modules`].
    fn name(&self) -> &str {
        let full = std::any::type_name::<Self>();
        full.rsplit("::").next().unwrap_or(full)
    }
}
