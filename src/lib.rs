//! # ferrous-weave
//!
//! Annotation-driven dependency injection with method interception for Rust.
//!
//! ## Features
//!
//! - **Modules and bindings**: bind types, optionally qualified by a name, to
//!   classes, instances, providers, factories or constructor arguments
//! - **Scopes**: singleton or prototype, from bindings or class annotations
//! - **Injection points**: `@Inject` constructors and setters, `@Named`
//!   qualifiers, optional injection, just-in-time defaults
//! - **Lifecycle**: post-construct and pre-destroy hooks
//! - **Interception**: matcher-selected pointcuts woven into classes at build
//!   time, with a persistent class directory for woven manifests
//! - **Diagnostics**: typed errors carrying the resolution chain, `tracing`
//!   spans and events, pluggable resolution observers
//!
//! ## Quick Start
//!
//! ```rust
//! use std::sync::Arc;
//! use ferrous_weave::{
//!     Annotation, Args, ClassDescriptor, ClassRegistry, Constructor, Injector, Method, Module, Param, Scope, Value,
//! };
//!
//! struct Database { dsn: String }
//! struct UserService { db: Arc<Database> }
//!
//! // Describe the classes once
//! let registry = Arc::new(
//!     ClassRegistry::new()
//!         .with(ClassDescriptor::concrete("Database").constructor(
//!             Constructor::new(|args: &Args| Ok(Database { dsn: args.str(0)?.to_string() }))
//!                 .annotate(Annotation::inject())
//!                 .annotate(Annotation::named("dsn=db_dsn"))
//!                 .param(Param::new("dsn")),
//!         ))
//!         .with(
//!             ClassDescriptor::concrete("UserService")
//!                 .constructor(
//!                     Constructor::new(|args: &Args| Ok(UserService { db: args.downcast::<Database>(0)? }))
//!                         .param(Param::of("db", "Database")),
//!                 )
//!                 .method(Method::shared("dsn", |s: &UserService, _| Ok(Value::from(s.db.dsn.clone())))),
//!         ),
//! );
//!
//! // Bind
//! let mut module = Module::new(Arc::clone(&registry));
//! module.bind("").annotated_with("db_dsn").to_instance("postgres://localhost");
//! module.bind("Database").in_scope(Scope::Singleton);
//!
//! // Resolve
//! let injector = Injector::new(module).unwrap();
//! let service = injector.get_instance("UserService").unwrap();
//! assert_eq!(service.invoke("dsn", ()).unwrap().as_str(), Some("postgres://localhost"));
//! ```
//!
//! ## Interception
//!
//! ```rust
//! use std::sync::Arc;
//! use ferrous_weave::{
//!     Annotation, ClassDescriptor, ClassRegistry, Constructor, FnInterceptor, Injector, Matcher, Method, Module, Value,
//! };
//!
//! #[derive(Default)]
//! struct Orders;
//!
//! let registry = Arc::new(ClassRegistry::new().with(
//!     ClassDescriptor::concrete("Orders")
//!         .constructor(Constructor::default_of::<Orders>())
//!         .method(Method::shared("place", |_: &Orders, _| Ok(Value::from("placed"))).annotate(Annotation::new("Audited"))),
//! ));
//!
//! let mut module = Module::new(Arc::clone(&registry));
//! module.bind_interceptor(
//!     Matcher::any(),
//!     Matcher::annotated_with("Audited"),
//!     vec![Arc::new(FnInterceptor::new("Audit", |invocation| {
//!         let result = invocation.proceed()?;
//!         Ok(Value::from(format!("{} (audited)", result.as_str().unwrap_or_default())))
//!     }))],
//! );
//!
//! let injector = Injector::new(module).unwrap();
//! let orders = injector.get_instance("Orders").unwrap();
//! assert!(orders.is_woven());
//! assert_eq!(orders.invoke("place", ()).unwrap().as_str(), Some("placed (audited)"));
//! ```
//!
//! ## Scopes
//!
//! - **Singleton**: built once per injector and retained under the requested type
//! - **Prototype**: built on every resolution (the default)

pub mod aop;
mod binding;
mod config;
mod container;
mod definition;
mod error;
mod injector;
pub mod key;
mod matcher;
mod module;
mod observer;
mod options;
pub mod reflect;
mod scope;
mod value;

pub use aop::{
    Bind, Compiler, CompilerStats, FnInterceptor, MethodInterceptor, MethodInvocation, PerformanceInterceptor,
    PerformanceStats, Pointcut, TracingInterceptor, WovenClass, WovenManifest,
};
pub use binding::{Binding, BindingTarget, Bindings, BindingsView, Callable};
pub use config::{Config, Unified, UnifiedParam};
pub use container::Container;
pub use definition::{
    Definition, DefinitionScanner, InjectionDescriptor, InjectionPoint, JitHint, ParamDescriptor,
};
pub use error::{DiError, DiResult, NotBoundError};
pub use injector::{BindingRecord, Injector, InjectorBuilder, InjectorSnapshot, TargetRecord};
pub use key::BindingKey;
pub use matcher::{MatchContext, MatchedMethod, Matcher};
pub use module::{BindingBuilder, Configure, Module};
pub use observer::{DiObserver, InjectionLog, InjectionRecord, LoggedInjection, TracingObserver};
pub use options::{InjectorOptions, ENV_PREFIX};
pub use reflect::annotation::{Annotation, AnnotationReader, CachedReader, DeclaredReader};
pub use reflect::{ClassDescriptor, ClassKind, ClassRegistry, Constructor, Method, Param, Provider};
pub use scope::Scope;
pub use value::{Args, Building, Lazy, Object, Value};
