/// Property-based tests for resolution, module merging and weaving
///
/// These tests check that scope identity, install precedence and compile
/// caching hold for arbitrary graphs and inputs.

use ferrous_weave::{
    Bind, BindingTarget, ClassDescriptor, ClassRegistry, Compiler, Constructor, FnInterceptor, Injector, Method,
    MethodInterceptor, Module, Object, Scope, Value,
};
use proptest::prelude::*;
use std::collections::BTreeSet;
use std::sync::Arc;

#[derive(Default)]
struct Service;

const METHODS: [&str; 5] = ["find", "save", "delete", "count", "flush"];

fn registry() -> Arc<ClassRegistry> {
    let mut service = ClassDescriptor::concrete("Service").constructor(Constructor::default_of::<Service>());
    for method in METHODS {
        service = service.method(Method::shared(method, |_: &Service, _| Ok(Value::null())));
    }
    Arc::new(ClassRegistry::new().with(service))
}

fn scoped(scope: Scope) -> Injector {
    let mut module = Module::new(registry());
    module.bind("Service").in_scope(scope);
    Injector::new(module).unwrap()
}

// Property: a singleton resolves to one instance per injector, however often it is asked for
proptest! {
    #[test]
    fn singleton_identity_holds(resolutions in 1usize..12) {
        let injector = scoped(Scope::Singleton);
        let first = injector.get_instance("Service").unwrap();
        for _ in 0..resolutions {
            prop_assert!(Object::ptr_eq(&first, &injector.get_instance("Service").unwrap()));
        }
        prop_assert_eq!(injector.container().len(), 1);

        let forked = injector.fork();
        prop_assert!(!Object::ptr_eq(&first, &forked.get_instance("Service").unwrap()));
    }
}

// Property: prototypes never share an instance
proptest! {
    #[test]
    fn prototype_instances_are_distinct(resolutions in 2usize..12) {
        let injector = scoped(Scope::Prototype);
        let objects: Vec<Object> = (0..resolutions)
            .map(|_| injector.get_instance("Service").unwrap())
            .collect();
        let identities: BTreeSet<usize> = objects.iter().map(Object::identity).collect();
        prop_assert_eq!(identities.len(), resolutions);
        prop_assert!(injector.container().is_empty());
    }
}

// Property: on install the installing module keeps its targets and only gaps are filled
proptest! {
    #[test]
    fn installer_targets_win(
        ours in prop::collection::btree_set("[A-E]", 0..5),
        theirs in prop::collection::btree_set("[A-E]", 0..5),
    ) {
        let registry = registry();
        let mut outer = Module::named(Arc::clone(&registry), "Outer");
        for name in &ours {
            outer.bind(name).to("Ours");
        }
        let mut inner = Module::named(Arc::clone(&registry), "Inner");
        for name in &theirs {
            inner.bind(name).to("Theirs").in_scope(Scope::Singleton);
        }
        outer.install(inner);

        let bindings = outer.bindings();
        prop_assert_eq!(bindings.len(), ours.union(&theirs).count());
        for name in ours.union(&theirs) {
            let binding = bindings.get(name, "*").unwrap();
            let expected = if ours.contains(name) { "Ours" } else { "Theirs" };
            let target = match &binding.target {
                Some(BindingTarget::Class(class)) => class.as_str(),
                other => return Err(TestCaseError::fail(format!("unexpected target {:?}", other))),
            };
            prop_assert_eq!(target, expected);
            prop_assert_eq!(binding.is_singleton(), theirs.contains(name));
        }
    }
}

fn bind_over(methods: &[usize], interceptor: &str) -> Bind {
    let mut bind = Bind::new();
    for &i in methods {
        let noop: Arc<dyn MethodInterceptor> =
            Arc::new(FnInterceptor::new(interceptor, |invocation| invocation.proceed()));
        bind.bind_interceptors(METHODS[i], vec![noop], None);
    }
    bind
}

// Property: compiling the same class and bind twice yields the cached class
proptest! {
    #[test]
    fn compile_is_idempotent(
        methods in prop::collection::btree_set(0usize..METHODS.len(), 1..METHODS.len()),
        interceptor in "[A-Z][a-z]{1,8}",
        repeats in 1usize..5,
    ) {
        let methods: Vec<usize> = methods.into_iter().collect();
        let registry = registry();
        let class = registry.get("Service").unwrap();
        let compiler = Compiler::new(None);

        let first = compiler.compile(&class, &bind_over(&methods, &interceptor)).unwrap();
        for _ in 0..repeats {
            let again = compiler.compile(&class, &bind_over(&methods, &interceptor)).unwrap();
            prop_assert!(Arc::ptr_eq(&first, &again));
        }
        for &i in &methods {
            prop_assert!(first.intercepts(METHODS[i]));
        }
        let stats = compiler.stats();
        prop_assert_eq!(stats.compiled, 1);
        prop_assert_eq!(stats.cache_hits, repeats as u64);
    }
}

// Property: scalar instances come back unchanged through named lookups
proptest! {
    #[test]
    fn named_scalars_round_trip(
        name in "[a-z][a-z_]{0,12}",
        text in "\\PC{0,40}",
        number in any::<i64>(),
    ) {
        let mut module = Module::new(registry());
        module.bind("").annotated_with(name.clone()).to_instance(text.clone());
        module.bind("int").annotated_with(name.clone()).to_instance(number);
        let injector = Injector::new(module).unwrap();

        let fetched = injector.get_named("", &name).unwrap();
        prop_assert_eq!(fetched.as_str(), Some(text.as_str()));
        prop_assert_eq!(injector.get_named("int", &name).unwrap().as_i64(), Some(number));
    }
}
