//! End-to-end behaviour of a small application graph.

use ferrous_weave::{
    Annotation, Args, ClassDescriptor, ClassRegistry, Constructor, Injector, Method, Module, Object, Scope, Value,
};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

#[derive(Default)]
struct FileLogger;

#[derive(Default)]
struct StubLogger;

fn loggers() -> Arc<ClassRegistry> {
    Arc::new(
        ClassRegistry::new()
            .with(ClassDescriptor::interface("Logger"))
            .with(
                ClassDescriptor::concrete("FileLogger")
                    .implements("Logger")
                    .constructor(Constructor::default_of::<FileLogger>())
                    .method(Method::shared("log", |_: &FileLogger, _| Ok(Value::from("file")))),
            )
            .with(
                ClassDescriptor::concrete("StubLogger")
                    .implements("Logger")
                    .constructor(Constructor::default_of::<StubLogger>())
                    .method(Method::shared("log", |_: &StubLogger, _| Ok(Value::from("stub")))),
            ),
    )
}

#[test]
fn test_annotated_rebinding_leaves_the_default_singleton_alone() {
    let registry = loggers();
    let mut module = Module::new(Arc::clone(&registry));
    module.bind("Logger").to("FileLogger").in_scope(Scope::Singleton);
    let injector = Injector::new(module).unwrap();

    let first = injector.get_instance("Logger").unwrap();
    let second = injector.get_instance("Logger").unwrap();
    assert!(Object::ptr_eq(&first, &second));
    assert_eq!(first.class_name(), "FileLogger");

    let mut module = Module::new(Arc::clone(&registry));
    module.bind("Logger").to("FileLogger").in_scope(Scope::Singleton);
    module
        .bind("Logger")
        .annotated_with("test")
        .to("StubLogger")
        .in_scope(Scope::Prototype);
    let injector = Injector::new(module).unwrap();

    let default = injector.get_instance("Logger").unwrap();
    let stub_a = injector.get_named("Logger", "test").unwrap();
    let stub_b = injector.get_named("Logger", "test").unwrap();
    let stub_a = stub_a.as_object().unwrap();
    let stub_b = stub_b.as_object().unwrap();

    assert!(Object::ptr_eq(&default, &injector.get_instance("Logger").unwrap()));
    assert_eq!(default.invoke("log", ()).unwrap().as_str(), Some("file"));
    assert_eq!(stub_a.class_name(), "StubLogger");
    assert_eq!(stub_a.invoke("log", ()).unwrap().as_str(), Some("stub"));
    assert!(!Object::ptr_eq(stub_a, stub_b));
}

struct Greeter {
    greeting: String,
    cleanups: Arc<AtomicUsize>,
}

fn greeter_registry(inits: &Arc<AtomicUsize>, cleanups: &Arc<AtomicUsize>) -> Arc<ClassRegistry> {
    let inits = Arc::clone(inits);
    let cleanups = Arc::clone(cleanups);
    Arc::new(
        ClassRegistry::new().with(
            ClassDescriptor::concrete("Greeter")
                .annotate(Annotation::scope(Scope::Singleton))
                .constructor(Constructor::new(move |_: &Args| {
                    Ok(Greeter {
                        greeting: String::new(),
                        cleanups: Arc::clone(&cleanups),
                    })
                }))
                .method(
                    Method::mutating("initGreeting", move |g: &mut Greeter, _| {
                        inits.fetch_add(1, Ordering::SeqCst);
                        g.greeting = "hello".to_string();
                        Ok(())
                    })
                    .annotate(Annotation::post_construct()),
                )
                .method(
                    Method::shared("cleanup", |g: &Greeter, _| {
                        g.cleanups.fetch_add(1, Ordering::SeqCst);
                        Ok(Value::null())
                    })
                    .annotate(Annotation::pre_destroy()),
                )
                .method(Method::shared("greet", |g: &Greeter, args: &Args| {
                    Ok(Value::from(format!("{}, {}", g.greeting, args.str(0)?)))
                })),
        ),
    )
}

#[test]
fn test_greeter_lifecycle_runs_each_hook_once() {
    let inits = Arc::new(AtomicUsize::new(0));
    let cleanups = Arc::new(AtomicUsize::new(0));
    let injector = Injector::new(Module::new(greeter_registry(&inits, &cleanups))).unwrap();

    let greeter = injector.get_instance("Greeter").unwrap();
    assert_eq!(inits.load(Ordering::SeqCst), 1);
    assert_eq!(greeter.invoke("greet", vec![Value::from("weave")]).unwrap().as_str(), Some("hello, weave"));

    injector.get_instance("Greeter").unwrap();
    assert_eq!(inits.load(Ordering::SeqCst), 1);
    assert_eq!(cleanups.load(Ordering::SeqCst), 0);

    assert_eq!(injector.shutdown(), 1);
    assert_eq!(injector.shutdown(), 0);
    drop(injector);
    assert_eq!(cleanups.load(Ordering::SeqCst), 1);
}

#[test]
fn test_greeter_cleanup_runs_when_the_last_injector_drops() {
    let inits = Arc::new(AtomicUsize::new(0));
    let cleanups = Arc::new(AtomicUsize::new(0));
    let injector = Injector::new(Module::new(greeter_registry(&inits, &cleanups))).unwrap();
    injector.get_instance("Greeter").unwrap();

    let forked = injector.fork();
    drop(injector);
    assert_eq!(cleanups.load(Ordering::SeqCst), 0);
    drop(forked);
    assert_eq!(cleanups.load(Ordering::SeqCst), 1);
}
