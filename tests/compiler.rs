use ferrous_weave::{
    Annotation, Bind, ClassDescriptor, ClassRegistry, Compiler, Constructor, FnInterceptor, Injector, InjectorOptions,
    Matcher, Method, MethodInterceptor, Module, Object, Value, WovenManifest,
};
use std::fs;
use std::sync::Arc;
use tempfile::TempDir;

#[derive(Default)]
struct Mailer;

fn mailer() -> ClassDescriptor {
    ClassDescriptor::concrete("App\\Mailer")
        .constructor(Constructor::default_of::<Mailer>())
        .method(Method::shared("send", |_: &Mailer, _| Ok(Value::from("sent"))))
        .method(Method::shared("queue", |_: &Mailer, _| Ok(Value::from("queued"))))
}

fn noop(name: &str) -> Arc<dyn MethodInterceptor> {
    Arc::new(FnInterceptor::new(name, |invocation| invocation.proceed()))
}

fn bind_for(methods: &[&str], interceptor: &str) -> Bind {
    let mut bind = Bind::new();
    for method in methods {
        bind.bind_interceptors(method, vec![noop(interceptor)], None);
    }
    bind
}

#[test]
fn test_compile_is_idempotent_in_memory() {
    let compiler = Compiler::new(None);
    let class = mailer();
    let bind = bind_for(&["send"], "Audit");

    let first = compiler.compile(&class, &bind).unwrap();
    let second = compiler.compile(&class, &bind_for(&["send"], "Audit")).unwrap();

    assert!(Arc::ptr_eq(&first, &second));
    assert_eq!(first.name(), Compiler::identity("App\\Mailer", &bind));
    assert_eq!(first.parent(), "App\\Mailer");
    assert!(first.path().is_none());
    let stats = compiler.stats();
    assert_eq!((stats.compiled, stats.emitted, stats.cache_hits), (1, 0, 1));
}

#[test]
fn test_different_binds_compile_separately() {
    let compiler = Compiler::new(None);
    let class = mailer();

    let send = compiler.compile(&class, &bind_for(&["send"], "Audit")).unwrap();
    let both = compiler.compile(&class, &bind_for(&["send", "queue"], "Audit")).unwrap();
    let renamed = compiler.compile(&class, &bind_for(&["send"], "Retry")).unwrap();

    assert_ne!(send.name(), both.name());
    assert_ne!(send.name(), renamed.name());
    assert_eq!(compiler.woven_names().len(), 3);
}

#[test]
fn test_triggering_annotation_is_part_of_identity() {
    let dir = TempDir::new().unwrap();
    let class = mailer();
    let mut transactional = Bind::new();
    transactional.bind_interceptors("send", vec![noop("Audit")], Some(Annotation::new("Transactional")));
    let mut cacheable = Bind::new();
    cacheable.bind_interceptors("send", vec![noop("Audit")], Some(Annotation::new("Cacheable")));

    let compiler = Compiler::new(Some(dir.path().to_path_buf()));
    let a = compiler.compile(&class, &transactional).unwrap();
    let b = compiler.compile(&class, &cacheable).unwrap();

    assert_ne!(a.name(), b.name());
    assert_eq!(a.manifest().annotations["send"], "@Transactional");
    assert_eq!(b.manifest().annotations["send"], "@Cacheable");
    assert_eq!(compiler.stats().emitted, 2);

    let restarted = Compiler::new(Some(dir.path().to_path_buf()));
    restarted.compile(&class, &transactional).unwrap();
    restarted.compile(&class, &cacheable).unwrap();
    assert_eq!(restarted.stats().loaded, 2);
    assert_eq!(restarted.stats().emitted, 0);
}

#[test]
fn test_manifest_is_written_once_and_reused() {
    let dir = TempDir::new().unwrap();
    let class = mailer();
    let bind = bind_for(&["queue", "send"], "Audit");

    let compiler = Compiler::new(Some(dir.path().to_path_buf()));
    let woven = compiler.compile(&class, &bind).unwrap();
    let path = woven.path().expect("manifest path").to_path_buf();
    assert!(path.exists());
    assert_eq!(compiler.stats().emitted, 1);

    let manifest: WovenManifest = serde_json::from_slice(&fs::read(&path).unwrap()).unwrap();
    assert_eq!(&manifest, woven.manifest());
    assert_eq!(manifest.class, "App\\Mailer");
    assert_eq!(manifest.methods["send"], vec!["Audit".to_string()]);

    let restarted = Compiler::new(Some(dir.path().to_path_buf()));
    let again = restarted.compile(&class, &bind).unwrap();
    assert_eq!(again.name(), woven.name());
    assert_eq!(restarted.stats().loaded, 1);
    assert_eq!(restarted.stats().emitted, 0);
}

#[test]
fn test_stale_manifest_is_rewritten() {
    let dir = TempDir::new().unwrap();
    let class = mailer();
    let bind = bind_for(&["send"], "Audit");
    let identity = Compiler::identity(class.name(), &bind);
    fs::write(dir.path().join(format!("{}.json", identity)), b"not json").unwrap();

    let compiler = Compiler::new(Some(dir.path().to_path_buf()));
    compiler.compile(&class, &bind).unwrap();
    assert_eq!(compiler.stats().emitted, 1);
    assert_eq!(compiler.stats().loaded, 0);
}

#[test]
fn test_injector_uses_configured_class_dir() {
    let dir = TempDir::new().unwrap();
    let registry = Arc::new(ClassRegistry::new().with(mailer()));
    let mut module = Module::new(Arc::clone(&registry));
    module.bind_interceptor(Matcher::any(), Matcher::starts_with("send"), vec![noop("Audit")]);

    let injector = Injector::builder(registry)
        .module(module)
        .options(InjectorOptions::default().with_class_dir(dir.path()))
        .build()
        .unwrap();

    let a = injector.get_instance("App\\Mailer").unwrap();
    let b = injector.get_instance("App\\Mailer").unwrap();
    assert!(!Object::ptr_eq(&a, &b));
    assert_eq!(a.woven_class().map(|w| w.name()), b.woven_class().map(|w| w.name()));
    assert_eq!(injector.compiler().stats().compiled, 1);
    assert_eq!(injector.compiler().stats().cache_hits, 1);
    assert_eq!(fs::read_dir(dir.path()).unwrap().count(), 1);
    assert_eq!(a.invoke("send", ()).unwrap().as_str(), Some("sent"));
}
