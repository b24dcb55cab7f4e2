use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use ferrous_weave::*;
use std::sync::Arc;

#[derive(Default)]
struct Repo;

struct Service {
    _repo: Object,
}

fn registry() -> Arc<ClassRegistry> {
    Arc::new(
        ClassRegistry::new()
            .with(ClassDescriptor::interface("RepoInterface"))
            .with(
                ClassDescriptor::concrete("Repo")
                    .implements("RepoInterface")
                    .constructor(Constructor::default_of::<Repo>())
                    .method(Method::shared("find", |_: &Repo, args: &Args| Ok(Value::from(args.i64(0)?)))),
            )
            .with(
                ClassDescriptor::concrete("Service").constructor(
                    Constructor::new(|args: &Args| Ok(Service { _repo: args.object(0)?.clone() }))
                        .param(Param::of("repo", "RepoInterface"))
                        .annotate(Annotation::inject()),
                ),
            ),
    )
}

// ===== Resolution =====

fn bench_singleton_hit(c: &mut Criterion) {
    let mut module = Module::new(registry());
    module.bind("RepoInterface").to("Repo").in_scope(Scope::Singleton);
    let injector = Injector::new(module).unwrap();

    // Prime the singleton
    let _ = injector.get_instance("RepoInterface").unwrap();

    c.bench_function("singleton_hit", |b| {
        b.iter(|| black_box(injector.get_instance("RepoInterface").unwrap()))
    });
}

fn bench_prototype_graph(c: &mut Criterion) {
    let mut group = c.benchmark_group("prototype");

    for singleton_repo in [false, true] {
        let mut module = Module::new(registry());
        let scope = if singleton_repo { Scope::Singleton } else { Scope::Prototype };
        module.bind("RepoInterface").to("Repo").in_scope(scope);
        let injector = Injector::new(module).unwrap();

        group.bench_with_input(
            BenchmarkId::new("service", if singleton_repo { "singleton_repo" } else { "prototype_repo" }),
            &injector,
            |b, injector| b.iter(|| black_box(injector.get_instance("Service").unwrap())),
        );
    }

    group.finish();
}

// ===== Interception =====

fn bench_woven_invoke(c: &mut Criterion) {
    let mut group = c.benchmark_group("invoke");

    for depth in [0usize, 1, 4] {
        let mut module = Module::new(registry());
        module.bind("RepoInterface").to("Repo").in_scope(Scope::Singleton);
        if depth > 0 {
            let chain: Vec<Arc<dyn MethodInterceptor>> = (0..depth)
                .map(|i| {
                    Arc::new(FnInterceptor::new(format!("Pass{}", i), |inv| inv.proceed()))
                        as Arc<dyn MethodInterceptor>
                })
                .collect();
            module.bind_interceptor(Matcher::any(), Matcher::starts_with("find"), chain);
        }
        let injector = Injector::new(module).unwrap();
        let repo = injector.get_instance("RepoInterface").unwrap();

        group.bench_with_input(BenchmarkId::new("interceptors", depth), &repo, |b, repo| {
            b.iter(|| black_box(repo.invoke("find", [Value::from(7)]).unwrap()))
        });
    }

    group.finish();
}

fn bench_compile(c: &mut Criterion) {
    let registry = registry();
    let class = registry.get("Repo").unwrap();
    let mut bind = Bind::new();
    bind.bind_interceptors(
        "find",
        vec![Arc::new(FnInterceptor::new("Pass", |inv| inv.proceed()))],
        None,
    );

    c.bench_function("compile_cold", |b| {
        b.iter(|| {
            let compiler = Compiler::new(None);
            black_box(compiler.compile(&class, &bind).unwrap())
        })
    });

    let compiler = Compiler::new(None);
    let _ = compiler.compile(&class, &bind).unwrap();
    c.bench_function("compile_cached", |b| {
        b.iter(|| black_box(compiler.compile(&class, &bind).unwrap()))
    });
}

criterion_group!(
    benches,
    bench_singleton_hit,
    bench_prototype_graph,
    bench_woven_invoke,
    bench_compile
);
criterion_main!(benches);
