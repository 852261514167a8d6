//! Benchmarks for the service registry

use criterion::{Criterion, Throughput, criterion_group, criterion_main};
use service_registry::{FactoryDescriptor, InstanceDescriptor, Scope};
use std::hint::black_box;
use std::sync::Arc;

#[allow(dead_code)]
struct SmallService {
    value: i32,
}

#[allow(dead_code)]
struct MediumService {
    name: String,
    values: Vec<i32>,
}

#[allow(dead_code)]
struct Composite {
    small: Arc<SmallService>,
    medium: Arc<MediumService>,
}

#[allow(dead_code)]
trait Listener: Send + Sync {
    fn id(&self) -> usize;
}

struct Numbered(usize);

impl Listener for Numbered {
    fn id(&self) -> usize {
        self.0
    }
}

fn populated() -> Scope {
    Scope::builder()
        .instance(SmallService { value: 42 })
        .factory(FactoryDescriptor::new("create_medium_service", |(): ()| {
            Ok(MediumService {
                name: "medium".to_string(),
                values: vec![1, 2, 3, 4, 5],
            })
        }))
        .factory(FactoryDescriptor::new(
            "create_composite",
            |(small, medium): (Arc<SmallService>, Arc<MediumService>)| {
                Ok(Composite { small, medium })
            },
        ))
        .build()
        .unwrap()
}

fn bench_registration(c: &mut Criterion) {
    let mut group = c.benchmark_group("registration");

    group.bench_function("instance", |b| {
        b.iter(|| {
            let scope = Scope::new();
            scope.register(SmallService { value: 42 }).unwrap();
            black_box(scope)
        })
    });

    group.bench_function("factory", |b| {
        b.iter(|| {
            let scope = Scope::new();
            scope
                .register_factory_of(|| SmallService { value: 42 })
                .unwrap();
            black_box(scope)
        })
    });

    group.bench_function("builder_3_bindings", |b| b.iter(|| black_box(populated())));

    group.finish();
}

fn bench_resolution(c: &mut Criterion) {
    let mut group = c.benchmark_group("resolution");
    group.throughput(Throughput::Elements(1));

    let scope = populated();
    scope.get::<Composite>().unwrap();

    group.bench_function("get_instance", |b| {
        b.iter(|| black_box(scope.get::<SmallService>().unwrap()))
    });

    group.bench_function("get_constructed", |b| {
        b.iter(|| black_box(scope.get::<Composite>().unwrap()))
    });

    group.bench_function("contains_check", |b| {
        b.iter(|| black_box(scope.contains::<MediumService>()))
    });

    group.bench_function("try_get_not_found", |b| {
        b.iter(|| black_box(scope.try_get::<Numbered>().unwrap()))
    });

    group.bench_function("first_construction", |b| {
        b.iter(|| {
            let scope = populated();
            black_box(scope.get::<Composite>().unwrap())
        })
    });

    group.finish();
}

fn bench_hierarchy(c: &mut Criterion) {
    let mut group = c.benchmark_group("hierarchy");

    let root = populated();
    let mut leaf = root.clone();
    for _ in 0..8 {
        leaf = leaf.child();
    }

    group.bench_function("create_child", |b| b.iter(|| black_box(root.child())));

    group.bench_function("resolve_through_8_ancestors", |b| {
        b.iter(|| black_box(leaf.get::<SmallService>().unwrap()))
    });

    group.bench_function("resolve_shadowed", |b| {
        let child = root
            .child_builder()
            .instance(SmallService { value: 7 })
            .build()
            .unwrap();
        b.iter(|| black_box(child.get::<SmallService>().unwrap()))
    });

    group.finish();
}

fn bench_get_all(c: &mut Criterion) {
    let mut group = c.benchmark_group("get_all");

    // One listener per scope, 16 scopes deep
    let mut child = Scope::new();
    for id in 0..16 {
        child = child
            .child_builder()
            .instance_descriptor(
                InstanceDescriptor::new(Numbered(id)).exposed_as::<dyn Listener, _>(|l| l),
            )
            .build()
            .unwrap();
    }

    group.throughput(Throughput::Elements(16));
    group.bench_function("16_listeners", |b| {
        b.iter(|| black_box(child.get_all::<dyn Listener>().unwrap()))
    });

    group.finish();
}

fn bench_concurrent(c: &mut Criterion) {
    use std::thread;

    let mut group = c.benchmark_group("concurrent");

    group.bench_function("concurrent_reads_4", |b| {
        let scope = populated();
        scope.get::<Composite>().unwrap();

        b.iter(|| {
            let handles: Vec<_> = (0..4)
                .map(|_| {
                    let scope = scope.clone();
                    thread::spawn(move || {
                        for _ in 0..100 {
                            let _ = scope.get::<Composite>().unwrap();
                        }
                    })
                })
                .collect();

            for h in handles {
                h.join().unwrap();
            }
        })
    });

    group.finish();
}

criterion_group!(
    benches,
    bench_registration,
    bench_resolution,
    bench_hierarchy,
    bench_get_all,
    bench_concurrent,
);

criterion_main!(benches);
