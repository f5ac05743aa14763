use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use parity_engine::classfile::{access, ClassBuilder};
use parity_engine::{Auditor, EngineConfig, MapClassSource, Patcher};

/// A reference type with `methods` static helpers, each touching fields and
/// calling the next, plus a verify method
fn reference_class(methods: usize) -> ClassBuilder {
    let tags = EngineConfig::default().tags;
    let mut class = ClassBuilder::new("bench/Ref");
    class
        .field(access::PUBLIC, "value", "I")
        .field(access::PUBLIC, "next", "Lbench/Ref;")
        .field(access::PUBLIC, "items", "[Lbench/Ref;");
    for i in 0..methods {
        let name = format!("step{}", i);
        let mut code = class.method(access::PUBLIC | access::STATIC, &name, "(Lbench/Ref;)I");
        code.tag(&tags.generator)
            .load(0)
            .get_field("bench/Ref", "value", "I")
            .load(0)
            .check_cast("bench/Ref")
            .invoke_virtual("bench/Ref", "weight", "()I")
            .iadd();
        if i + 1 < methods {
            code.load(0)
                .invoke_static("bench/Ref", &format!("step{}", i + 1), "(Lbench/Ref;)I")
                .iadd();
        }
        code.ret().finish();
    }
    class
        .method(access::PUBLIC, "weight", "()I")
        .const_i32(1)
        .ret()
        .finish();
    class
        .method(access::PUBLIC | access::STATIC, "check", "(Lbench/Ref;)I")
        .tag(&tags.verify)
        .load(0)
        .invoke_static("bench/Ref", "step0", "(Lbench/Ref;)I")
        .ret()
        .finish();
    class
}

fn source_with(methods: usize) -> MapClassSource {
    let source = MapClassSource::new();
    source.insert_class(&reference_class(methods).build()).unwrap();
    source
}

fn bench_mirror(c: &mut Criterion) {
    let config = EngineConfig::default();
    let mut group = c.benchmark_group("mirror");

    for methods in [4usize, 32, 128] {
        let source = source_with(methods);
        group.throughput(Throughput::Elements(methods as u64));
        group.bench_with_input(BenchmarkId::new("methods", methods), &source, |b, source| {
            let patcher = Patcher::new(source, &config);
            b.iter(|| {
                patcher
                    .mirror_named(black_box("bench/Ref"), "bench/Impl", "mirror/bench")
                    .unwrap()
            });
        });
    }

    group.finish();
}

fn bench_audit(c: &mut Criterion) {
    let config = EngineConfig::default();
    let mut group = c.benchmark_group("audit");

    for methods in [4usize, 32, 128] {
        let source = source_with(methods);
        group.bench_with_input(BenchmarkId::new("methods", methods), &source, |b, source| {
            let auditor = Auditor::new(source, &config);
            b.iter(|| auditor.audit(black_box("bench/Ref")).unwrap());
        });
    }

    group.finish();
}

criterion_group!(benches, bench_mirror, bench_audit);
criterion_main!(benches);
