use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use lumen_tm::{CallOrigin, DispatchConfig, Event, OverrideMap, Table, Value, VM};

fn absence_cache_benchmark(c: &mut Criterion) {
    let mut group = c.benchmark_group("absence_cache");

    for (name, enabled) in [("cached", true), ("uncached", false)] {
        group.bench_with_input(BenchmarkId::new("len_miss", name), &enabled, |b, &enabled| {
            let config = DispatchConfig {
                absence_cache: enabled,
                ..DispatchConfig::default()
            };
            let mut vm = VM::with_config(config);
            let map = OverrideMap::from_entries([("__add", Value::Int(0)), ("__type", Value::from("T"))]);
            let t = Value::table_with(map);
            let dest = vm.push(Value::Nil).unwrap();
            b.iter(|| {
                vm.length(black_box(&t), dest, CallOrigin::Interpreted).unwrap();
            });
        });
    }
    group.finish();
}

fn binary_dispatch_benchmark(c: &mut Criterion) {
    let mut group = c.benchmark_group("binary_dispatch");
    let mut vm = VM::new();
    let dest = vm.push(Value::Nil).unwrap();

    // Built-in fast path
    group.bench_function("int_add", |b| {
        b.iter(|| {
            vm.arith(Event::Add, black_box(&Value::Int(2)), &Value::Int(3), dest, CallOrigin::Interpreted)
                .unwrap();
        });
    });

    // Full handler call
    let add = Value::function("add", |_vm, args| Ok(vec![args[2].clone()]));
    let t = Value::table_with(OverrideMap::from_entries([("__add", add)]));
    group.bench_function("handler_add", |b| {
        b.iter(|| {
            vm.arith(Event::Add, black_box(&t), &Value::Int(3), dest, CallOrigin::Interpreted)
                .unwrap();
        });
    });

    // Index chain through three tables
    let base = Table::new();
    base.raw_set(Value::from("x"), Value::Int(1)).unwrap();
    let mut top = Value::table(base);
    for _ in 0..3 {
        top = Value::table_with(OverrideMap::from_entries([("__index", top)]));
    }
    let key = Value::from("x");
    group.bench_function("index_chain", |b| {
        b.iter(|| {
            vm.index(black_box(&top), &key, dest, CallOrigin::Interpreted).unwrap();
        });
    });
    group.finish();
}

criterion_group!(benches, absence_cache_benchmark, binary_dispatch_benchmark);
criterion_main!(benches);
