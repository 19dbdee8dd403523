//! Benchmark: track/trigger throughput.
//!
//! Compares:
//! - Write to a record slot read by N effects
//! - Cached vs. invalidated computed reads
//! - Nested effect runs below and above the marker-bit depth

use std::hint::black_box;

use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion};
use ripple_core::{
    computed, effect, reactive, EffectOptions, EffectRunner, Observed, Ref, Runtime,
    RuntimeConfig, Target,
};

fn record(keys: usize) -> Observed {
    reactive(Target::record((0..keys).map(|i| (format!("k{i}"), 0))))
        .into_observed()
        .expect("observed record")
}

fn benchmark_trigger_fan_out(c: &mut Criterion) {
    let mut group = c.benchmark_group("trigger_fan_out");

    for subscribers in [1, 8, 64] {
        let state = record(1);
        let runners: Vec<EffectRunner<()>> = (0..subscribers)
            .map(|_| {
                let s = state.clone();
                effect(
                    move || {
                        black_box(s.get("k0"));
                    },
                    EffectOptions::default(),
                )
            })
            .collect();

        group.bench_with_input(
            BenchmarkId::new("set", subscribers),
            &subscribers,
            |b, _| {
                let mut n = 0;
                b.iter(|| {
                    n += 1;
                    state.set("k0", black_box(n));
                });
            },
        );

        for runner in &runners {
            runner.stop();
        }
    }

    group.finish();
}

fn benchmark_computed(c: &mut Criterion) {
    let mut group = c.benchmark_group("computed");
    let source = Ref::new(1);
    let s = source.clone();
    let doubled = computed(move || s.get() * 2);

    group.bench_function("cached_read", |b| {
        b.iter(|| black_box(doubled.get()));
    });

    group.bench_function("invalidated_read", |b| {
        let mut n = 0;
        b.iter(|| {
            n += 1;
            source.set(n);
            black_box(doubled.get())
        });
    });

    group.finish();
}

/// An effect nested `depth` levels deep reading `width` slots.
fn nested(state: &Observed, depth: usize, width: usize) {
    if depth == 0 {
        for i in 0..width {
            black_box(state.get(format!("k{i}")));
        }
        return;
    }
    let s = state.clone();
    let runner = effect(move || nested(&s, depth - 1, width), EffectOptions::default());
    runner.stop();
}

fn benchmark_marker_bits(c: &mut Criterion) {
    let mut group = c.benchmark_group("nested_rerun");
    let width = 16;

    for bits in [0u32, 30] {
        let previous = Runtime::configure(RuntimeConfig::new().with_max_marker_bits(bits));
        let state = record(width);
        let s = state.clone();
        let runner = effect(
            move || {
                for i in 0..width {
                    black_box(s.get(format!("k{i}")));
                }
                nested(&s, 2, width);
            },
            EffectOptions::default(),
        );

        group.bench_with_input(BenchmarkId::new("max_marker_bits", bits), &bits, |b, _| {
            b.iter(|| runner.run());
        });

        runner.stop();
        Runtime::configure(previous);
    }

    group.finish();
}

criterion_group!(
    benches,
    benchmark_trigger_fan_out,
    benchmark_computed,
    benchmark_marker_bits
);
criterion_main!(benches);
