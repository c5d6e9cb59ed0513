//! Benchmarks for measurement generation and the polling cycle

use criterion::{black_box, criterion_group, criterion_main, Criterion};
use telemsim::engine::{
    Configuration, MeasurementGenerator, MemoryStore, Simulator, SimulatorOptions, SignalState,
};

fn bench_generate(c: &mut Criterion) {
    let config = Configuration::default();
    let mut state = SignalState::new(&config);
    let mut gen = MeasurementGenerator::seeded(Some(1));
    let mut id = 0;

    c.bench_function("generate_measurement", |b| {
        b.iter(|| {
            id += 1;
            black_box(gen.generate(id, &config, &mut state))
        })
    });
}

fn bench_poll_cycle(c: &mut Criterion) {
    let mut sim = Simulator::new(
        Configuration::default(),
        Box::new(MemoryStore::new()),
        SimulatorOptions {
            seed: Some(1),
            readiness_interval: 1,
        },
    )
    .unwrap();

    c.bench_function("poll_cycle_memory_store", |b| {
        b.iter(|| {
            sim.tick();
            sim.maybe_generate_and_store().unwrap();
            black_box(sim.measurements())
        })
    });
}

criterion_group!(benches, bench_generate, bench_poll_cycle);
criterion_main!(benches);
