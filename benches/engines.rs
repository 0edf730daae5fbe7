use criterion::{criterion_group, criterion_main, Criterion};
use life_stepper::{CellSet, EngineAdapter, HashLifeEngine, NaiveEngine, Rule};

const SEED: u64 = 42;
const FILL_RATE: f64 = 0.3;

fn bench_naive(c: &mut Criterion) {
    let cells = CellSet::random(256, 256, FILL_RATE, Some(SEED));
    let mut engine = NaiveEngine::new();
    c.bench_function("naive_256_x16", |b| {
        b.iter(|| engine.run(&cells, 16, &Rule::CONWAY).unwrap())
    });
}

// memo tables survive between iterations, so this measures the warm case
fn bench_hashlife(c: &mut Criterion) {
    let cells = CellSet::random(256, 256, FILL_RATE, Some(SEED));
    let mut engine = HashLifeEngine::default();
    c.bench_function("hashlife_256_x16", |b| {
        b.iter(|| engine.run(&cells, 16, &Rule::CONWAY).unwrap())
    });
    c.bench_function("hashlife_256_x1024", |b| {
        b.iter(|| engine.run(&cells, 1024, &Rule::CONWAY).unwrap())
    });
}

fn bench_hashlife_cold(c: &mut Criterion) {
    let cells = CellSet::random(256, 256, FILL_RATE, Some(SEED));
    c.bench_function("hashlife_256_x16_cold", |b| {
        b.iter(|| HashLifeEngine::default().run(&cells, 16, &Rule::CONWAY).unwrap())
    });
}

criterion_group!(benches, bench_naive, bench_hashlife, bench_hashlife_cold);
criterion_main!(benches);
