use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};

use bftb_work::{validate_work, Difficulty, WorkGenerator};

fn bench_pow_generation(c: &mut Criterion) {
    let mut group = c.benchmark_group("pow_generation");
    let payload = [0x42u8; 160];

    for bits in [0u32, 8, 12, 16] {
        let difficulty = Difficulty::new(bits).unwrap();
        group.bench_with_input(BenchmarkId::new("generate", bits), &difficulty, |b, &d| {
            b.iter(|| black_box(WorkGenerator.generate(black_box(&payload), d).unwrap()));
        });
    }

    group.finish();
}

fn bench_pow_validation(c: &mut Criterion) {
    let payload = [0x42u8; 160];
    let counter = WorkGenerator.generate(&payload, Difficulty::DEFAULT).unwrap();

    c.bench_function("pow_validate_default", |b| {
        b.iter(|| black_box(validate_work(black_box(&payload), counter, Difficulty::DEFAULT)))
    });
}

criterion_group!(benches, bench_pow_generation, bench_pow_validation);
criterion_main!(benches);
