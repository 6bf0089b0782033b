//! Criterion benchmarks for the dispatched 8-bit and 16-bit multiplies.

use criterion::{BenchmarkId, Criterion, Throughput, black_box, criterion_group, criterion_main};
use intgemm::{Callback, Int8, Int16, max_absolute};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

const SHAPES: [(usize, usize, usize); 3] = [(8, 256, 256), (64, 512, 512), (256, 1024, 256)];

fn random_matrix(rng: &mut StdRng, len: usize) -> Vec<f32> {
    (0..len).map(|_| rng.gen_range(-1.0f32..1.0)).collect()
}

fn benchmark_multiply8(c: &mut Criterion) {
    let mut rng = StdRng::seed_from_u64(8);
    let mut group = c.benchmark_group("int8_multiply");

    for &(a_rows, width, b_cols) in SHAPES.iter() {
        let a = random_matrix(&mut rng, a_rows * width);
        let b = random_matrix(&mut rng, width * b_cols);
        let a_mult = 127.0 / max_absolute(&a);
        let b_mult = 127.0 / max_absolute(&b);
        let a_q = Int8::prepare_a(&a, a_mult, a_rows, width);
        let b_q = Int8::prepare_b(&b, b_mult, width, b_cols);
        let mut out = vec![0.0f32; a_rows * b_cols];

        group.throughput(Throughput::Elements((2 * a_rows * width * b_cols) as u64));
        group.bench_with_input(
            BenchmarkId::from_parameter(format!("{}x{}x{}", a_rows, width, b_cols)),
            &(a_rows, width, b_cols),
            |bench, &(a_rows, width, b_cols)| {
                bench.iter(|| {
                    Int8::multiply(
                        black_box(&a_q),
                        black_box(&b_q),
                        a_rows,
                        width,
                        b_cols,
                        &mut [Callback::unquantize_and_write(1.0 / (a_mult * b_mult), &mut out)],
                    )
                });
            },
        );
    }

    group.finish();
}

fn benchmark_multiply16(c: &mut Criterion) {
    let mut rng = StdRng::seed_from_u64(16);
    let mut group = c.benchmark_group("int16_multiply");

    for &(a_rows, width, b_cols) in SHAPES.iter() {
        let a = random_matrix(&mut rng, a_rows * width);
        let b = random_matrix(&mut rng, width * b_cols);
        let a_q = Int16::prepare_a(&a, 1024.0, a_rows, width);
        let b_q = Int16::prepare_b(&b, 1024.0, width, b_cols);
        let mut out = vec![0.0f32; a_rows * b_cols];

        group.throughput(Throughput::Elements((2 * a_rows * width * b_cols) as u64));
        group.bench_with_input(
            BenchmarkId::from_parameter(format!("{}x{}x{}", a_rows, width, b_cols)),
            &(a_rows, width, b_cols),
            |bench, &(a_rows, width, b_cols)| {
                bench.iter(|| {
                    Int16::multiply(
                        black_box(&a_q),
                        black_box(&b_q),
                        a_rows,
                        width,
                        b_cols,
                        &mut [Callback::unquantize_and_write(1.0 / (1024.0 * 1024.0), &mut out)],
                    )
                });
            },
        );
    }

    group.finish();
}

fn benchmark_prepare(c: &mut Criterion) {
    let mut rng = StdRng::seed_from_u64(0);
    let b = random_matrix(&mut rng, 1024 * 256);

    c.bench_function("max_absolute_256k", |bench| {
        bench.iter(|| black_box(max_absolute(black_box(&b))))
    });
    c.bench_function("int8_prepare_b_1024x256", |bench| {
        bench.iter(|| black_box(Int8::prepare_b(black_box(&b), 127.0, 1024, 256)))
    });
}

criterion_group!(benches, benchmark_multiply8, benchmark_multiply16, benchmark_prepare);
criterion_main!(benches);
