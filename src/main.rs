//! Benchmark runner for the integer multiply kernels.

use intgemm::kernels::{avx2, avx512, sse};
use intgemm::{AlignedVec, CpuType, Int8, Int16, cpu_type, multiply_reference};
use std::time::Instant;

fn main() {
    println!("=== Integer GEMM Benchmark ===\n");

    let sizes = [256, 512, 1024];
    let iterations = 3;
    let mut all_results = Vec::new();

    let tier = cpu_type();
    println!(
        "CPU Features: SSSE3={}, AVX2={}, AVX-512BW={} (dispatching to {})\n",
        tier >= CpuType::Ssse3,
        tier >= CpuType::Avx2,
        tier >= CpuType::Avx512bw,
        tier
    );
    if tier < CpuType::Ssse3 {
        println!("Need at least SSSE3 to run the 8-bit kernels.");
        return;
    }

    for &size in &sizes {
        println!("Matrix: {}×{}", size, size);
        println!("{}", "-".repeat(50));

        let (a_rows, width, b_cols) = (size, size, size);
        let a: Vec<i8> = (0..a_rows * width).map(|i| (i % 61) as i8 - 30).collect();
        let b: Vec<i8> = (0..width * b_cols).map(|i| (i % 53) as i8 - 26).collect();
        let a16: Vec<i16> = a.iter().map(|&x| x as i16).collect();
        let b16: Vec<i16> = b.iter().map(|&x| x as i16).collect();

        let mut results: Vec<(&str, (f64, f64))> = vec![(
            "Scalar (i-k-j)",
            bench_fn(a_rows, width, b_cols, iterations, |c| {
                let out = multiply_reference(&a, &b, a_rows, width, b_cols);
                for (c, o) in c.iter_mut().zip(out) {
                    *c = o as f32;
                }
            }),
        )];

        let a8 = AlignedVec::from_slice(&a);
        let a16 = AlignedVec::from_slice(&a16);
        let b8_sse = rearranged(&b, width, b_cols, 16);
        let b16_sse = rearranged(&b16, width, b_cols, 8);
        results.push((
            "16-bit SSE2",
            bench_fn(a_rows, width, b_cols, iterations, |c| unsafe {
                sse::multiply16(&a16, &b16_sse, a_rows, width, b_cols, write_tile(c))
            }),
        ));
        results.push((
            "8-bit SSSE3",
            bench_fn(a_rows, width, b_cols, iterations, |c| unsafe {
                sse::multiply8(&a8, &b8_sse, a_rows, width, b_cols, write_tile(c))
            }),
        ));

        if tier >= CpuType::Avx2 {
            let b8 = rearranged(&b, width, b_cols, 32);
            let b16 = rearranged(&b16, width, b_cols, 16);
            results.push((
                "16-bit AVX2",
                bench_fn(a_rows, width, b_cols, iterations, |c| unsafe {
                    avx2::multiply16(&a16, &b16, a_rows, width, b_cols, write_tile(c))
                }),
            ));
            results.push((
                "8-bit AVX2",
                bench_fn(a_rows, width, b_cols, iterations, |c| unsafe {
                    avx2::multiply8(&a8, &b8, a_rows, width, b_cols, write_tile(c))
                }),
            ));
        }

        if tier >= CpuType::Avx512bw {
            let b8 = rearranged(&b, width, b_cols, 64);
            let b16 = rearranged(&b16, width, b_cols, 32);
            results.push((
                "16-bit AVX-512",
                bench_fn(a_rows, width, b_cols, iterations, |c| unsafe {
                    avx512::multiply16(&a16, &b16, a_rows, width, b_cols, write_tile(c))
                }),
            ));
            results.push((
                "8-bit AVX-512",
                bench_fn(a_rows, width, b_cols, iterations, |c| unsafe {
                    avx512::multiply8(&a8, &b8, a_rows, width, b_cols, write_tile(c))
                }),
            ));
        }

        // Through the dispatching front-ends, callbacks included.
        let b16_dispatch = Int16::rearrange_b(&b16, width, b_cols);
        results.push((
            "Int16 dispatch",
            bench_fn(a_rows, width, b_cols, iterations, |c| {
                Int16::multiply(
                    &a16,
                    &b16_dispatch,
                    a_rows,
                    width,
                    b_cols,
                    &mut [intgemm::Callback::write(c)],
                )
            }),
        ));
        let b8_dispatch = Int8::rearrange_b(&b, width, b_cols);
        results.push((
            "Int8 dispatch",
            bench_fn(a_rows, width, b_cols, iterations, |c| {
                Int8::multiply(
                    &a8,
                    &b8_dispatch,
                    a_rows,
                    width,
                    b_cols,
                    &mut [intgemm::Callback::unquantize_and_write(1.0, c)],
                )
            }),
        ));

        // Print results
        let baseline_time = results[0].1.0;
        for (i, (name, (time_ms, gops))) in results.iter().enumerate() {
            let speedup = baseline_time / time_ms;
            println!(
                "{}. {:16} {:8.2} ms  {:6.2} GOPS  ({:.1}×)",
                i + 1,
                name,
                time_ms,
                gops,
                speedup
            );
        }
        println!();

        all_results.push((size, results));
    }

    print_comparison(&all_results, tier);
}

/// Quantized B rearranged for a tier with `lanes` elements per register.
fn rearranged<T: Copy + Default>(b: &[T], rows: usize, cols: usize, lanes: usize) -> AlignedVec<T> {
    let mut out = AlignedVec::new(b.len());
    intgemm::matrix::prepare::rearrange_b(b, &mut out, rows, cols, lanes);
    out
}

/// Epilogue that stores the raw totals, the cheapest useful callback.
fn write_tile(c: &mut [f32]) -> impl FnMut(&[i32; 8], intgemm::Tile) + '_ {
    move |totals: &[i32; 8], tile: intgemm::Tile| {
        let offset = tile.output_offset();
        for (dst, &t) in c[offset..offset + 8].iter_mut().zip(totals) {
            *dst = t as f32;
        }
    }
}

/// Benchmark one multiply, returning (ms per run, GOPS)
fn bench_fn<F>(a_rows: usize, width: usize, b_cols: usize, iterations: usize, mut f: F) -> (f64, f64)
where
    F: FnMut(&mut [f32]),
{
    // Warmup
    let mut c = vec![0.0f32; a_rows * b_cols];
    f(&mut c);

    // Timed runs
    let mut total = 0.0;
    for _ in 0..iterations {
        let mut c = vec![0.0f32; a_rows * b_cols];
        let start = Instant::now();
        f(&mut c);
        total += start.elapsed().as_secs_f64();
    }

    let avg = total / iterations as f64;
    let gops = 2.0 * (a_rows * width * b_cols) as f64 / avg / 1e9;
    (avg * 1000.0, gops)
}

/// (label, 16-bit row, 8-bit row) of each tier, slowest first.
const TIER_ROWS: [(&str, &str, &str); 3] = [
    ("SSE", "16-bit SSE2", "8-bit SSSE3"),
    ("AVX2", "16-bit AVX2", "8-bit AVX2"),
    ("AVX-512", "16-bit AVX-512", "8-bit AVX-512"),
];

fn time_of(results: &[(&str, (f64, f64))], name: &str) -> Option<f64> {
    results.iter().find(|(n, _)| *n == name).map(|(_, (ms, _))| *ms)
}

fn ratio(num: Option<f64>, den: Option<f64>) -> String {
    match (num, den) {
        (Some(n), Some(d)) => format!("{:.2}×", n / d),
        _ => "-".to_string(),
    }
}

/// Speedup of 8-bit over 16-bit per tier, then the cost of going through the
/// front-ends instead of calling the dispatched tier directly.
#[allow(clippy::type_complexity)]
fn print_comparison(all_results: &[(usize, Vec<(&str, (f64, f64))>)], tier: CpuType) {
    println!("{}", "=".repeat(60));
    println!("8-bit vs 16-bit (16-bit time / 8-bit time)");
    println!("{}", "=".repeat(60));
    print!("{:<10}", "Size");
    for (label, _, _) in TIER_ROWS {
        print!(" {:>10}", label);
    }
    println!();
    for (size, results) in all_results {
        print!("{:<10}", size);
        for (_, wide, narrow) in TIER_ROWS {
            print!(" {:>10}", ratio(time_of(results, wide), time_of(results, narrow)));
        }
        println!();
    }

    let (_, direct16, direct8) = match tier {
        CpuType::Avx512bw => TIER_ROWS[2],
        CpuType::Avx2 => TIER_ROWS[1],
        _ => TIER_ROWS[0],
    };
    println!("\n{}", "=".repeat(60));
    println!("Dispatch overhead on {} (front-end time / direct time)", tier);
    println!("{}", "=".repeat(60));
    println!("{:<10} {:>10} {:>10}", "Size", "Int16", "Int8");
    for (size, results) in all_results {
        println!(
            "{:<10} {:>10} {:>10}",
            size,
            ratio(time_of(results, "Int16 dispatch"), time_of(results, direct16)),
            ratio(time_of(results, "Int8 dispatch"), time_of(results, direct8))
        );
    }
    println!("\nFront-end rows include callbacks; Int8 also unquantizes.\n");
}
