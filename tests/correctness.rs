#![cfg(target_arch = "x86_64")]

use intgemm::kernels::{avx2, avx512, sse};
use intgemm::matrix::prepare::rearrange_b;
use intgemm::{AlignedVec, Callback, CpuType, Int8, Int16, Tile, cpu_type, max_absolute, multiply_reference};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

fn has_avx512bw() -> bool {
    is_x86_feature_detected!("avx512f") && is_x86_feature_detected!("avx512bw")
}

fn random_ints<T>(rng: &mut StdRng, len: usize, bound: i32) -> Vec<T>
where
    T: TryFrom<i32>,
    T::Error: std::fmt::Debug,
{
    (0..len)
        .map(|_| T::try_from(rng.gen_range(-bound..=bound)).unwrap())
        .collect()
}

fn rearranged<T: Copy + Default>(b: &[T], width: usize, b_cols: usize, lanes: usize) -> AlignedVec<T> {
    let mut out = AlignedVec::new(b.len());
    rearrange_b(b, &mut out, width, b_cols, lanes);
    out
}

/// Run a tier kernel with an epilogue that stores raw totals, checking that
/// every tile is visited exactly once.
fn collect_totals(
    a_rows: usize,
    b_cols: usize,
    run: impl FnOnce(&mut dyn FnMut(&[i32; 8], Tile)),
) -> Vec<i32> {
    let mut c = vec![0i32; a_rows * b_cols];
    let mut visited = vec![0usize; a_rows * b_cols / 8];
    run(&mut |totals: &[i32; 8], tile: Tile| {
        assert_eq!(tile.col % 8, 0);
        assert_eq!((tile.a_rows, tile.b_cols), (a_rows, b_cols));
        let offset = tile.output_offset();
        c[offset..offset + 8].copy_from_slice(totals);
        visited[offset / 8] += 1;
    });
    assert!(visited.iter().all(|&n| n == 1), "tiles visited {:?}", visited);
    c
}

const SHAPES: [(usize, usize); 4] = [(1, 8), (3, 16), (8, 40), (5, 64)];

/// (i16 lanes, i8 lanes) of each tier.
const SSE_LANES: (usize, usize) = (8, 16);
const AVX2_LANES: (usize, usize) = (16, 32);
const AVX512_LANES: (usize, usize) = (32, 64);

fn check_multiply16(name: &str, lanes: usize, kernel: impl Fn(&[i16], &[i16], usize, usize, usize) -> Vec<i32>) {
    let mut rng = StdRng::seed_from_u64(16);
    for &(a_rows, b_cols) in &SHAPES {
        for width in [lanes, 2 * lanes, 512] {
            let a: Vec<i16> = random_ints(&mut rng, a_rows * width, 1000);
            let b: Vec<i16> = random_ints(&mut rng, width * b_cols, 1000);
            let expected = multiply_reference(&a, &b, a_rows, width, b_cols);

            let a_aligned = AlignedVec::from_slice(&a);
            let b_prepared = rearranged(&b, width, b_cols, lanes);
            let actual = kernel(&a_aligned[..], &b_prepared[..], a_rows, width, b_cols);
            assert_eq!(expected, actual, "{}: {}x{}x{}", name, a_rows, width, b_cols);
        }
    }
}

fn check_multiply8(name: &str, lanes: usize, kernel: impl Fn(&[i8], &[i8], usize, usize, usize) -> Vec<i32>) {
    let mut rng = StdRng::seed_from_u64(8);
    for &(a_rows, b_cols) in &SHAPES {
        // |a|,|b| <= 30 and at most 32 products per 16-bit lane: no saturation.
        for width in [lanes, 2 * lanes, 256] {
            let a: Vec<i8> = random_ints(&mut rng, a_rows * width, 30);
            let b: Vec<i8> = random_ints(&mut rng, width * b_cols, 30);
            let expected = multiply_reference(&a, &b, a_rows, width, b_cols);

            let a_aligned = AlignedVec::from_slice(&a);
            let b_prepared = rearranged(&b, width, b_cols, lanes);
            let actual = kernel(&a_aligned[..], &b_prepared[..], a_rows, width, b_cols);
            assert_eq!(expected, actual, "{}: {}x{}x{}", name, a_rows, width, b_cols);
        }
    }
}

// ============================================================
// Per-tier kernels against the scalar reference
// ============================================================

#[test]
fn test_multiply16_sse2() {
    check_multiply16("SSE2", SSE_LANES.0, |a, b, a_rows, width, b_cols| {
        collect_totals(a_rows, b_cols, |epilogue| unsafe {
            sse::multiply16(a, b, a_rows, width, b_cols, epilogue)
        })
    });
}

#[test]
fn test_multiply8_ssse3() {
    if !is_x86_feature_detected!("ssse3") {
        println!("Skipping - SSSE3 not available");
        return;
    }
    check_multiply8("SSSE3", SSE_LANES.1, |a, b, a_rows, width, b_cols| {
        collect_totals(a_rows, b_cols, |epilogue| unsafe {
            sse::multiply8(a, b, a_rows, width, b_cols, epilogue)
        })
    });
}

#[test]
fn test_multiply16_avx2() {
    if !is_x86_feature_detected!("avx2") {
        println!("Skipping - AVX2 not available");
        return;
    }
    check_multiply16("AVX2", AVX2_LANES.0, |a, b, a_rows, width, b_cols| {
        collect_totals(a_rows, b_cols, |epilogue| unsafe {
            avx2::multiply16(a, b, a_rows, width, b_cols, epilogue)
        })
    });
}

#[test]
fn test_multiply8_avx2() {
    if !is_x86_feature_detected!("avx2") {
        println!("Skipping - AVX2 not available");
        return;
    }
    check_multiply8("AVX2", AVX2_LANES.1, |a, b, a_rows, width, b_cols| {
        collect_totals(a_rows, b_cols, |epilogue| unsafe {
            avx2::multiply8(a, b, a_rows, width, b_cols, epilogue)
        })
    });
}

#[test]
fn test_multiply16_avx512() {
    if !has_avx512bw() {
        println!("Skipping - AVX-512BW not available");
        return;
    }
    check_multiply16("AVX-512", AVX512_LANES.0, |a, b, a_rows, width, b_cols| {
        collect_totals(a_rows, b_cols, |epilogue| unsafe {
            avx512::multiply16(a, b, a_rows, width, b_cols, epilogue)
        })
    });
}

#[test]
fn test_multiply8_avx512() {
    if !has_avx512bw() {
        println!("Skipping - AVX-512BW not available");
        return;
    }
    check_multiply8("AVX-512", AVX512_LANES.1, |a, b, a_rows, width, b_cols| {
        collect_totals(a_rows, b_cols, |epilogue| unsafe {
            avx512::multiply8(a, b, a_rows, width, b_cols, epilogue)
        })
    });
}

// ============================================================
// Edge cases
// ============================================================

#[test]
fn test_all_ones_total_is_width() {
    let (a_rows, b_cols) = (2, 16);
    for width in [64, 128] {
        let a16 = AlignedVec::from_slice(&vec![1i16; a_rows * width]);
        let b16 = AlignedVec::from_slice(&vec![1i16; width * b_cols]);
        let totals = collect_totals(a_rows, b_cols, |e| unsafe {
            sse::multiply16(&a16, &b16, a_rows, width, b_cols, e)
        });
        assert!(totals.iter().all(|&t| t == width as i32), "16-bit width {}", width);

        if is_x86_feature_detected!("avx2") {
            let a8 = AlignedVec::from_slice(&vec![1i8; a_rows * width]);
            let b8 = AlignedVec::from_slice(&vec![1i8; width * b_cols]);
            let totals = collect_totals(a_rows, b_cols, |e| unsafe {
                avx2::multiply8(&a8, &b8, a_rows, width, b_cols, e)
            });
            assert!(totals.iter().all(|&t| t == width as i32), "8-bit width {}", width);
        }
    }
}

#[test]
fn test_negative_a_flips_sign_of_b() {
    if !is_x86_feature_detected!("ssse3") {
        println!("Skipping - SSSE3 not available");
        return;
    }
    let width = 16;
    let a = AlignedVec::from_slice(&[-3i8; 16]);
    // Column j of B is all (j - 4).
    let b_rows: Vec<i8> = (0..width).flat_map(|_| (0..8).map(|j| j - 4)).collect();
    let b = rearranged(&b_rows, width, 8, SSE_LANES.1);
    let totals = collect_totals(1, 8, |e| unsafe { sse::multiply8(&a, &b, 1, width, 8, e) });
    let expected: Vec<i32> = (0..8).map(|j| -3 * (j - 4) * width as i32).collect();
    assert_eq!(totals, expected);
}

#[test]
fn test_multiply8_saturates_16bit_lanes() {
    let check = |name: &str, i8_lanes: usize, kernel: &dyn Fn(&[i8], &[i8], usize) -> Vec<i32>| {
        // Four register steps of 127*127*2 = 32258 per lane saturate at 32767.
        let width = 4 * i8_lanes;
        let a = AlignedVec::from_slice(&vec![127i8; width]);
        let b = AlignedVec::from_slice(&vec![127i8; width * 8]);
        let totals = kernel(&a[..], &b[..], width);
        let i16_lanes = (i8_lanes / 2) as i32;
        assert!(
            totals.iter().all(|&t| t == i16_lanes * 32767),
            "{}: expected {}, got {:?}",
            name,
            i16_lanes * 32767,
            totals
        );
    };

    if is_x86_feature_detected!("ssse3") {
        check("SSSE3", SSE_LANES.1, &|a: &[i8], b: &[i8], width: usize| {
            collect_totals(1, 8, |e| unsafe { sse::multiply8(a, b, 1, width, 8, e) })
        });
    }
    if is_x86_feature_detected!("avx2") {
        check("AVX2", AVX2_LANES.1, &|a: &[i8], b: &[i8], width: usize| {
            collect_totals(1, 8, |e| unsafe { avx2::multiply8(a, b, 1, width, 8, e) })
        });
    }
    if has_avx512bw() {
        check("AVX-512", AVX512_LANES.1, &|a: &[i8], b: &[i8], width: usize| {
            collect_totals(1, 8, |e| unsafe { avx512::multiply8(a, b, 1, width, 8, e) })
        });
    }
}

#[test]
fn test_multiply8_minus_128() {
    // |-128| is 0x80, which pmaddubsw reads as 128, so A = -128 is exact.
    // sign(-128, a < 0) wraps back to -128, so B = -128 under a negative A is not.
    let check = |name: &str, i8_lanes: usize, kernel: &dyn Fn(&[i8], &[i8], usize) -> Vec<i32>| {
        let width = i8_lanes;
        let expected = -128 * width as i32;

        let a = AlignedVec::from_slice(&vec![-128i8; width]);
        let b = AlignedVec::from_slice(&vec![1i8; width * 8]);
        let totals = kernel(&a[..], &b[..], width);
        assert!(totals.iter().all(|&t| t == expected), "{}: A=-128 gave {:?}", name, totals);

        let a = AlignedVec::from_slice(&vec![-1i8; width]);
        let b = AlignedVec::from_slice(&vec![-128i8; width * 8]);
        let totals = kernel(&a[..], &b[..], width);
        assert!(totals.iter().all(|&t| t == expected), "{}: B=-128 gave {:?}", name, totals);
    };

    if is_x86_feature_detected!("ssse3") {
        check("SSSE3", SSE_LANES.1, &|a: &[i8], b: &[i8], width: usize| {
            collect_totals(1, 8, |e| unsafe { sse::multiply8(a, b, 1, width, 8, e) })
        });
    }
    if is_x86_feature_detected!("avx2") {
        check("AVX2", AVX2_LANES.1, &|a: &[i8], b: &[i8], width: usize| {
            collect_totals(1, 8, |e| unsafe { avx2::multiply8(a, b, 1, width, 8, e) })
        });
    }
    if has_avx512bw() {
        check("AVX-512", AVX512_LANES.1, &|a: &[i8], b: &[i8], width: usize| {
            collect_totals(1, 8, |e| unsafe { avx512::multiply8(a, b, 1, width, 8, e) })
        });
    }
}

#[test]
fn test_zero_rows_never_calls_epilogue() {
    let b = AlignedVec::from_slice(&[1i16; 8 * 8]);
    let mut calls = 0;
    unsafe {
        sse::multiply16(&[], &b, 0, 8, 8, |_: &[i32; 8], _: Tile| calls += 1);
    }
    assert_eq!(calls, 0);
}

#[test]
fn test_tile_order_is_column_block_major() {
    let (a_rows, width, b_cols) = (3, 8, 24);
    let a = AlignedVec::from_slice(&vec![1i16; a_rows * width]);
    let b = AlignedVec::from_slice(&vec![1i16; width * b_cols]);
    let mut order = Vec::new();
    unsafe {
        sse::multiply16(&a, &b, a_rows, width, b_cols, |_: &[i32; 8], tile: Tile| {
            order.push((tile.col, tile.row))
        });
    }
    let expected: Vec<(usize, usize)> = (0..b_cols)
        .step_by(8)
        .flat_map(|col| (0..a_rows).map(move |row| (col, row)))
        .collect();
    assert_eq!(order, expected);
}

#[test]
#[should_panic(expected = "must be a positive multiple of 8")]
fn test_ragged_width_panics() {
    let a = AlignedVec::from_slice(&[0i16; 12]);
    let b = AlignedVec::from_slice(&[0i16; 12 * 8]);
    unsafe { sse::multiply16(&a, &b, 1, 12, 8, |_: &[i32; 8], _: Tile| {}) };
}

#[test]
#[should_panic(expected = "B_cols 12 must be a multiple of 8")]
fn test_ragged_b_cols_panics() {
    let a = AlignedVec::from_slice(&[0i16; 8]);
    let b = AlignedVec::from_slice(&[0i16; 8 * 12]);
    unsafe { sse::multiply16(&a, &b, 1, 8, 12, |_: &[i32; 8], _: Tile| {}) };
}

#[test]
#[should_panic(expected = "A must be aligned to 16 bytes")]
fn test_misaligned_a_panics() {
    let a = AlignedVec::from_slice(&[0i16; 16]);
    let b = AlignedVec::from_slice(&[0i16; 8 * 8]);
    unsafe { sse::multiply16(&a[1..9], &b, 1, 8, 8, |_: &[i32; 8], _: Tile| {}) };
}

#[test]
#[should_panic(expected = "A: expected 18446744073709551615x8 elements, size overflows usize")]
fn test_overflowing_a_size_panics() {
    let b = AlignedVec::from_slice(&[0i16; 8 * 8]);
    unsafe { sse::multiply16(&[], &b, usize::MAX, 8, 8, |_: &[i32; 8], _: Tile| {}) };
}

// ============================================================
// Dispatching front-ends
// ============================================================

fn front_end_available() -> bool {
    if cpu_type() < CpuType::Ssse3 {
        println!("Skipping - SSSE3 not available");
        return false;
    }
    true
}

#[test]
fn test_int8_exact_with_bias() {
    if !front_end_available() {
        return;
    }
    let (a_rows, width, b_cols) = (4, 128, 16);
    let mut rng = StdRng::seed_from_u64(1);
    let a: Vec<i8> = random_ints(&mut rng, a_rows * width, 10);
    let b: Vec<i8> = random_ints(&mut rng, width * b_cols, 10);
    let bias: Vec<f32> = (0..b_cols).map(|j| j as f32 - 0.5).collect();

    // Integer-valued floats with a scale of 1 quantize exactly.
    let a_f: Vec<f32> = a.iter().map(|&x| x as f32).collect();
    let b_f: Vec<f32> = b.iter().map(|&x| x as f32).collect();
    let a_q = Int8::prepare_a(&a_f, 1.0, a_rows, width);
    let b_q = Int8::prepare_b(&b_f, 1.0, width, b_cols);
    assert_eq!(&*a_q, &a[..]);

    let mut c = vec![0.0f32; a_rows * b_cols];
    Int8::multiply(
        &a_q,
        &b_q,
        a_rows,
        width,
        b_cols,
        &mut [Callback::unquantize_and_add_bias_and_write(0.5, &bias, &mut c)],
    );

    let expected = multiply_reference(&a, &b, a_rows, width, b_cols);
    for i in 0..a_rows {
        for j in 0..b_cols {
            let want = expected[i * b_cols + j] as f32 * 0.5 + bias[j];
            assert_eq!(c[i * b_cols + j], want, "C[{}][{}]", i, j);
        }
    }
}

#[test]
fn test_int8_float_error_is_bounded() {
    if !front_end_available() {
        return;
    }
    let (a_rows, width, b_cols) = (8, 64, 24);
    let mut rng = StdRng::seed_from_u64(2);
    let a: Vec<f32> = (0..a_rows * width).map(|_| rng.gen_range(-1.0f32..1.0)).collect();
    let b: Vec<f32> = (0..width * b_cols).map(|_| rng.gen_range(-2.0f32..2.0)).collect();

    // A scale of 32 keeps 16-bit lanes far from saturation.
    let (max_a, max_b) = (max_absolute(&a), max_absolute(&b));
    let a_mult = 32.0 / max_a;
    let b_mult = 32.0 / max_b;
    let a_q = Int8::prepare_a(&a, a_mult, a_rows, width);
    let b_q = Int8::prepare_b(&b, b_mult, width, b_cols);

    let mut c = vec![0.0f32; a_rows * b_cols];
    Int8::multiply(
        &a_q,
        &b_q,
        a_rows,
        width,
        b_cols,
        &mut [Callback::unquantize_and_write(1.0 / (a_mult * b_mult), &mut c)],
    );

    // |a·b - a'·b'| <= |a|·eb + |b|·ea + ea·eb per product.
    let (ea, eb) = (0.5 / a_mult, 0.5 / b_mult);
    let tolerance = width as f32 * (max_a * eb + max_b * ea + ea * eb) + 1e-3;
    for i in 0..a_rows {
        for j in 0..b_cols {
            let want: f32 = (0..width).map(|p| a[i * width + p] * b[p * b_cols + j]).sum();
            let got = c[i * b_cols + j];
            assert!(
                (want - got).abs() <= tolerance,
                "C[{}][{}]: expected {}, got {} (tolerance {})",
                i,
                j,
                want,
                got,
                tolerance
            );
        }
    }
}

#[test]
fn test_int16_callbacks_compose() {
    if cpu_type() < CpuType::Sse2 {
        println!("Skipping - SSE2 not available");
        return;
    }
    let (a_rows, width, b_cols) = (3, 64, 16);
    let mut rng = StdRng::seed_from_u64(3);
    let a: Vec<f32> = (0..a_rows * width).map(|_| rng.gen_range(-1.0f32..1.0)).collect();
    let b: Vec<f32> = (0..width * b_cols).map(|_| rng.gen_range(-1.0f32..1.0)).collect();
    let bias: Vec<f32> = (0..b_cols).map(|j| j as f32 * 0.25).collect();
    let a_q = Int16::prepare_a(&a, 1024.0, a_rows, width);
    let b_q = Int16::prepare_b(&b, 1024.0, width, b_cols);
    let unquant = 1.0 / (1024.0 * 1024.0);

    let mut combined = vec![0.0f32; a_rows * b_cols];
    let mut separate = vec![0.0f32; a_rows * b_cols];
    let mut raw = vec![0.0f32; a_rows * b_cols];
    Int16::multiply(
        &a_q,
        &b_q,
        a_rows,
        width,
        b_cols,
        &mut [Callback::unquantize_and_add_bias_and_write(unquant, &bias, &mut combined)],
    );
    Int16::multiply(
        &a_q,
        &b_q,
        a_rows,
        width,
        b_cols,
        &mut [
            Callback::write(&mut raw),
            Callback::unquantize(unquant),
            Callback::add_bias(&bias),
            Callback::write(&mut separate),
        ],
    );
    assert_eq!(combined, separate);

    let a_int: Vec<i16> = a_q.to_vec();
    let mut b_int = vec![0i16; width * b_cols];
    Int16::quantize(&b, &mut b_int, 1024.0);
    let expected = multiply_reference(&a_int, &b_int, a_rows, width, b_cols);
    let expected: Vec<f32> = expected.iter().map(|&t| t as f32).collect();
    assert_eq!(raw, expected);
}

#[test]
fn test_prepare_b_transposed_matches_prepare_b() {
    if cpu_type() < CpuType::Sse2 {
        println!("Skipping - SSE2 not available");
        return;
    }
    let (width, b_cols) = (64, 16);
    let b: Vec<f32> = (0..width * b_cols).map(|i| ((i * 7) % 23) as f32 - 11.0).collect();
    let mut bt = vec![0.0f32; b.len()];
    for r in 0..width {
        for c in 0..b_cols {
            bt[c * width + r] = b[r * b_cols + c];
        }
    }
    assert_eq!(
        Int16::prepare_b(&b, 2.0, width, b_cols),
        Int16::prepare_b_transposed(&bt, 2.0, width, b_cols)
    );
}

#[test]
fn test_quantize_clamps() {
    if !front_end_available() {
        return;
    }
    let input = [200.0f32, -200.0, 1e6, -1e6, 0.5, 1.5, -2.5];
    let mut out8 = [0i8; 7];
    let mut out16 = [0i16; 7];
    Int8::quantize(&input, &mut out8, 1.0);
    Int16::quantize(&input, &mut out16, 1.0);
    assert_eq!(out8, [127, -127, 127, -127, 0, 2, -2]);
    assert_eq!(out16, [200, -200, 32767, -32768, 0, 2, -2]);
}

#[test]
fn test_quantize_out_of_range_body_and_tail() {
    if !front_end_available() {
        return;
    }
    // 35 = two 512-bit registers of floats plus a tail of 3 on every tier.
    let mut input: Vec<f32> = (0..35).map(|i| i as f32 - 17.0).collect();
    let specials = [0, 1, 2, 32, 33, 34];
    for (&i, &x) in specials.iter().zip(&[3e9f32, -3e9, f32::NAN, 3e9, -3e9, f32::NAN]) {
        input[i] = x;
    }
    let expect = |min: i32| -> Vec<i32> {
        (0..35)
            .map(|i| if specials.contains(&i) { min } else { i as i32 - 17 })
            .collect()
    };

    let mut out16 = vec![0i16; 35];
    let mut out8 = vec![0i8; 35];
    Int16::quantize(&input, &mut out16, 1.0);
    Int8::quantize(&input, &mut out8, 1.0);
    assert_eq!(out16.iter().map(|&v| v as i32).collect::<Vec<_>>(), expect(-32768));
    assert_eq!(out8.iter().map(|&v| v as i32).collect::<Vec<_>>(), expect(-127));

    let check = |name: &str, out16: &[i16], out8: &[i8]| {
        assert_eq!(out16.iter().map(|&v| v as i32).collect::<Vec<_>>(), expect(-32768), "{}", name);
        assert_eq!(out8.iter().map(|&v| v as i32).collect::<Vec<_>>(), expect(-127), "{}", name);
    };
    unsafe {
        sse::quantize16(&input, &mut out16, 1.0);
        sse::quantize8(&input, &mut out8, 1.0);
    }
    check("SSE2", &out16, &out8);
    if is_x86_feature_detected!("avx2") {
        unsafe {
            avx2::quantize16(&input, &mut out16, 1.0);
            avx2::quantize8(&input, &mut out8, 1.0);
        }
        check("AVX2", &out16, &out8);
    }
    if has_avx512bw() {
        unsafe {
            avx512::quantize16(&input, &mut out16, 1.0);
            avx512::quantize8(&input, &mut out8, 1.0);
        }
        check("AVX-512", &out16, &out8);
    }
}

#[test]
fn test_max_absolute_front_end() {
    if cpu_type() < CpuType::Sse2 {
        println!("Skipping - SSE2 not available");
        return;
    }
    let mut values: Vec<f32> = (0..100).map(|i| (i % 13) as f32 - 6.0).collect();
    assert_eq!(max_absolute(&values), 6.0);

    // Unaligned start and ragged tail.
    values[0] = -42.0;
    assert_eq!(max_absolute(&values), 42.0);
    assert_eq!(max_absolute(&values[1..]), 6.0);
    values[99] = 43.5;
    assert_eq!(max_absolute(&values[1..]), 43.5);

    let negative = vec![-1.0f32, -8.0, -3.0];
    assert_eq!(max_absolute(&negative), 8.0);
    assert_eq!(max_absolute(&[]), 0.0);
}
