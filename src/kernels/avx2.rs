//! 256-bit tier: AVX2.

#![allow(unsafe_op_in_unsafe_fn)]

use std::arch::x86_64::*;

use super::Simd;
use super::sse::Sse;
use crate::callbacks::Tile;
use crate::matrix::prepare;
use crate::multiply::{int8, int16};

/// 256-bit registers.
#[derive(Debug, Clone, Copy, Default)]
pub struct Avx2;

impl Simd for Avx2 {
    type Register = __m256i;
    type Float = __m256;
    type Total = __m256i;

    const NAME: &'static str = "AVX2";
    const BYTES: usize = 32;

    #[inline(always)]
    unsafe fn madd_epi16(a: __m256i, b: __m256i) -> __m256i {
        _mm256_madd_epi16(a, b)
    }

    #[inline(always)]
    unsafe fn maddubs_epi16(a: __m256i, b: __m256i) -> __m256i {
        _mm256_maddubs_epi16(a, b)
    }

    #[inline(always)]
    unsafe fn adds_epi16(a: __m256i, b: __m256i) -> __m256i {
        _mm256_adds_epi16(a, b)
    }

    #[inline(always)]
    unsafe fn add_epi32(a: __m256i, b: __m256i) -> __m256i {
        _mm256_add_epi32(a, b)
    }

    #[inline(always)]
    unsafe fn abs_epi8(a: __m256i) -> __m256i {
        _mm256_abs_epi8(a)
    }

    #[inline(always)]
    unsafe fn sign_epi8(b: __m256i, a: __m256i) -> __m256i {
        _mm256_sign_epi8(b, a)
    }

    #[inline(always)]
    unsafe fn set1_epi16(value: i16) -> __m256i {
        _mm256_set1_epi16(value)
    }

    #[inline(always)]
    unsafe fn interleave32(a: __m256i, b: __m256i) -> (__m256i, __m256i) {
        (_mm256_unpacklo_epi32(a, b), _mm256_unpackhi_epi32(a, b))
    }

    #[inline(always)]
    unsafe fn interleave64(a: __m256i, b: __m256i) -> (__m256i, __m256i) {
        (_mm256_unpacklo_epi64(a, b), _mm256_unpackhi_epi64(a, b))
    }

    #[inline(always)]
    unsafe fn permute_summer(pack0123: __m256i, pack4567: __m256i) -> __m256i {
        // 1s 2s 3s 4s 5f 6f 7f 8f
        let rev = _mm256_permute2f128_si256::<0x21>(pack0123, pack4567);
        // 1f 2f 3f 4f 5s 6s 7s 8s
        let blended = _mm256_blend_epi32::<0xf0>(pack0123, pack4567);
        _mm256_add_epi32(rev, blended)
    }

    #[inline(always)]
    unsafe fn store_total(total: __m256i) -> [i32; 8] {
        let mut out = [0i32; 8];
        _mm256_storeu_si256(out.as_mut_ptr() as *mut __m256i, total);
        out
    }

    #[inline(always)]
    unsafe fn set1_ps(value: f32) -> __m256 {
        _mm256_set1_ps(value)
    }

    #[inline(always)]
    unsafe fn mul_ps(a: __m256, b: __m256) -> __m256 {
        _mm256_mul_ps(a, b)
    }

    #[inline(always)]
    unsafe fn and_ps(a: __m256, b: __m256) -> __m256 {
        _mm256_and_ps(a, b)
    }

    #[inline(always)]
    unsafe fn max_ps(a: __m256, b: __m256) -> __m256 {
        _mm256_max_ps(a, b)
    }

    #[inline(always)]
    unsafe fn max_float32(a: __m256) -> f32 {
        Sse::max_float32(_mm_max_ps(
            _mm256_castps256_ps128(a),
            _mm256_extractf128_ps::<1>(a),
        ))
    }

    #[inline(always)]
    unsafe fn cvtps_epi32(a: __m256) -> __m256i {
        _mm256_cvtps_epi32(a)
    }

    /// Hand-scheduled inner step.
    ///
    /// There are 16 YMM registers and the naive order wants 17: `a`, `|a|`,
    /// eight sign-corrected columns of B and eight sums. Columns 0 and 1 are
    /// finished first so their temporaries can carry columns 6 and 7, which
    /// keeps every sum in a register. `vpmaddubsw` has a latency of 5, so
    /// sign application for other columns is interleaved behind it.
    #[inline(always)]
    unsafe fn inner8(a: __m256i, b: *const __m256i, sums: &mut [__m256i; 8]) {
        let mut b0_b6 = b.read();
        let mut b1_b7 = b.add(1).read();
        let mut b2 = b.add(2).read();
        let mut b3 = b.add(3).read();
        let mut b4 = b.add(4).read();
        let mut b5 = b.add(5).read();

        let absa = _mm256_abs_epi8(a);
        b0_b6 = _mm256_sign_epi8(b0_b6, a);
        b1_b7 = _mm256_sign_epi8(b1_b7, a);
        b0_b6 = _mm256_maddubs_epi16(absa, b0_b6);
        b1_b7 = _mm256_maddubs_epi16(absa, b1_b7);

        b2 = _mm256_sign_epi8(b2, a);
        b3 = _mm256_sign_epi8(b3, a);
        b4 = _mm256_sign_epi8(b4, a);
        b5 = _mm256_sign_epi8(b5, a);

        sums[0] = _mm256_adds_epi16(sums[0], b0_b6);
        b0_b6 = b.add(6).read();
        sums[1] = _mm256_adds_epi16(sums[1], b1_b7);
        b1_b7 = b.add(7).read();

        b2 = _mm256_maddubs_epi16(absa, b2);
        b3 = _mm256_maddubs_epi16(absa, b3);
        b4 = _mm256_maddubs_epi16(absa, b4);
        b0_b6 = _mm256_sign_epi8(b0_b6, a);
        b1_b7 = _mm256_sign_epi8(b1_b7, a);
        b5 = _mm256_maddubs_epi16(absa, b5);
        b0_b6 = _mm256_maddubs_epi16(absa, b0_b6);
        b1_b7 = _mm256_maddubs_epi16(absa, b1_b7);

        sums[2] = _mm256_adds_epi16(sums[2], b2);
        sums[3] = _mm256_adds_epi16(sums[3], b3);
        sums[4] = _mm256_adds_epi16(sums[4], b4);
        sums[5] = _mm256_adds_epi16(sums[5], b5);
        sums[6] = _mm256_adds_epi16(sums[6], b0_b6);
        sums[7] = _mm256_adds_epi16(sums[7], b1_b7);
    }
}

/// 16-bit multiply on AVX2. See [`int16::multiply16`].
///
/// # Safety
///
/// CPU must support AVX2.
#[target_feature(enable = "avx2")]
pub unsafe fn multiply16<F>(
    a: &[i16],
    b: &[i16],
    a_rows: usize,
    width: usize,
    b_cols: usize,
    epilogue: F,
) where
    F: FnMut(&[i32; 8], Tile),
{
    int16::multiply16::<Avx2, F>(a, b, a_rows, width, b_cols, epilogue)
}

/// 8-bit multiply on AVX2, using the hand-scheduled inner step. See
/// [`int8::multiply8`].
///
/// # Safety
///
/// CPU must support AVX2.
#[target_feature(enable = "avx2")]
pub unsafe fn multiply8<F>(
    a: &[i8],
    b: &[i8],
    a_rows: usize,
    width: usize,
    b_cols: usize,
    epilogue: F,
) where
    F: FnMut(&[i32; 8], Tile),
{
    int8::multiply8::<Avx2, F>(a, b, a_rows, width, b_cols, epilogue)
}

/// Quantize eight floats.
///
/// # Safety
///
/// CPU must support AVX2.
#[target_feature(enable = "avx2")]
pub unsafe fn quantize(input: __m256, quant_mult: __m256) -> __m256i {
    super::quantize::quantize::<Avx2>(input, quant_mult)
}

/// # Safety
///
/// CPU must support AVX2.
#[target_feature(enable = "avx2")]
pub unsafe fn max_absolute(input: &[f32]) -> f32 {
    super::quantize::max_absolute::<Avx2>(input)
}

/// # Safety
///
/// CPU must support AVX2.
#[target_feature(enable = "avx2")]
pub unsafe fn quantize16(input: &[f32], output: &mut [i16], quant_mult: f32) {
    prepare::quantize16::<Avx2>(input, output, quant_mult)
}

/// # Safety
///
/// CPU must support AVX2.
#[target_feature(enable = "avx2")]
pub unsafe fn quantize8(input: &[f32], output: &mut [i8], quant_mult: f32) {
    prepare::quantize8::<Avx2>(input, output, quant_mult)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::kernels::reduce::{reduce_lanes, reduce_lanes_naive};

    #[target_feature(enable = "avx2")]
    unsafe fn reduce(lanes: &[i32]) -> [i32; 8] {
        reduce_lanes::<Avx2>(lanes)
    }

    #[target_feature(enable = "avx2")]
    unsafe fn quantize_slice(input: &[f32], quant_mult: f32) -> [i32; 8] {
        let q = quantize(_mm256_loadu_ps(input.as_ptr()), _mm256_set1_ps(quant_mult));
        let mut output = [0i32; 8];
        _mm256_storeu_si256(output.as_mut_ptr() as *mut __m256i, q);
        output
    }

    /// Runs the scheduled and the generic inner step on the same inputs.
    #[target_feature(enable = "avx2")]
    unsafe fn inner_both(a: &[i8], b: &[i8]) -> ([i16; 16 * 8], [i16; 16 * 8]) {
        let a = (a.as_ptr() as *const __m256i).read_unaligned();
        let mut b_regs = [_mm256_setzero_si256(); 8];
        for (j, reg) in b_regs.iter_mut().enumerate() {
            *reg = _mm256_loadu_si256(b.as_ptr().add(j * 32) as *const __m256i);
        }
        let start = _mm256_set1_epi16(100);

        let mut scheduled = [start; 8];
        <Avx2 as Simd>::inner8(a, b_regs.as_ptr(), &mut scheduled);

        let mut generic = [start; 8];
        let a_positive = _mm256_abs_epi8(a);
        for (j, sum) in generic.iter_mut().enumerate() {
            let product = _mm256_maddubs_epi16(a_positive, _mm256_sign_epi8(b_regs[j], a));
            *sum = _mm256_adds_epi16(*sum, product);
        }

        let mut out_scheduled = [0i16; 16 * 8];
        let mut out_generic = [0i16; 16 * 8];
        for j in 0..8 {
            _mm256_storeu_si256(out_scheduled.as_mut_ptr().add(j * 16) as *mut __m256i, scheduled[j]);
            _mm256_storeu_si256(out_generic.as_mut_ptr().add(j * 16) as *mut __m256i, generic[j]);
        }
        (out_scheduled, out_generic)
    }

    #[test]
    fn test_quantize_avx2() {
        if !is_x86_feature_detected!("avx2") {
            println!("Skipping - AVX2 not available");
            return;
        }

        let input: Vec<f32> = (0..8).map(|i| i as f32).collect();
        let output = unsafe { quantize_slice(&input, 2.0) };
        for (i, &v) in output.iter().enumerate() {
            assert_eq!(v, (i as f32 * 2.0) as i32);
        }
    }

    #[test]
    fn test_reduce_avx2() {
        if !is_x86_feature_detected!("avx2") {
            println!("Skipping - AVX2 not available");
            return;
        }

        let lanes: Vec<i32> = (0..64).map(|i| (i * 37 % 101) - 50).collect();
        let totals = unsafe { reduce(&lanes) };
        assert_eq!(totals, reduce_lanes_naive(&lanes));
    }

    #[test]
    fn test_scheduled_inner_matches_generic() {
        if !is_x86_feature_detected!("avx2") {
            println!("Skipping - AVX2 not available");
            return;
        }

        let a: Vec<i8> = (0..32).map(|i| ((i * 13) % 255 - 127) as i8).collect();
        let b: Vec<i8> = (0..32 * 8).map(|i| ((i * 29) % 255 - 127) as i8).collect();
        let (scheduled, generic) = unsafe { inner_both(&a, &b) };
        assert_eq!(scheduled, generic);
    }

    #[test]
    fn test_max_absolute_avx2() {
        if !is_x86_feature_detected!("avx2") {
            println!("Skipping - AVX2 not available");
            return;
        }

        let mut values = vec![0.25f32; 32];
        values[31] = -17.0;
        let data = crate::AlignedVec::from_slice(&values);
        assert_eq!(unsafe { max_absolute(&data) }, 17.0);
    }
}
