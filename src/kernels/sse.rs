//! 128-bit tier: SSE2 for the 16-bit path, SSSE3 for the 8-bit path.
//!
//! SSE2 has no `pabsb`, `psignb` or `pmaddubsw`, so only the 16-bit kernel,
//! quantization and MaxAbsolute run on plain SSE2. The 8-bit kernel needs
//! SSSE3.

#![allow(unsafe_op_in_unsafe_fn)]

use std::arch::x86_64::*;

use super::Simd;
use crate::callbacks::Tile;
use crate::matrix::prepare;
use crate::multiply::{int8, int16};

/// 128-bit registers.
#[derive(Debug, Clone, Copy, Default)]
pub struct Sse;

impl Simd for Sse {
    type Register = __m128i;
    type Float = __m128;
    // Already fully reduced at 128 bits, so the two packs are the total.
    type Total = (__m128i, __m128i);

    const NAME: &'static str = "SSE";
    const BYTES: usize = 16;

    #[inline(always)]
    unsafe fn madd_epi16(a: __m128i, b: __m128i) -> __m128i {
        _mm_madd_epi16(a, b)
    }

    #[inline(always)]
    unsafe fn maddubs_epi16(a: __m128i, b: __m128i) -> __m128i {
        _mm_maddubs_epi16(a, b)
    }

    #[inline(always)]
    unsafe fn adds_epi16(a: __m128i, b: __m128i) -> __m128i {
        _mm_adds_epi16(a, b)
    }

    #[inline(always)]
    unsafe fn add_epi32(a: __m128i, b: __m128i) -> __m128i {
        _mm_add_epi32(a, b)
    }

    #[inline(always)]
    unsafe fn abs_epi8(a: __m128i) -> __m128i {
        _mm_abs_epi8(a)
    }

    #[inline(always)]
    unsafe fn sign_epi8(b: __m128i, a: __m128i) -> __m128i {
        _mm_sign_epi8(b, a)
    }

    #[inline(always)]
    unsafe fn set1_epi16(value: i16) -> __m128i {
        _mm_set1_epi16(value)
    }

    #[inline(always)]
    unsafe fn interleave32(a: __m128i, b: __m128i) -> (__m128i, __m128i) {
        (_mm_unpacklo_epi32(a, b), _mm_unpackhi_epi32(a, b))
    }

    #[inline(always)]
    unsafe fn interleave64(a: __m128i, b: __m128i) -> (__m128i, __m128i) {
        (_mm_unpacklo_epi64(a, b), _mm_unpackhi_epi64(a, b))
    }

    #[inline(always)]
    unsafe fn permute_summer(pack0123: __m128i, pack4567: __m128i) -> (__m128i, __m128i) {
        (pack0123, pack4567)
    }

    #[inline(always)]
    unsafe fn store_total(total: (__m128i, __m128i)) -> [i32; 8] {
        let mut out = [0i32; 8];
        _mm_storeu_si128(out.as_mut_ptr() as *mut __m128i, total.0);
        _mm_storeu_si128(out.as_mut_ptr().add(4) as *mut __m128i, total.1);
        out
    }

    #[inline(always)]
    unsafe fn set1_ps(value: f32) -> __m128 {
        _mm_set1_ps(value)
    }

    #[inline(always)]
    unsafe fn mul_ps(a: __m128, b: __m128) -> __m128 {
        _mm_mul_ps(a, b)
    }

    #[inline(always)]
    unsafe fn and_ps(a: __m128, b: __m128) -> __m128 {
        _mm_and_ps(a, b)
    }

    #[inline(always)]
    unsafe fn max_ps(a: __m128, b: __m128) -> __m128 {
        _mm_max_ps(a, b)
    }

    #[inline(always)]
    unsafe fn max_float32(a: __m128) -> f32 {
        // Fold to the first 64 bits.
        let second_half = _mm_shuffle_ps::<{ 3 * 4 + 2 }>(a, a);
        let a = _mm_max_ps(a, second_half);
        // Fold to the first 32 bits.
        let second_half = _mm_shuffle_ps::<1>(a, a);
        let a = _mm_max_ps(a, second_half);
        _mm_cvtss_f32(a)
    }

    #[inline(always)]
    unsafe fn cvtps_epi32(a: __m128) -> __m128i {
        _mm_cvtps_epi32(a)
    }
}

/// 16-bit multiply on SSE2. See [`int16::multiply16`].
///
/// # Safety
///
/// CPU must support SSE2.
#[target_feature(enable = "sse2")]
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
    int16::multiply16::<Sse, F>(a, b, a_rows, width, b_cols, epilogue)
}

/// 8-bit multiply on SSSE3. See [`int8::multiply8`].
///
/// # Safety
///
/// CPU must support SSSE3.
#[target_feature(enable = "ssse3")]
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
    int8::multiply8::<Sse, F>(a, b, a_rows, width, b_cols, epilogue)
}

/// Quantize four floats.
///
/// # Safety
///
/// CPU must support SSE2.
#[target_feature(enable = "sse2")]
pub unsafe fn quantize(input: __m128, quant_mult: __m128) -> __m128i {
    super::quantize::quantize::<Sse>(input, quant_mult)
}

/// # Safety
///
/// CPU must support SSE2.
#[target_feature(enable = "sse2")]
pub unsafe fn max_absolute(input: &[f32]) -> f32 {
    super::quantize::max_absolute::<Sse>(input)
}

/// # Safety
///
/// CPU must support SSE2.
#[target_feature(enable = "sse2")]
pub unsafe fn quantize16(input: &[f32], output: &mut [i16], quant_mult: f32) {
    prepare::quantize16::<Sse>(input, output, quant_mult)
}

/// # Safety
///
/// CPU must support SSE2.
#[target_feature(enable = "sse2")]
pub unsafe fn quantize8(input: &[f32], output: &mut [i8], quant_mult: f32) {
    prepare::quantize8::<Sse>(input, output, quant_mult)
}
