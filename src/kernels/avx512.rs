//! 512-bit tier: AVX-512F + AVX-512BW.
//!
//! AVX-512 dropped `vpsignb`. [`Simd::sign_epi8`] is rebuilt from a mask of
//! the negative bytes of `a` and a masked subtract from zero. Unlike
//! `vpsignb` it leaves `b` alone where `a` is zero, which makes no difference
//! to the kernel because those lanes are multiplied by `|a| = 0`.

#![allow(unsafe_op_in_unsafe_fn)]

use std::arch::x86_64::*;

use super::Simd;
use super::avx2::Avx2;
use crate::callbacks::Tile;
use crate::matrix::prepare;
use crate::multiply::{int8, int16};

/// 512-bit registers.
#[derive(Debug, Clone, Copy, Default)]
pub struct Avx512;

impl Simd for Avx512 {
    type Register = __m512i;
    type Float = __m512;
    // The reduction folds 512 bits down to eight 32-bit totals.
    type Total = __m256i;

    const NAME: &'static str = "AVX512BW";
    const BYTES: usize = 64;

    #[inline(always)]
    unsafe fn madd_epi16(a: __m512i, b: __m512i) -> __m512i {
        _mm512_madd_epi16(a, b)
    }

    #[inline(always)]
    unsafe fn maddubs_epi16(a: __m512i, b: __m512i) -> __m512i {
        _mm512_maddubs_epi16(a, b)
    }

    #[inline(always)]
    unsafe fn adds_epi16(a: __m512i, b: __m512i) -> __m512i {
        _mm512_adds_epi16(a, b)
    }

    #[inline(always)]
    unsafe fn add_epi32(a: __m512i, b: __m512i) -> __m512i {
        _mm512_add_epi32(a, b)
    }

    #[inline(always)]
    unsafe fn abs_epi8(a: __m512i) -> __m512i {
        _mm512_abs_epi8(a)
    }

    #[inline(always)]
    unsafe fn sign_epi8(b: __m512i, a: __m512i) -> __m512i {
        let negative = _mm512_movepi8_mask(a);
        _mm512_mask_sub_epi8(b, negative, _mm512_setzero_si512(), b)
    }

    #[inline(always)]
    unsafe fn set1_epi16(value: i16) -> __m512i {
        _mm512_set1_epi16(value)
    }

    #[inline(always)]
    unsafe fn interleave32(a: __m512i, b: __m512i) -> (__m512i, __m512i) {
        (_mm512_unpacklo_epi32(a, b), _mm512_unpackhi_epi32(a, b))
    }

    #[inline(always)]
    unsafe fn interleave64(a: __m512i, b: __m512i) -> (__m512i, __m512i) {
        (_mm512_unpacklo_epi64(a, b), _mm512_unpackhi_epi64(a, b))
    }

    #[inline(always)]
    unsafe fn permute_summer(pack0123: __m512i, pack4567: __m512i) -> __m256i {
        // [0th 128-bit lane of pack0123, 0th of pack4567, 2nd of pack0123, 2nd of pack4567]
        let mix0 = _mm512_mask_permutex_epi64::<{ (0 << 4) | (1 << 6) }>(pack0123, 0xcc, pack4567);
        // [1st 128-bit lane of pack0123, 1st of pack4567, 3rd of pack0123, 3rd of pack4567]
        let mix1 = _mm512_mask_permutex_epi64::<{ 2 | (3 << 2) }>(pack4567, 0x33, pack0123);
        let added = _mm512_add_epi32(mix0, mix1);
        // 0 1 2 3 4 5 6 7 0 1 2 3 4 5 6 7: fold the register over itself.
        _mm256_add_epi32(
            _mm512_castsi512_si256(added),
            _mm512_extracti64x4_epi64::<1>(added),
        )
    }

    #[inline(always)]
    unsafe fn store_total(total: __m256i) -> [i32; 8] {
        let mut out = [0i32; 8];
        _mm256_storeu_si256(out.as_mut_ptr() as *mut __m256i, total);
        out
    }

    #[inline(always)]
    unsafe fn set1_ps(value: f32) -> __m512 {
        _mm512_set1_ps(value)
    }

    #[inline(always)]
    unsafe fn mul_ps(a: __m512, b: __m512) -> __m512 {
        _mm512_mul_ps(a, b)
    }

    #[inline(always)]
    unsafe fn and_ps(a: __m512, b: __m512) -> __m512 {
        // vandps on zmm is AVX-512DQ; the integer and is plain AVX-512F.
        _mm512_castsi512_ps(_mm512_and_si512(
            _mm512_castps_si512(a),
            _mm512_castps_si512(b),
        ))
    }

    #[inline(always)]
    unsafe fn max_ps(a: __m512, b: __m512) -> __m512 {
        _mm512_max_ps(a, b)
    }

    #[inline(always)]
    unsafe fn max_float32(a: __m512) -> f32 {
        let upper = _mm256_castpd_ps(_mm512_extractf64x4_pd::<1>(_mm512_castps_pd(a)));
        Avx2::max_float32(_mm256_max_ps(_mm512_castps512_ps256(a), upper))
    }

    #[inline(always)]
    unsafe fn cvtps_epi32(a: __m512) -> __m512i {
        _mm512_cvtps_epi32(a)
    }
}

/// 16-bit multiply on AVX-512BW. See [`int16::multiply16`].
///
/// # Safety
///
/// CPU must support AVX-512F and AVX-512BW.
#[target_feature(enable = "avx512f,avx512bw")]
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
    int16::multiply16::<Avx512, F>(a, b, a_rows, width, b_cols, epilogue)
}

/// 8-bit multiply on AVX-512BW. See [`int8::multiply8`].
///
/// # Safety
///
/// CPU must support AVX-512F and AVX-512BW.
#[target_feature(enable = "avx512f,avx512bw")]
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
    int8::multiply8::<Avx512, F>(a, b, a_rows, width, b_cols, epilogue)
}

/// Quantize sixteen floats.
///
/// # Safety
///
/// CPU must support AVX-512F and AVX-512BW.
#[target_feature(enable = "avx512f,avx512bw")]
pub unsafe fn quantize(input: __m512, quant_mult: __m512) -> __m512i {
    super::quantize::quantize::<Avx512>(input, quant_mult)
}

/// # Safety
///
/// CPU must support AVX-512F and AVX-512BW.
#[target_feature(enable = "avx512f,avx512bw")]
pub unsafe fn max_absolute(input: &[f32]) -> f32 {
    super::quantize::max_absolute::<Avx512>(input)
}

/// # Safety
///
/// CPU must support AVX-512F and AVX-512BW.
#[target_feature(enable = "avx512f,avx512bw")]
pub unsafe fn quantize16(input: &[f32], output: &mut [i16], quant_mult: f32) {
    prepare::quantize16::<Avx512>(input, output, quant_mult)
}

/// # Safety
///
/// CPU must support AVX-512F and AVX-512BW.
#[target_feature(enable = "avx512f,avx512bw")]
pub unsafe fn quantize8(input: &[f32], output: &mut [i8], quant_mult: f32) {
    prepare::quantize8::<Avx512>(input, output, quant_mult)
}
