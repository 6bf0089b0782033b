//! Float-to-integer quantization and the dynamic-range scan used to pick a
//! quantization scale.

#![allow(unsafe_op_in_unsafe_fn)]

use super::Simd;

/// Quantize one register of floats: `round(input * quant_mult)` per lane.
///
/// Rounds to nearest, ties to even. There is no clamping beyond what the
/// conversion instruction does, so lanes outside the `i32` range come back
/// as `i32::MIN`.
#[inline(always)]
pub unsafe fn quantize<S: Simd>(input: S::Float, quant_mult: S::Float) -> S::Register {
    S::cvtps_epi32(S::mul_ps(input, quant_mult))
}

/// Largest absolute value in `input`.
///
/// The sign bit is masked off each register, a running packed max is kept,
/// and the last register is reduced horizontally.
///
/// # Panics
///
/// Panics if `input` is empty, if its length is not a multiple of the tier's
/// `f32` lane count, or if it is not aligned to the register size.
#[inline(always)]
pub unsafe fn max_absolute<S: Simd>(input: &[f32]) -> f32 {
    assert!(!input.is_empty(), "max_absolute: input is empty");
    assert_eq!(
        input.len() % S::F32_LANES,
        0,
        "max_absolute: length {} is not a multiple of {} lanes ({})",
        input.len(),
        S::F32_LANES,
        S::NAME
    );
    assert_eq!(
        input.as_ptr() as usize % S::BYTES,
        0,
        "max_absolute: input must be aligned to {} bytes ({})",
        S::BYTES,
        S::NAME
    );

    let begin = input.as_ptr() as *const S::Float;
    let registers = input.len() / S::F32_LANES;
    let and_me = S::set1_ps(f32::from_bits(0x7fff_ffff));

    let mut highest = S::and_ps(and_me, begin.read());
    for i in 1..registers {
        let reg = S::and_ps(and_me, begin.add(i).read());
        highest = S::max_ps(highest, reg);
    }
    S::max_float32(highest)
}
