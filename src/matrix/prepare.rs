//! Turning float matrices into the operand layouts the kernels read.
//!
//! A is just quantized, row by row. B is quantized and then rearranged so the
//! kernel can stream it: for each block of 8 columns, the first register's
//! worth of rows of column 0, then of column 1, ... column 7, then the next
//! register's worth of rows, and so on. With `L` elements per register and
//! `simd_width = rows / L`, element `(r, c)` goes to
//!
//! ```text
//! ((c / 8 * simd_width + r / L) * 8 + c % 8) * L + r % L
//! ```

#![allow(unsafe_op_in_unsafe_fn)]

use super::reference::quantize_scalar;
use crate::kernels::Simd;
use crate::kernels::quantize::quantize;

/// Quantize `input` into `i16`, saturating at the type's range.
///
/// Full registers go through [`quantize`]; the tail (fewer than one
/// register of floats) is rounded the same way in scalar code. Neither
/// buffer needs to be aligned.
///
/// # Panics
///
/// If `input` and `output` have different lengths.
///
/// # Safety
///
/// CPU must support tier `S`, and this must be inlined into a function that
/// enables its features.
#[inline(always)]
pub unsafe fn quantize16<S: Simd>(input: &[f32], output: &mut [i16], quant_mult: f32) {
    quantize_into::<S, i16>(input, output, quant_mult, |v| {
        v.clamp(i16::MIN as i32, i16::MAX as i32) as i16
    })
}

/// Quantize `input` into `i8`, clamping to `[-127, 127]`.
///
/// `-128` is left out because `sign(b, a)` in the 8-bit kernel wraps when
/// `b` is `-128` and `a` is negative.
///
/// # Panics
///
/// If `input` and `output` have different lengths.
///
/// # Safety
///
/// As [`quantize16`].
#[inline(always)]
pub unsafe fn quantize8<S: Simd>(input: &[f32], output: &mut [i8], quant_mult: f32) {
    quantize_into::<S, i8>(input, output, quant_mult, |v| v.clamp(-127, 127) as i8)
}

#[inline(always)]
unsafe fn quantize_into<S: Simd, T>(
    input: &[f32],
    output: &mut [T],
    quant_mult: f32,
    narrow: impl Fn(i32) -> T,
) {
    assert_eq!(
        input.len(),
        output.len(),
        "quantize: input has {} elements, output {}",
        input.len(),
        output.len()
    );

    let mult = S::set1_ps(quant_mult);
    // Big enough for one 512-bit register of i32.
    let mut scratch = [0i32; 16];
    let mut src = input.chunks_exact(S::F32_LANES);
    let mut dst = output.chunks_exact_mut(S::F32_LANES);
    for (src, dst) in (&mut src).zip(&mut dst) {
        let floats = (src.as_ptr() as *const S::Float).read_unaligned();
        let ints = quantize::<S>(floats, mult);
        (scratch.as_mut_ptr() as *mut S::Register).write_unaligned(ints);
        for (d, &s) in dst.iter_mut().zip(&scratch) {
            *d = narrow(s);
        }
    }
    for (d, &s) in dst.into_remainder().iter_mut().zip(src.remainder()) {
        *d = narrow(quantize_scalar(s, quant_mult));
    }
}

/// Index of `B[r][c]` in the rearranged layout for `lanes` elements per
/// register.
#[inline]
pub fn rearranged_index(r: usize, c: usize, rows: usize, lanes: usize) -> usize {
    let simd_width = rows / lanes;
    ((c / 8 * simd_width + r / lanes) * 8 + c % 8) * lanes + r % lanes
}

/// Rearrange a quantized row-major `rows × cols` B into the kernel layout.
///
/// # Panics
///
/// If `rows` is not a positive multiple of `lanes`, if `cols` is not a
/// multiple of 8, or if either buffer is not `rows * cols` long.
pub fn rearrange_b<T: Copy>(input: &[T], output: &mut [T], rows: usize, cols: usize, lanes: usize) {
    assert!(
        lanes > 0 && rows > 0 && rows % lanes == 0,
        "rearrange_b: rows {} must be a positive multiple of {}",
        rows,
        lanes
    );
    assert_eq!(cols % 8, 0, "rearrange_b: cols {} must be a multiple of 8", cols);
    assert_eq!(input.len(), rows * cols, "B: expected {}x{}={} elements", rows, cols, rows * cols);
    assert_eq!(output.len(), rows * cols, "output: expected {} elements", rows * cols);

    for r in 0..rows {
        for c in 0..cols {
            output[rearranged_index(r, c, rows, lanes)] = input[r * cols + c];
        }
    }
}
