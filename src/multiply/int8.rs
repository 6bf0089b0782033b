//! 8-bit integer multiply.
//!
//! x86 only multiplies bytes as unsigned × signed (`pmaddubsw`). The kernel
//! takes `|a|` as the unsigned operand and moves the sign of `a` onto every
//! column of B with `psignb`, so `|a| * (sign(a) * b) == a * b`. Products are
//! added in pairs into 16-bit lanes and accumulated with saturating adds,
//! then widened to 32 bits once per tile.
//!
//! Saturation is the overflow policy: a 16-bit lane clamps at
//! `[-32768, 32767]` both inside `pmaddubsw` and in the running sum. An A
//! byte of `-128` is exact: `|a|` is `0x80`, which `pmaddubsw` reads as 128.
//! A B byte of `-128` is not when its A byte is negative, since negating
//! `-128` wraps back to `-128`. `prepare_b` clamps to `[-127, 127]` to stay
//! clear of that.

#![allow(unsafe_op_in_unsafe_fn)]

use super::assert_multiply_args;
use crate::callbacks::Tile;
use crate::kernels::Simd;
use crate::kernels::reduce::reduce;

/// C = A × B over `i8` operands.
///
/// Same layout contract and epilogue protocol as
/// [`multiply16`](super::int16::multiply16), with `width` a multiple of the
/// tier's `i8` lane count. Inner steps after the first go through
/// [`Simd::inner8`], which a tier may replace with a hand-scheduled version.
///
/// # Panics
///
/// On any violated precondition (see [`multiply16`](super::int16::multiply16)).
///
/// # Safety
///
/// CPU must support tier `S` (SSSE3 at 128 bits), and this must be inlined
/// into a function that enables its features.
#[inline(always)]
pub unsafe fn multiply8<S: Simd, F>(
    a: &[i8],
    b: &[i8],
    a_rows: usize,
    width: usize,
    b_cols: usize,
    mut epilogue: F,
) where
    F: FnMut(&[i32; 8], Tile),
{
    assert_multiply_args::<S, i8>("multiply8", a, b, a_rows, width, b_cols, S::I8_LANES);

    let simd_width = width / S::I8_LANES;
    let ones = S::set1_epi16(1);
    let mut b0_col = b.as_ptr() as *const S::Register;

    for b0_colidx in (0..b_cols).step_by(8) {
        for a_rowidx in 0..a_rows {
            let a_row = a.as_ptr().add(a_rowidx * width) as *const S::Register;

            let a0 = a_row.read();
            let a_positive = S::abs_epi8(a0);
            // Packed 16-bit sums, one register per column of the block.
            let mut sums = [
                S::maddubs_epi16(a_positive, S::sign_epi8(b0_col.read(), a0)),
                S::maddubs_epi16(a_positive, S::sign_epi8(b0_col.add(1).read(), a0)),
                S::maddubs_epi16(a_positive, S::sign_epi8(b0_col.add(2).read(), a0)),
                S::maddubs_epi16(a_positive, S::sign_epi8(b0_col.add(3).read(), a0)),
                S::maddubs_epi16(a_positive, S::sign_epi8(b0_col.add(4).read(), a0)),
                S::maddubs_epi16(a_positive, S::sign_epi8(b0_col.add(5).read(), a0)),
                S::maddubs_epi16(a_positive, S::sign_epi8(b0_col.add(6).read(), a0)),
                S::maddubs_epi16(a_positive, S::sign_epi8(b0_col.add(7).read(), a0)),
            ];

            for k in 1..simd_width {
                S::inner8(a_row.add(k).read(), b0_col.add(k * 8), &mut sums);
            }

            // Widen 16-bit to 32-bit by multiplying by one and adding pairs.
            // Which lanes get added together does not matter, the reduction
            // sums all of them.
            for sum in &mut sums {
                *sum = S::madd_epi16(*sum, ones);
            }

            let totals = reduce::<S>(sums);
            epilogue(
                &totals,
                Tile {
                    row: a_rowidx,
                    col: b0_colidx,
                    a_rows,
                    width,
                    b_cols,
                },
            );
        }
        b0_col = b0_col.add(8 * simd_width);
    }
}
