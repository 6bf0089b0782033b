//! 16-bit integer multiply.

#![allow(unsafe_op_in_unsafe_fn)]

use super::assert_multiply_args;
use crate::callbacks::Tile;
use crate::kernels::Simd;
use crate::kernels::reduce::reduce;

/// C = A × B over `i16` operands, accumulating in `i32`.
///
/// - `a` is row-major, `a_rows × width` (from `prepare_a`).
/// - `b` is `width × b_cols`, rearranged into 8-column blocks (from
///   `prepare_b` for the same tier).
/// - `epilogue` is called once per tile with the eight column totals and the
///   tile coordinates, blocks of B outermost, rows of A inner.
///
/// `madd_epi16` multiplies adjacent `i16` pairs and adds them into 32-bit
/// lanes; the running sums use wrapping 32-bit adds. Nothing widens to 64
/// bits, so a dot product whose magnitude exceeds `i32::MAX` wraps. Callers
/// pick operand ranges and widths that keep sums in range.
///
/// # Panics
///
/// If `width` is not a positive multiple of the tier's `i16` lane count, if
/// `b_cols` is not a multiple of 8, if A or B are too short, or if A or B are
/// not aligned to the register size.
///
/// # Safety
///
/// CPU must support tier `S`, and this must be inlined into a function that
/// enables its features.
#[inline(always)]
pub unsafe fn multiply16<S: Simd, F>(
    a: &[i16],
    b: &[i16],
    a_rows: usize,
    width: usize,
    b_cols: usize,
    mut epilogue: F,
) where
    F: FnMut(&[i32; 8], Tile),
{
    assert_multiply_args::<S, i16>("multiply16", a, b, a_rows, width, b_cols, S::I16_LANES);

    let simd_width = width / S::I16_LANES;
    let mut b0_col = b.as_ptr() as *const S::Register;

    for b0_colidx in (0..b_cols).step_by(8) {
        // One row of A at a time; several rows at once was not faster.
        for a_rowidx in 0..a_rows {
            let a_row = a.as_ptr().add(a_rowidx * width) as *const S::Register;

            // Initialize from the first step instead of zeros.
            let a0 = a_row.read();
            let mut sum0 = S::madd_epi16(a0, b0_col.read());
            let mut sum1 = S::madd_epi16(a0, b0_col.add(1).read());
            let mut sum2 = S::madd_epi16(a0, b0_col.add(2).read());
            let mut sum3 = S::madd_epi16(a0, b0_col.add(3).read());
            let mut sum4 = S::madd_epi16(a0, b0_col.add(4).read());
            let mut sum5 = S::madd_epi16(a0, b0_col.add(5).read());
            let mut sum6 = S::madd_epi16(a0, b0_col.add(6).read());
            let mut sum7 = S::madd_epi16(a0, b0_col.add(7).read());

            for k in 1..simd_width {
                let ak = a_row.add(k).read();
                let b_live = b0_col.add(k * 8);

                let mult0 = S::madd_epi16(ak, b_live.read());
                let mult1 = S::madd_epi16(ak, b_live.add(1).read());
                let mult2 = S::madd_epi16(ak, b_live.add(2).read());
                let mult3 = S::madd_epi16(ak, b_live.add(3).read());
                let mult4 = S::madd_epi16(ak, b_live.add(4).read());
                let mult5 = S::madd_epi16(ak, b_live.add(5).read());
                let mult6 = S::madd_epi16(ak, b_live.add(6).read());
                let mult7 = S::madd_epi16(ak, b_live.add(7).read());

                // TODO: fold into 64-bit every few hundred steps so wide inputs cannot wrap.
                sum0 = S::add_epi32(sum0, mult0);
                sum1 = S::add_epi32(sum1, mult1);
                sum2 = S::add_epi32(sum2, mult2);
                sum3 = S::add_epi32(sum3, mult3);
                sum4 = S::add_epi32(sum4, mult4);
                sum5 = S::add_epi32(sum5, mult5);
                sum6 = S::add_epi32(sum6, mult6);
                sum7 = S::add_epi32(sum7, mult7);
            }

            let totals = reduce::<S>([sum0, sum1, sum2, sum3, sum4, sum5, sum6, sum7]);
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
