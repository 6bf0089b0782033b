//! Tile loops of the integer multiply kernels.
//!
//! A tile is one row of A against one 8-column block of B. For every tile
//! the kernel accumulates eight registers of partial sums, reduces them to
//! eight `i32` totals with [`reduce`](crate::kernels::reduce::reduce) and
//! hands the totals plus the tile coordinates to an epilogue.
//!
//! - `int16`: `i16` operands, 32-bit accumulation
//! - `int8`: `i8` operands, 16-bit saturating accumulation, widened per tile

pub mod int16;
pub mod int8;

use crate::kernels::Simd;

/// Checks the contract shared by both kernels. Every violation is fatal.
#[allow(clippy::too_many_arguments)]
pub(crate) fn assert_multiply_args<S: Simd, T>(
    kernel: &str,
    a: &[T],
    b: &[T],
    a_rows: usize,
    width: usize,
    b_cols: usize,
    lanes: usize,
) {
    assert!(
        width > 0 && width % lanes == 0,
        "{}: width {} must be a positive multiple of {} on {}",
        kernel,
        width,
        lanes,
        S::NAME
    );
    assert_eq!(b_cols % 8, 0, "{}: B_cols {} must be a multiple of 8", kernel, b_cols);
    let a_len = a_rows
        .checked_mul(width)
        .unwrap_or_else(|| panic!("A: expected {}x{} elements, size overflows usize", a_rows, width));
    assert!(
        a.len() >= a_len,
        "A: expected {}x{}={} elements, got {}",
        a_rows,
        width,
        a_len,
        a.len()
    );
    let b_len = width
        .checked_mul(b_cols)
        .unwrap_or_else(|| panic!("B: expected {}x{} elements, size overflows usize", width, b_cols));
    assert!(
        b.len() >= b_len,
        "B: expected {}x{}={} elements, got {}",
        width,
        b_cols,
        b_len,
        b.len()
    );
    if a_rows > 0 {
        assert_eq!(
            a.as_ptr() as usize % S::BYTES,
            0,
            "{}: A must be aligned to {} bytes on {}",
            kernel,
            S::BYTES,
            S::NAME
        );
    }
    if b_cols > 0 {
        assert_eq!(
            b.as_ptr() as usize % S::BYTES,
            0,
            "{}: B must be aligned to {} bytes on {}",
            kernel,
            S::BYTES,
            S::NAME
        );
    }
}
