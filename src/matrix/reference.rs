//! Scalar baselines the SIMD kernels are checked against.

/// Quantize one float the way `cvtps2dq` does: round to nearest, ties to
/// even, and `i32::MIN` for anything outside the `i32` range (NaN included).
pub fn quantize_scalar(value: f32, quant_mult: f32) -> i32 {
    let rounded = (value * quant_mult).round_ties_even();
    if (-2_147_483_648.0..2_147_483_648.0).contains(&rounded) {
        rounded as i32
    } else {
        i32::MIN
    }
}

/// Integer matrix multiplication in i-k-j loop order, `C = A * B`.
///
/// B is plain row-major here, not rearranged. Products and sums wrap in
/// 32 bits like the 16-bit kernel; the 8-bit kernel only agrees while its
/// 16-bit lanes do not saturate.
///
/// # Arguments
///
/// * `a` - Matrix A (a_rows × width), row-major
/// * `b` - Matrix B (width × b_cols), row-major
/// * Returns C (a_rows × b_cols), row-major
pub fn multiply_reference<T>(a: &[T], b: &[T], a_rows: usize, width: usize, b_cols: usize) -> Vec<i32>
where
    T: Copy + Into<i32>,
{
    assert_eq!(a.len(), a_rows * width, "A: expected {}x{}={} elements", a_rows, width, a_rows * width);
    assert_eq!(b.len(), width * b_cols, "B: expected {}x{}={} elements", width, b_cols, width * b_cols);

    let mut c = vec![0i32; a_rows * b_cols];
    for i in 0..a_rows {
        for p in 0..width {
            let a_ip: i32 = a[i * width + p].into();
            for j in 0..b_cols {
                let b_pj: i32 = b[p * b_cols + j].into();
                let cell = &mut c[i * b_cols + j];
                *cell = cell.wrapping_add(a_ip.wrapping_mul(b_pj));
            }
        }
    }
    c
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_quantize_scalar_rounding() {
        assert_eq!(quantize_scalar(0.5, 1.0), 0);
        assert_eq!(quantize_scalar(1.5, 1.0), 2);
        assert_eq!(quantize_scalar(-2.5, 1.0), -2);
        assert_eq!(quantize_scalar(0.3, 10.0), 3);
        assert_eq!(quantize_scalar(3e9, 1.0), i32::MIN);
        assert_eq!(quantize_scalar(f32::NAN, 1.0), i32::MIN);
    }

    #[test]
    fn test_multiply_reference_2x2() {
        let a = [1i8, 2, 3, 4];
        let b = [5i8, 6, 7, 8];
        assert_eq!(multiply_reference(&a, &b, 2, 2, 2), vec![19, 22, 43, 50]);
    }

    #[test]
    fn test_multiply_reference_wraps() {
        let a = [i16::MIN; 4];
        let b = [i16::MIN; 4];
        // 4 * 2^30 = 2^32 wraps to 0.
        assert_eq!(multiply_reference(&a, &b, 1, 4, 1), vec![0]);
    }
}
