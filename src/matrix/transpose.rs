/// Transpose a matrix: dst = src^T
///
/// Converts from row-major (rows × cols) to row-major (cols × rows).
/// After transpose, what was column j of src becomes row j of dst.
///
/// # Example
///
/// ```
/// use intgemm::matrix::transpose::transpose;
///
/// let src = vec![1, 2, 3,   // 2×3 matrix
///                4, 5, 6];
/// let mut dst = vec![0; 6]; // will be 3×2
///
/// transpose(&src, &mut dst, 2, 3);
///
/// assert_eq!(dst, vec![1, 4,
///                      2, 5,
///                      3, 6]);
/// ```
pub fn transpose<T: Copy>(src: &[T], dst: &mut [T], rows: usize, cols: usize) {
    assert_eq!(src.len(), rows * cols, "src: expected {}x{}={} elements", rows, cols, rows * cols);
    assert_eq!(dst.len(), rows * cols, "dst: expected {}x{}={} elements", cols, rows, rows * cols);
    for i in 0..rows {
        for j in 0..cols {
            dst[j * rows + i] = src[i * cols + j];
        }
    }
}
