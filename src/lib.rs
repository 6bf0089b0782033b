//! 8-bit and 16-bit integer matrix multiplication for inference.
//!
//! Floats are quantized to `i8` or `i16`, multiplied with SIMD integer
//! instructions, and turned back into floats by a list of [`Callback`]s run on
//! every finished tile. The widest instruction set the CPU has is picked at
//! runtime: AVX-512BW, AVX2, SSSE3 or SSE2 (16-bit only).
//!
//! ## Usage
//!
//! ```
//! use intgemm::{Callback, Int8, max_absolute};
//!
//! let (a_rows, width, b_cols) = (4, 64, 8);
//! let a: Vec<f32> = (0..a_rows * width).map(|i| (i % 7) as f32 - 3.0).collect();
//! let b: Vec<f32> = (0..width * b_cols).map(|i| (i % 5) as f32 - 2.0).collect();
//!
//! let a_mult = 127.0 / max_absolute(&a);
//! let b_mult = 127.0 / max_absolute(&b);
//! let a_q = Int8::prepare_a(&a, a_mult, a_rows, width);
//! let b_q = Int8::prepare_b(&b, b_mult, width, b_cols);
//!
//! let mut c = vec![0.0f32; a_rows * b_cols];
//! Int8::multiply(
//!     &a_q,
//!     &b_q,
//!     a_rows,
//!     width,
//!     b_cols,
//!     &mut [Callback::unquantize_and_write(1.0 / (a_mult * b_mult), &mut c)],
//! );
//! ```
//!
//! `width` must be a multiple of [`Int8::width_multiple`] (64 covers every
//! tier) and `b_cols` a multiple of 8. Set `INTGEMM_CPUID=AVX2` (or `SSSE3`,
//! `SSE2`) to force a slower tier.
//!
//! ## What's inside
//!
//! - One generic 16-bit and one generic 8-bit kernel, instantiated per tier
//! - A hand-scheduled AVX2 inner loop for the 8-bit kernel
//! - Quantize, MaxAbsolute and the B rearrangement the kernels expect

pub mod callbacks;
pub mod cpu;
pub mod kernels;
pub mod matrix;
pub mod multiply;

pub use callbacks::{Callback, Tile};
pub use cpu::{CpuType, CpuTypeError, cpu_type};
pub use matrix::aligned::AlignedVec;
pub use matrix::reference::multiply_reference;

use callbacks::{assert_callbacks, run_callbacks};
use matrix::prepare::rearrange_b;
use matrix::transpose::transpose;

#[cfg(target_arch = "x86_64")]
use kernels::{avx2, avx512, sse};

fn unsupported(what: &str, tier: CpuType) -> ! {
    panic!("{}: no SIMD support on this CPU (tier {})", what, tier)
}

/// Largest absolute value in `input`, `0.0` when it is empty.
///
/// Any length and alignment is accepted; the aligned middle goes through the
/// SIMD kernel and the ends are handled in scalar code.
pub fn max_absolute(input: &[f32]) -> f32 {
    let tier = cpu_type();
    let bytes = tier.register_bytes();
    if bytes == 0 {
        unsupported("max_absolute", tier);
    }
    let lanes = bytes / 4;

    let head = (input.as_ptr().align_offset(bytes)).min(input.len());
    let body = (input.len() - head) / lanes * lanes;
    let (start, rest) = input.split_at(head);
    let (middle, end) = rest.split_at(body);

    let scalar = start
        .iter()
        .chain(end)
        .fold(0.0f32, |acc, x| acc.max(x.abs()));
    if middle.is_empty() {
        return scalar;
    }

    #[cfg(target_arch = "x86_64")]
    let simd = unsafe {
        match tier {
            CpuType::Avx512bw => avx512::max_absolute(middle),
            CpuType::Avx2 => avx2::max_absolute(middle),
            CpuType::Ssse3 | CpuType::Sse2 => sse::max_absolute(middle),
            CpuType::Unsupported => unsupported("max_absolute", tier),
        }
    };
    #[cfg(not(target_arch = "x86_64"))]
    let simd: f32 = unsupported("max_absolute", tier);

    simd.max(scalar)
}

/// 16-bit front-end: quantize, prepare and multiply on the best tier.
///
/// Good for values that need more than 8 bits of precision. Pick
/// `quant_mult` so that `width * max|A| * max|B|` stays within `i32`; the
/// accumulators do not widen past 32 bits.
#[derive(Debug, Clone, Copy)]
pub struct Int16;

impl Int16 {
    /// `width` (rows of B) must be a multiple of this. 0 if unsupported.
    pub fn width_multiple() -> usize {
        cpu_type().register_bytes() / 2
    }

    /// Quantize with `round(x * quant_mult)`, saturated to `i16`.
    ///
    /// # Panics
    ///
    /// If the lengths differ or the CPU has no SIMD tier.
    #[cfg_attr(not(target_arch = "x86_64"), allow(unused_variables))]
    pub fn quantize(input: &[f32], output: &mut [i16], quant_mult: f32) {
        let tier = cpu_type();
        #[cfg(target_arch = "x86_64")]
        unsafe {
            match tier {
                CpuType::Avx512bw => return avx512::quantize16(input, output, quant_mult),
                CpuType::Avx2 => return avx2::quantize16(input, output, quant_mult),
                CpuType::Ssse3 | CpuType::Sse2 => return sse::quantize16(input, output, quant_mult),
                CpuType::Unsupported => {}
            }
        }
        unsupported("Int16::quantize", tier)
    }

    /// Quantize a row-major `rows × cols` A into an aligned buffer.
    pub fn prepare_a(input: &[f32], quant_mult: f32, rows: usize, cols: usize) -> AlignedVec<i16> {
        assert_eq!(input.len(), rows * cols, "A: expected {}x{}={} elements", rows, cols, rows * cols);
        let mut output = AlignedVec::new(input.len());
        Self::quantize(input, &mut output, quant_mult);
        output
    }

    /// Quantize a row-major `rows × cols` B and rearrange it for this tier.
    pub fn prepare_b(input: &[f32], quant_mult: f32, rows: usize, cols: usize) -> AlignedVec<i16> {
        assert_eq!(input.len(), rows * cols, "B: expected {}x{}={} elements", rows, cols, rows * cols);
        let mut quantized = vec![0i16; input.len()];
        Self::quantize(input, &mut quantized, quant_mult);
        Self::rearrange_b(&quantized, rows, cols)
    }

    /// As [`prepare_b`](Self::prepare_b) for B supplied transposed, i.e.
    /// row-major `cols × rows`.
    pub fn prepare_b_transposed(
        input: &[f32],
        quant_mult: f32,
        rows: usize,
        cols: usize,
    ) -> AlignedVec<i16> {
        let mut b = vec![0.0f32; input.len()];
        transpose(input, &mut b, cols, rows);
        Self::prepare_b(&b, quant_mult, rows, cols)
    }

    /// Rearrange an already quantized row-major B for this tier.
    pub fn rearrange_b(quantized: &[i16], rows: usize, cols: usize) -> AlignedVec<i16> {
        let lanes = Self::width_multiple();
        if lanes == 0 {
            unsupported("Int16::rearrange_b", cpu_type());
        }
        let mut output = AlignedVec::new(quantized.len());
        rearrange_b(quantized, &mut output, rows, cols, lanes);
        output
    }

    /// C = A × B, then `callbacks` on every tile.
    ///
    /// `a` is from [`prepare_a`](Self::prepare_a), `b` from
    /// [`prepare_b`](Self::prepare_b) on the same machine.
    ///
    /// # Panics
    ///
    /// On bad dimensions, short or misaligned buffers, callbacks whose buffers
    /// are too small, or a CPU without SIMD support.
    #[cfg_attr(not(target_arch = "x86_64"), allow(unused_variables))]
    pub fn multiply(
        a: &[i16],
        b: &[i16],
        a_rows: usize,
        width: usize,
        b_cols: usize,
        callbacks: &mut [Callback<'_>],
    ) {
        assert_callbacks(callbacks, a_rows, b_cols);
        let tier = cpu_type();
        let epilogue = |totals: &[i32; 8], tile: Tile| run_callbacks(callbacks, totals, tile);

        #[cfg(target_arch = "x86_64")]
        unsafe {
            match tier {
                CpuType::Avx512bw => return avx512::multiply16(a, b, a_rows, width, b_cols, epilogue),
                CpuType::Avx2 => return avx2::multiply16(a, b, a_rows, width, b_cols, epilogue),
                CpuType::Ssse3 | CpuType::Sse2 => {
                    return sse::multiply16(a, b, a_rows, width, b_cols, epilogue);
                }
                CpuType::Unsupported => {}
            }
        }
        unsupported("Int16::multiply", tier)
    }
}

/// 8-bit front-end: quantize, prepare and multiply on the best tier.
///
/// Roughly twice the throughput of [`Int16`]. Values are clamped to
/// `[-127, 127]`; the usual scale is `127 / max_absolute(x)`. Pairs of
/// products are summed in saturating 16-bit lanes, so results are exact
/// only while `|a|·|b|` stays below about 16384 per pair.
#[derive(Debug, Clone, Copy)]
pub struct Int8;

impl Int8 {
    /// `width` (rows of B) must be a multiple of this. 0 if unsupported.
    pub fn width_multiple() -> usize {
        match cpu_type() {
            CpuType::Sse2 | CpuType::Unsupported => 0,
            tier => tier.register_bytes(),
        }
    }

    fn tier() -> CpuType {
        let tier = cpu_type();
        if tier < CpuType::Ssse3 {
            panic!("Int8 needs at least SSSE3, this CPU runs {}", tier);
        }
        tier
    }

    /// Quantize with `round(x * quant_mult)`, clamped to `[-127, 127]`.
    ///
    /// # Panics
    ///
    /// If the lengths differ or the CPU lacks SSSE3.
    #[cfg_attr(not(target_arch = "x86_64"), allow(unused_variables))]
    pub fn quantize(input: &[f32], output: &mut [i8], quant_mult: f32) {
        let tier = Self::tier();
        #[cfg(target_arch = "x86_64")]
        unsafe {
            match tier {
                CpuType::Avx512bw => return avx512::quantize8(input, output, quant_mult),
                CpuType::Avx2 => return avx2::quantize8(input, output, quant_mult),
                CpuType::Ssse3 => return sse::quantize8(input, output, quant_mult),
                CpuType::Sse2 | CpuType::Unsupported => {}
            }
        }
        unsupported("Int8::quantize", tier)
    }

    /// Quantize a row-major `rows × cols` A into an aligned buffer.
    pub fn prepare_a(input: &[f32], quant_mult: f32, rows: usize, cols: usize) -> AlignedVec<i8> {
        assert_eq!(input.len(), rows * cols, "A: expected {}x{}={} elements", rows, cols, rows * cols);
        let mut output = AlignedVec::new(input.len());
        Self::quantize(input, &mut output, quant_mult);
        output
    }

    /// Quantize a row-major `rows × cols` B and rearrange it for this tier.
    pub fn prepare_b(input: &[f32], quant_mult: f32, rows: usize, cols: usize) -> AlignedVec<i8> {
        assert_eq!(input.len(), rows * cols, "B: expected {}x{}={} elements", rows, cols, rows * cols);
        let mut quantized = vec![0i8; input.len()];
        Self::quantize(input, &mut quantized, quant_mult);
        Self::rearrange_b(&quantized, rows, cols)
    }

    /// As [`prepare_b`](Self::prepare_b) for B supplied transposed, i.e.
    /// row-major `cols × rows`.
    pub fn prepare_b_transposed(
        input: &[f32],
        quant_mult: f32,
        rows: usize,
        cols: usize,
    ) -> AlignedVec<i8> {
        let mut b = vec![0.0f32; input.len()];
        transpose(input, &mut b, cols, rows);
        Self::prepare_b(&b, quant_mult, rows, cols)
    }

    /// Rearrange an already quantized row-major B for this tier.
    pub fn rearrange_b(quantized: &[i8], rows: usize, cols: usize) -> AlignedVec<i8> {
        let lanes = Self::tier().register_bytes();
        let mut output = AlignedVec::new(quantized.len());
        rearrange_b(quantized, &mut output, rows, cols, lanes);
        output
    }

    /// C = A × B, then `callbacks` on every tile.
    ///
    /// # Panics
    ///
    /// As [`Int16::multiply`], and if the CPU lacks SSSE3.
    #[cfg_attr(not(target_arch = "x86_64"), allow(unused_variables))]
    pub fn multiply(
        a: &[i8],
        b: &[i8],
        a_rows: usize,
        width: usize,
        b_cols: usize,
        callbacks: &mut [Callback<'_>],
    ) {
        assert_callbacks(callbacks, a_rows, b_cols);
        let tier = Self::tier();
        let epilogue = |totals: &[i32; 8], tile: Tile| run_callbacks(callbacks, totals, tile);

        #[cfg(target_arch = "x86_64")]
        unsafe {
            match tier {
                CpuType::Avx512bw => return avx512::multiply8(a, b, a_rows, width, b_cols, epilogue),
                CpuType::Avx2 => return avx2::multiply8(a, b, a_rows, width, b_cols, epilogue),
                CpuType::Ssse3 => return sse::multiply8(a, b, a_rows, width, b_cols, epilogue),
                CpuType::Sse2 | CpuType::Unsupported => {}
            }
        }
        unsupported("Int8::multiply", tier)
    }
}
