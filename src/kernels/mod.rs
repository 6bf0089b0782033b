//! SIMD building blocks shared by the 8-bit and 16-bit multiply kernels.
//!
//! Everything here is written once against the [`Simd`] trait and
//! instantiated per instruction-set tier:
//!
//! | Tier | Register | `i16` lanes | `i8` lanes | Module |
//! |------|----------|-------------|------------|--------|
//! | SSE2 / SSSE3 | 128-bit | 8 | 16 | [`sse`] |
//! | AVX2 | 256-bit | 16 | 32 | [`avx2`] |
//! | AVX-512BW | 512-bit | 32 | 64 | [`avx512`] |
//!
//! Each tier module exposes `#[target_feature]` entry points (`multiply16`,
//! `multiply8`, `quantize`, `max_absolute`, ...). Calling one on a CPU
//! without the feature is undefined behaviour; the dispatching front-ends in
//! the crate root check [`cpu_type`](crate::cpu_type) first.

pub mod quantize;
pub mod reduce;
mod simd;

#[cfg(target_arch = "x86_64")]
pub mod avx2;
#[cfg(target_arch = "x86_64")]
pub mod avx512;
#[cfg(target_arch = "x86_64")]
pub mod sse;

pub use simd::Simd;
