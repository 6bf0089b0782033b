//! The vector-width abstraction every kernel is written against.

/// Primitive SIMD operations for one instruction-set tier.
///
/// Each implementor is a zero-sized tag ([`Sse`](super::sse::Sse),
/// [`Avx2`](super::avx2::Avx2), [`Avx512`](super::avx512::Avx512)) that maps
/// the same semantic names onto that tier's registers and intrinsics. The
/// multiply, reduction and quantization code is generic over this trait and
/// gets instantiated once per tier inside a `#[target_feature]` entry point.
///
/// Names follow the x86 mnemonics they wrap so the generic code reads like the
/// instruction sequence it compiles to.
///
/// # Safety
///
/// Every method is only sound on a CPU that supports the tier. The methods
/// are `#[inline(always)]` and carry no `#[target_feature]` of their own: they
/// must be inlined into a function that enables the tier's features.
pub trait Simd: Copy + 'static {
    /// Packed integer register (`__m128i`, `__m256i`, `__m512i`).
    type Register: Copy;
    /// Packed `f32` register.
    type Float: Copy;
    /// What [`permute_summer`](Simd::permute_summer) hands back: eight fully
    /// reduced 32-bit column totals.
    type Total: Copy;

    /// Human-readable tier name.
    const NAME: &'static str;
    /// Register size in bytes, which is also the required alignment of A and B.
    const BYTES: usize;
    /// `i8` elements per register.
    const I8_LANES: usize = Self::BYTES;
    /// `i16` elements per register.
    const I16_LANES: usize = Self::BYTES / 2;
    /// `f32` elements per register.
    const F32_LANES: usize = Self::BYTES / 4;

    /// Multiply signed 16-bit lanes and add adjacent pairs into 32-bit lanes.
    unsafe fn madd_epi16(a: Self::Register, b: Self::Register) -> Self::Register;

    /// Multiply unsigned 8-bit lanes of `a` by signed 8-bit lanes of `b`, add
    /// adjacent pairs into 16-bit lanes with signed saturation.
    unsafe fn maddubs_epi16(a: Self::Register, b: Self::Register) -> Self::Register;

    /// 16-bit add with signed saturation.
    unsafe fn adds_epi16(a: Self::Register, b: Self::Register) -> Self::Register;

    /// Wrapping 32-bit add.
    unsafe fn add_epi32(a: Self::Register, b: Self::Register) -> Self::Register;

    /// Absolute value of signed 8-bit lanes. `-128` maps to `0x80`, which is
    /// exactly 128 when read as unsigned by [`maddubs_epi16`](Simd::maddubs_epi16).
    unsafe fn abs_epi8(a: Self::Register) -> Self::Register;

    /// Negate each byte of `b` whose corresponding byte of `a` is negative.
    unsafe fn sign_epi8(b: Self::Register, a: Self::Register) -> Self::Register;

    /// Broadcast one `i16` to all lanes.
    unsafe fn set1_epi16(value: i16) -> Self::Register;

    /// Interleave 32-bit lanes of `a` and `b` within each 128-bit lane,
    /// returning the (low, high) halves.
    unsafe fn interleave32(a: Self::Register, b: Self::Register) -> (Self::Register, Self::Register);

    /// Interleave 64-bit lanes of `a` and `b` within each 128-bit lane,
    /// returning the (low, high) halves.
    unsafe fn interleave64(a: Self::Register, b: Self::Register) -> (Self::Register, Self::Register);

    /// Final cross-lane reduction of two `pack0123` results into eight totals.
    unsafe fn permute_summer(pack0123: Self::Register, pack4567: Self::Register) -> Self::Total;

    /// Spill a total to memory in column order.
    unsafe fn store_total(total: Self::Total) -> [i32; 8];

    /// Broadcast one `f32` to all lanes.
    unsafe fn set1_ps(value: f32) -> Self::Float;

    unsafe fn mul_ps(a: Self::Float, b: Self::Float) -> Self::Float;

    unsafe fn and_ps(a: Self::Float, b: Self::Float) -> Self::Float;

    unsafe fn max_ps(a: Self::Float, b: Self::Float) -> Self::Float;

    /// Largest lane of `a`.
    unsafe fn max_float32(a: Self::Float) -> f32;

    /// Convert `f32` lanes to `i32` with the current rounding mode
    /// (round-to-nearest-even by default). Out-of-range lanes become `i32::MIN`.
    unsafe fn cvtps_epi32(a: Self::Float) -> Self::Register;

    /// One inner step of the 8-bit kernel: multiply the A register `a` against
    /// the eight consecutive B column registers at `b` and accumulate into
    /// `sums` with 16-bit saturation.
    ///
    /// The only signed 8-bit multiply is unsigned × signed, so the sign of `a`
    /// is moved onto each column of B and `|a|` is used as the unsigned side.
    /// Tiers may override this with a hand-scheduled sequence, as long as the
    /// result is identical.
    ///
    /// # Safety
    ///
    /// `b` must point to eight readable, register-aligned registers.
    #[inline(always)]
    #[allow(unsafe_op_in_unsafe_fn)]
    unsafe fn inner8(a: Self::Register, b: *const Self::Register, sums: &mut [Self::Register; 8]) {
        let a_positive = Self::abs_epi8(a);
        for (j, sum) in sums.iter_mut().enumerate() {
            let product = Self::maddubs_epi16(a_positive, Self::sign_epi8(b.add(j).read(), a));
            *sum = Self::adds_epi16(*sum, product);
        }
    }
}
