//! Horizontal reduction of per-column partial sums.
//!
//! Both multiply kernels end a tile with eight registers of 32-bit partial
//! sums, one register per column of the 8-column block, each column's sum
//! still spread across every lane. Reduction happens in two stages:
//!
//! 1. [`pack0123`] adds within 128-bit lanes, turning four registers into one
//!    holding `c0 c1 c2 c3` once per 128-bit lane.
//! 2. [`Simd::permute_summer`] removes the remaining duplication across
//!    128-bit lanes. It is a no-op at 128 bits, a permute/blend/add at 256
//!    bits and a masked permute plus a fold of halves at 512 bits.

#![allow(unsafe_op_in_unsafe_fn)]

use super::Simd;

/// Reduce four registers of 32-bit sums to one register in the pattern
/// `1 2 3 4 1 2 3 4 ...`, leaving the cross-128-bit addition to
/// [`Simd::permute_summer`].
#[inline(always)]
pub unsafe fn pack0123<S: Simd>(
    sum0: S::Register,
    sum1: S::Register,
    sum2: S::Register,
    sum3: S::Register,
) -> S::Register {
    // 1 2 1 2 1 2 1 2
    let (sum0, sum1) = S::interleave32(sum0, sum1);
    let pack01 = S::add_epi32(sum0, sum1);
    // 3 4 3 4 3 4 3 4
    let (sum2, sum3) = S::interleave32(sum2, sum3);
    let pack23 = S::add_epi32(sum2, sum3);
    // 1 2 3 4 1 2 3 4
    let (pack01, pack23) = S::interleave64(pack01, pack23);
    S::add_epi32(pack01, pack23)
}

/// Reduce the eight column registers of a finished tile to its eight totals.
#[inline(always)]
pub unsafe fn reduce<S: Simd>(sums: [S::Register; 8]) -> [i32; 8] {
    let [sum0, sum1, sum2, sum3, sum4, sum5, sum6, sum7] = sums;
    let p0123 = pack0123::<S>(sum0, sum1, sum2, sum3);
    let p4567 = pack0123::<S>(sum4, sum5, sum6, sum7);
    S::store_total(S::permute_summer(p0123, p4567))
}

/// Load eight consecutive registers of 32-bit lanes and reduce them.
#[cfg(test)]
#[inline(always)]
pub(crate) unsafe fn reduce_lanes<S: Simd>(lanes: &[i32]) -> [i32; 8] {
    assert_eq!(lanes.len(), 8 * S::F32_LANES);
    let regs = lanes.as_ptr() as *const S::Register;
    reduce::<S>([
        regs.read_unaligned(),
        regs.add(1).read_unaligned(),
        regs.add(2).read_unaligned(),
        regs.add(3).read_unaligned(),
        regs.add(4).read_unaligned(),
        regs.add(5).read_unaligned(),
        regs.add(6).read_unaligned(),
        regs.add(7).read_unaligned(),
    ])
}

/// Scalar equivalent of [`reduce_lanes`]: sum every lane of each register.
#[cfg(test)]
pub(crate) fn reduce_lanes_naive(lanes: &[i32]) -> [i32; 8] {
    let per_register = lanes.len() / 8;
    let mut totals = [0i32; 8];
    for (total, register) in totals.iter_mut().zip(lanes.chunks_exact(per_register)) {
        *total = register.iter().fold(0i32, |acc, &v| acc.wrapping_add(v));
    }
    totals
}
