//! Word-level bit tricks used by the bitmap index.
#![cfg(target_pointer_width = "64")]

/// Returns the number of set bits in `x`.
#[inline(always)]
pub const fn popcount(x: u64) -> usize {
    x.count_ones() as usize
}

/// Returns the number of set bits in `x` strictly below bit position `pos`.
///
/// # Examples
///
/// ```
/// use slimidx::broadword::rank_below;
///
/// assert_eq!(rank_below(0b1011, 0), 0);
/// assert_eq!(rank_below(0b1011, 2), 2);
/// assert_eq!(rank_below(0b1011, 4), 3);
/// assert_eq!(rank_below(u64::MAX, 63), 63);
/// ```
///
/// # Panics
///
/// It will panic if `pos >= 64` in debug builds.
#[inline(always)]
pub const fn rank_below(x: u64, pos: usize) -> usize {
    debug_assert!(pos < 64);
    popcount(x & ((1u64 << pos) - 1))
}

/// Returns the position of the lowest set bit, or [`None`] if `mask == 0`.
#[inline(always)]
pub const fn lsb(mask: u64) -> Option<usize> {
    if mask != 0 {
        Some(mask.trailing_zeros() as usize)
    } else {
        None
    }
}
