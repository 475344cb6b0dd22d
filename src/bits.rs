//! Fixed-width configuration bit patterns and the bit operations used on them.
//!
//! A configuration is an unsigned integer whose bit `i` tells whether site `i`
//! of a sub-lattice is occupied. All sectors, orderings and communication plans
//! are generic over [`BitPattern`], implemented for `u16`, `u32` and `u64`.

use bytemuck::Pod;
use num_traits::{PrimInt, Unsigned};
use std::fmt::Debug;
use std::hash::Hash;

/// Unsigned integer usable as a configuration.
///
/// `Pod` lets configurations travel through the byte-level collectives
/// unchanged; `Hash` backs the head → offset maps.
pub trait BitPattern: PrimInt + Unsigned + Pod + Hash + Debug + Send + Sync + 'static {
    /// Number of bits (and therefore maximal number of sites).
    const BITS: u32;

    fn to_u64(self) -> u64;

    /// Truncating conversion; callers only pass values that fit.
    fn from_u64(v: u64) -> Self;
}

macro_rules! impl_bit_pattern {
    ($($t:ty),*) => {
        $(
            impl BitPattern for $t {
                const BITS: u32 = <$t>::BITS;
                #[inline]
                fn to_u64(self) -> u64 {
                    self as u64
                }
                #[inline]
                fn from_u64(v: u64) -> Self {
                    v as $t
                }
            }
        )*
    };
}

impl_bit_pattern!(u16, u32, u64);

/// Number of set bits.
#[inline]
pub fn popcnt<B: BitPattern>(x: B) -> usize {
    x.count_ones() as usize
}

/// Bit `n` of `x`.
#[inline]
pub fn gbit<B: BitPattern>(x: B, n: usize) -> bool {
    (x >> n) & B::one() == B::one()
}

/// Mask with the lowest `n` bits set; saturates at the full width.
#[inline]
pub fn low_mask<B: BitPattern>(n: usize) -> B {
    if n as u32 >= B::BITS {
        B::max_value()
    } else {
        (B::one() << n) - B::one()
    }
}

/// `n` bits of `x` starting at bit `start`, shifted down to bit 0.
#[inline]
pub fn gbits<B: BitPattern>(x: B, n: usize, start: usize) -> B {
    if start as u32 >= B::BITS {
        return B::zero();
    }
    (x >> start) & low_mask::<B>(n)
}

/// Mask of the sites strictly between `s1` and `s2` (order irrelevant).
#[inline]
pub fn between_mask<B: BitPattern>(s1: usize, s2: usize) -> B {
    let (lo, hi) = if s1 < s2 { (s1, s2) } else { (s2, s1) };
    if hi <= lo + 1 {
        return B::zero();
    }
    low_mask::<B>(hi - lo - 1) << (lo + 1)
}

/// Scatter the low bits of `src` onto the set bits of `mask` (PDEP).
#[inline]
pub fn deposit<B: BitPattern>(src: B, mask: B) -> B {
    let mut out = B::zero();
    let mut m = mask;
    let mut k = 0usize;
    while m != B::zero() {
        let pos = m.trailing_zeros() as usize;
        if gbit(src, k) {
            out = out | (B::one() << pos);
        }
        m = m & (m - B::one());
        k += 1;
    }
    out
}

/// Gather the bits of `src` selected by `mask` into the low bits (PEXT).
#[inline]
pub fn extract<B: BitPattern>(src: B, mask: B) -> B {
    let mut out = B::zero();
    let mut m = mask;
    let mut k = 0usize;
    while m != B::zero() {
        let pos = m.trailing_zeros() as usize;
        if gbit(src, pos) {
            out = out | (B::one() << k);
        }
        m = m & (m - B::one());
        k += 1;
    }
    out
}
