//! Fixed little-endian wire records for plan construction.
//!
//! Payload exchanges move coefficients as raw `Pod` slices; only the
//! metadata rounds (counts and configuration pairs) go through these records,
//! so ranks of different configuration widths never disagree on layout.

use crate::bits::BitPattern;
use bytemuck::{Pod, Zeroable};

pub fn cast_slice<T: Pod>(v: &[T]) -> &[u8] {
    bytemuck::cast_slice(v)
}

pub fn cast_slice_mut<T: Pod>(v: &mut [T]) -> &mut [u8] {
    bytemuck::cast_slice_mut(v)
}

pub fn expect_exact_len(actual: usize, expected: usize) -> Result<(), String> {
    if actual == expected {
        Ok(())
    } else {
        Err(format!("expected {expected} bytes, got {actual}"))
    }
}

/// A per-peer element count.
#[repr(C)]
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Pod, Zeroable)]
pub struct WireCount {
    pub n_le: u64,
}

impl WireCount {
    pub fn new(n: usize) -> Self {
        Self {
            n_le: (n as u64).to_le(),
        }
    }

    pub fn get(&self) -> usize {
        u64::from_le(self.n_le) as usize
    }
}

/// A `(head, partner)` configuration pair in the target ordering.
#[repr(C)]
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Pod, Zeroable)]
pub struct WirePair {
    pub head_le: u64,
    pub partner_le: u64,
}

impl WirePair {
    pub fn new<B: BitPattern>(head: B, partner: B) -> Self {
        Self {
            head_le: head.to_u64().to_le(),
            partner_le: partner.to_u64().to_le(),
        }
    }

    pub fn head<B: BitPattern>(&self) -> B {
        B::from_u64(u64::from_le(self.head_le))
    }

    pub fn partner<B: BitPattern>(&self) -> B {
        B::from_u64(u64::from_le(self.partner_le))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn records_are_little_endian() {
        let c = WireCount::new(0x0102);
        assert_eq!(&cast_slice(std::slice::from_ref(&c))[..2], &[0x02, 0x01]);
        let p = WirePair::new(0b1010u16, 0b0101u16);
        assert_eq!(p.head::<u16>(), 0b1010);
        assert_eq!(p.partner::<u16>(), 0b0101);
        assert_eq!(std::mem::size_of::<WirePair>(), 16);
    }

    #[test]
    fn length_check_message() {
        assert!(expect_exact_len(8, 8).is_ok());
        assert_eq!(
            expect_exact_len(4, 8).unwrap_err(),
            "expected 8 bytes, got 4"
        );
    }
}
