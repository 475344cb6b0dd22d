use crate::bits::{BitPattern, low_mask};
use crate::combinatorics::binomial;

/// All patterns with `k` of the lowest `n` bits set, ascending.
///
/// Uses Gosper's hack, so the walk order is the numeric (colex) order that
/// [`LinTable`](super::LinTable) ranks.
#[derive(Clone, Debug)]
pub struct Combinations<B: BitPattern> {
    next: Option<B>,
    remaining: usize,
}

impl<B: BitPattern> Combinations<B> {
    pub fn new(n: usize, k: usize) -> Self {
        let remaining = binomial(n, k);
        let next = if remaining == 0 { None } else { Some(low_mask::<B>(k)) };
        Self { next, remaining }
    }
}

impl<B: BitPattern> Iterator for Combinations<B> {
    type Item = B;

    fn next(&mut self) -> Option<B> {
        let current = self.next?;
        self.remaining -= 1;
        self.next = if self.remaining == 0 {
            None
        } else {
            // Gosper: smallest larger integer with the same popcount.
            let c = current & (!current + B::one());
            let r = current + c;
            Some((((r ^ current) >> 2) / c) | r)
        };
        Some(current)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        (self.remaining, Some(self.remaining))
    }
}

impl<B: BitPattern> ExactSizeIterator for Combinations<B> {}

/// All `2^n` patterns on the lowest `n` bits, ascending.
#[derive(Clone, Debug)]
pub struct Subsets<B: BitPattern> {
    next: u128,
    end: u128,
    _marker: std::marker::PhantomData<B>,
}

impl<B: BitPattern> Subsets<B> {
    pub fn new(n: usize) -> Self {
        Self {
            next: 0,
            end: 1u128 << n.min(64),
            _marker: std::marker::PhantomData,
        }
    }
}

impl<B: BitPattern> Iterator for Subsets<B> {
    type Item = B;

    fn next(&mut self) -> Option<B> {
        if self.next >= self.end {
            return None;
        }
        let v = B::from_u64(self.next as u64);
        self.next += 1;
        Some(v)
    }
}
