//! Boolean enable-mask over the original operation sequence.
//!
//! The original trace is never mutated; a candidate trace is the subsequence
//! of operations whose guard bit is set. The minimizer only ever clears
//! bits, so every accepted candidate is a subset of its predecessor and the
//! enabled count strictly decreases on acceptance.

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct GuardVec {
    bits: Vec<bool>,
}

impl GuardVec {
    /// A mask with every operation enabled.
    pub fn all_enabled(len: usize) -> Self {
        Self {
            bits: vec![true; len],
        }
    }

    pub fn len(&self) -> usize {
        self.bits.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bits.is_empty()
    }

    pub fn is_enabled(&self, index: usize) -> bool {
        self.bits[index]
    }

    pub fn disable(&mut self, index: usize) {
        self.bits[index] = false;
    }

    pub fn enabled_count(&self) -> usize {
        self.bits.iter().filter(|bit| **bit).count()
    }

    /// True iff every bit enabled here is also enabled in `base`.
    /// Both vectors must cover the same operation sequence.
    pub fn is_subset_of(&self, base: &GuardVec) -> bool {
        assert_eq!(
            self.len(),
            base.len(),
            "guard vectors must have equal length"
        );
        self.bits
            .iter()
            .zip(&base.bits)
            .all(|(candidate, baseline)| !*candidate || *baseline)
    }

    /// Indices of enabled operations, in order.
    pub fn iter_enabled(&self) -> impl Iterator<Item = usize> + '_ {
        self.bits
            .iter()
            .enumerate()
            .filter_map(|(index, bit)| bit.then_some(index))
    }
}
