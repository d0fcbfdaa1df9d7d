//! Ring buffer of raw sensor samples.
//!
//! Capacity is fixed at construction from the sampling configuration and
//! never changes for the lifetime of the process.  The live buffer stays in
//! temporal order; percentile work runs on a sorted copy.

use crate::error::{Error, Result};

/// Fixed-capacity circular history of sensor samples.
#[derive(Debug, Clone)]
pub struct SampleBuffer {
    samples: Vec<u16>,
    /// Slot the next sample will be written to.
    index: usize,
}

impl SampleBuffer {
    /// Allocate a buffer of `capacity` zeroed slots.
    ///
    /// Fails with [`Error::Init`] if `capacity` is zero or the heap cannot
    /// satisfy the request.  The caller treats either as fatal.
    pub fn new(capacity: usize) -> Result<Self> {
        if capacity == 0 {
            return Err(Error::Init("sample buffer capacity is zero"));
        }
        let mut samples = Vec::new();
        samples
            .try_reserve_exact(capacity)
            .map_err(|_| Error::Init("sample buffer allocation failed"))?;
        samples.resize(capacity, 0);
        Ok(Self { samples, index: 0 })
    }

    /// Number of slots.
    pub fn capacity(&self) -> usize {
        self.samples.len()
    }

    /// Slot the next push will overwrite.
    pub fn write_index(&self) -> usize {
        self.index
    }

    /// Store `sample` over the oldest slot and advance, wrapping to zero.
    pub fn push(&mut self, sample: u16) {
        self.samples[self.index] = sample;
        self.index += 1;
        if self.index >= self.samples.len() {
            self.index = 0;
        }
    }

    /// Restart writing at slot zero.  Older samples stay readable until
    /// the next lap overwrites them.
    pub fn rewind(&mut self) {
        self.index = 0;
    }

    /// Ascending-sorted copy of every slot.
    pub fn sorted_snapshot(&self) -> Vec<u16> {
        let mut copy = self.samples.clone();
        copy.sort_unstable();
        copy
    }

    /// Mean of the `count` samples ending just before `from_index`,
    /// walking backward with wrap-around.
    ///
    /// `count` is clamped to the capacity; a count of zero yields zero.
    pub fn average(&self, count: usize, from_index: usize) -> u16 {
        let count = count.min(self.samples.len());
        if count == 0 {
            return 0;
        }
        let mut i = from_index % self.samples.len();
        let mut sum: u32 = 0;
        for _ in 0..count {
            i = self.prev(i);
            sum += u32::from(self.samples[i]);
        }
        (sum / count as u32) as u16
    }

    /// Samples from newest to oldest, each slot visited at most once.
    pub fn iter_newest(&self) -> impl Iterator<Item = u16> + '_ {
        let len = self.samples.len();
        let start = self.index;
        (1..=len).map(move |k| self.samples[(start + len - k) % len])
    }

    fn prev(&self, i: usize) -> usize {
        if i == 0 { self.samples.len() - 1 } else { i - 1 }
    }
}
