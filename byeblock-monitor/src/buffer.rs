//! Rolling sample window shared by the probe loop and its readers.

use std::collections::VecDeque;

use byeblock_core::{Error, LatencySample, Result};
use parking_lot::RwLock;

/// Fixed-size rolling window of the most recent samples, oldest first.
///
/// The window always holds exactly `capacity` entries: it starts filled with
/// sentinels and every push evicts the oldest entry. Readers only ever get a
/// copy taken under the lock, so a redraw never observes a half-applied push.
#[derive(Debug)]
pub struct SampleBuffer {
    samples: RwLock<VecDeque<LatencySample>>,
    capacity: usize,
}

impl SampleBuffer {
    /// Creates a window pre-filled with `capacity` sentinel samples.
    ///
    /// # Errors
    /// Returns [`Error::Config`] when `capacity == 0`.
    pub fn new(capacity: usize) -> Result<Self> {
        if capacity == 0 {
            return Err(Error::config("sample window capacity must be greater than zero"));
        }
        let mut samples = VecDeque::with_capacity(capacity);
        samples.resize(capacity, LatencySample::failure());
        Ok(Self { samples: RwLock::new(samples), capacity })
    }

    /// Number of entries, fixed at construction.
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Appends `sample` and evicts the oldest entry.
    pub fn push(&self, sample: LatencySample) {
        let mut samples = self.samples.write();
        samples.pop_front();
        samples.push_back(sample);
    }

    /// Consistent copy of the whole window, oldest first.
    pub fn snapshot(&self) -> Vec<LatencySample> {
        self.samples.read().iter().copied().collect()
    }

    /// Most recently pushed entry.
    pub fn latest(&self) -> Option<LatencySample> {
        self.samples.read().back().copied()
    }
}
