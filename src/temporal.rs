use crate::error::{LaneError, Result};
use ndarray::Array2;
use std::collections::VecDeque;

/// Per-pixel lane confidence in [0, 255], shape `(height, width)`
pub type Mask = Array2<f32>;

/// Number of recent masks averaged per stream
pub const HISTORY_CAPACITY: usize = 5;

/// Width and height of a mask
pub fn mask_dimensions(mask: &Mask) -> (u32, u32) {
    let (height, width) = mask.dim();
    (width as u32, height as u32)
}

/// Temporal smoother for lane masks using a fixed-size FIFO window.
///
/// Owned by exactly one stream. Appending at capacity evicts the oldest mask,
/// so the window never holds more than `capacity` entries.
#[derive(Debug, Clone)]
pub struct TemporalAverager {
    history: VecDeque<Mask>,
    capacity: usize,
}

impl Default for TemporalAverager {
    fn default() -> Self {
        Self::new()
    }
}

impl TemporalAverager {
    pub fn new() -> Self {
        Self::with_capacity(HISTORY_CAPACITY)
    }

    /// Create an averager over the `capacity` most recent masks (at least one).
    pub fn with_capacity(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            history: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    /// Push a mask onto the window, evicting the oldest one when full.
    pub fn append(&mut self, mask: Mask) -> Result<()> {
        self.check_shape(&mask)?;

        if self.history.len() == self.capacity {
            self.history.pop_front();
        }
        self.history.push_back(mask);

        Ok(())
    }

    /// Elementwise mean of the masks currently held.
    ///
    /// Returns `None` before the first append.
    pub fn current(&self) -> Option<Mask> {
        let first = self.history.front()?;
        let mut sum = Array2::<f32>::zeros(first.raw_dim());
        for mask in &self.history {
            sum += mask;
        }
        Some(sum / self.history.len() as f32)
    }

    /// The mean `current()` would return after appending `incoming`.
    ///
    /// Does not touch the window; lets a caller finish all fallible work for a
    /// frame before committing its mask.
    pub fn mean_with(&self, incoming: &Mask) -> Result<Mask> {
        self.check_shape(incoming)?;

        // At capacity the oldest entry drops out of the window
        let skip = usize::from(self.history.len() == self.capacity);
        let mut sum = incoming.clone();
        let mut count = 1usize;
        for mask in self.history.iter().skip(skip) {
            sum += mask;
            count += 1;
        }

        Ok(sum / count as f32)
    }

    pub fn len(&self) -> usize {
        self.history.len()
    }

    pub fn is_empty(&self) -> bool {
        self.history.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Forget every mask (scene cut, stream restart)
    pub fn reset(&mut self) {
        self.history.clear();
    }

    fn check_shape(&self, mask: &Mask) -> Result<()> {
        match self.history.front() {
            Some(held) if held.dim() != mask.dim() => Err(LaneError::DimensionMismatch {
                expected: mask_dimensions(held),
                actual: mask_dimensions(mask),
            }),
            _ => Ok(()),
        }
    }
}
