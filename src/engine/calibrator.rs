//! Percentile threshold calibration.
//!
//! After at least one full disk revolution the marker occupies the top few
//! percent of the reflectance distribution, so the 98th percentile of a full
//! buffer isolates marker samples independent of sensor gain.

use super::buffer::SampleBuffer;

/// Statistics derived from one complete calibration pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CalibrationResult {
    pub min: u16,
    pub max: u16,
    /// Trimmed spread: 99th minus 1st percentile.
    pub spread: u16,
    /// Marker threshold, zero when the pass failed.
    pub threshold: u16,
}

impl CalibrationResult {
    pub fn succeeded(&self) -> bool {
        self.threshold > 0
    }
}

/// Derive a [`CalibrationResult`] from the buffer's current contents.
///
/// The threshold is accepted only if the trimmed spread reaches
/// `spread_min`; otherwise it is zero and counting stays disabled.
pub fn calibrate(buffer: &SampleBuffer, spread_min: u16) -> CalibrationResult {
    let sorted = buffer.sorted_snapshot();
    let n = sorted.len();

    let min = sorted[0];
    let max = sorted[n - 1];
    let spread = sorted[percentile_index(n, 99)].saturating_sub(sorted[percentile_index(n, 1)]);

    let threshold = if spread >= spread_min {
        sorted[percentile_index(n, 98)]
    } else {
        0
    };

    CalibrationResult {
        min,
        max,
        spread,
        threshold,
    }
}

/// `floor(n * pct / 100)`, kept inside the slice.
fn percentile_index(n: usize, pct: usize) -> usize {
    (n * pct / 100).min(n - 1)
}
