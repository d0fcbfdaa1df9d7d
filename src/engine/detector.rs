//! Debounced rising-edge detection.
//!
//! A rotation is accepted when enough consecutive samples sit at or above
//! the effective threshold and the buffer history confirms a genuine
//! below-to-above transition: scanning backward from the newest sample,
//! a contiguous above run no longer than the trigger count must be
//! preceded by a contiguous below run of at least half the debounce time.
//! A marker that dwells under the sensor past the debounce interval is
//! therefore counted once.

use super::buffer::SampleBuffer;
use crate::config::MeterConfig;

/// Result of feeding one sample to the detector.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EdgeOutcome {
    /// No rotation on this sample.
    None,
    /// Verified rotation.  `interval_tenths` is the time since the previous
    /// accepted rotation, absent for the first one.
    Accepted { interval_tenths: Option<u32> },
    /// Edge seen while the drift offset is unverified; dropped.
    Suppressed,
}

/// Per-tick transient detection state.  Never persisted.
#[derive(Debug, Clone)]
pub struct EdgeDetector {
    above_count: u16,
    last_accepted_ms: Option<u64>,
    trigger: u16,
    below_required: usize,
    debounce_ms: u64,
}

impl EdgeDetector {
    pub fn new(config: &MeterConfig) -> Self {
        Self {
            above_count: 0,
            last_accepted_ms: None,
            trigger: u16::from(config.above_threshold_trigger.max(1)),
            below_required: config.below_threshold_trigger(),
            debounce_ms: u64::from(config.debounce_ms),
        }
    }

    /// Pick up new trigger/debounce settings without losing state.
    pub fn reconfigure(&mut self, config: &MeterConfig) {
        self.trigger = u16::from(config.above_threshold_trigger.max(1));
        self.below_required = config.below_threshold_trigger();
        self.debounce_ms = u64::from(config.debounce_ms);
    }

    pub fn reset(&mut self) {
        self.above_count = 0;
        self.last_accepted_ms = None;
    }

    pub fn above_count(&self) -> u16 {
        self.above_count
    }

    pub fn last_accepted_ms(&self) -> Option<u64> {
        self.last_accepted_ms
    }

    /// Evaluate the newest sample, which must already be in `buffer`.
    pub fn evaluate(
        &mut self,
        sample: u16,
        threshold: i32,
        buffer: &SampleBuffer,
        now_ms: u64,
        drift_unverified: bool,
    ) -> EdgeOutcome {
        if let Some(prev) = self.last_accepted_ms {
            if now_ms.saturating_sub(prev) < self.debounce_ms {
                return EdgeOutcome::None;
            }
        }

        if i32::from(sample) >= threshold {
            self.above_count = self.above_count.saturating_add(1);
        } else {
            self.above_count = 0;
            return EdgeOutcome::None;
        }

        if self.above_count < self.trigger || !self.rising_edge(buffer, threshold) {
            return EdgeOutcome::None;
        }

        if drift_unverified {
            log::debug!("edge suppressed: drift offset not yet measured");
            self.above_count = 0;
            return EdgeOutcome::Suppressed;
        }

        let interval_tenths = self
            .last_accepted_ms
            .map(|prev| (now_ms.saturating_sub(prev) / 100) as u32);
        self.last_accepted_ms = Some(now_ms);
        self.above_count = 0;
        EdgeOutcome::Accepted { interval_tenths }
    }

    /// Backward scan over at most one lap of the buffer.
    fn rising_edge(&self, buffer: &SampleBuffer, threshold: i32) -> bool {
        let mut above = 0usize;
        let mut below = 0usize;

        for s in buffer.iter_newest() {
            let is_above = i32::from(s) >= threshold;
            if below == 0 {
                if is_above {
                    above += 1;
                    // Stale edge: the marker has been in view since before the trigger.
                    if above > usize::from(self.trigger) {
                        return false;
                    }
                    continue;
                }
                if above < usize::from(self.trigger) {
                    return false;
                }
            } else if is_above {
                return false;
            }
            below += 1;
            if below >= self.below_required {
                return true;
            }
        }
        false
    }
}
