//! Sensor drift compensation across radio power transitions.
//!
//! Switching the radio off shifts the IR sensor's baseline.  A radio-on
//! baseline is averaged once the radio has been up for a minute; thirty
//! seconds into each outage the radio-off baseline is averaged and the
//! difference becomes the threshold offset for the rest of the outage.

use log::{info, warn};

use super::buffer::SampleBuffer;

/// Radio must be up this long before the on-baseline is taken.
pub const BASELINE_ON_DELAY_MS: u64 = 60_000;
/// Window averaged for the on-baseline.
pub const BASELINE_ON_WINDOW_MS: u64 = 30_000;
/// Radio must be down this long before the offset is taken.
pub const BASELINE_OFF_DELAY_MS: u64 = 30_000;
/// Window averaged for the off-baseline.
pub const BASELINE_OFF_WINDOW_MS: u64 = 20_000;

#[derive(Debug, Clone)]
pub struct DriftCompensator {
    radio_on: bool,
    radio_on_since: Option<u64>,
    radio_off_since: Option<u64>,
    /// On-baseline pending for the current on-period.
    baseline_pending: bool,
    baseline_on: Option<u16>,
    offset: Option<i32>,
}

impl Default for DriftCompensator {
    fn default() -> Self {
        Self::new(None)
    }
}

impl DriftCompensator {
    /// Radio assumed on since boot (uptime zero).
    pub fn new(baseline_on: Option<u16>) -> Self {
        Self {
            radio_on: true,
            radio_on_since: Some(0),
            radio_off_since: None,
            baseline_pending: true,
            baseline_on,
            offset: None,
        }
    }

    pub fn radio_on(&self) -> bool {
        self.radio_on
    }

    pub fn baseline_on(&self) -> Option<u16> {
        self.baseline_on
    }

    /// Offset to add to the threshold; zero while unset.
    pub fn offset(&self) -> i32 {
        self.offset.unwrap_or(0)
    }

    /// Radio is off and no offset has been measured for this outage.
    pub fn is_unverified(&self) -> bool {
        !self.radio_on && self.offset.is_none()
    }

    /// Record a radio power transition.  Repeated reports of the same state
    /// are ignored so the timers are not restarted.
    pub fn on_radio_change(&mut self, on: bool, now_ms: u64) {
        if on == self.radio_on {
            return;
        }
        self.radio_on = on;
        self.offset = None;
        if on {
            self.radio_on_since = Some(now_ms);
            self.radio_off_since = None;
            self.baseline_pending = true;
        } else {
            self.radio_off_since = Some(now_ms);
        }
    }

    /// Back to continuous-radio operation: drop the outage timer and offset
    /// but keep the last good on-baseline.  Without one, the on-baseline
    /// stays due and is measured from `now_ms` if the radio was off.
    pub fn reset(&mut self, now_ms: u64) {
        if !self.radio_on {
            self.radio_on_since = Some(now_ms);
        }
        self.radio_on = true;
        self.radio_off_since = None;
        self.baseline_pending = self.baseline_on.is_none();
        self.offset = None;
    }

    /// Take whichever baseline is due.  Called once per fast tick after the
    /// sample has been pushed.
    pub fn update(&mut self, now_ms: u64, buffer: &SampleBuffer, interval_ms: u16) {
        let interval = u64::from(interval_ms.max(1));

        if self.radio_on {
            let due = self.baseline_pending
                && self
                    .radio_on_since
                    .is_some_and(|since| now_ms.saturating_sub(since) >= BASELINE_ON_DELAY_MS);
            if due {
                let count = (BASELINE_ON_WINDOW_MS / interval) as usize;
                let avg = buffer.average(count, buffer.write_index());
                self.baseline_on = Some(avg);
                self.baseline_pending = false;
                info!("drift: radio-on baseline {avg}");
            }
            return;
        }

        if self.offset.is_some() {
            return;
        }
        let Some(since) = self.radio_off_since else {
            return;
        };
        if now_ms.saturating_sub(since) < BASELINE_OFF_DELAY_MS {
            return;
        }

        let count = (BASELINE_OFF_WINDOW_MS / interval) as usize;
        let off = i32::from(buffer.average(count, buffer.write_index()));
        let offset = match self.baseline_on {
            Some(on) => off - i32::from(on),
            None => {
                warn!("drift: no radio-on baseline, using zero offset");
                0
            }
        };
        self.offset = Some(offset);
        info!("drift: radio-off baseline {off}, offset {offset}");
    }
}
