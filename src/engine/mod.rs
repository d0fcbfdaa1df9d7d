//! Sensing, calibration and rotation-counting engine.
//!
//! ```text
//!   sample ──▶ SampleBuffer ──┬──▶ calibrator   (Calibrating)
//!                             └──▶ EdgeDetector (Counting) ──▶ MeterState
//!                                        ▲                 └─▶ PowerEstimator
//!                                        └── DriftCompensator offset
//! ```
//!
//! The engine is owned by the application service and mutated only from
//! the fast tick.  External requests reach it as commands applied between
//! ticks.

pub mod buffer;
pub mod calibrator;
pub mod detector;
pub mod drift;
pub mod meter;
pub mod power;

use log::{info, warn};

use crate::app::ports::ConfigError;
use crate::config::MeterConfig;
use crate::error::Result;

use buffer::SampleBuffer;
use calibrator::CalibrationResult;
use detector::{EdgeDetector, EdgeOutcome};
use drift::DriftCompensator;
use meter::{MeterState, PersistedState};
use power::{PowerEstimator, PowerReading};

/// Operating mode of the engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EngineMode {
    /// Uncalibrated; samples are buffered but nothing is counted.
    Idle,
    /// Refilling the buffer for a new threshold.  The previous threshold is
    /// kept so a cancel can restore it.
    Calibrating { prior_threshold: u16 },
    /// Calibrated and counting rotations.
    Counting,
}

/// What a single fast tick produced.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickOutcome {
    Nothing,
    /// Calibration is still filling the buffer.
    Calibrating,
    /// Calibration pass completed, successfully or not.
    Calibrated(CalibrationResult),
    /// A verified rotation; carries the new total.
    Rotation { total: u32 },
    /// An edge was dropped because the drift offset is not yet known.
    EdgeSuppressed,
}

/// Snapshot for the local status page.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
pub struct EngineStatus {
    pub threshold: u16,
    pub calibrating: bool,
    pub index: usize,
    pub size: usize,
    pub min: u16,
    pub max: u16,
    pub spread: u16,
}

pub struct Engine {
    config: MeterConfig,
    buffer: SampleBuffer,
    mode: EngineMode,
    threshold: u16,
    last_calibration: CalibrationResult,
    detector: EdgeDetector,
    power: PowerEstimator,
    drift: DriftCompensator,
    meter: MeterState,
}

impl Engine {
    /// Allocate the sample buffer and restore persisted counters.
    ///
    /// Buffer allocation failure is fatal for the device.
    pub fn new(config: &MeterConfig, persisted: &PersistedState) -> Result<Self> {
        let buffer = SampleBuffer::new(config.buffer_capacity())?;
        let mode = if persisted.threshold > 0 {
            EngineMode::Counting
        } else {
            EngineMode::Idle
        };
        info!(
            "engine: buffer {} samples, threshold {}, total {}",
            buffer.capacity(),
            persisted.threshold,
            persisted.meter.total_rotations
        );
        Ok(Self {
            config: config.clone(),
            buffer,
            mode,
            threshold: persisted.threshold,
            last_calibration: CalibrationResult::default(),
            detector: EdgeDetector::new(config),
            power: PowerEstimator::new(config),
            drift: DriftCompensator::new(persisted.drift_baseline),
            meter: persisted.meter,
        })
    }

    // ── Fast tick ────────────────────────────────────────────────

    /// Feed one sample taken at `now_ms`.
    pub fn fast_tick(&mut self, sample: u16, now_ms: u64) -> TickOutcome {
        self.buffer.push(sample);
        self.drift
            .update(now_ms, &self.buffer, self.config.sample_interval_ms);

        match self.mode {
            EngineMode::Calibrating { .. } => {
                if self.buffer.write_index() != 0 {
                    return TickOutcome::Calibrating;
                }
                let result = calibrator::calibrate(&self.buffer, self.config.spread_min);
                self.finish_calibration(result);
                TickOutcome::Calibrated(result)
            }
            EngineMode::Idle => TickOutcome::Nothing,
            EngineMode::Counting => {
                let outcome = self.detector.evaluate(
                    sample,
                    self.effective_threshold(),
                    &self.buffer,
                    now_ms,
                    self.drift.is_unverified(),
                );
                match outcome {
                    EdgeOutcome::None => TickOutcome::Nothing,
                    EdgeOutcome::Suppressed => TickOutcome::EdgeSuppressed,
                    EdgeOutcome::Accepted { interval_tenths } => {
                        self.meter.record_rotation();
                        self.power.record(now_ms, interval_tenths);
                        TickOutcome::Rotation {
                            total: self.meter.total_rotations,
                        }
                    }
                }
            }
        }
    }

    fn finish_calibration(&mut self, result: CalibrationResult) {
        self.last_calibration = result;
        self.threshold = result.threshold;
        self.detector.reset();
        if result.succeeded() {
            info!(
                "calibration succeeded: threshold {} (min {}, max {}, spread {})",
                result.threshold, result.min, result.max, result.spread
            );
            self.mode = EngineMode::Counting;
        } else {
            warn!(
                "calibration failed: spread {} below minimum {} (min {}, max {})",
                result.spread, self.config.spread_min, result.min, result.max
            );
            self.mode = EngineMode::Idle;
        }
    }

    // ── Requests (applied between ticks) ─────────────────────────

    /// Start a calibration pass.  Returns `false` if one is already running.
    pub fn begin_calibration(&mut self) -> bool {
        if matches!(self.mode, EngineMode::Calibrating { .. }) {
            return false;
        }
        info!("calibration started");
        self.mode = EngineMode::Calibrating {
            prior_threshold: self.threshold,
        };
        self.buffer.rewind();
        self.detector.reset();
        self.last_calibration = CalibrationResult::default();
        true
    }

    /// Abort a running calibration and restore the prior threshold.
    pub fn cancel_calibration(&mut self) -> bool {
        let EngineMode::Calibrating { prior_threshold } = self.mode else {
            return false;
        };
        info!("calibration cancelled, threshold back to {prior_threshold}");
        self.threshold = prior_threshold;
        self.mode = if prior_threshold > 0 {
            EngineMode::Counting
        } else {
            EngineMode::Idle
        };
        self.detector.reset();
        true
    }

    pub fn reset_counters(&mut self) {
        info!(
            "counters reset (was {} rotations)",
            self.meter.total_rotations
        );
        self.meter.reset();
        self.power.clear();
    }

    /// Align the reported kWh with the physical register.
    pub fn set_consumption(&mut self, kwh: f64) -> core::result::Result<(), ConfigError> {
        self.meter.set_consumption(kwh, self.config.turns_per_kwh)?;
        info!(
            "consumption set to {kwh:.2} kWh (offset {} hundredths)",
            self.meter.offset_hundredths
        );
        Ok(())
    }

    /// Adopt new settings.  Sampling parameters size the buffer and stay at
    /// their boot values until restart.
    pub fn apply_config(&mut self, config: &MeterConfig) {
        let mut active = config.clone();
        active.sample_interval_ms = self.config.sample_interval_ms;
        active.buffer_secs = self.config.buffer_secs;
        self.detector.reconfigure(&active);
        self.power.reconfigure(&active);
        self.config = active;
    }

    /// Counters and threshold back to zero.
    pub fn factory_reset(&mut self) {
        self.meter.reset();
        self.power.clear();
        self.detector.reset();
        self.threshold = 0;
        self.mode = EngineMode::Idle;
    }

    pub fn radio_changed(&mut self, on: bool, now_ms: u64) {
        info!("radio {}", if on { "on" } else { "off" });
        self.drift.on_radio_change(on, now_ms);
    }

    /// Continuous-radio mode resumed.
    pub fn reset_drift(&mut self, now_ms: u64) {
        self.drift.reset(now_ms);
    }

    // ── Queries ──────────────────────────────────────────────────

    pub fn mode(&self) -> EngineMode {
        self.mode
    }

    pub fn is_calibrating(&self) -> bool {
        matches!(self.mode, EngineMode::Calibrating { .. })
    }

    pub fn radio_on(&self) -> bool {
        self.drift.radio_on()
    }

    /// Radio-on sensor baseline, once measured.
    pub fn drift_baseline(&self) -> Option<u16> {
        self.drift.baseline_on()
    }

    pub fn threshold(&self) -> u16 {
        self.threshold
    }

    /// Threshold plus the drift offset.
    pub fn effective_threshold(&self) -> i32 {
        i32::from(self.threshold) + self.drift.offset()
    }

    pub fn meter(&self) -> MeterState {
        self.meter
    }

    pub fn consumption_kwh(&self) -> f64 {
        self.meter.consumption_kwh(self.config.turns_per_kwh)
    }

    pub fn power(&self, now_ms: u64) -> PowerReading {
        self.power.estimate(now_ms)
    }

    pub fn config(&self) -> &MeterConfig {
        &self.config
    }

    pub fn persisted(&self) -> PersistedState {
        PersistedState {
            meter: self.meter,
            threshold: self.threshold,
            drift_baseline: self.drift.baseline_on(),
        }
    }

    pub fn status(&self) -> EngineStatus {
        EngineStatus {
            threshold: self.threshold,
            calibrating: self.is_calibrating(),
            index: self.buffer.write_index(),
            size: self.buffer.capacity(),
            min: self.last_calibration.min,
            max: self.last_calibration.max,
            spread: self.last_calibration.spread,
        }
    }
}
