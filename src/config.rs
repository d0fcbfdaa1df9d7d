//! Meter configuration parameters
//!
//! All tunable parameters for the rotation counter and its collaborators.
//! Values can be overridden via NVS or imported from a settings export
//! produced by another device.

use serde::{Deserialize, Serialize};

use crate::app::ports::ConfigError;

/// Core meter configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MeterConfig {
    // --- Meter ---
    /// Disk rotations per kWh, printed on the meter's nameplate
    pub turns_per_kwh: u16,

    // --- Sampling ---
    /// Interval between two sensor samples (milliseconds)
    pub sample_interval_ms: u16,
    /// Length of the sample history kept in the ring buffer (seconds)
    pub buffer_secs: u16,
    /// Minimum trimmed spread for a calibration to be accepted
    pub spread_min: u16,
    /// Consecutive samples above threshold before an edge is considered
    pub above_threshold_trigger: u8,
    /// Dead time after an accepted rotation (milliseconds)
    pub debounce_ms: u16,

    // --- Power ---
    /// Estimate current power draw from rotation intervals
    pub calculate_power: bool,
    /// Moving-average window (seconds), 0 = last interval only
    pub power_avg_secs: u16,

    // --- Persistence ---
    /// Meter state backup interval (minutes)
    pub backup_cycle_min: u16,

    // --- Publishing ---
    /// Publish readings to the message broker
    pub publish_enabled: bool,
    /// Periodic publish interval (seconds)
    pub publish_interval_secs: u16,

    // --- Radio ---
    /// Duty-cycle the radio between publishes
    pub power_saving: bool,

    // --- Debug ---
    /// Stream raw samples to the debug telemetry sink
    pub debug_telemetry: bool,
}

impl Default for MeterConfig {
    fn default() -> Self {
        Self {
            turns_per_kwh: 75,

            sample_interval_ms: 25,
            buffer_secs: 90,
            spread_min: 4,
            above_threshold_trigger: 3,
            debounce_ms: 2000,

            calculate_power: true,
            power_avg_secs: 60,

            backup_cycle_min: 60,

            publish_enabled: false,
            publish_interval_secs: 60,

            power_saving: false,

            debug_telemetry: false,
        }
    }
}

impl MeterConfig {
    /// Number of slots in the sample ring buffer.
    pub fn buffer_capacity(&self) -> usize {
        if self.sample_interval_ms == 0 {
            return 0;
        }
        self.buffer_secs as usize * 1000 / self.sample_interval_ms as usize
    }

    /// Samples that must read below threshold ahead of a rising edge.
    pub fn below_threshold_trigger(&self) -> usize {
        if self.sample_interval_ms == 0 {
            return 1;
        }
        ((self.debounce_ms / 2) / self.sample_interval_ms).max(1) as usize
    }

    /// Whether `other` changes parameters that size the sample buffer.
    pub fn sampling_differs(&self, other: &MeterConfig) -> bool {
        self.sample_interval_ms != other.sample_interval_ms || self.buffer_secs != other.buffer_secs
    }

    /// Range-check every field.  Out-of-range values are rejected, never clamped.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(50..=500).contains(&self.turns_per_kwh) {
            return Err(ConfigError::ValidationFailed("turns_per_kwh must be 50–500"));
        }
        if !(15..=50).contains(&self.sample_interval_ms) {
            return Err(ConfigError::ValidationFailed(
                "sample_interval_ms must be 15–50",
            ));
        }
        if !(30..=120).contains(&self.buffer_secs) {
            return Err(ConfigError::ValidationFailed("buffer_secs must be 30–120"));
        }
        if !(3..=30).contains(&self.spread_min) {
            return Err(ConfigError::ValidationFailed("spread_min must be 3–30"));
        }
        if !(3..=8).contains(&self.above_threshold_trigger) {
            return Err(ConfigError::ValidationFailed(
                "above_threshold_trigger must be 3–8",
            ));
        }
        if !(1000..=3000).contains(&self.debounce_ms) {
            return Err(ConfigError::ValidationFailed("debounce_ms must be 1000–3000"));
        }
        if self.power_avg_secs != 0 && !(30..=300).contains(&self.power_avg_secs) {
            return Err(ConfigError::ValidationFailed(
                "power_avg_secs must be 0 or 30–300",
            ));
        }
        if !(60..=180).contains(&self.backup_cycle_min) {
            return Err(ConfigError::ValidationFailed(
                "backup_cycle_min must be 60–180",
            ));
        }
        if !(10..=900).contains(&self.publish_interval_secs) {
            return Err(ConfigError::ValidationFailed(
                "publish_interval_secs must be 10–900",
            ));
        }
        Ok(())
    }
}

/// Serialise the configuration for transfer to another device.
pub fn export_settings(config: &MeterConfig) -> Result<String, ConfigError> {
    serde_json::to_string(config).map_err(|_| ConfigError::Corrupted)
}

/// Parse and validate a settings export.
pub fn import_settings(json: &str) -> Result<MeterConfig, ConfigError> {
    let config: MeterConfig = serde_json::from_str(json).map_err(|_| ConfigError::Corrupted)?;
    config.validate()?;
    Ok(config)
}
