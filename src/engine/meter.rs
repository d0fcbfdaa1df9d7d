//! Authoritative meter counters and their persisted form.

use serde::{Deserialize, Serialize};

use crate::app::ports::ConfigError;

/// Largest register reading the offset can represent.
pub const MAX_CONSUMPTION_KWH: f64 = i32::MAX as f64 / 100.0;

/// Rotation counter plus the user-set consumption offset.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MeterState {
    /// Verified rotations since the last reset.  Never decreases otherwise.
    pub total_rotations: u32,
    /// Correction in hundredths of a kWh so the reading matches the
    /// physical register.
    pub offset_hundredths: i32,
}

impl MeterState {
    pub fn record_rotation(&mut self) {
        self.total_rotations = self.total_rotations.saturating_add(1);
    }

    /// `total / K + offset / 100`
    pub fn consumption_kwh(&self, turns_per_kwh: u16) -> f64 {
        f64::from(self.total_rotations) / f64::from(turns_per_kwh.max(1))
            + f64::from(self.offset_hundredths) / 100.0
    }

    /// Align the reported consumption with the register reading `kwh`.
    ///
    /// Leaves the offset untouched when `kwh` is negative, not finite, or
    /// needs an offset outside `i32` hundredths.
    pub fn set_consumption(&mut self, kwh: f64, turns_per_kwh: u16) -> Result<(), ConfigError> {
        const OUT_OF_RANGE: ConfigError =
            ConfigError::ValidationFailed("consumption must be 0 to 21474836 kWh");
        if !kwh.is_finite() || !(0.0..=MAX_CONSUMPTION_KWH).contains(&kwh) {
            return Err(OUT_OF_RANGE);
        }
        let target = (kwh * 100.0).round() as i64;
        let counted = (f64::from(self.total_rotations) * 100.0 / f64::from(turns_per_kwh.max(1)))
            .round() as i64;
        self.offset_hundredths = i32::try_from(target - counted).map_err(|_| OUT_OF_RANGE)?;
        Ok(())
    }

    pub fn reset(&mut self) {
        *self = Self::default();
    }
}

/// Everything that survives a reboot besides the configuration.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PersistedState {
    pub meter: MeterState,
    pub threshold: u16,
    pub drift_baseline: Option<u16>,
}

impl PersistedState {
    pub fn to_bytes(&self) -> Result<Vec<u8>, postcard::Error> {
        postcard::to_allocvec(self)
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self, postcard::Error> {
        postcard::from_bytes(bytes)
    }
}
