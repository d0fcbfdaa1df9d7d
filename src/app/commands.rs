//! Inbound commands to the application service.
//!
//! These represent actions requested by the outside world (the Wi-Fi
//! driver or the serial console) that the
//! [`AppService`](super::service::AppService) applies between ticks.

use crate::config::MeterConfig;

/// Commands that external adapters can send into the application core.
#[derive(Debug, Clone, PartialEq)]
pub enum AppCommand {
    /// Start a threshold calibration pass.  No-op while one is running.
    BeginCalibration,

    /// Abort calibration and keep the previous threshold.
    CancelCalibration,

    /// Zero the rotation counter and consumption offset.
    ResetCounters,

    /// Adopt imported or edited settings (validated again on apply).
    ApplySettings(MeterConfig),

    /// Align reported consumption with the meter's register (kWh).
    SetConsumption(f64),

    /// Flush counters and threshold to storage now.
    SaveState,

    /// Flush state, then reboot.
    Restart,

    /// Restore default settings, zero counters, then reboot.
    FactoryReset,

    /// The radio was switched on (`true`) or off.
    RadioPowerChanged(bool),
}
