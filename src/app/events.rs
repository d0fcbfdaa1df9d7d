//! Outbound application events.
//!
//! The [`AppService`](super::service::AppService) emits these through the
//! [`EventSink`](super::ports::EventSink) port.  Adapters on the other side
//! decide what to do with them.

use crate::engine::calibrator::CalibrationResult;
use crate::engine::power::PowerReading;

use super::ports::{ConfigError, PublishError, StorageError};

/// Structured events emitted by the application core.
#[derive(Debug, Clone, PartialEq)]
pub enum AppEvent {
    /// The service has started with restored counters.
    Started { total: u32, threshold: u16 },

    CalibrationStarted,

    /// Calibration pass finished; `threshold == 0` means it failed.
    CalibrationFinished(CalibrationResult),

    CalibrationCancelled { threshold: u16 },

    /// A verified rotation was counted.
    RotationCounted {
        total: u32,
        consumption_kwh: f64,
        power: PowerReading,
    },

    /// An edge was dropped during an unverified drift window.
    EdgeSuppressed,

    CountersReset,

    ConsumptionSet { kwh: f64 },

    /// Register reading outside the range the offset can hold.
    ConsumptionRejected(ConfigError),

    SettingsApplied,

    SettingsRejected(ConfigError),

    /// Settings were stored but only take effect after a reboot.
    RestartRequired,

    StateFlushed { total: u32 },

    FlushFailed(StorageError),

    Published { total: u32 },

    PublishFailed(PublishError),

    /// Radio has been offline long enough to ask for re-association.
    RadioReconnect { attempts: u32 },
}
