//! Port traits: the hexagonal boundary between the meter core and the
//! outside world.
//!
//! ```text
//!   Adapter ──▶ Port trait ──▶ AppService (domain)
//! ```
//!
//! Driven adapters (IR sensor, NVS, MQTT, Wi-Fi, debug exporter) implement
//! these traits.  The [`AppService`](super::service::AppService) consumes
//! them via generics, so the engine never touches hardware directly.

use serde::Serialize;

use crate::config::MeterConfig;
use crate::engine::meter::PersistedState;
use crate::engine::power::PowerReading;

// ───────────────────────────────────────────────────────────────
// Sample source (driven adapter: hardware → domain)
// ───────────────────────────────────────────────────────────────

/// One bounded analog reading of the reflectance sensor.
///
/// Implementations may block for microseconds, never longer.
pub trait SampleSource {
    fn read(&mut self) -> u16;
}

// ───────────────────────────────────────────────────────────────
// Event sink port (driven adapter: domain → logging)
// ───────────────────────────────────────────────────────────────

/// The domain emits structured [`AppEvent`](super::events::AppEvent)s
/// through this port.
pub trait EventSink {
    fn emit(&mut self, event: &super::events::AppEvent);
}

// ───────────────────────────────────────────────────────────────
// Configuration port (driven adapter: domain ↔ persistent config)
// ───────────────────────────────────────────────────────────────

/// Loads and persists the meter configuration.
///
/// Implementations MUST validate before persisting and reject invalid
/// ranges with [`ConfigError::ValidationFailed`], never clamp.
pub trait ConfigPort {
    /// Load configuration.  Returns [`MeterConfig::default()`] if none is stored.
    fn load(&self) -> Result<MeterConfig, ConfigError>;

    /// Validate and persist configuration.
    fn save(&mut self, config: &MeterConfig) -> Result<(), ConfigError>;
}

// ───────────────────────────────────────────────────────────────
// Persistence port (driven adapter: domain ↔ NVS / flash)
// ───────────────────────────────────────────────────────────────

/// Counter, threshold and drift baseline storage.
///
/// Writes MUST be atomic; a power loss mid-save leaves the previous state.
pub trait PersistencePort {
    /// Load the last saved state.  Returns the default state if none exists.
    fn load_state(&self) -> Result<PersistedState, StorageError>;

    fn save_state(&mut self, state: &PersistedState) -> Result<(), StorageError>;

    /// Erase stored configuration and state; the next boot starts from
    /// defaults.
    fn erase_all(&mut self) -> Result<(), StorageError>;
}

// ───────────────────────────────────────────────────────────────
// Publish port (driven adapter: domain → message broker)
// ───────────────────────────────────────────────────────────────

/// Coarse meter status carried with each reading.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum MeterStatus {
    Uncalibrated,
    Calibrating,
    Counting,
}

/// One meter reading handed to the broker.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MeterReading {
    pub counter: u32,
    pub consumption_kwh: f64,
    pub power: PowerReading,
    pub uptime_secs: u64,
    pub rssi: Option<i8>,
    pub status: MeterStatus,
}

/// Implementations own their connection and retry policy; the core calls
/// this once per slow tick at most and never retries.
pub trait PublishPort {
    fn publish(&mut self, reading: &MeterReading) -> Result<(), PublishError>;
}

/// An absent publisher (client not configured) is never connected.
impl<P: PublishPort> PublishPort for Option<P> {
    fn publish(&mut self, reading: &MeterReading) -> Result<(), PublishError> {
        match self {
            Some(p) => p.publish(reading),
            None => Err(PublishError::NotConnected),
        }
    }
}

// ───────────────────────────────────────────────────────────────
// Radio port (driven adapter: domain ↔ Wi-Fi)
// ───────────────────────────────────────────────────────────────

pub trait RadioPort {
    fn is_connected(&self) -> bool;

    /// Signal strength in dBm while associated.
    fn rssi(&self) -> Option<i8>;

    /// Ask the station to re-associate.  Non-blocking.
    fn reconnect(&mut self);

    /// Enter or leave duty-cycled radio operation.
    fn set_power_saving(&mut self, enabled: bool);
}

// ───────────────────────────────────────────────────────────────
// Debug telemetry (driven adapter: domain → raw sample exporter)
// ───────────────────────────────────────────────────────────────

/// Fire-and-forget raw sample stream, called once per fast tick when
/// enabled.  Failures stay inside the adapter.
pub trait DebugTelemetry {
    fn emit(&mut self, counter: u32, threshold: i32, sample: u16);
}

impl<T: DebugTelemetry> DebugTelemetry for Option<T> {
    fn emit(&mut self, counter: u32, threshold: i32, sample: u16) {
        if let Some(t) = self {
            t.emit(counter, threshold, sample);
        }
    }
}

// ───────────────────────────────────────────────────────────────
// Scheduler delegate (decouples scheduler from the service)
// ───────────────────────────────────────────────────────────────

/// Callback trait the [`Scheduler`](crate::scheduler::Scheduler) invokes
/// when a cadence is due.
pub trait SchedulerDelegate {
    /// One sample period elapsed.
    fn on_fast_tick(&mut self, now_ms: u64);

    /// One second elapsed.
    fn on_slow_tick(&mut self, now_ms: u64);
}

// ───────────────────────────────────────────────────────────────
// Error types
// ───────────────────────────────────────────────────────────────

/// Errors from [`ConfigPort`] operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigError {
    /// No config found in storage (first boot).
    NotFound,
    /// Stored config failed deserialization.
    Corrupted,
    /// A field failed range validation.  Names the field and its range.
    ValidationFailed(&'static str),
    /// Underlying storage is full.
    StorageFull,
    /// Generic I/O error from the storage backend.
    IoError,
}

/// Errors from [`PersistencePort`] operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StorageError {
    /// Requested key does not exist.
    NotFound,
    /// Storage partition is full.
    Full,
    /// Generic I/O error.
    IoError,
    /// Stored blob could not be decoded.
    Corrupted,
}

/// Errors from [`PublishPort`] operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PublishError {
    /// Broker unreachable after the client's own retries.
    NotConnected,
    /// Payload could not be encoded.
    Encode,
    /// The client rejected or dropped the message.
    Rejected,
}

impl core::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::NotFound => write!(f, "config not found"),
            Self::Corrupted => write!(f, "config corrupted"),
            Self::ValidationFailed(msg) => write!(f, "validation failed: {}", msg),
            Self::StorageFull => write!(f, "storage full"),
            Self::IoError => write!(f, "I/O error"),
        }
    }
}

impl core::fmt::Display for StorageError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::NotFound => write!(f, "key not found"),
            Self::Full => write!(f, "storage full"),
            Self::IoError => write!(f, "I/O error"),
            Self::Corrupted => write!(f, "stored state corrupted"),
        }
    }
}

impl core::fmt::Display for PublishError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::NotConnected => write!(f, "broker not connected"),
            Self::Encode => write!(f, "payload encoding failed"),
            Self::Rejected => write!(f, "message rejected"),
        }
    }
}

impl std::error::Error for ConfigError {}
impl std::error::Error for StorageError {}
impl std::error::Error for PublishError {}
