//! Mock adapters for integration tests.
//!
//! Every mock records what the service asked of it so tests can assert on
//! the full history without touching real ADC, NVS or network.

use std::collections::VecDeque;

use ferraris::app::events::AppEvent;
use ferraris::app::ports::{
    ConfigError, ConfigPort, DebugTelemetry, EventSink, MeterReading, PersistencePort,
    PublishError, PublishPort, RadioPort, SampleSource, StorageError,
};
use ferraris::config::MeterConfig;
use ferraris::engine::meter::PersistedState;

/// Background reflectance of the bare disc.
pub const DISC: u16 = 100;
/// Reflectance while the red mark passes.
pub const MARK: u16 = 900;

// ── Scripted sensor ───────────────────────────────────────────

pub struct ScriptedSource {
    queue: VecDeque<u16>,
    idle: u16,
    pub reads: u64,
}

#[allow(dead_code)]
impl ScriptedSource {
    pub fn new(idle: u16) -> Self {
        Self {
            queue: VecDeque::new(),
            idle,
            reads: 0,
        }
    }

    pub fn push(&mut self, count: usize, value: u16) -> &mut Self {
        self.queue.extend(std::iter::repeat_n(value, count));
        self
    }

    /// One disc revolution: `low` background samples then `high` mark samples.
    pub fn push_rotation(&mut self, low: usize, high: usize) -> &mut Self {
        self.push(low, DISC).push(high, MARK)
    }

    pub fn remaining(&self) -> usize {
        self.queue.len()
    }
}

impl SampleSource for ScriptedSource {
    fn read(&mut self) -> u16 {
        self.reads += 1;
        self.queue.pop_front().unwrap_or(self.idle)
    }
}

// ── Storage ───────────────────────────────────────────────────

#[derive(Default)]
pub struct MockStore {
    pub config: Option<MeterConfig>,
    pub state: Option<PersistedState>,
    pub state_saves: u32,
    pub fail_state_saves: bool,
}

impl ConfigPort for MockStore {
    fn load(&self) -> Result<MeterConfig, ConfigError> {
        Ok(self.config.clone().unwrap_or_default())
    }

    fn save(&mut self, config: &MeterConfig) -> Result<(), ConfigError> {
        config.validate()?;
        self.config = Some(config.clone());
        Ok(())
    }
}

impl PersistencePort for MockStore {
    fn load_state(&self) -> Result<PersistedState, StorageError> {
        self.state.ok_or(StorageError::NotFound)
    }

    fn save_state(&mut self, state: &PersistedState) -> Result<(), StorageError> {
        if self.fail_state_saves {
            return Err(StorageError::IoError);
        }
        self.state = Some(*state);
        self.state_saves += 1;
        Ok(())
    }

    fn erase_all(&mut self) -> Result<(), StorageError> {
        self.config = None;
        self.state = None;
        Ok(())
    }
}

// ── Publisher ─────────────────────────────────────────────────

pub struct MockPublisher {
    pub sent: Vec<MeterReading>,
    pub connected: bool,
}

impl Default for MockPublisher {
    fn default() -> Self {
        Self {
            sent: Vec::new(),
            connected: true,
        }
    }
}

impl PublishPort for MockPublisher {
    fn publish(&mut self, reading: &MeterReading) -> Result<(), PublishError> {
        if !self.connected {
            return Err(PublishError::NotConnected);
        }
        self.sent.push(*reading);
        Ok(())
    }
}

// ── Radio ─────────────────────────────────────────────────────

pub struct MockRadio {
    pub connected: bool,
    pub power_saving: bool,
    pub reconnects: u32,
}

impl Default for MockRadio {
    fn default() -> Self {
        Self {
            connected: true,
            power_saving: false,
            reconnects: 0,
        }
    }
}

impl RadioPort for MockRadio {
    fn is_connected(&self) -> bool {
        self.connected
    }

    fn rssi(&self) -> Option<i8> {
        self.connected.then_some(-58)
    }

    fn reconnect(&mut self) {
        self.reconnects += 1;
    }

    fn set_power_saving(&mut self, enabled: bool) {
        self.power_saving = enabled;
    }
}

// ── Event sink ────────────────────────────────────────────────

#[derive(Default)]
pub struct RecordingSink {
    pub events: Vec<AppEvent>,
}

#[allow(dead_code)]
impl RecordingSink {
    pub fn count(&self, pred: impl Fn(&AppEvent) -> bool) -> usize {
        self.events.iter().filter(|e| pred(e)).count()
    }

    pub fn rotations(&self) -> usize {
        self.count(|e| matches!(e, AppEvent::RotationCounted { .. }))
    }
}

impl EventSink for RecordingSink {
    fn emit(&mut self, event: &AppEvent) {
        self.events.push(event.clone());
    }
}

// ── Debug telemetry ───────────────────────────────────────────

#[derive(Default)]
pub struct RecordingTelemetry {
    pub lines: Vec<(u32, i32, u16)>,
}

impl DebugTelemetry for RecordingTelemetry {
    fn emit(&mut self, counter: u32, threshold: i32, sample: u16) {
        self.lines.push((counter, threshold, sample));
    }
}

// ── Config helpers ────────────────────────────────────────────

/// 50 ms samples, 30 s buffer (600 slots), 2 s debounce.
#[allow(dead_code)]
pub fn test_config() -> MeterConfig {
    MeterConfig {
        sample_interval_ms: 50,
        buffer_secs: 30,
        debounce_ms: 2000,
        ..Default::default()
    }
}
