//! Application service, the hexagonal core.
//!
//! [`AppService`] owns the counting engine and the live configuration.
//! All I/O flows through port traits injected at call sites, making the
//! entire service testable with mock adapters.
//!
//! ```text
//!  SampleSource ──▶ ┌────────────────────────┐ ──▶ EventSink
//!                   │       AppService        │ ──▶ PublishPort
//!   RadioPort ◀──── │  Engine · slow duties   │ ◀─▶ PersistencePort
//!                   └────────────────────────┘
//! ```

use log::{info, warn};

use crate::config::MeterConfig;
use crate::engine::meter::PersistedState;
use crate::engine::{Engine, EngineMode, EngineStatus, TickOutcome};
use crate::error::Result;

use super::commands::AppCommand;
use super::events::AppEvent;
use super::ports::{
    ConfigPort, DebugTelemetry, EventSink, MeterReading, MeterStatus, PersistencePort,
    PublishPort, RadioPort, SampleSource,
};

/// Slow ticks without a connection between reconnect requests.
pub const RECONNECT_EVERY_TICKS: u32 = 30;

/// What the host must do after a command.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HostAction {
    Continue,
    /// State is flushed; reboot the device.
    Reboot,
}

// ───────────────────────────────────────────────────────────────
// AppService
// ───────────────────────────────────────────────────────────────

pub struct AppService {
    engine: Engine,
    /// Latest accepted settings, including sampling values pending restart.
    config: MeterConfig,
    slow_ticks: u64,
    publish_pending: bool,
    offline_ticks: u32,
    reconnects: u32,
}

impl AppService {
    /// Build the engine from configuration and restored state.
    ///
    /// Fails only if the sample buffer cannot be allocated.
    pub fn new(config: MeterConfig, persisted: &PersistedState) -> Result<Self> {
        let engine = Engine::new(&config, persisted)?;
        Ok(Self {
            engine,
            config,
            slow_ticks: 0,
            publish_pending: false,
            offline_ticks: 0,
            reconnects: 0,
        })
    }

    // ── Lifecycle ─────────────────────────────────────────────

    pub fn start(&mut self, radio: &mut impl RadioPort, sink: &mut impl EventSink) {
        radio.set_power_saving(self.config.power_saving);
        let meter = self.engine.meter();
        sink.emit(&AppEvent::Started {
            total: meter.total_rotations,
            threshold: self.engine.threshold(),
        });
        info!(
            "AppService started: {} rotations, threshold {}",
            meter.total_rotations,
            self.engine.threshold()
        );
    }

    // ── Fast tick ─────────────────────────────────────────────

    /// Take one sample and run it through the engine.
    pub fn on_fast_tick(
        &mut self,
        now_ms: u64,
        source: &mut impl SampleSource,
        telemetry: &mut impl DebugTelemetry,
        sink: &mut impl EventSink,
    ) -> TickOutcome {
        let sample = source.read();
        if self.config.debug_telemetry {
            telemetry.emit(
                self.engine.meter().total_rotations,
                self.engine.effective_threshold(),
                sample,
            );
        }

        let outcome = self.engine.fast_tick(sample, now_ms);
        match outcome {
            TickOutcome::Calibrated(result) => {
                sink.emit(&AppEvent::CalibrationFinished(result));
            }
            TickOutcome::Rotation { total } => {
                self.publish_pending = self.config.publish_enabled;
                sink.emit(&AppEvent::RotationCounted {
                    total,
                    consumption_kwh: self.engine.consumption_kwh(),
                    power: self.engine.power(now_ms),
                });
            }
            TickOutcome::EdgeSuppressed => sink.emit(&AppEvent::EdgeSuppressed),
            TickOutcome::Nothing | TickOutcome::Calibrating => {}
        }
        outcome
    }

    // ── Slow tick ─────────────────────────────────────────────

    /// Once-per-second duties: publish, radio health, periodic backup.
    pub fn on_slow_tick(
        &mut self,
        now_ms: u64,
        store: &mut impl PersistencePort,
        publisher: &mut impl PublishPort,
        radio: &mut impl RadioPort,
        sink: &mut impl EventSink,
    ) {
        self.slow_ticks += 1;

        if self.config.publish_enabled {
            let periodic = self.slow_ticks % u64::from(self.config.publish_interval_secs.max(1)) == 0;
            // A sleeping radio defers rotation publishes to the periodic one.
            let pending = self.publish_pending
                && (radio.is_connected() || !self.config.power_saving);
            if pending || periodic {
                self.publish(now_ms, publisher, &*radio, sink);
            }
        }
        self.publish_pending = false;

        self.check_radio(radio, sink);

        let backup_ticks = u64::from(self.config.backup_cycle_min.max(1)) * 60;
        if self.slow_ticks % backup_ticks == 0 {
            self.flush(store, sink);
        }
    }

    fn publish(
        &mut self,
        now_ms: u64,
        publisher: &mut impl PublishPort,
        radio: &impl RadioPort,
        sink: &mut impl EventSink,
    ) {
        let reading = self.reading(now_ms, radio.rssi());
        match publisher.publish(&reading) {
            Ok(()) => sink.emit(&AppEvent::Published {
                total: reading.counter,
            }),
            Err(e) => {
                warn!("publish failed: {}", e);
                sink.emit(&AppEvent::PublishFailed(e));
            }
        }
    }

    fn check_radio(&mut self, radio: &mut impl RadioPort, sink: &mut impl EventSink) {
        // Duty-cycled radio is expected to be down between publishes.
        if radio.is_connected() || (self.config.power_saving && !self.engine.radio_on()) {
            self.offline_ticks = 0;
            return;
        }
        self.offline_ticks += 1;
        if self.offline_ticks >= RECONNECT_EVERY_TICKS {
            self.offline_ticks = 0;
            self.reconnects += 1;
            info!("radio offline, reconnect attempt {}", self.reconnects);
            radio.reconnect();
            sink.emit(&AppEvent::RadioReconnect {
                attempts: self.reconnects,
            });
        }
    }

    // ── Command handling ──────────────────────────────────────

    /// Apply an external command.  Only call between ticks.
    pub fn handle_command(
        &mut self,
        cmd: AppCommand,
        now_ms: u64,
        store: &mut (impl PersistencePort + ConfigPort),
        radio: &mut impl RadioPort,
        sink: &mut impl EventSink,
    ) -> HostAction {
        match cmd {
            AppCommand::BeginCalibration => {
                if self.engine.begin_calibration() {
                    sink.emit(&AppEvent::CalibrationStarted);
                }
            }
            AppCommand::CancelCalibration => {
                if self.engine.cancel_calibration() {
                    sink.emit(&AppEvent::CalibrationCancelled {
                        threshold: self.engine.threshold(),
                    });
                }
            }
            AppCommand::ResetCounters => {
                self.engine.reset_counters();
                sink.emit(&AppEvent::CountersReset);
                self.flush(store, sink);
            }
            AppCommand::ApplySettings(next) => {
                self.apply_settings(next, now_ms, store, radio, sink);
            }
            AppCommand::SetConsumption(kwh) => match self.engine.set_consumption(kwh) {
                Ok(()) => {
                    sink.emit(&AppEvent::ConsumptionSet { kwh });
                    self.flush(store, sink);
                }
                Err(e) => {
                    warn!("consumption {} rejected: {}", kwh, e);
                    sink.emit(&AppEvent::ConsumptionRejected(e));
                }
            },
            AppCommand::SaveState => self.flush(store, sink),
            AppCommand::Restart => {
                info!("restart requested");
                self.flush(store, sink);
                return HostAction::Reboot;
            }
            AppCommand::FactoryReset => {
                warn!("factory reset");
                self.engine.factory_reset();
                self.engine.reset_drift(now_ms);
                self.config = MeterConfig::default();
                self.engine.apply_config(&self.config);
                if let Err(e) = store.erase_all() {
                    warn!("storage erase failed: {}", e);
                    sink.emit(&AppEvent::FlushFailed(e));
                }
                return HostAction::Reboot;
            }
            AppCommand::RadioPowerChanged(on) => {
                self.engine.radio_changed(on, now_ms);
            }
        }
        HostAction::Continue
    }

    fn apply_settings(
        &mut self,
        next: MeterConfig,
        now_ms: u64,
        config_store: &mut impl ConfigPort,
        radio: &mut impl RadioPort,
        sink: &mut impl EventSink,
    ) {
        if let Err(e) = next.validate() {
            warn!("settings rejected: {}", e);
            sink.emit(&AppEvent::SettingsRejected(e));
            return;
        }
        if let Err(e) = config_store.save(&next) {
            warn!("settings not persisted: {}", e);
            sink.emit(&AppEvent::SettingsRejected(e));
            return;
        }

        let restart = self.config.sampling_differs(&next);
        if next.power_saving != self.config.power_saving {
            radio.set_power_saving(next.power_saving);
            if !next.power_saving {
                self.engine.reset_drift(now_ms);
            }
        }
        self.engine.apply_config(&next);
        self.config = next;
        info!("settings applied");
        sink.emit(&AppEvent::SettingsApplied);
        if restart {
            info!("sampling parameters changed, restart required");
            sink.emit(&AppEvent::RestartRequired);
        }
    }

    fn flush(&mut self, store: &mut impl PersistencePort, sink: &mut impl EventSink) {
        let state = self.engine.persisted();
        match store.save_state(&state) {
            Ok(()) => sink.emit(&AppEvent::StateFlushed {
                total: state.meter.total_rotations,
            }),
            Err(e) => {
                warn!("state flush failed: {}", e);
                sink.emit(&AppEvent::FlushFailed(e));
            }
        }
    }

    // ── Queries ───────────────────────────────────────────────

    /// Current reading for publishing or the local status page.
    pub fn reading(&self, now_ms: u64, rssi: Option<i8>) -> MeterReading {
        MeterReading {
            counter: self.engine.meter().total_rotations,
            consumption_kwh: self.engine.consumption_kwh(),
            power: self.engine.power(now_ms),
            uptime_secs: now_ms / 1000,
            rssi,
            status: self.meter_status(),
        }
    }

    pub fn meter_status(&self) -> MeterStatus {
        match self.engine.mode() {
            EngineMode::Idle => MeterStatus::Uncalibrated,
            EngineMode::Calibrating { .. } => MeterStatus::Calibrating,
            EngineMode::Counting => MeterStatus::Counting,
        }
    }

    pub fn engine_status(&self) -> EngineStatus {
        self.engine.status()
    }

    pub fn is_calibrating(&self) -> bool {
        self.engine.is_calibrating()
    }

    /// The radio-on drift baseline has been measured at least once.
    pub fn has_drift_baseline(&self) -> bool {
        self.engine.drift_baseline().is_some()
    }

    /// Radio is down and not by duty-cycling.
    pub fn is_offline(&self) -> bool {
        self.offline_ticks > 0
    }

    /// Live configuration, including values pending restart.
    pub fn config(&self) -> &MeterConfig {
        &self.config
    }

    pub fn persisted(&self) -> PersistedState {
        self.engine.persisted()
    }

    pub fn slow_ticks(&self) -> u64 {
        self.slow_ticks
    }
}
