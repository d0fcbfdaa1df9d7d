//! Integration tests: AppService slow-tick duties and request handling.

use ferraris::app::commands::AppCommand;
use ferraris::app::events::AppEvent;
use ferraris::app::ports::{
    ConfigError, ConfigPort, EventSink, MeterReading, PersistencePort, PublishError, PublishPort,
    RadioPort, StorageError,
};
use ferraris::app::service::{AppService, HostAction, RECONNECT_EVERY_TICKS};
use ferraris::config::MeterConfig;
use ferraris::engine::meter::{MeterState, PersistedState};

// ── Mock implementations ──────────────────────────────────────

#[derive(Default)]
struct MockNvs {
    config: Option<MeterConfig>,
    state: Option<PersistedState>,
    flushes: u32,
    erases: u32,
    broken: bool,
}

impl ConfigPort for MockNvs {
    fn load(&self) -> Result<MeterConfig, ConfigError> {
        Ok(self.config.clone().unwrap_or_default())
    }
    fn save(&mut self, c: &MeterConfig) -> Result<(), ConfigError> {
        c.validate()?;
        self.config = Some(c.clone());
        Ok(())
    }
}

impl PersistencePort for MockNvs {
    fn load_state(&self) -> Result<PersistedState, StorageError> {
        self.state.ok_or(StorageError::NotFound)
    }
    fn save_state(&mut self, state: &PersistedState) -> Result<(), StorageError> {
        if self.broken {
            return Err(StorageError::Full);
        }
        self.state = Some(*state);
        self.flushes += 1;
        Ok(())
    }
    fn erase_all(&mut self) -> Result<(), StorageError> {
        if self.broken {
            return Err(StorageError::IoError);
        }
        self.config = None;
        self.state = None;
        self.erases += 1;
        Ok(())
    }
}

struct MockBroker {
    sent: Vec<MeterReading>,
    up: bool,
}
impl MockBroker {
    fn new() -> Self {
        Self {
            sent: Vec::new(),
            up: true,
        }
    }
}
impl PublishPort for MockBroker {
    fn publish(&mut self, r: &MeterReading) -> Result<(), PublishError> {
        if !self.up {
            return Err(PublishError::NotConnected);
        }
        self.sent.push(*r);
        Ok(())
    }
}

struct MockWifi {
    up: bool,
    saving: bool,
    reconnects: u32,
}
impl MockWifi {
    fn new(up: bool) -> Self {
        Self {
            up,
            saving: false,
            reconnects: 0,
        }
    }
}
impl RadioPort for MockWifi {
    fn is_connected(&self) -> bool {
        self.up
    }
    fn rssi(&self) -> Option<i8> {
        self.up.then_some(-70)
    }
    fn reconnect(&mut self) {
        self.reconnects += 1;
    }
    fn set_power_saving(&mut self, enabled: bool) {
        self.saving = enabled;
    }
}

struct LogSink {
    events: Vec<AppEvent>,
}
impl LogSink {
    fn new() -> Self {
        Self { events: Vec::new() }
    }
    fn count(&self, pred: impl Fn(&AppEvent) -> bool) -> usize {
        self.events.iter().filter(|e| pred(e)).count()
    }
}
impl EventSink for LogSink {
    fn emit(&mut self, e: &AppEvent) {
        self.events.push(e.clone());
    }
}

struct Harness {
    app: AppService,
    nvs: MockNvs,
    broker: MockBroker,
    wifi: MockWifi,
    sink: LogSink,
    now_ms: u64,
}

impl Harness {
    fn new(config: MeterConfig) -> Self {
        Self::restored(config, PersistedState::default())
    }

    fn restored(config: MeterConfig, persisted: PersistedState) -> Self {
        let mut h = Self {
            app: AppService::new(config, &persisted).unwrap(),
            nvs: MockNvs::default(),
            broker: MockBroker::new(),
            wifi: MockWifi::new(true),
            sink: LogSink::new(),
            now_ms: 0,
        };
        h.app.start(&mut h.wifi, &mut h.sink);
        h
    }

    fn seconds(&mut self, n: u64) {
        for _ in 0..n {
            self.now_ms += 1000;
            self.app.on_slow_tick(
                self.now_ms,
                &mut self.nvs,
                &mut self.broker,
                &mut self.wifi,
                &mut self.sink,
            );
        }
    }

    fn command(&mut self, cmd: AppCommand) -> HostAction {
        self.app
            .handle_command(cmd, self.now_ms, &mut self.nvs, &mut self.wifi, &mut self.sink)
    }
}

fn publishing(interval: u16) -> MeterConfig {
    MeterConfig {
        publish_enabled: true,
        publish_interval_secs: interval,
        ..Default::default()
    }
}

fn counted(total: u32) -> PersistedState {
    PersistedState {
        meter: MeterState {
            total_rotations: total,
            offset_hundredths: 0,
        },
        threshold: 500,
        drift_baseline: None,
    }
}

// ── Publishing ────────────────────────────────────────────────

#[test]
fn periodic_publish_follows_interval() {
    let mut h = Harness::restored(publishing(10), counted(42));
    h.seconds(35);
    assert_eq!(h.broker.sent.len(), 3);
    let r = h.broker.sent[2];
    assert_eq!(r.counter, 42);
    assert_eq!(r.uptime_secs, 30);
    assert_eq!(r.rssi, Some(-70));
}

#[test]
fn publishing_disabled_sends_nothing() {
    let mut h = Harness::new(MeterConfig::default());
    h.seconds(300);
    assert!(h.broker.sent.is_empty());
}

#[test]
fn publish_failure_is_reported_not_retried() {
    let mut h = Harness::new(publishing(10));
    h.broker.up = false;
    h.seconds(20);
    assert_eq!(
        h.sink.count(|e| matches!(e, AppEvent::PublishFailed(PublishError::NotConnected))),
        2
    );
    h.broker.up = true;
    h.seconds(9);
    assert!(h.broker.sent.is_empty());
}

// ── Radio health ──────────────────────────────────────────────

#[test]
fn reconnect_requested_every_thirty_offline_seconds() {
    let mut h = Harness::new(MeterConfig::default());
    h.wifi.up = false;
    h.seconds(u64::from(RECONNECT_EVERY_TICKS) * 3);
    assert_eq!(h.wifi.reconnects, 3);
    assert!(
        h.sink
            .events
            .contains(&AppEvent::RadioReconnect { attempts: 3 })
    );

    h.seconds(1);
    assert!(h.app.is_offline());
    h.wifi.up = true;
    h.seconds(1);
    assert!(!h.app.is_offline());
}

#[test]
fn duty_cycled_radio_is_not_offline() {
    let cfg = MeterConfig {
        power_saving: true,
        ..Default::default()
    };
    let mut h = Harness::new(cfg);
    assert!(h.wifi.saving);

    h.command(AppCommand::RadioPowerChanged(false));
    h.wifi.up = false;
    h.seconds(120);
    assert_eq!(h.wifi.reconnects, 0);
    assert!(!h.app.is_offline());
}

// ── Persistence ───────────────────────────────────────────────

#[test]
fn backup_runs_once_per_cycle() {
    let mut h = Harness::restored(MeterConfig::default(), counted(7));
    h.seconds(3599);
    assert_eq!(h.nvs.flushes, 0);
    h.seconds(1);
    assert_eq!(h.nvs.flushes, 1);
    assert_eq!(h.nvs.state.unwrap().meter.total_rotations, 7);
    h.seconds(3600);
    assert_eq!(h.nvs.flushes, 2);
}

#[test]
fn flush_failure_keeps_service_running() {
    let mut h = Harness::restored(MeterConfig::default(), counted(7));
    h.nvs.broken = true;
    assert_eq!(h.command(AppCommand::SaveState), HostAction::Continue);
    assert!(
        h.sink
            .events
            .contains(&AppEvent::FlushFailed(StorageError::Full))
    );
    assert_eq!(h.app.reading(h.now_ms, None).counter, 7);
}

#[test]
fn reset_counters_flushes_zero() {
    let mut h = Harness::restored(MeterConfig::default(), counted(99));
    h.command(AppCommand::SetConsumption(50.0));
    h.command(AppCommand::ResetCounters);

    let saved = h.nvs.state.unwrap();
    assert_eq!(saved.meter, MeterState::default());
    assert_eq!(saved.threshold, 500);
    assert_eq!(h.app.reading(h.now_ms, None).consumption_kwh, 0.0);
}

#[test]
fn oversized_consumption_keeps_offset() {
    let mut h = Harness::restored(MeterConfig::default(), counted(150));
    h.command(AppCommand::SetConsumption(1000.0));
    assert_eq!(h.nvs.flushes, 1);

    h.command(AppCommand::SetConsumption(30_000_000.0));
    assert_eq!(
        h.sink.count(|e| matches!(
            e,
            AppEvent::ConsumptionRejected(ConfigError::ValidationFailed(_))
        )),
        1
    );
    assert_eq!(h.nvs.flushes, 1);
    let kwh = h.app.reading(h.now_ms, None).consumption_kwh;
    assert!((kwh - 1000.0).abs() < 0.01);
}

#[test]
fn factory_reset_restores_defaults_and_reboots() {
    let cfg = MeterConfig {
        turns_per_kwh: 120,
        ..Default::default()
    };
    let mut h = Harness::restored(cfg.clone(), counted(1000));
    h.command(AppCommand::ApplySettings(cfg));
    h.command(AppCommand::SaveState);
    assert!(h.nvs.state.is_some());

    assert_eq!(h.command(AppCommand::FactoryReset), HostAction::Reboot);
    assert_eq!(h.nvs.erases, 1);
    assert_eq!(h.nvs.load().unwrap(), MeterConfig::default());
    assert!(h.nvs.state.is_none());
    assert_eq!(h.app.config(), &MeterConfig::default());
    assert_eq!(h.app.persisted(), PersistedState::default());
}

#[test]
fn factory_reset_erase_failure_is_reported() {
    let mut h = Harness::restored(MeterConfig::default(), counted(3));
    h.nvs.broken = true;
    assert_eq!(h.command(AppCommand::FactoryReset), HostAction::Reboot);
    assert!(
        h.sink
            .events
            .contains(&AppEvent::FlushFailed(StorageError::IoError))
    );
}

// ── Settings import ───────────────────────────────────────────

#[test]
fn invalid_settings_rejected_unchanged() {
    let mut h = Harness::new(MeterConfig::default());
    let bad = MeterConfig {
        above_threshold_trigger: 12,
        ..Default::default()
    };
    h.command(AppCommand::ApplySettings(bad));
    assert_eq!(
        h.sink.count(|e| matches!(
            e,
            AppEvent::SettingsRejected(ConfigError::ValidationFailed(_))
        )),
        1
    );
    assert_eq!(h.app.config(), &MeterConfig::default());
    assert!(h.nvs.config.is_none());
}

#[test]
fn sampling_change_needs_restart() {
    let mut h = Harness::new(MeterConfig::default());
    let size = h.app.engine_status().size;
    let next = MeterConfig {
        sample_interval_ms: 40,
        ..Default::default()
    };
    h.command(AppCommand::ApplySettings(next.clone()));

    assert!(h.sink.events.contains(&AppEvent::SettingsApplied));
    assert!(h.sink.events.contains(&AppEvent::RestartRequired));
    assert_eq!(h.app.config(), &next);
    assert_eq!(h.app.engine_status().size, size);
    assert_eq!(h.nvs.load().unwrap(), next);
}

#[test]
fn power_saving_toggle_reaches_radio() {
    let mut h = Harness::new(MeterConfig::default());
    assert!(!h.wifi.saving);
    h.command(AppCommand::ApplySettings(MeterConfig {
        power_saving: true,
        ..Default::default()
    }));
    assert!(h.wifi.saving);
    assert!(!h.sink.events.contains(&AppEvent::RestartRequired));
}
