//! AppService driven end to end through mock adapters: calibration,
//! counting, drift suppression and the persisted state it leaves behind.

use ferraris::adapters::wifi::WifiAdapter;
use ferraris::app::commands::AppCommand;
use ferraris::app::events::AppEvent;
use ferraris::app::ports::MeterStatus;
use ferraris::app::service::{AppService, HostAction};
use ferraris::config::MeterConfig;
use ferraris::engine::TickOutcome;
use ferraris::engine::meter::PersistedState;
use ferraris::engine::power::PowerReading;

use crate::mock_hw::{
    DISC, MARK, MockPublisher, MockRadio, MockStore, RecordingSink, RecordingTelemetry,
    ScriptedSource, test_config,
};

struct Rig {
    app: AppService,
    source: ScriptedSource,
    store: MockStore,
    publisher: MockPublisher,
    radio: MockRadio,
    telemetry: RecordingTelemetry,
    sink: RecordingSink,
    interval_ms: u64,
    now_ms: u64,
    fast_ticks: u64,
}

impl Rig {
    fn new(config: MeterConfig, persisted: PersistedState) -> Self {
        let interval_ms = u64::from(config.sample_interval_ms);
        let mut rig = Self {
            app: AppService::new(config, &persisted).unwrap(),
            source: ScriptedSource::new(DISC),
            store: MockStore::default(),
            publisher: MockPublisher::default(),
            radio: MockRadio::default(),
            telemetry: RecordingTelemetry::default(),
            sink: RecordingSink::default(),
            interval_ms,
            now_ms: 0,
            fast_ticks: 0,
        };
        rig.app.start(&mut rig.radio, &mut rig.sink);
        rig
    }

    /// Advance `n` fast ticks, firing a slow tick on each whole second.
    fn run(&mut self, n: usize) -> Vec<TickOutcome> {
        let mut outcomes = Vec::with_capacity(n);
        for _ in 0..n {
            self.now_ms += self.interval_ms;
            self.fast_ticks += 1;
            outcomes.push(self.app.on_fast_tick(
                self.now_ms,
                &mut self.source,
                &mut self.telemetry,
                &mut self.sink,
            ));
            if self.now_ms % 1000 == 0 {
                self.app.on_slow_tick(
                    self.now_ms,
                    &mut self.store,
                    &mut self.publisher,
                    &mut self.radio,
                    &mut self.sink,
                );
            }
        }
        outcomes
    }

    /// Run until the scripted samples are used up.
    fn drain(&mut self) -> Vec<TickOutcome> {
        let n = self.source.remaining();
        self.run(n)
    }

    fn command(&mut self, cmd: AppCommand) -> HostAction {
        self.app.handle_command(
            cmd,
            self.now_ms,
            &mut self.store,
            &mut self.radio,
            &mut self.sink,
        )
    }

    /// Calibrate on a pulse train with a 10 % mark duty cycle.
    fn calibrate(&mut self) {
        self.command(AppCommand::BeginCalibration);
        for _ in 0..12 {
            self.source.push(45, DISC).push(5, MARK);
        }
        let outcomes = self.drain();
        assert!(matches!(outcomes.last(), Some(TickOutcome::Calibrated(r)) if r.threshold == MARK));
    }
}

fn rotations(outcomes: &[TickOutcome]) -> usize {
    outcomes
        .iter()
        .filter(|o| matches!(o, TickOutcome::Rotation { .. }))
        .count()
}

#[test]
fn calibration_then_counting() {
    let mut rig = Rig::new(test_config(), PersistedState::default());
    assert_eq!(rig.app.meter_status(), MeterStatus::Uncalibrated);

    rig.calibrate();
    assert_eq!(rig.app.meter_status(), MeterStatus::Counting);
    let status = rig.app.engine_status();
    assert_eq!((status.min, status.max, status.threshold), (DISC, MARK, MARK));
    assert!(!status.calibrating);

    for _ in 0..3 {
        rig.source.push_rotation(60, 5);
    }
    let outcomes = rig.drain();
    assert_eq!(rotations(&outcomes), 3);
    assert_eq!(rig.sink.rotations(), 3);

    let reading = rig.app.reading(rig.now_ms, None);
    assert_eq!(reading.counter, 3);
    assert!((reading.consumption_kwh - 3.0 / 75.0).abs() < 1e-9);
}

#[test]
fn power_follows_rotation_interval() {
    let mut rig = Rig::new(test_config(), PersistedState::default());
    rig.calibrate();

    rig.source.push_rotation(60, 5).push_rotation(60, 5);
    rig.drain();

    let powers: Vec<PowerReading> = rig
        .sink
        .events
        .iter()
        .filter_map(|e| match e {
            AppEvent::RotationCounted { power, .. } => Some(*power),
            _ => None,
        })
        .collect();
    // 65 samples × 50 ms = 3.25 s per turn at 75 turns/kWh.
    assert_eq!(powers, vec![PowerReading::Unknown, PowerReading::Watts(15_000)]);
}

#[test]
fn debounce_merges_close_pulses() {
    let mut rig = Rig::new(test_config(), PersistedState::default());
    rig.calibrate();

    // Second mark 1.5 s after the first: inside the 2 s debounce window.
    rig.source.push_rotation(60, 5).push_rotation(25, 5);
    let outcomes = rig.drain();
    assert_eq!(rotations(&outcomes), 1);
}

#[test]
fn slow_disc_long_mark_counts_once_per_pass() {
    let mut rig = Rig::new(test_config(), PersistedState::default());
    rig.calibrate();

    // Low load: the mark stays in view 6 s, three times the debounce.
    rig.source.push_rotation(400, 120).push_rotation(400, 120);
    rig.source.push(100, DISC);
    let outcomes = rig.drain();
    assert_eq!(rotations(&outcomes), 2);
}

#[test]
fn uncalibrated_meter_never_counts() {
    let mut rig = Rig::new(test_config(), PersistedState::default());
    for _ in 0..5 {
        rig.source.push_rotation(60, 5);
    }
    let outcomes = rig.drain();
    assert_eq!(rotations(&outcomes), 0);
}

#[test]
fn flat_signal_fails_calibration() {
    let restored = PersistedState {
        threshold: 640,
        ..Default::default()
    };
    let mut rig = Rig::new(test_config(), restored);
    rig.command(AppCommand::BeginCalibration);
    rig.source.push(600, 300);
    let outcomes = rig.drain();

    match outcomes.last() {
        Some(TickOutcome::Calibrated(r)) => assert!(!r.succeeded()),
        other => panic!("expected calibration result, got {:?}", other),
    }
    assert_eq!(rig.app.meter_status(), MeterStatus::Uncalibrated);
    assert_eq!(rig.app.persisted().threshold, 0);
}

#[test]
fn cancel_restores_previous_threshold() {
    let restored = PersistedState {
        threshold: 640,
        ..Default::default()
    };
    let mut rig = Rig::new(test_config(), restored);
    rig.command(AppCommand::BeginCalibration);
    rig.run(100);
    assert!(rig.app.is_calibrating());

    rig.command(AppCommand::CancelCalibration);
    assert!(!rig.app.is_calibrating());
    assert_eq!(rig.app.engine_status().threshold, 640);
    assert!(rig.sink.events.contains(&AppEvent::CalibrationCancelled { threshold: 640 }));
}

#[test]
fn radio_off_suppresses_until_baseline() {
    let mut rig = Rig::new(test_config(), PersistedState::default());
    rig.calibrate();
    // Let the radio-on baseline settle (60 s).
    rig.run(1300);

    rig.command(AppCommand::RadioPowerChanged(false));
    rig.source.push_rotation(60, 5);
    let outcomes = rig.drain();
    assert_eq!(rotations(&outcomes), 0);
    assert!(outcomes.contains(&TickOutcome::EdgeSuppressed));

    // After the off-baseline delay the offset is known and counting resumes.
    rig.run(700);
    rig.source.push_rotation(60, 5);
    let outcomes = rig.drain();
    assert_eq!(rotations(&outcomes), 1);
}

#[test]
fn debug_telemetry_only_when_enabled() {
    let mut rig = Rig::new(test_config(), PersistedState::default());
    rig.run(10);
    assert!(rig.telemetry.lines.is_empty());

    let cfg = MeterConfig {
        debug_telemetry: true,
        ..test_config()
    };
    rig.command(AppCommand::ApplySettings(cfg));
    rig.run(10);
    assert_eq!(rig.telemetry.lines.len(), 10);
    assert_eq!(rig.telemetry.lines[0], (0, 0, DISC));
}

#[test]
fn restart_flushes_counters() {
    let mut rig = Rig::new(test_config(), PersistedState::default());
    rig.calibrate();
    rig.source.push_rotation(60, 5).push_rotation(60, 5);
    rig.drain();

    assert_eq!(rig.command(AppCommand::Restart), HostAction::Reboot);
    let saved = rig.store.state.unwrap();
    assert_eq!(saved.meter.total_rotations, 2);
    assert_eq!(saved.threshold, MARK);

    // A fresh service restored from the flushed state continues the count.
    let mut rig = Rig::new(test_config(), saved);
    assert_eq!(rig.app.meter_status(), MeterStatus::Counting);
    rig.source.push(100, DISC).push_rotation(60, 5);
    rig.drain();
    assert_eq!(rig.app.reading(rig.now_ms, None).counter, 3);
}

#[test]
fn power_saving_from_boot_measures_drift_baseline() {
    let config = MeterConfig {
        power_saving: true,
        publish_enabled: true,
        publish_interval_secs: 60,
        ..test_config()
    };
    let restored = PersistedState {
        threshold: MARK,
        ..Default::default()
    };
    let mut app = AppService::new(config.clone(), &restored).unwrap();
    let mut wifi = WifiAdapter::new("HomeWiFi", "mysecret8", config.publish_interval_secs).unwrap();
    let mut source = ScriptedSource::new(DISC);
    let mut store = MockStore::default();
    let mut publisher = MockPublisher::default();
    let mut telemetry = RecordingTelemetry::default();
    let mut sink = RecordingSink::default();
    app.start(&mut wifi, &mut sink);

    let mut now = 0u64;
    let mut sleeps = 0;
    // Ten minutes of duty cycling, wired the way the firmware loop does it.
    while now < 600_000 {
        now += 50;
        app.on_fast_tick(now, &mut source, &mut telemetry, &mut sink);
        if now % 1000 != 0 {
            continue;
        }
        wifi.hold_awake(app.config().power_saving && !app.has_drift_baseline());
        if let Some(on) = wifi.tick() {
            sleeps += usize::from(!on);
            app.handle_command(AppCommand::RadioPowerChanged(on), now, &mut store, &mut wifi, &mut sink);
        }
        app.on_slow_tick(now, &mut store, &mut publisher, &mut wifi, &mut sink);
    }

    assert_eq!(app.persisted().drift_baseline, Some(DISC));
    assert!(sleeps >= 9);
    assert!(publisher.sent.len() >= 9);
}
