//! The firmware loop as `main` wires it, built from the host simulation
//! adapters: scheduler cadences, the request queue, NVS, MQTT and the LED.
//!
//! This is the only test in the binary that touches the request queue and
//! the simulated ADC, both of which are process-global.

use embedded_hal::delay::DelayNs;

use ferraris::adapters::device_id::{read_mac, system_id};
use ferraris::adapters::hardware::HardwareAdapter;
use ferraris::adapters::mqtt::MqttPublisher;
use ferraris::adapters::nvs::NvsAdapter;
use ferraris::adapters::wifi::WifiAdapter;
use ferraris::app::commands::AppCommand;
use ferraris::app::ports::{PersistencePort, SchedulerDelegate};
use ferraris::app::service::{AppService, HostAction};
use ferraris::config::MeterConfig;
use ferraris::drivers::ir_sensor::{IrSensor, sim_set_ir_adc};
use ferraris::drivers::status_led::StatusLed;
use ferraris::engine::meter::PersistedState;
use ferraris::requests;
use ferraris::scheduler::Scheduler;

use crate::mock_hw::{DISC, MARK, RecordingSink, RecordingTelemetry};

struct NoDelay;

impl DelayNs for NoDelay {
    fn delay_ns(&mut self, _ns: u32) {}
}

struct Firmware {
    app: AppService,
    hw: HardwareAdapter<NoDelay>,
    nvs: NvsAdapter,
    wifi: WifiAdapter,
    mqtt: MqttPublisher,
    telemetry: RecordingTelemetry,
    sink: RecordingSink,
    led_was_lit: bool,
}

impl SchedulerDelegate for Firmware {
    fn on_fast_tick(&mut self, now_ms: u64) {
        let outcome = self
            .app
            .on_fast_tick(now_ms, &mut self.hw, &mut self.telemetry, &mut self.sink);
        let calibrating = self.app.is_calibrating();
        let offline = self.app.is_offline();
        self.hw.indicate(&outcome, calibrating, offline, 50);
        self.led_was_lit |= self.hw.led_on();
    }

    fn on_slow_tick(&mut self, now_ms: u64) {
        self.wifi.set_publish_interval(
            self.app.config().publish_interval_secs,
            self.app.slow_ticks(),
        );
        self.wifi
            .hold_awake(self.app.config().power_saving && !self.app.has_drift_baseline());
        if let Some(on) = self.wifi.tick() {
            requests::submit(AppCommand::RadioPowerChanged(on));
        }
        self.app.on_slow_tick(
            now_ms,
            &mut self.nvs,
            &mut self.mqtt,
            &mut self.wifi,
            &mut self.sink,
        );
    }
}

/// Poll the scheduler every 10 ms for `ms` milliseconds with the sensor
/// held at `level`, draining requests after each poll.
fn run_for(sched: &mut Scheduler, fw: &mut Firmware, now: &mut u64, ms: u64, level: u16) -> HostAction {
    sim_set_ir_adc(level);
    let end = *now + ms;
    let mut action = HostAction::Continue;
    while *now < end {
        *now += 10;
        sched.poll(*now, fw);
        requests::drain_requests(|cmd| {
            if action == HostAction::Continue {
                action = fw
                    .app
                    .handle_command(cmd, *now, &mut fw.nvs, &mut fw.wifi, &mut fw.sink);
            }
        });
    }
    action
}

#[test]
fn boot_calibrate_count_publish_restart() {
    let config = MeterConfig {
        sample_interval_ms: 50,
        buffer_secs: 30,
        publish_enabled: true,
        publish_interval_secs: 60,
        ..Default::default()
    };
    let id = system_id(&read_mac());
    let mut fw = Firmware {
        app: AppService::new(config.clone(), &PersistedState::default()).unwrap(),
        hw: HardwareAdapter::new(IrSensor::new(NoDelay), StatusLed::new()),
        nvs: NvsAdapter::new().unwrap(),
        wifi: WifiAdapter::new("TestNet", "password1", config.publish_interval_secs).unwrap(),
        mqtt: MqttPublisher::new("mqtt://sim", "ferraris", &id).unwrap(),
        telemetry: RecordingTelemetry::default(),
        sink: RecordingSink::default(),
        led_was_lit: false,
    };
    fw.app.start(&mut fw.wifi, &mut fw.sink);

    let mut sched = Scheduler::new(config.sample_interval_ms, 0);
    let mut now = 0;

    // Calibration over 30 s of a 10 % duty pulse train.
    assert!(requests::submit(AppCommand::BeginCalibration));
    for _ in 0..12 {
        run_for(&mut sched, &mut fw, &mut now, 2250, DISC);
        run_for(&mut sched, &mut fw, &mut now, 250, MARK);
    }
    run_for(&mut sched, &mut fw, &mut now, 100, DISC);
    assert!(!fw.app.is_calibrating());
    assert_eq!(fw.app.engine_status().threshold, MARK);

    // Two disc revolutions.
    for _ in 0..2 {
        run_for(&mut sched, &mut fw, &mut now, 3000, DISC);
        run_for(&mut sched, &mut fw, &mut now, 250, MARK);
    }
    run_for(&mut sched, &mut fw, &mut now, 1000, DISC);
    assert_eq!(fw.sink.rotations(), 2);
    assert!(fw.led_was_lit);

    // Each rotation is published on the following slow tick.
    let sent = fw.mqtt.sent();
    assert!(sent.len() >= 2);
    let (topic, body) = &sent[sent.len() - 1];
    assert_eq!(topic.as_str(), format!("ferraris/{}", id));
    assert!(body.contains(r#""counter":2"#));
    assert!(body.contains(r#""status":"counting""#));

    // Console-style requests: align the register, then restart.
    requests::submit(AppCommand::SetConsumption(1234.5));
    assert_eq!(run_for(&mut sched, &mut fw, &mut now, 10, DISC), HostAction::Continue);
    assert!((fw.app.reading(now, None).consumption_kwh - 1234.5).abs() < 0.01);

    requests::submit(AppCommand::Restart);
    assert_eq!(run_for(&mut sched, &mut fw, &mut now, 10, DISC), HostAction::Reboot);

    let saved = fw.nvs.load_state().unwrap();
    assert_eq!(saved.meter.total_rotations, 2);
    assert_eq!(saved.threshold, MARK);
    assert_eq!(requests::pending(), 0);
}
