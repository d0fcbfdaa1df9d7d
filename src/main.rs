//! Ferraris Meter Firmware: main entry point
//!
//! Hexagonal architecture driven by a two-cadence cooperative scheduler.
//!
//! ```text
//! ┌────────────────────────────────────────────────────────────────┐
//! │                      Adapters (outer ring)                     │
//! │                                                                │
//! │  HardwareAdapter   LogEventSink   NvsAdapter    WifiAdapter    │
//! │  (SampleSource)    (EventSink)    (Config+NVS)  (RadioPort)    │
//! │  MqttPublisher     InfluxExporter console                      │
//! │  (PublishPort)     (DebugTelemetry) (requests)                 │
//! │                                                                │
//! │  ──────────────── Port Trait Boundary ───────────────────      │
//! │                                                                │
//! │  ┌────────────────────────────────────────────────────────┐    │
//! │  │              AppService (pure logic)                   │    │
//! │  │  Calibrator · EdgeDetector · Power · Drift             │    │
//! │  └────────────────────────────────────────────────────────┘    │
//! │                                                                │
//! │  Scheduler (fast: sample interval · slow: 1 s)                 │
//! └────────────────────────────────────────────────────────────────┘
//! ```
#![deny(unused_must_use)]

use anyhow::Result;
use log::{error, info, warn};

use esp_idf_hal::delay::{Ets, FreeRtos};
use esp_idf_hal::peripherals::Peripherals;
use esp_idf_svc::eventloop::EspSystemEventLoop;
use esp_idf_svc::wifi::EspWifi;

use ferraris::adapters::device_id;
use ferraris::adapters::hardware::HardwareAdapter;
use ferraris::adapters::influx::InfluxExporter;
use ferraris::adapters::log_sink::LogEventSink;
use ferraris::adapters::mqtt::MqttPublisher;
use ferraris::adapters::nvs::NvsAdapter;
use ferraris::adapters::time::{Clock, format_runtime};
use ferraris::adapters::wifi::WifiAdapter;
use ferraris::app::commands::AppCommand;
use ferraris::app::ports::{ConfigPort, PersistencePort, SchedulerDelegate};
use ferraris::app::service::{AppService, HostAction};
use ferraris::config::MeterConfig;
use ferraris::drivers::ir_sensor::IrSensor;
use ferraris::drivers::status_led::StatusLed;
use ferraris::engine::meter::PersistedState;
use ferraris::scheduler::Scheduler;
use ferraris::{console, drivers, requests};

// ── Build-time network settings ───────────────────────────────

const WIFI_SSID: &str = match option_env!("FERRARIS_WIFI_SSID") {
    Some(s) => s,
    None => "ferraris",
};
const WIFI_PASS: &str = match option_env!("FERRARIS_WIFI_PASS") {
    Some(s) => s,
    None => "",
};
const MQTT_URL: &str = match option_env!("FERRARIS_MQTT_URL") {
    Some(s) => s,
    None => "mqtt://192.168.1.2:1883",
};
const MQTT_BASE_TOPIC: &str = "ferraris";
const INFLUX_HOST: &str = match option_env!("FERRARIS_INFLUX_HOST") {
    Some(s) => s,
    None => "192.168.1.2",
};
const INFLUX_PORT: u16 = 8089;

/// Fatal-pattern half period.
const FATAL_FLASH_MS: u32 = 100;

// ── Scheduler delegate ────────────────────────────────────────
//
// Owns every adapter and routes the two cadences into the service.

struct Firmware {
    app: AppService,
    hw: HardwareAdapter<Ets>,
    nvs: NvsAdapter,
    wifi: WifiAdapter,
    mqtt: Option<MqttPublisher>,
    influx: Option<InfluxExporter>,
    sink: LogEventSink,
    sample_interval_ms: u32,
}

impl Firmware {
    fn handle(&mut self, cmd: AppCommand, now_ms: u64) -> HostAction {
        self.app
            .handle_command(cmd, now_ms, &mut self.nvs, &mut self.wifi, &mut self.sink)
    }
}

impl SchedulerDelegate for Firmware {
    fn on_fast_tick(&mut self, now_ms: u64) {
        let outcome = self
            .app
            .on_fast_tick(now_ms, &mut self.hw, &mut self.influx, &mut self.sink);
        let calibrating = self.app.is_calibrating();
        let offline = self.app.is_offline();
        self.hw
            .indicate(&outcome, calibrating, offline, self.sample_interval_ms);
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
        if self.app.slow_ticks() % 600 == 0 {
            info!("uptime {}", format_runtime(now_ms / 1000, false));
        }
    }
}

// ── Main ──────────────────────────────────────────────────────

fn main() -> Result<()> {
    // ── 1. ESP-IDF bootstrap ──────────────────────────────────
    esp_idf_svc::sys::link_patches();
    esp_idf_logger::init()?;

    info!("╔══════════════════════════════════════╗");
    info!("║  Ferraris Meter v{}                  ║", env!("CARGO_PKG_VERSION"));
    info!("╚══════════════════════════════════════╝");

    drivers::hw_init::init_peripherals()?;
    let mut hw = HardwareAdapter::new(IrSensor::new(Ets), StatusLed::new());

    // ── 2. Config and persisted state ─────────────────────────
    let nvs = NvsAdapter::new().map_err(|e| anyhow::anyhow!("NVS init: {e}"))?;
    let config = match nvs.load() {
        Ok(cfg) => cfg,
        Err(e) => {
            warn!("config load failed ({}), using defaults", e);
            MeterConfig::default()
        }
    };
    let persisted = match nvs.load_state() {
        Ok(state) => state,
        Err(e) => {
            warn!("state load failed ({}), starting from zero", e);
            PersistedState::default()
        }
    };

    // ── 3. Engine (fatal on allocation failure) ───────────────
    let mut app = match AppService::new(config.clone(), &persisted) {
        Ok(app) => app,
        Err(e) => {
            error!("{}, halting", e);
            loop {
                hw.fatal_flash(FATAL_FLASH_MS);
                FreeRtos::delay_ms(FATAL_FLASH_MS);
            }
        }
    };

    // ── 4. Network adapters ───────────────────────────────────
    let mac = device_id::read_mac();
    let sys_id = device_id::system_id(&mac);
    info!("System ID: {} ({})", sys_id, device_id::ap_name(&mac));

    let peripherals = Peripherals::take()?;
    let sysloop = EspSystemEventLoop::take()?;
    let esp_wifi = EspWifi::new(peripherals.modem, sysloop, None)?;
    let mut wifi = WifiAdapter::new(esp_wifi, WIFI_SSID, WIFI_PASS, config.publish_interval_secs)?;

    let mqtt = if config.publish_enabled {
        match MqttPublisher::new(MQTT_URL, MQTT_BASE_TOPIC, &sys_id) {
            Ok(p) => Some(p),
            Err(e) => {
                warn!("MQTT disabled: {}", e);
                None
            }
        }
    } else {
        info!("publishing of meter readings disabled");
        None
    };

    let influx = if config.debug_telemetry {
        match InfluxExporter::new(INFLUX_HOST, INFLUX_PORT, sys_id.clone()) {
            Ok(x) => Some(x),
            Err(e) => {
                warn!("raw sample streaming disabled: {}", e);
                None
            }
        }
    } else {
        None
    };

    let mut sink = LogEventSink::new();
    app.start(&mut wifi, &mut sink);

    if let Err(e) = console::spawn() {
        warn!("console unavailable: {}", e);
    }

    let clock = Clock::new();
    let mut sched = Scheduler::new(config.sample_interval_ms, clock.now_ms());
    let mut fw = Firmware {
        app,
        hw,
        nvs,
        wifi,
        mqtt,
        influx,
        sink,
        sample_interval_ms: u32::from(config.sample_interval_ms),
    };

    info!("System ready. Entering scheduler loop.");

    // ── 5. Scheduler loop ─────────────────────────────────────
    loop {
        let now = clock.now_ms();
        sched.poll(now, &mut fw);

        let mut action = HostAction::Continue;
        requests::drain_requests(|cmd| {
            if action == HostAction::Continue {
                action = fw.handle(cmd, now);
            }
        });
        if action == HostAction::Reboot {
            info!("rebooting");
            FreeRtos::delay_ms(500);
            // SAFETY: plain ESP-IDF reset call; state was flushed by the service.
            unsafe { esp_idf_svc::sys::esp_restart() };
        }

        let idle = sched.idle_budget_ms(clock.now_ms());
        if idle > 0 {
            FreeRtos::delay_ms(idle as u32);
        }
    }
}
