//! Log-based event sink adapter.
//!
//! Implements [`EventSink`] by writing one structured line per application
//! event to the logger (UART / USB-CDC in production).

use log::{info, warn};

use crate::app::events::AppEvent;
use crate::app::ports::EventSink;
use crate::engine::power::PowerReading;

/// Adapter that logs every [`AppEvent`] to the serial console.
#[derive(Default)]
pub struct LogEventSink;

impl LogEventSink {
    pub fn new() -> Self {
        Self
    }
}

struct PowerField(PowerReading);

impl core::fmt::Display for PowerField {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self.0 {
            PowerReading::Watts(w) => write!(f, "{w}W"),
            PowerReading::Unknown => write!(f, "unknown"),
            PowerReading::Disabled => write!(f, "off"),
        }
    }
}

impl EventSink for LogEventSink {
    fn emit(&mut self, event: &AppEvent) {
        match event {
            AppEvent::Started { total, threshold } => {
                info!("START | total={} threshold={}", total, threshold);
            }
            AppEvent::CalibrationStarted => info!("CALIB | started"),
            AppEvent::CalibrationFinished(r) => {
                if r.succeeded() {
                    info!(
                        "CALIB | ok threshold={} min={} max={} spread={}",
                        r.threshold, r.min, r.max, r.spread
                    );
                } else {
                    warn!(
                        "CALIB | failed min={} max={} spread={}",
                        r.min, r.max, r.spread
                    );
                }
            }
            AppEvent::CalibrationCancelled { threshold } => {
                info!("CALIB | cancelled threshold={}", threshold);
            }
            AppEvent::RotationCounted {
                total,
                consumption_kwh,
                power,
            } => {
                info!(
                    "ROTATION | total={} kwh={:.2} power={}",
                    total,
                    consumption_kwh,
                    PowerField(*power)
                );
            }
            AppEvent::EdgeSuppressed => info!("ROTATION | suppressed (drift unverified)"),
            AppEvent::CountersReset => info!("COUNTER | reset"),
            AppEvent::ConsumptionSet { kwh } => info!("COUNTER | consumption set kwh={:.2}", kwh),
            AppEvent::ConsumptionRejected(e) => warn!("COUNTER | consumption rejected: {}", e),
            AppEvent::SettingsApplied => info!("CONFIG | applied"),
            AppEvent::SettingsRejected(e) => warn!("CONFIG | rejected: {}", e),
            AppEvent::RestartRequired => warn!("CONFIG | restart required"),
            AppEvent::StateFlushed { total } => info!("NVS | flushed total={}", total),
            AppEvent::FlushFailed(e) => warn!("NVS | flush failed: {}", e),
            AppEvent::Published { total } => info!("MQTT | published total={}", total),
            AppEvent::PublishFailed(e) => warn!("MQTT | publish failed: {}", e),
            AppEvent::RadioReconnect { attempts } => {
                info!("WIFI | reconnect attempt={}", attempts);
            }
        }
    }
}
