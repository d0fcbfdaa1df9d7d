//! MQTT publish adapter.
//!
//! Implements [`PublishPort`].  Each reading is rendered as a flat JSON
//! object on `<base>/<system id>`:
//!
//! ```json
//! {"counter":1234,"consumption":16.45,"power":420,"runtime":"2d5h7m","rssi":-61,"status":"counting"}
//! ```
//!
//! `power` is omitted while unknown or disabled, `rssi` while offline.
//! Publishing is enqueue-only on target so the caller never blocks on the
//! broker.

use log::{debug, info, warn};
use serde::Serialize;

use crate::adapters::device_id::SystemId;
use crate::adapters::time::format_runtime;
use crate::app::ports::{MeterReading, MeterStatus, PublishError, PublishPort};

#[cfg(target_os = "espidf")]
use core::sync::atomic::{AtomicBool, Ordering};
#[cfg(target_os = "espidf")]
use esp_idf_svc::mqtt::client::{EspMqttClient, EventPayload, MqttClientConfiguration, QoS};
#[cfg(target_os = "espidf")]
use std::sync::Arc;

pub type Topic = heapless::String<64>;

// ── Payload ───────────────────────────────────────────────────

#[derive(Debug, Serialize)]
struct Payload<'a> {
    counter: u32,
    consumption: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    power: Option<u32>,
    runtime: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    rssi: Option<i8>,
    status: MeterStatus,
}

/// Round down to two decimals, as shown on the meter's drum.
fn floor_hundredths(kwh: f64) -> f64 {
    (kwh * 100.0).floor() / 100.0
}

/// Render a reading as the published JSON document.
pub fn encode_reading(reading: &MeterReading) -> Result<String, PublishError> {
    let runtime = format_runtime(reading.uptime_secs, true);
    let payload = Payload {
        counter: reading.counter,
        consumption: floor_hundredths(reading.consumption_kwh),
        power: reading.power.watts(),
        runtime: runtime.as_str(),
        rssi: reading.rssi,
        status: reading.status,
    };
    serde_json::to_string(&payload).map_err(|_| PublishError::Encode)
}

/// `<base>/<system id>`, e.g. `ferraris/EFCAFE`.
pub fn topic(base: &str, id: &SystemId) -> Result<Topic, PublishError> {
    let mut t = Topic::new();
    t.push_str(base).map_err(|_| PublishError::Encode)?;
    t.push('/').map_err(|_| PublishError::Encode)?;
    t.push_str(id).map_err(|_| PublishError::Encode)?;
    Ok(t)
}

// ── Adapter ───────────────────────────────────────────────────

pub struct MqttPublisher {
    topic: Topic,
    #[cfg(target_os = "espidf")]
    client: EspMqttClient<'static>,
    #[cfg(target_os = "espidf")]
    connected: Arc<AtomicBool>,
    #[cfg(not(target_os = "espidf"))]
    sim_connected: bool,
    #[cfg(not(target_os = "espidf"))]
    sent: Vec<(Topic, String)>,
}

impl MqttPublisher {
    /// Connect to `url` (e.g. `mqtt://broker.local:1883`).
    #[cfg(target_os = "espidf")]
    pub fn new(url: &str, base: &str, id: &SystemId) -> Result<Self, PublishError> {
        let topic = topic(base, id)?;
        let connected = Arc::new(AtomicBool::new(false));
        let flag = connected.clone();
        let conf = MqttClientConfiguration {
            client_id: Some(id.as_str()),
            ..Default::default()
        };
        let client = EspMqttClient::new_cb(url, &conf, move |event| match event.payload() {
            EventPayload::Connected(_) => flag.store(true, Ordering::Relaxed),
            EventPayload::Disconnected => flag.store(false, Ordering::Relaxed),
            _ => {}
        })
        .map_err(|e| {
            warn!("MQTT: client init failed: {}", e);
            PublishError::NotConnected
        })?;
        info!("MQTT: client started, topic '{}'", topic);
        Ok(Self {
            topic,
            client,
            connected,
        })
    }

    #[cfg(not(target_os = "espidf"))]
    pub fn new(_url: &str, base: &str, id: &SystemId) -> Result<Self, PublishError> {
        let topic = topic(base, id)?;
        info!("MQTT(sim): topic '{}'", topic);
        Ok(Self {
            topic,
            sim_connected: true,
            sent: Vec::new(),
        })
    }

    pub fn topic(&self) -> &str {
        &self.topic
    }

    #[cfg(target_os = "espidf")]
    fn send(&mut self, body: &str) -> Result<(), PublishError> {
        if !self.connected.load(Ordering::Relaxed) {
            return Err(PublishError::NotConnected);
        }
        self.client
            .enqueue(&self.topic, QoS::AtMostOnce, false, body.as_bytes())
            .map(|_| ())
            .map_err(|e| {
                warn!("MQTT: enqueue failed: {}", e);
                PublishError::Rejected
            })
    }

    #[cfg(not(target_os = "espidf"))]
    fn send(&mut self, body: &str) -> Result<(), PublishError> {
        if !self.sim_connected {
            return Err(PublishError::NotConnected);
        }
        self.sent.push((self.topic.clone(), body.to_owned()));
        Ok(())
    }

    /// Simulation: toggle broker reachability.
    #[cfg(not(target_os = "espidf"))]
    pub fn sim_set_connected(&mut self, up: bool) {
        self.sim_connected = up;
    }

    /// Simulation: everything published so far.
    #[cfg(not(target_os = "espidf"))]
    pub fn sent(&self) -> &[(Topic, String)] {
        &self.sent
    }
}

impl PublishPort for MqttPublisher {
    fn publish(&mut self, reading: &MeterReading) -> Result<(), PublishError> {
        let body = encode_reading(reading)?;
        debug!("MQTT: {} <- {}", self.topic, body);
        self.send(&body)
    }
}
