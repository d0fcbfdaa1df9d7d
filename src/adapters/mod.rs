//! Adapters: concrete implementations of the hexagonal port traits.
//!
//! | Adapter     | Implements        | Connects to                 |
//! |-------------|-------------------|-----------------------------|
//! | `hardware`  | SampleSource      | ESP32 ADC, status LED GPIO  |
//! | `influx`    | DebugTelemetry    | InfluxDB UDP line protocol  |
//! | `log_sink`  | EventSink         | Serial log output           |
//! | `mqtt`      | PublishPort       | MQTT broker                 |
//! | `nvs`       | ConfigPort        | NVS / in-memory store       |
//! |             | PersistencePort   |                             |
//! | `wifi`      | RadioPort         | ESP-IDF WiFi STA            |
//!
//! `device_id` and `time` are shared helpers (MAC-derived identity,
//! monotonic clock).

pub mod device_id;
pub mod hardware;
pub mod influx;
pub mod log_sink;
pub mod mqtt;
pub mod nvs;
pub mod time;
pub mod wifi;
