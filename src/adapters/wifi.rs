//! WiFi station-mode adapter.
//!
//! Implements [`RadioPort`].  The application decides *when* to reconnect;
//! this adapter only owns the driver and the power-saving duty cycle.
//!
//! ## cfg gating
//!
//! - **`target_os = "espidf"`**: real ESP-IDF WiFi driver via `esp_idf_svc::wifi`.
//! - **all other targets**: in-memory link state for host-side tests.
//!
//! ## Power saving
//!
//! With power saving enabled the radio is switched off between publishes
//! and woken [`AWAKE_SECS`] before each publish slot.  Every on/off
//! transition is returned from [`WifiAdapter::tick`] so the caller can
//! queue `AppCommand::RadioPowerChanged` for drift compensation.
//! [`WifiAdapter::hold_awake`] keeps the radio up regardless, until the
//! first radio-on sensor baseline exists.

use core::fmt;
use log::{info, warn};

use crate::app::ports::RadioPort;

#[cfg(target_os = "espidf")]
use esp_idf_svc::wifi::{AuthMethod, ClientConfiguration, Configuration, EspWifi};

/// Seconds the radio is kept up ahead of a publish slot.
pub const AWAKE_SECS: u32 = 10;

// ───────────────────────────────────────────────────────────────
// Errors
// ───────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WifiError {
    InvalidSsid,
    InvalidPassword,
    Driver,
}

impl fmt::Display for WifiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidSsid => write!(f, "SSID invalid (must be 1-32 printable ASCII bytes)"),
            Self::InvalidPassword => write!(f, "password invalid (must be 8-64 bytes for WPA2, or empty for open)"),
            Self::Driver => write!(f, "WiFi driver error"),
        }
    }
}

impl std::error::Error for WifiError {}

// ───────────────────────────────────────────────────────────────
// Connection state
// ───────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WifiState {
    /// Radio powered down (power saving).
    Off,
    Connecting,
    Connected,
}

// ───────────────────────────────────────────────────────────────
// Validation
// ───────────────────────────────────────────────────────────────

fn is_printable_ascii(s: &str) -> bool {
    s.bytes().all(|b| (0x20..=0x7E).contains(&b))
}

pub fn validate_ssid(ssid: &str) -> Result<(), WifiError> {
    if ssid.is_empty() || ssid.len() > 32 || !is_printable_ascii(ssid) {
        return Err(WifiError::InvalidSsid);
    }
    Ok(())
}

pub fn validate_password(password: &str) -> Result<(), WifiError> {
    if password.is_empty() {
        return Ok(());
    }
    if password.len() < 8 || password.len() > 64 {
        return Err(WifiError::InvalidPassword);
    }
    Ok(())
}

// ───────────────────────────────────────────────────────────────
// Duty cycle
// ───────────────────────────────────────────────────────────────

/// Decides whether the radio should be up at a given slow tick.
///
/// Publish slots fall on multiples of `period_secs`; the radio is up for
/// the `AWAKE_SECS` leading into each slot and for the slot itself.
#[derive(Debug, Clone, Copy)]
pub struct DutyCycle {
    period_secs: u32,
    phase: u32,
}

impl DutyCycle {
    pub fn new(period_secs: u32) -> Self {
        Self {
            period_secs: period_secs.max(1),
            phase: 0,
        }
    }

    pub fn period_secs(&self) -> u32 {
        self.period_secs
    }

    /// Switch to a new publish period, keeping slots aligned with
    /// `elapsed_secs` since boot.
    pub fn realign(&mut self, period_secs: u32, elapsed_secs: u64) {
        self.period_secs = period_secs.max(1);
        self.phase = (elapsed_secs % u64::from(self.period_secs)) as u32;
    }

    /// Advance one second; returns whether the radio should be on.
    pub fn advance(&mut self) -> bool {
        self.phase = (self.phase + 1) % self.period_secs;
        self.phase == 0 || self.phase + AWAKE_SECS > self.period_secs
    }
}

// ───────────────────────────────────────────────────────────────
// WiFi adapter
// ───────────────────────────────────────────────────────────────

pub struct WifiAdapter {
    #[cfg(target_os = "espidf")]
    wifi: EspWifi<'static>,
    #[cfg(not(target_os = "espidf"))]
    sim_link_up: bool,
    #[cfg(not(target_os = "espidf"))]
    sim_reconnects: u32,
    state: WifiState,
    power_saving: bool,
    hold_awake: bool,
    duty: DutyCycle,
}

impl WifiAdapter {
    /// Configure and start the STA interface.
    #[cfg(target_os = "espidf")]
    pub fn new(
        mut wifi: EspWifi<'static>,
        ssid: &str,
        password: &str,
        publish_interval_secs: u16,
    ) -> Result<Self, WifiError> {
        validate_ssid(ssid)?;
        validate_password(password)?;
        let auth_method = if password.is_empty() {
            AuthMethod::None
        } else {
            AuthMethod::WPA2Personal
        };
        let client = ClientConfiguration {
            ssid: ssid.try_into().map_err(|_| WifiError::InvalidSsid)?,
            password: password.try_into().map_err(|_| WifiError::InvalidPassword)?,
            auth_method,
            ..Default::default()
        };
        wifi.set_configuration(&Configuration::Client(client))
            .map_err(|_| WifiError::Driver)?;
        wifi.start().map_err(|_| WifiError::Driver)?;
        if let Err(e) = wifi.connect() {
            warn!("WiFi: initial connect failed: {}", e);
        }
        info!("WiFi: STA started, SSID='{}'", ssid);
        Ok(Self {
            wifi,
            state: WifiState::Connecting,
            power_saving: false,
            hold_awake: false,
            duty: DutyCycle::new(u32::from(publish_interval_secs)),
        })
    }

    #[cfg(not(target_os = "espidf"))]
    pub fn new(ssid: &str, password: &str, publish_interval_secs: u16) -> Result<Self, WifiError> {
        validate_ssid(ssid)?;
        validate_password(password)?;
        info!("WiFi(sim): STA started, SSID='{}'", ssid);
        Ok(Self {
            sim_link_up: true,
            sim_reconnects: 0,
            state: WifiState::Connecting,
            power_saving: false,
            hold_awake: false,
            duty: DutyCycle::new(u32::from(publish_interval_secs)),
        })
    }

    pub fn state(&self) -> WifiState {
        self.state
    }

    /// Follow a changed publish interval.  `elapsed_ticks` is the number of
    /// slow ticks already run.
    pub fn set_publish_interval(&mut self, secs: u16, elapsed_ticks: u64) {
        if self.duty.period_secs() != u32::from(secs.max(1)) {
            info!("WiFi: duty cycle period {} s", secs);
            self.duty.realign(u32::from(secs), elapsed_ticks);
        }
    }

    /// Keep the radio on through power-saving sleep slots.
    pub fn hold_awake(&mut self, hold: bool) {
        if self.hold_awake != hold {
            info!("WiFi: {} for drift baseline", if hold { "held awake" } else { "released" });
        }
        self.hold_awake = hold;
    }

    /// Once per slow tick.  Returns `Some(on)` when the radio power state
    /// changed.
    pub fn tick(&mut self) -> Option<bool> {
        // Advance unconditionally so the phase stays aligned with publish slots.
        let awake = self.duty.advance();
        let want_on = !self.power_saving || self.hold_awake || awake;
        let is_on = self.state != WifiState::Off;

        let transition = match (is_on, want_on) {
            (true, false) => {
                self.platform_stop();
                self.state = WifiState::Off;
                Some(false)
            }
            (false, true) => {
                self.platform_start();
                self.state = WifiState::Connecting;
                Some(true)
            }
            _ => None,
        };

        if self.state != WifiState::Off {
            self.state = if self.platform_is_connected() {
                WifiState::Connected
            } else {
                WifiState::Connecting
            };
        }
        transition
    }

    // ── Platform-specific ─────────────────────────────────────

    #[cfg(target_os = "espidf")]
    fn platform_start(&mut self) {
        if let Err(e) = self.wifi.start() {
            warn!("WiFi: start failed: {}", e);
            return;
        }
        if let Err(e) = self.wifi.connect() {
            warn!("WiFi: connect failed: {}", e);
        }
    }

    #[cfg(not(target_os = "espidf"))]
    fn platform_start(&mut self) {
        info!("WiFi(sim): radio on");
    }

    #[cfg(target_os = "espidf")]
    fn platform_stop(&mut self) {
        if let Err(e) = self.wifi.stop() {
            warn!("WiFi: stop failed: {}", e);
        }
    }

    #[cfg(not(target_os = "espidf"))]
    fn platform_stop(&mut self) {
        info!("WiFi(sim): radio off");
    }

    #[cfg(target_os = "espidf")]
    fn platform_is_connected(&self) -> bool {
        self.wifi.is_connected().unwrap_or(false)
    }

    #[cfg(not(target_os = "espidf"))]
    fn platform_is_connected(&self) -> bool {
        self.sim_link_up
    }

    #[cfg(target_os = "espidf")]
    fn platform_rssi(&self) -> Option<i8> {
        use esp_idf_svc::sys::{ESP_OK, esp_wifi_sta_get_ap_info, wifi_ap_record_t};
        // SAFETY: wifi_ap_record_t is plain data; zero is a valid bit pattern.
        let mut info: wifi_ap_record_t = unsafe { core::mem::zeroed() };
        let ret = unsafe { esp_wifi_sta_get_ap_info(&mut info) };
        (ret == ESP_OK).then_some(info.rssi)
    }

    #[cfg(not(target_os = "espidf"))]
    fn platform_rssi(&self) -> Option<i8> {
        Some(-60)
    }

    // ── Simulation hooks ──────────────────────────────────────

    /// Simulation: drop or restore the access-point link.
    #[cfg(not(target_os = "espidf"))]
    pub fn sim_set_link(&mut self, up: bool) {
        self.sim_link_up = up;
    }

    #[cfg(not(target_os = "espidf"))]
    pub fn sim_reconnects(&self) -> u32 {
        self.sim_reconnects
    }
}

// ───────────────────────────────────────────────────────────────
// RadioPort
// ───────────────────────────────────────────────────────────────

impl RadioPort for WifiAdapter {
    fn is_connected(&self) -> bool {
        self.state != WifiState::Off && self.platform_is_connected()
    }

    fn rssi(&self) -> Option<i8> {
        if self.is_connected() {
            self.platform_rssi()
        } else {
            None
        }
    }

    fn reconnect(&mut self) {
        if self.state == WifiState::Off {
            return;
        }
        info!("WiFi: reconnecting");
        #[cfg(target_os = "espidf")]
        {
            let _ = self.wifi.disconnect();
            if let Err(e) = self.wifi.connect() {
                warn!("WiFi: reconnect failed: {}", e);
            }
        }
        #[cfg(not(target_os = "espidf"))]
        {
            self.sim_reconnects += 1;
        }
        self.state = WifiState::Connecting;
    }

    fn set_power_saving(&mut self, enabled: bool) {
        if self.power_saving != enabled {
            info!("WiFi: power saving {}", if enabled { "on" } else { "off" });
        }
        self.power_saving = enabled;
    }
}

// ───────────────────────────────────────────────────────────────
// Tests
// ───────────────────────────────────────────────────────────────
