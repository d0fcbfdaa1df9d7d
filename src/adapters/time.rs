//! Monotonic clock and uptime formatting.
//!
//! - **`target_os = "espidf"`** wraps `esp_timer_get_time()` from the
//!   ESP-IDF high-resolution timer (microsecond precision, monotonic).
//! - **`not(target_os = "espidf")`** uses `std::time::Instant` for
//!   host-side testing and simulation.

use core::fmt::Write;

/// Rendered uptime, e.g. `"12d 3h 45m"`.
pub type RuntimeString = heapless::String<24>;

/// Monotonic millisecond clock for the scheduler.
pub struct Clock {
    #[cfg(not(target_os = "espidf"))]
    start: std::time::Instant,
}

impl Default for Clock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock {
    pub fn new() -> Self {
        Self {
            #[cfg(not(target_os = "espidf"))]
            start: std::time::Instant::now(),
        }
    }

    /// Milliseconds since boot (monotonic).
    #[cfg(target_os = "espidf")]
    pub fn now_ms(&self) -> u64 {
        (unsafe { esp_idf_svc::sys::esp_timer_get_time() }) as u64 / 1000
    }

    /// Milliseconds since boot (monotonic).
    #[cfg(not(target_os = "espidf"))]
    pub fn now_ms(&self) -> u64 {
        self.start.elapsed().as_millis() as u64
    }
}

/// Format `secs` as days, hours and minutes.  `compact` drops the spaces
/// for use as an MQTT value.
pub fn format_runtime(secs: u64, compact: bool) -> RuntimeString {
    let days = secs / 86_400;
    let hours = (secs % 86_400) / 3600;
    let minutes = (secs % 3600) / 60;
    let mut out = RuntimeString::new();
    let _ = if compact {
        write!(out, "{days}d{hours}h{minutes}m")
    } else {
        write!(out, "{days}d {hours}h {minutes}m")
    };
    out
}
