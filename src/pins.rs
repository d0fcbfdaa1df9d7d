//! GPIO / peripheral pin assignments for the Ferraris reader board.
//!
//! Single source of truth: every driver references this module rather than
//! hard-coding pin numbers.

// ---------------------------------------------------------------------------
// IR reflex sensor (TCRT5000 phototransistor via divider)
// ---------------------------------------------------------------------------

/// ADC1 channel 0 (GPIO 36 / SENSOR_VP on ESP32).
pub const IR_ADC_GPIO: i32 = 36;
/// ADC1 channel number for the IR sensor.
pub const IR_ADC_CHANNEL: u32 = 0;

/// Conversions averaged per sample.
pub const IR_OVERSAMPLE: u16 = 10;
/// Spacing between averaged conversions.
pub const IR_OVERSAMPLE_GAP_US: u32 = 200;

// ---------------------------------------------------------------------------
// Status LED (on-board, active LOW)
// ---------------------------------------------------------------------------

pub const LED_GPIO: i32 = 2;
pub const LED_ACTIVE_LOW: bool = true;
