//! Sensor and indicator drivers plus one-shot hardware initialisation.

pub mod hw_init;
pub mod ir_sensor;
pub mod led_patterns;
pub mod status_led;
