//! Single-colour status LED driver.
//!
//! On ESP-IDF: drives the on-board LED GPIO (active LOW) via hw_init.
//! On host/test: tracks state in-memory only.

use crate::drivers::hw_init;
use crate::pins;

pub struct StatusLed {
    on: bool,
}

impl Default for StatusLed {
    fn default() -> Self {
        Self::new()
    }
}

impl StatusLed {
    pub fn new() -> Self {
        Self { on: false }
    }

    pub fn set(&mut self, on: bool) {
        if on != self.on {
            hw_init::gpio_write(pins::LED_GPIO, on != pins::LED_ACTIVE_LOW);
            self.on = on;
        }
    }

    pub fn is_on(&self) -> bool {
        self.on
    }
}
