//! Hardware adapter: bridges real peripherals to domain port traits.
//!
//! Owns the IR sensor and the status LED, exposing the sensor through
//! [`SampleSource`] and translating tick outcomes into LED patterns.  This
//! is the only module in the system that touches actual hardware.  On
//! non-espidf targets, the underlying drivers use cfg-gated simulation
//! stubs.

use embedded_hal::delay::DelayNs;

use crate::app::ports::SampleSource;
use crate::drivers::ir_sensor::IrSensor;
use crate::drivers::led_patterns::LedPatternEngine;
use crate::drivers::status_led::StatusLed;
use crate::engine::TickOutcome;

/// Concrete adapter that combines all hardware behind port traits.
pub struct HardwareAdapter<D: DelayNs> {
    ir: IrSensor<D>,
    led: StatusLed,
    patterns: LedPatternEngine,
}

impl<D: DelayNs> HardwareAdapter<D> {
    pub fn new(ir: IrSensor<D>, led: StatusLed) -> Self {
        Self {
            ir,
            led,
            patterns: LedPatternEngine::new(),
        }
    }

    /// Update the LED after a fast tick.
    pub fn indicate(&mut self, outcome: &TickOutcome, calibrating: bool, offline: bool, delta_ms: u32) {
        if matches!(outcome, TickOutcome::Rotation { .. }) {
            self.patterns.trigger_double_blink();
        }
        self.patterns.set_calibrating(calibrating);
        self.patterns.set_offline(offline);
        let lit = self.patterns.tick(delta_ms);
        self.led.set(lit);
    }

    /// Fatal error pattern; one step per call.
    pub fn fatal_flash(&mut self, delta_ms: u32) {
        self.patterns.set_fatal();
        let lit = self.patterns.tick(delta_ms);
        self.led.set(lit);
    }

    pub fn led_on(&self) -> bool {
        self.led.is_on()
    }
}

// ── SampleSource implementation ───────────────────────────────

impl<D: DelayNs> SampleSource for HardwareAdapter<D> {
    fn read(&mut self) -> u16 {
        self.ir.read()
    }
}
