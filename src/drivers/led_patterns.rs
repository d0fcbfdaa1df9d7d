//! LED pattern engine with priority-based pattern selection.
//!
//! Generates the on/off state of the single status LED.  The caller ticks
//! it on every fast tick with the elapsed milliseconds and feeds the result
//! into `StatusLed::set()`.
//!
//! ## Priority hierarchy (highest first)
//!
//! 1. **Fatal**: rapid flash, never cleared
//! 2. **Rotation**: one double blink per counted rotation
//! 3. **Calibrating**: slow toggle
//! 4. **Offline**: slow toggle while the radio is unexpectedly down
//!
//! | Pattern      | Description                      | Rate     |
//! |-------------|----------------------------------|----------|
//! | SlowToggle   | 1 s on, 1 s off                  | 0.5 Hz   |
//! | DoubleBlink  | Two 200 ms flashes, one-shot     | none     |
//! | RapidFlash   | 100 ms on, 100 ms off            | 5 Hz     |

/// Length of the one-shot double blink.
pub const DOUBLE_BLINK_MS: u32 = 800;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PatternId {
    Off,
    SlowToggle,
    DoubleBlink,
    RapidFlash,
}

/// LED pattern engine. Stack-allocated, no heap.
#[derive(Debug, Default)]
pub struct LedPatternEngine {
    phase_ms: u32,
    active: Option<PatternId>,
    fatal: bool,
    blink_remaining_ms: u32,
    calibrating: bool,
    offline: bool,
}

impl LedPatternEngine {
    pub fn new() -> Self {
        Self::default()
    }

    /// Latch the fatal pattern.  There is no way back short of a reboot.
    pub fn set_fatal(&mut self) {
        self.fatal = true;
    }

    /// Start (or restart) the rotation double blink.
    pub fn trigger_double_blink(&mut self) {
        self.blink_remaining_ms = DOUBLE_BLINK_MS;
        // Force a phase reset even if a blink is already running.
        self.active = None;
    }

    pub fn set_calibrating(&mut self, active: bool) {
        self.calibrating = active;
    }

    pub fn set_offline(&mut self, active: bool) {
        self.offline = active;
    }

    /// Advance the pattern phase and return whether the LED is lit.
    pub fn tick(&mut self, delta_ms: u32) -> bool {
        self.phase_ms = self.phase_ms.wrapping_add(delta_ms);

        let selected = self.select_active();
        if self.active != Some(selected) {
            self.phase_ms = 0;
        }
        self.active = Some(selected);

        let lit = self.generate(selected);
        if selected == PatternId::DoubleBlink {
            self.blink_remaining_ms = self.blink_remaining_ms.saturating_sub(delta_ms);
        }
        lit
    }

    fn select_active(&self) -> PatternId {
        if self.fatal {
            PatternId::RapidFlash
        } else if self.blink_remaining_ms > 0 {
            PatternId::DoubleBlink
        } else if self.calibrating || self.offline {
            PatternId::SlowToggle
        } else {
            PatternId::Off
        }
    }

    fn generate(&self, pattern: PatternId) -> bool {
        match pattern {
            PatternId::Off => false,
            PatternId::SlowToggle => (self.phase_ms % 2000) < 1000,
            PatternId::DoubleBlink => {
                let p = self.phase_ms;
                p < 200 || (400..600).contains(&p)
            }
            PatternId::RapidFlash => (self.phase_ms % 200) < 100,
        }
    }
}
