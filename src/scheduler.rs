//! Two-cadence cooperative scheduler.
//!
//! The sampling loop runs one fast tick per configured sample interval and
//! one slow tick per second.  The scheduler only decides *when*; it notifies
//! a [`SchedulerDelegate`] and knows nothing about the engine, ports or the
//! request queue.
//!
//! ```text
//! ┌──────────────────────────────────────────────────────┐
//! │  main loop: now_ms ──▶ Scheduler::poll()             │
//! │                          │                           │
//! │             ┌────────────┴─────────────┐             │
//! │             ▼                          ▼             │
//! │   fast cadence (15–50 ms)     slow cadence (1 s)     │
//! │   on_fast_tick()              on_slow_tick()         │
//! │   sample → engine             publish · radio ·      │
//! │                               backup · LED           │
//! └──────────────────────────────────────────────────────┘
//! ```
//!
//! A late poll fires each due cadence once; missed periods are not
//! replayed, so a slow network call never causes a burst of samples.

use crate::app::ports::SchedulerDelegate;

/// Slow cadence period.
pub const SLOW_PERIOD_MS: u64 = 1000;

// ═══════════════════════════════════════════════════════════════
//  Cadence
// ═══════════════════════════════════════════════════════════════

/// One fixed-period timer driven by an external millisecond clock.
#[derive(Debug, Clone, Copy)]
pub struct Cadence {
    period_ms: u64,
    last_ms: u64,
}

impl Cadence {
    pub fn new(period_ms: u64, start_ms: u64) -> Self {
        Self {
            period_ms: period_ms.max(1),
            last_ms: start_ms,
        }
    }

    pub fn period_ms(&self) -> u64 {
        self.period_ms
    }

    /// Returns `true` and restarts the period if it has elapsed.
    pub fn due(&mut self, now_ms: u64) -> bool {
        if now_ms.saturating_sub(self.last_ms) >= self.period_ms {
            self.last_ms = now_ms;
            true
        } else {
            false
        }
    }

    /// Milliseconds until the next fire (zero if overdue).
    pub fn remaining(&self, now_ms: u64) -> u64 {
        self.period_ms
            .saturating_sub(now_ms.saturating_sub(self.last_ms))
    }
}

// ═══════════════════════════════════════════════════════════════
//  Scheduler
// ═══════════════════════════════════════════════════════════════

pub struct Scheduler {
    fast: Cadence,
    slow: Cadence,
    fast_ticks: u64,
    slow_ticks: u64,
}

impl Scheduler {
    pub fn new(sample_interval_ms: u16, start_ms: u64) -> Self {
        Self {
            fast: Cadence::new(u64::from(sample_interval_ms), start_ms),
            slow: Cadence::new(SLOW_PERIOD_MS, start_ms),
            fast_ticks: 0,
            slow_ticks: 0,
        }
    }

    /// Fire whichever cadences are due.  The fast tick runs first so a
    /// sample is never delayed behind slow-tick I/O.
    pub fn poll(&mut self, now_ms: u64, delegate: &mut dyn SchedulerDelegate) {
        if self.fast.due(now_ms) {
            self.fast_ticks += 1;
            delegate.on_fast_tick(now_ms);
        }
        if self.slow.due(now_ms) {
            self.slow_ticks += 1;
            delegate.on_slow_tick(now_ms);
        }
    }

    /// How long the caller may sleep before the next cadence is due.
    pub fn idle_budget_ms(&self, now_ms: u64) -> u64 {
        self.fast.remaining(now_ms).min(self.slow.remaining(now_ms))
    }

    pub fn fast_ticks(&self) -> u64 {
        self.fast_ticks
    }

    pub fn slow_ticks(&self) -> u64 {
        self.slow_ticks
    }
}

// ═══════════════════════════════════════════════════════════════
//  Tests
// ═══════════════════════════════════════════════════════════════
