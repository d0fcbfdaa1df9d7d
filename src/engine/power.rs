//! Power estimation from rotation intervals.
//!
//! One rotation is `1 / turns_per_kwh` kWh, so an interval of `t` tenths of a
//! second corresponds to `36_000_000 / (K * t)` watts.  The estimator keeps a
//! bounded history of intervals for the moving average and decays the
//! reading when the disk has been silent longer than the last interval.

use crate::config::MeterConfig;

/// Intervals retained for the moving average.
pub const HISTORY_CAP: usize = 64;

/// Current power draw as reported to consumers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PowerReading {
    Watts(u32),
    /// No interval recorded yet.
    Unknown,
    /// Estimation switched off in the configuration.
    Disabled,
}

impl PowerReading {
    pub fn watts(self) -> Option<u32> {
        match self {
            Self::Watts(w) => Some(w),
            _ => None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct PowerEstimator {
    ring: [u32; HISTORY_CAP],
    head: usize,
    count: usize,
    last_edge_ms: Option<u64>,
    turns_per_kwh: u16,
    window_secs: u16,
    enabled: bool,
}

impl PowerEstimator {
    pub fn new(config: &MeterConfig) -> Self {
        Self {
            ring: [0; HISTORY_CAP],
            head: 0,
            count: 0,
            last_edge_ms: None,
            turns_per_kwh: config.turns_per_kwh,
            window_secs: config.power_avg_secs,
            enabled: config.calculate_power,
        }
    }

    pub fn reconfigure(&mut self, config: &MeterConfig) {
        self.turns_per_kwh = config.turns_per_kwh;
        self.window_secs = config.power_avg_secs;
        self.enabled = config.calculate_power;
    }

    pub fn clear(&mut self) {
        self.head = 0;
        self.count = 0;
        self.last_edge_ms = None;
    }

    pub fn len(&self) -> usize {
        self.count
    }

    pub fn is_empty(&self) -> bool {
        self.count == 0
    }

    /// Note an accepted rotation at `now_ms`, with the interval since the
    /// previous one when known.
    pub fn record(&mut self, now_ms: u64, interval_tenths: Option<u32>) {
        self.last_edge_ms = Some(now_ms);
        if let Some(t) = interval_tenths {
            self.ring[self.head] = t;
            self.head = (self.head + 1) % HISTORY_CAP;
            if self.count < HISTORY_CAP {
                self.count += 1;
            }
        }
    }

    /// Power for a single interval of `tenths` tenths of a second.
    pub fn power_of(&self, tenths: u32) -> u32 {
        let denom = u64::from(self.turns_per_kwh.max(1)) * u64::from(tenths.max(1));
        (36_000_000 / denom) as u32
    }

    /// Estimate current power at `now_ms`.
    pub fn estimate(&self, now_ms: u64) -> PowerReading {
        if !self.enabled {
            return PowerReading::Disabled;
        }
        let Some(last) = self.newest() else {
            return PowerReading::Unknown;
        };

        // Silence longer than the last interval stands in for a virtual,
        // still-growing interval.
        let silent = self
            .last_edge_ms
            .map(|t| (now_ms.saturating_sub(t) / 100) as u32)
            .filter(|&elapsed| elapsed > last);

        if self.window_secs == 0 {
            return PowerReading::Watts(self.power_of(silent.unwrap_or(last)));
        }

        let limit = u64::from(self.window_secs) * 10;
        let mut span: u64 = 0;
        let mut watts: u64 = 0;
        let mut used: u64 = 0;
        for t in silent.into_iter().chain(self.iter_newest()) {
            span += u64::from(t);
            watts += u64::from(self.power_of(t));
            used += 1;
            if span > limit {
                break;
            }
        }
        PowerReading::Watts((watts / used) as u32)
    }

    fn newest(&self) -> Option<u32> {
        self.iter_newest().next()
    }

    fn iter_newest(&self) -> impl Iterator<Item = u32> + '_ {
        (1..=self.count).map(move |k| self.ring[(self.head + HISTORY_CAP - k) % HISTORY_CAP])
    }
}
