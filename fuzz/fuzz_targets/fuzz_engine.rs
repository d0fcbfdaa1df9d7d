//! Fuzz target: `Engine::fast_tick` under interleaved requests
//!
//! Each 3-byte chunk is one step: the first byte selects a sample or a
//! request, the next two carry a 10-bit ADC value.  The engine must never
//! panic and the rotation total must never decrease.
//!
//! cargo fuzz run fuzz_engine

#![no_main]

use ferraris::config::MeterConfig;
use ferraris::engine::meter::PersistedState;
use ferraris::engine::{Engine, EngineMode, TickOutcome};
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    let config = MeterConfig {
        sample_interval_ms: 50,
        buffer_secs: 30,
        ..Default::default()
    };
    let Ok(mut engine) = Engine::new(&config, &PersistedState::default()) else {
        return;
    };

    let mut now = 0u64;
    let mut radio_on = true;
    let mut total = 0u32;

    for step in data.chunks_exact(3) {
        match step[0] % 16 {
            12 => {
                engine.begin_calibration();
            }
            13 => {
                engine.cancel_calibration();
            }
            14 => {
                radio_on = !radio_on;
                engine.radio_changed(radio_on, now);
            }
            15 => now += u64::from(step[1]) * 1000,
            _ => {
                now += 50;
                let sample = u16::from_le_bytes([step[1], step[2]]) & 0x3ff;
                if let TickOutcome::Rotation { total: t } = engine.fast_tick(sample, now) {
                    assert_eq!(t, total + 1, "rotation must add exactly one");
                }
            }
        }

        let current = engine.meter().total_rotations;
        assert!(current >= total, "total decreased");
        total = current;

        if engine.mode() == EngineMode::Counting {
            assert!(engine.threshold() > 0, "counting without a threshold");
        }
    }
});
