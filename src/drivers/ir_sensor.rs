//! IR reflex sensor facing the meter disc.
//!
//! Each sample is the mean of [`IR_OVERSAMPLE`] one-shot conversions spaced
//! [`IR_OVERSAMPLE_GAP_US`] apart, which flattens mains-frequency ripple
//! from room lighting.  The red mark on the disc reflects less IR, so a
//! *higher* reading means the mark is in view.
//!
//! Generic over [`DelayNs`] so host tests can run without real waits.

use embedded_hal::delay::DelayNs;

use crate::pins::{IR_ADC_CHANNEL, IR_OVERSAMPLE, IR_OVERSAMPLE_GAP_US};

#[cfg(not(target_os = "espidf"))]
use core::sync::atomic::{AtomicU16, Ordering};

#[cfg(not(target_os = "espidf"))]
static SIM_IR_ADC: AtomicU16 = AtomicU16::new(0);

/// Simulation: set the raw value returned by every conversion.
#[cfg(not(target_os = "espidf"))]
pub fn sim_set_ir_adc(raw: u16) {
    SIM_IR_ADC.store(raw, Ordering::Relaxed);
}

#[cfg(target_os = "espidf")]
fn raw_read(channel: u32) -> u16 {
    crate::drivers::hw_init::adc1_read(channel)
}

#[cfg(not(target_os = "espidf"))]
fn raw_read(_channel: u32) -> u16 {
    SIM_IR_ADC.load(Ordering::Relaxed)
}

pub struct IrSensor<D: DelayNs> {
    delay: D,
    channel: u32,
}

impl<D: DelayNs> IrSensor<D> {
    pub fn new(delay: D) -> Self {
        Self {
            delay,
            channel: IR_ADC_CHANNEL,
        }
    }

    /// One averaged sample.
    pub fn read(&mut self) -> u16 {
        let mut sum: u32 = 0;
        for i in 0..IR_OVERSAMPLE {
            if i > 0 {
                self.delay.delay_us(IR_OVERSAMPLE_GAP_US);
            }
            sum += u32::from(raw_read(self.channel));
        }
        (sum / u32::from(IR_OVERSAMPLE)) as u16
    }
}
