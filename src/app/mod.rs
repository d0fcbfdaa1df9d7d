//! Application core: pure domain logic, zero I/O.
//!
//! Wraps the counting [`engine`](crate::engine) with the meter's slow-cadence
//! duties: persistence, publishing and radio health.  All interaction with
//! hardware happens through **port traits** defined in [`ports`], keeping
//! this layer fully testable without real peripherals.

pub mod commands;
pub mod events;
pub mod ports;
pub mod service;
