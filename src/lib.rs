//! Ferraris meter firmware library.
//!
//! Exposes the counting engine, the application service and the adapters
//! for integration testing. All ESP-IDF-specific code is guarded by
//! `#[cfg(target_os = "espidf")]` within each module.

#![deny(unused_must_use)]

pub mod app;
pub mod config;
pub mod console;
pub mod engine;
pub mod error;
pub mod requests;
pub mod scheduler;

pub mod adapters;
pub mod drivers;
pub mod pins;
