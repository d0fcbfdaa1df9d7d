//! Unified error types for the meter firmware.
//!
//! Port-level errors live next to their traits in [`crate::app::ports`];
//! this module folds them into one `Error` so boot code and the binary
//! can handle every failure the same way.

use core::fmt;

use crate::app::ports::{ConfigError, PublishError, StorageError};

// ---------------------------------------------------------------------------
// Top-level firmware error
// ---------------------------------------------------------------------------

/// Every fallible operation in the firmware funnels into this type.
#[derive(Debug)]
pub enum Error {
    /// Peripheral or buffer initialisation failed.  Fatal.
    Init(&'static str),
    /// Configuration is invalid or could not be loaded.
    Config(ConfigError),
    /// Persistent storage failed.
    Storage(StorageError),
    /// A reading could not be handed to the message broker.
    Publish(PublishError),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Init(msg) => write!(f, "init: {msg}"),
            Self::Config(e) => write!(f, "config: {e}"),
            Self::Storage(e) => write!(f, "storage: {e}"),
            Self::Publish(e) => write!(f, "publish: {e}"),
        }
    }
}

impl std::error::Error for Error {}

impl From<ConfigError> for Error {
    fn from(e: ConfigError) -> Self {
        Self::Config(e)
    }
}

impl From<StorageError> for Error {
    fn from(e: StorageError) -> Self {
        Self::Storage(e)
    }
}

impl From<PublishError> for Error {
    fn from(e: PublishError) -> Self {
        Self::Publish(e)
    }
}

// ---------------------------------------------------------------------------
// Convenience Result alias
// ---------------------------------------------------------------------------

/// Firmware-wide `Result` alias.
pub type Result<T> = core::result::Result<T, Error>;
