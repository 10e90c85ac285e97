//! Unified error types for the water meter firmware.
//!
//! Each subsystem keeps its own small `Copy` error enum next to the code
//! that raises it; this module funnels them into one [`Error`] so the
//! command and configuration entry points of the service return a single
//! type.  Nothing here is fatal: the polling loop logs and carries on.

use core::fmt;

use crate::app::commands::CommandError;
use crate::app::ports::{ConfigError, StorageError};
use crate::persistence::PersistError;

// ---------------------------------------------------------------------------
// Top-level firmware error
// ---------------------------------------------------------------------------

/// Every fallible service entry point funnels into this type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Error {
    /// The key-value backend failed.
    Storage(StorageError),
    /// A counter record could not be saved or restored.
    Persist(PersistError),
    /// Configuration failed validation or could not be loaded.
    Config(ConfigError),
    /// An administrative command was malformed.
    Command(CommandError),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Storage(e) => write!(f, "storage: {e}"),
            Self::Persist(e) => write!(f, "persist: {e}"),
            Self::Config(e) => write!(f, "config: {e}"),
            Self::Command(e) => write!(f, "command: {e}"),
        }
    }
}

impl From<StorageError> for Error {
    fn from(e: StorageError) -> Self {
        Self::Storage(e)
    }
}

impl From<PersistError> for Error {
    fn from(e: PersistError) -> Self {
        Self::Persist(e)
    }
}

impl From<ConfigError> for Error {
    fn from(e: ConfigError) -> Self {
        Self::Config(e)
    }
}

impl From<CommandError> for Error {
    fn from(e: CommandError) -> Self {
        Self::Command(e)
    }
}

// ---------------------------------------------------------------------------
// Convenience Result alias
// ---------------------------------------------------------------------------

/// Firmware-wide `Result` alias.
pub type Result<T> = core::result::Result<T, Error>;
