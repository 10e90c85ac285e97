//! Port traits, the hexagonal boundary between the meter core and the
//! outside world.
//!
//! ```text
//!   Adapter ──▶ Port trait ──▶ MeterService (domain)
//! ```
//!
//! NVS, the clocks, the status LED and the event sinks implement these
//! traits; [`MeterService`](super::service::MeterService) takes them as
//! generic parameters and never reaches hardware on its own.
//!
//! Storage and the wall clock are optional collaborators: the service asks
//! before using them and keeps metering in memory when they are missing.

use crate::calendar::CalendarDate;
use crate::config::MeterConfig;

// ───────────────────────────────────────────────────────────────
// Storage port (meter ↔ NVS counter keys)
// ───────────────────────────────────────────────────────────────

/// Persistent `u64` key-value storage for the counter record.
///
/// Keys are short (≤ 15 bytes, the NVS limit) and live in a single
/// namespace chosen by the adapter.  Each `put_u64` is durable on return.
pub trait StoragePort {
    /// `false` when the backend never initialised; callers skip I/O.
    fn is_available(&self) -> bool;

    /// Read a value.  A missing key yields `default`, not an error.
    fn get_u64(&self, key: &str, default: u64) -> Result<u64, StorageError>;

    /// Write a value and commit it.
    fn put_u64(&mut self, key: &str, value: u64) -> Result<(), StorageError>;
}

// ───────────────────────────────────────────────────────────────
// Configuration port (meter ↔ stored MeterConfig blob)
// ───────────────────────────────────────────────────────────────

/// Loads and persists [`MeterConfig`].
///
/// Implementations MUST call [`MeterConfig::validate`] before persisting
/// and reject, never clamp, out-of-range values.
pub trait ConfigPort {
    /// Returns [`MeterConfig::default()`] if no stored config exists.
    fn load(&self) -> Result<MeterConfig, ConfigError>;

    fn save(&self, config: &MeterConfig) -> Result<(), ConfigError>;
}

// ───────────────────────────────────────────────────────────────
// Clock port
// ───────────────────────────────────────────────────────────────

pub trait ClockPort {
    /// Milliseconds since boot, truncated to `u32` (wraps after ~49 days).
    fn uptime_ms(&self) -> u32;

    /// Local calendar date, or `None` while the wall clock is unsynchronised.
    fn wall_clock(&self) -> Option<CalendarDate>;
}

// ───────────────────────────────────────────────────────────────
// Event sink port (meter → log / telemetry transport)
// ───────────────────────────────────────────────────────────────

/// Receives every [`AppEvent`](super::events::AppEvent) the meter raises.
/// Emission never blocks and nothing is returned.
pub trait EventSink {
    fn emit(&mut self, event: &super::events::AppEvent);
}

// ───────────────────────────────────────────────────────────────
// Indicator port (domain → status LED)
// ───────────────────────────────────────────────────────────────

pub trait IndicatorPort {
    fn set_indicator(&mut self, on: bool);
}

// ── Errors ────────────────────────────────────────────────────

/// Why a [`ConfigPort`] call failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigError {
    /// Nothing stored yet.
    NotFound,
    /// Blob present but does not decode as a `MeterConfig`.
    Corrupted,
    /// Rejected by [`MeterConfig::validate`]; carries the violated rule.
    ValidationFailed(&'static str),
    StorageFull,
    IoError,
}

/// Why a [`StoragePort`] call failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StorageError {
    /// Backend never came up.
    Unavailable,
    NotFound,
    /// No free NVS entries left.
    Full,
    /// Read or commit failed in the driver.
    IoError,
}

impl core::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::NotFound => f.write_str("no stored config"),
            Self::Corrupted => f.write_str("stored config does not decode"),
            Self::ValidationFailed(rule) => write!(f, "rejected: {}", rule),
            Self::StorageFull => f.write_str("config partition full"),
            Self::IoError => f.write_str("config I/O failure"),
        }
    }
}

impl core::fmt::Display for StorageError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::Unavailable => f.write_str("backend unavailable"),
            Self::NotFound => f.write_str("no such key"),
            Self::Full => f.write_str("partition full"),
            Self::IoError => f.write_str("flash I/O failure"),
        }
    }
}
