//! Outbound application events.
//!
//! The [`MeterService`](super::service::MeterService) emits these through
//! the [`EventSink`](super::ports::EventSink) port.  Adapters on the other
//! side decide what to do with them: log to serial, publish over MQTT,
//! push to a web socket.

use serde::Serialize;

use super::commands::CommandSource;
use crate::ledger::{CounterField, CounterSnapshot};

/// Structured events emitted by the meter core.
#[derive(Debug, Clone, PartialEq)]
pub enum AppEvent {
    /// The service has started; carries the restored counters.
    Started(CounterSnapshot),

    /// One or more pulses were applied to the ledger.
    PulseCounted {
        lifetime_pulses: u64,
        daily_liters: u64,
        yearly_liters: u64,
    },

    /// A falling edge failed the debounce or stable-HIGH test.
    PulseIgnored { debounce_gap_ms: u32 },

    /// The boot guard opened; the meter is now counting.
    GuardOpened { after_ms: u32 },

    DailyReset,
    YearlyReset,

    /// An administrator replaced a counter.
    CounterOverridden(AuditEntry),

    /// Counters persisted.
    Saved,

    /// A save was attempted and failed; the next periodic save retries.
    SaveFailed,

    /// Periodic telemetry snapshot.
    Telemetry(TelemetryData),
}

/// A point-in-time telemetry snapshot suitable for logging or transmission.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct TelemetryData {
    #[serde(flatten)]
    pub counters: CounterSnapshot,
    /// Simple-difference flow over the last publish window.
    pub flow_l_per_min: f32,
    pub uptime_secs: u32,
}

/// What an audited action did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuditAction {
    Override(CounterField),
    ResetDaily,
    ResetYearly,
}

impl core::fmt::Display for AuditAction {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::Override(field) => write!(f, "override {field}"),
            Self::ResetDaily => write!(f, "reset daily"),
            Self::ResetYearly => write!(f, "reset yearly"),
        }
    }
}

/// One entry in the override/reset audit trail.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AuditEntry {
    pub source: CommandSource,
    pub action: AuditAction,
    pub previous: u64,
    pub value: u64,
    pub uptime_ms: u32,
}
