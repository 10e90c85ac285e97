//! Interrupt-to-loop pulse channel.
//!
//! The pulse ISR is the only producer; the polling loop is the only
//! consumer.  The channel carries exactly one counter and three one-shot
//! flags, all atomics, so the ISR never takes a lock.
//!
//! ```text
//! ┌─────────────┐  fetch_add / store(Release)  ┌──────────────┐
//! │ Pulse ISR   │─────────────────────────────▶│ PulseChannel │
//! └─────────────┘                              └──────┬───────┘
//!                                swap(false, Acquire) │
//!                                                     ▼
//!                                              ┌──────────────┐
//!                                              │  Poll loop   │
//!                                              └──────────────┘
//! ```
//!
//! Flags are booleans, not counts: several pulses between two drains
//! coalesce into one `new_pulse` notification.  The tally is the
//! authoritative count; the consumer diffs it against what it has
//! already applied.

use core::sync::atomic::{AtomicBool, AtomicU32, AtomicU64, Ordering};

/// Shared state between the pulse ISR and the polling loop.
pub struct PulseChannel {
    /// Lifetime accepted-pulse tally.
    tally: AtomicU64,
    new_pulse: AtomicBool,
    ignored_pulse: AtomicBool,
    /// Debounce gap (ms) of the most recent rejected edge.
    last_ignored_gap_ms: AtomicU32,
    guard_opened: AtomicBool,
}

/// Everything the polling loop learned from one drain.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Drained {
    /// At least one pulse was accepted since the last drain.
    pub new_pulse: bool,
    /// Debounce gap of the latest rejected edge, if any edge was rejected.
    pub ignored_gap_ms: Option<u32>,
    /// The boot guard opened since the last drain.
    pub guard_opened: bool,
}

impl Drained {
    pub fn is_empty(&self) -> bool {
        !self.new_pulse && self.ignored_gap_ms.is_none() && !self.guard_opened
    }
}

impl PulseChannel {
    pub const fn new() -> Self {
        Self {
            tally: AtomicU64::new(0),
            new_pulse: AtomicBool::new(false),
            ignored_pulse: AtomicBool::new(false),
            last_ignored_gap_ms: AtomicU32::new(0),
            guard_opened: AtomicBool::new(false),
        }
    }

    // ── Producer side (ISR) ───────────────────────────────────

    /// Count one accepted pulse.  The Release store orders the tally
    /// increment before the flag, so a consumer that sees the flag also
    /// sees the new count.
    pub fn record_pulse(&self) {
        self.tally.fetch_add(1, Ordering::Relaxed);
        self.new_pulse.store(true, Ordering::Release);
    }

    /// Flag a rejected falling edge.
    pub fn record_ignored(&self, debounce_gap_ms: u32) {
        self.last_ignored_gap_ms.store(debounce_gap_ms, Ordering::Relaxed);
        self.ignored_pulse.store(true, Ordering::Release);
    }

    /// Flag that the boot guard just opened.
    pub fn record_guard_opened(&self) {
        self.guard_opened.store(true, Ordering::Release);
    }

    // ── Consumer side (poll loop) ─────────────────────────────

    /// Take every pending flag, resetting each to `false`.
    pub fn drain(&self) -> Drained {
        let new_pulse = self.new_pulse.swap(false, Ordering::Acquire);
        let ignored_gap_ms = if self.ignored_pulse.swap(false, Ordering::Acquire) {
            Some(self.last_ignored_gap_ms.load(Ordering::Relaxed))
        } else {
            None
        };
        let guard_opened = self.guard_opened.swap(false, Ordering::Acquire);

        Drained {
            new_pulse,
            ignored_gap_ms,
            guard_opened,
        }
    }

    /// Current lifetime pulse tally.
    pub fn pulse_count(&self) -> u64 {
        self.tally.load(Ordering::Acquire)
    }

    /// Replace the tally (boot-time restore or administrative override).
    pub fn set_pulse_count(&self, count: u64) {
        self.tally.store(count, Ordering::Release);
    }

    /// Drop any flags left over from a previous arming.
    pub fn clear_flags(&self) {
        self.new_pulse.store(false, Ordering::Relaxed);
        self.ignored_pulse.store(false, Ordering::Relaxed);
        self.guard_opened.store(false, Ordering::Relaxed);
    }
}

impl Default for PulseChannel {
    fn default() -> Self {
        Self::new()
    }
}
