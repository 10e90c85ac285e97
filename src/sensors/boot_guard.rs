//! Post-boot quiet window for the pulse input.
//!
//! Reed and hall sensors chatter while the supply rails settle.  The
//! guard discards every edge for a fixed interval after arming, then
//! opens on the first edge seen after the interval and never closes
//! again while powered.
//!
//! All state is atomic: the guard is consulted from the pulse ISR.

use core::sync::atomic::{AtomicBool, AtomicU32, Ordering};

/// Outcome of presenting one edge to the guard.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Admission {
    /// Guard still closed; drop the edge without classifying it.
    Discard,
    /// This edge opened the guard.  Classify it, after seeding.
    Opened,
    /// Guard already open.
    Pass,
}

/// `Closed → Open` one-way gate.
pub struct BootGuard {
    boot_ms: AtomicU32,
    duration_ms: AtomicU32,
    open: AtomicBool,
}

impl BootGuard {
    pub const fn new(duration_ms: u32) -> Self {
        Self {
            boot_ms: AtomicU32::new(0),
            duration_ms: AtomicU32::new(duration_ms),
            open: AtomicBool::new(false),
        }
    }

    /// Close the guard and restart the quiet window at `now_ms`.
    /// Only called during bring-up, before the ISR is attached.
    pub fn arm(&self, now_ms: u32, duration_ms: u32) {
        self.boot_ms.store(now_ms, Ordering::Relaxed);
        self.duration_ms.store(duration_ms, Ordering::Relaxed);
        self.open.store(false, Ordering::Release);
    }

    /// Decide what to do with an edge observed at `now_ms`.
    pub fn admit(&self, now_ms: u32) -> Admission {
        if self.open.load(Ordering::Acquire) {
            return Admission::Pass;
        }

        let boot = self.boot_ms.load(Ordering::Relaxed);
        let duration = self.duration_ms.load(Ordering::Relaxed);
        if now_ms.wrapping_sub(boot) < duration {
            return Admission::Discard;
        }

        self.open.store(true, Ordering::Release);
        Admission::Opened
    }

    pub fn is_open(&self) -> bool {
        self.open.load(Ordering::Acquire)
    }

    /// Timestamp the quiet window started at.
    pub fn boot_ms(&self) -> u32 {
        self.boot_ms.load(Ordering::Relaxed)
    }

    pub fn duration_ms(&self) -> u32 {
        self.duration_ms.load(Ordering::Relaxed)
    }
}
