//! Counter ledger: daily and yearly consumption.
//!
//! The lifetime pulse count is *not* stored here: it lives in the ISR's
//! atomic tally and is passed in when a snapshot is taken.  The ledger
//! owns the two calendar-scoped volumes, which only the polling loop
//! touches.
//!
//! Volumes are whole litres (the persisted unit).  Each pulse adds
//! `ml_per_pulse` millilitres to a per-counter remainder and carries
//! whole litres out of it, so fractional litres-per-pulse meters neither
//! truncate to zero nor drift.

use serde::Serialize;

/// Which counter an administrative override targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CounterField {
    /// Lifetime pulse count.
    Lifetime,
    /// Litres since midnight.
    Daily,
    /// Litres since 1 January.
    Yearly,
}

impl CounterField {
    /// Persisted key for this counter.
    pub const fn key(self) -> &'static str {
        match self {
            Self::Lifetime => "pulse_count",
            Self::Daily => "daily_liters",
            Self::Yearly => "yearly_liters",
        }
    }
}

impl core::fmt::Display for CounterField {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::Lifetime => write!(f, "lifetime pulses"),
            Self::Daily => write!(f, "daily litres"),
            Self::Yearly => write!(f, "yearly litres"),
        }
    }
}

/// Read-only view of every counter and its derived volumes.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct CounterSnapshot {
    #[serde(rename = "pulse_count")]
    pub lifetime_pulses: u64,
    pub daily_liters: u64,
    pub yearly_liters: u64,
    /// `lifetime_pulses × liters_per_pulse`.
    pub total_liters: f64,
    pub total_m3: f64,
    pub daily_m3: f64,
    pub yearly_m3: f64,
}

impl CounterSnapshot {
    /// JSON payload for the data topic.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}

/// Daily and yearly volume accumulators.
#[derive(Debug, Clone)]
pub struct CounterLedger {
    daily_liters: u64,
    yearly_liters: u64,
    /// Sub-litre carry, millilitres (< 1000).
    daily_rem_ml: u64,
    yearly_rem_ml: u64,
    ml_per_pulse: u64,
    liters_per_pulse: f32,
}

impl CounterLedger {
    pub fn new(liters_per_pulse: f32) -> Self {
        Self {
            daily_liters: 0,
            yearly_liters: 0,
            daily_rem_ml: 0,
            yearly_rem_ml: 0,
            ml_per_pulse: to_ml(liters_per_pulse),
            liters_per_pulse,
        }
    }

    /// Seed from a persisted record.
    pub fn restore(&mut self, daily_liters: u64, yearly_liters: u64) {
        self.daily_liters = daily_liters;
        self.yearly_liters = yearly_liters;
        self.daily_rem_ml = 0;
        self.yearly_rem_ml = 0;
    }

    /// Account for one accepted pulse.
    pub fn apply_pulse_event(&mut self) {
        self.daily_rem_ml += self.ml_per_pulse;
        self.yearly_rem_ml += self.ml_per_pulse;

        self.daily_liters = self.daily_liters.saturating_add(self.daily_rem_ml / 1000);
        self.yearly_liters = self.yearly_liters.saturating_add(self.yearly_rem_ml / 1000);

        self.daily_rem_ml %= 1000;
        self.yearly_rem_ml %= 1000;
    }

    pub fn reset_daily(&mut self) {
        self.daily_liters = 0;
        self.daily_rem_ml = 0;
    }

    pub fn reset_yearly(&mut self) {
        self.yearly_liters = 0;
        self.yearly_rem_ml = 0;
    }

    /// Administrative replacement of the daily volume.
    pub fn set_daily(&mut self, liters: u64) {
        self.daily_liters = liters;
        self.daily_rem_ml = 0;
    }

    /// Administrative replacement of the yearly volume.
    pub fn set_yearly(&mut self, liters: u64) {
        self.yearly_liters = liters;
        self.yearly_rem_ml = 0;
    }

    /// Applies to pulses from now on; accumulated volumes are kept.
    pub fn set_liters_per_pulse(&mut self, liters_per_pulse: f32) {
        self.liters_per_pulse = liters_per_pulse;
        self.ml_per_pulse = to_ml(liters_per_pulse);
    }

    pub fn daily_liters(&self) -> u64 {
        self.daily_liters
    }

    pub fn yearly_liters(&self) -> u64 {
        self.yearly_liters
    }

    pub fn liters_per_pulse(&self) -> f32 {
        self.liters_per_pulse
    }

    /// Combine with the lifetime tally into a [`CounterSnapshot`].
    pub fn snapshot(&self, lifetime_pulses: u64) -> CounterSnapshot {
        let total_liters = lifetime_pulses as f64 * f64::from(self.liters_per_pulse);
        CounterSnapshot {
            lifetime_pulses,
            daily_liters: self.daily_liters,
            yearly_liters: self.yearly_liters,
            total_liters,
            total_m3: total_liters / 1000.0,
            daily_m3: self.daily_liters as f64 / 1000.0,
            yearly_m3: self.yearly_liters as f64 / 1000.0,
        }
    }
}

fn to_ml(liters_per_pulse: f32) -> u64 {
    (f64::from(liters_per_pulse) * 1000.0).round() as u64
}
