//! Calendar-driven counter resets.
//!
//! Polled from the main loop with the current wall-clock date (or `None`
//! when the clock has not been synchronised).  Remembers the last date it
//! saw and reports which resets are due when that date changes.
//!
//! The first valid date after boot only seeds the cursor: a device that
//! reboots mid-day must not wipe the day's consumption.

/// Local calendar date as far as resets are concerned.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CalendarDate {
    /// 0-based day of the year (0 = 1 January).
    pub day_of_year: u16,
    /// Gregorian year, e.g. 2026.
    pub year: i32,
}

impl CalendarDate {
    pub const fn new(day_of_year: u16, year: i32) -> Self {
        Self { day_of_year, year }
    }
}

/// Which resets a date change calls for.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ResetDecision {
    pub daily: bool,
    pub yearly: bool,
}

impl ResetDecision {
    pub fn any(&self) -> bool {
        self.daily || self.yearly
    }
}

/// Last date observed.  `-1` in either field means "not yet seen".
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CalendarCursor {
    pub last_day_of_year: i32,
    pub last_year: i32,
}

impl Default for CalendarCursor {
    fn default() -> Self {
        Self {
            last_day_of_year: -1,
            last_year: -1,
        }
    }
}

impl CalendarCursor {
    pub fn is_seeded(&self) -> bool {
        self.last_day_of_year >= 0 && self.last_year >= 0
    }

    pub fn last(&self) -> Option<CalendarDate> {
        self.is_seeded()
            .then(|| CalendarDate::new(self.last_day_of_year as u16, self.last_year))
    }

    fn record(&mut self, date: CalendarDate) {
        self.last_day_of_year = i32::from(date.day_of_year);
        self.last_year = date.year;
    }
}

/// Decides daily and yearly resets from successive date observations.
#[derive(Debug, Default)]
pub struct CalendarResetPolicy {
    cursor: CalendarCursor,
}

impl CalendarResetPolicy {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed one observation.
    ///
    /// - `None`: clock invalid, nothing changes.
    /// - first valid date: cursor seeded, no reset.
    /// - year changed: daily and yearly reset.
    /// - day changed within the year: daily reset.
    pub fn check(&mut self, today: Option<CalendarDate>) -> ResetDecision {
        let Some(today) = today else {
            return ResetDecision::default();
        };

        let decision = match self.cursor.last() {
            None => ResetDecision::default(),
            Some(prev) => {
                let yearly = today.year != prev.year;
                ResetDecision {
                    daily: yearly || today.day_of_year != prev.day_of_year,
                    yearly,
                }
            }
        };

        self.cursor.record(today);
        decision
    }

    pub fn cursor(&self) -> CalendarCursor {
        self.cursor
    }
}
