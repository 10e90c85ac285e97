//! ESP32 clock adapter.
//!
//! Implements [`ClockPort`] for the water meter.
//!
//! - **`target_os = "espidf"`**: uptime from `esp_timer_get_time()` (the
//!   same source the pulse ISR stamps edges with) and the calendar date
//!   from the SNTP-disciplined system clock via `localtime_r`.
//! - **`not(target_os = "espidf")`**: `std::time::Instant` for uptime and
//!   `chrono::Local` for the date, for host-side simulation.

use crate::app::ports::ClockPort;
use crate::calendar::CalendarDate;

/// Anything earlier than 2020-01-01 means SNTP has not synced yet.
const EPOCH_2020: i64 = 1_577_836_800;

/// Clock adapter for the ESP32 platform.
pub struct Esp32TimeAdapter {
    #[cfg(not(target_os = "espidf"))]
    start: std::time::Instant,
}

impl Default for Esp32TimeAdapter {
    fn default() -> Self {
        Self::new()
    }
}

impl Esp32TimeAdapter {
    pub fn new() -> Self {
        Self {
            #[cfg(not(target_os = "espidf"))]
            start: std::time::Instant::now(),
        }
    }

    /// Milliseconds since boot as `u32` (wraps).  Same clock the ISR uses.
    #[cfg(target_os = "espidf")]
    pub fn now_ms() -> u32 {
        // SAFETY: esp_timer_get_time is ISR-safe and has no preconditions.
        ((unsafe { esp_idf_svc::sys::esp_timer_get_time() }) / 1_000) as u32
    }

    #[cfg(target_os = "espidf")]
    fn local_date() -> Option<CalendarDate> {
        use core::ptr;
        let mut tv = esp_idf_svc::sys::timeval {
            tv_sec: 0,
            tv_usec: 0,
        };
        if unsafe { esp_idf_svc::sys::gettimeofday(&mut tv, ptr::null_mut()) } != 0 {
            return None;
        }
        if (tv.tv_sec as i64) < EPOCH_2020 {
            return None;
        }
        let secs = tv.tv_sec as esp_idf_svc::sys::time_t;
        let mut tm: esp_idf_svc::sys::tm = unsafe { core::mem::zeroed() };
        if unsafe { esp_idf_svc::sys::localtime_r(&secs, &mut tm) }.is_null() {
            return None;
        }
        if !(0..=365).contains(&tm.tm_yday) {
            return None;
        }
        Some(CalendarDate::new(tm.tm_yday as u16, tm.tm_year + 1900))
    }

    #[cfg(not(target_os = "espidf"))]
    fn local_date() -> Option<CalendarDate> {
        use chrono::Datelike;

        let now = chrono::Local::now();
        if now.timestamp() < EPOCH_2020 {
            return None;
        }
        Some(CalendarDate::new(now.ordinal0() as u16, now.year()))
    }
}

impl ClockPort for Esp32TimeAdapter {
    #[cfg(target_os = "espidf")]
    fn uptime_ms(&self) -> u32 {
        Self::now_ms()
    }

    #[cfg(not(target_os = "espidf"))]
    fn uptime_ms(&self) -> u32 {
        self.start.elapsed().as_millis() as u32
    }

    fn wall_clock(&self) -> Option<CalendarDate> {
        Self::local_date()
    }
}
