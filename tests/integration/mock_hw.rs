//! Mock adapters for integration tests.
//!
//! Storage state lives behind an `Rc`, so a test can keep a handle, drop
//! the service to simulate a restart, and build a new service over the
//! same "flash".

use std::cell::{Cell, RefCell};
use std::collections::HashMap;
use std::rc::Rc;

use watermeter::app::events::AppEvent;
use watermeter::app::ports::{
    ClockPort, ConfigError, ConfigPort, EventSink, IndicatorPort, StorageError, StoragePort,
};
use watermeter::calendar::CalendarDate;
use watermeter::config::MeterConfig;

// ── MemStorage ────────────────────────────────────────────────

#[derive(Clone, Default)]
pub struct MemStorage {
    map: Rc<RefCell<HashMap<String, u64>>>,
    offline: Rc<Cell<bool>>,
    /// `Some(n)`: the next `n` writes succeed, then every write fails.
    writes_left: Rc<Cell<Option<usize>>>,
    reads_fail: Rc<Cell<bool>>,
}

#[allow(dead_code)]
impl MemStorage {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn value(&self, key: &str) -> Option<u64> {
        self.map.borrow().get(key).copied()
    }

    /// Put a value straight into "flash", as a previous firmware run would.
    pub fn seed(&self, key: &str, value: u64) {
        self.map.borrow_mut().insert(key.to_string(), value);
    }

    pub fn fail_reads(&self, fail: bool) {
        self.reads_fail.set(fail);
    }

    pub fn set_offline(&self, offline: bool) {
        self.offline.set(offline);
    }

    /// Simulate power loss after `n` more key writes.
    pub fn fail_after(&self, n: usize) {
        self.writes_left.set(Some(n));
    }

    pub fn heal(&self) {
        self.writes_left.set(None);
    }
}

impl StoragePort for MemStorage {
    fn is_available(&self) -> bool {
        !self.offline.get()
    }

    fn get_u64(&self, key: &str, default: u64) -> Result<u64, StorageError> {
        if self.reads_fail.get() {
            return Err(StorageError::IoError);
        }
        Ok(self.map.borrow().get(key).copied().unwrap_or(default))
    }

    fn put_u64(&mut self, key: &str, value: u64) -> Result<(), StorageError> {
        if let Some(n) = self.writes_left.get() {
            if n == 0 {
                return Err(StorageError::IoError);
            }
            self.writes_left.set(Some(n - 1));
        }
        self.map.borrow_mut().insert(key.to_string(), value);
        Ok(())
    }
}

// ── MockConfigStore ───────────────────────────────────────────

#[derive(Default)]
pub struct MockConfigStore {
    pub saved: RefCell<Option<MeterConfig>>,
}

impl ConfigPort for MockConfigStore {
    fn load(&self) -> Result<MeterConfig, ConfigError> {
        Ok(self.saved.borrow().clone().unwrap_or_default())
    }

    fn save(&self, config: &MeterConfig) -> Result<(), ConfigError> {
        config.validate()?;
        *self.saved.borrow_mut() = Some(config.clone());
        Ok(())
    }
}

// ── MockClock ─────────────────────────────────────────────────

#[derive(Default)]
pub struct MockClock {
    now_ms: Cell<u32>,
    date: Cell<Option<CalendarDate>>,
}

#[allow(dead_code)]
impl MockClock {
    pub fn at(now_ms: u32) -> Self {
        let c = Self::default();
        c.now_ms.set(now_ms);
        c
    }

    pub fn set_ms(&self, now_ms: u32) {
        self.now_ms.set(now_ms);
    }

    pub fn advance(&self, ms: u32) {
        self.now_ms.set(self.now_ms.get().wrapping_add(ms));
    }

    pub fn set_date(&self, day_of_year: u16, year: i32) {
        self.date.set(Some(CalendarDate::new(day_of_year, year)));
    }

    pub fn lose_sync(&self) {
        self.date.set(None);
    }
}

impl ClockPort for MockClock {
    fn uptime_ms(&self) -> u32 {
        self.now_ms.get()
    }

    fn wall_clock(&self) -> Option<CalendarDate> {
        self.date.get()
    }
}

// ── RecordingSink ─────────────────────────────────────────────

#[derive(Default)]
pub struct RecordingSink {
    pub events: Vec<AppEvent>,
}

#[allow(dead_code)]
impl RecordingSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn count(&self, pred: impl Fn(&AppEvent) -> bool) -> usize {
        self.events.iter().filter(|e| pred(e)).count()
    }

    pub fn clear(&mut self) {
        self.events.clear();
    }
}

impl EventSink for RecordingSink {
    fn emit(&mut self, event: &AppEvent) {
        self.events.push(event.clone());
    }
}

// ── MockIndicator ─────────────────────────────────────────────

#[derive(Default)]
pub struct MockIndicator {
    pub on: bool,
    pub flashes: usize,
}

impl IndicatorPort for MockIndicator {
    fn set_indicator(&mut self, on: bool) {
        if on && !self.on {
            self.flashes += 1;
        }
        self.on = on;
    }
}
