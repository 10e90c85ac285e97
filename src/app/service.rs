//! Meter service, the hexagonal core.
//!
//! [`MeterService`] owns the counter ledger, the calendar reset policy,
//! the persistence gateway, and the polling-side timers.  The pulse ISR
//! writes into a [`PulseDetector`]; the service only reads its channel.
//! All other I/O flows through port traits injected at call sites, so the
//! whole service runs under test with mock adapters.
//!
//! ```text
//!  PulseDetector ──▶ ┌──────────────────────────┐ ──▶ EventSink
//!   (ISR, atomics)   │       MeterService        │
//!  ClockPort ──────▶ │ Ledger · Calendar · Save  │ ──▶ IndicatorPort
//!                    └─────────────┬────────────┘
//!                                  ▼
//!                         PersistenceGateway ──▶ StoragePort
//! ```

use heapless::HistoryBuffer;
use log::{info, warn};

use crate::calendar::CalendarResetPolicy;
use crate::config::MeterConfig;
use crate::error::Result;
use crate::ledger::{CounterField, CounterLedger, CounterSnapshot};
use crate::persistence::{PersistError, PersistedRecord, PersistenceGateway};
use crate::sensors::PulseDetector;
use crate::sensors::flow::FlowEstimator;
use crate::timers::{IntervalTimer, OneShotTimer};

use super::commands::{AppCommand, CommandSource};
use super::events::{AppEvent, AuditAction, AuditEntry, TelemetryData};
use super::ports::{ClockPort, ConfigPort, EventSink, IndicatorPort, StoragePort};

/// Entries kept in the in-memory audit trail.
pub const AUDIT_CAPACITY: usize = 8;

/// Outcome of a runtime configuration update.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigChange {
    /// Everything took effect immediately.
    Applied,
    /// Applied, but a pin or enable change only takes effect after the
    /// host re-runs hardware bring-up.
    RestartRequired,
}

/// What a handled command produced.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum CommandReply {
    Done,
    Status(CounterSnapshot),
    Config(ConfigChange),
}

// ───────────────────────────────────────────────────────────────
// MeterService
// ───────────────────────────────────────────────────────────────

pub struct MeterService<'d, S: StoragePort> {
    config: MeterConfig,
    detector: &'d PulseDetector,
    ledger: CounterLedger,
    calendar: CalendarResetPolicy,
    persistence: PersistenceGateway<S>,
    flow: FlowEstimator,
    save_timer: IntervalTimer,
    publish_timer: IntervalTimer,
    led_timer: OneShotTimer,
    /// Tally value the ledger has been brought up to.
    applied_pulses: u64,
    audit: HistoryBuffer<AuditEntry, AUDIT_CAPACITY>,
    /// Uptime at the latest `begin`/`poll`, used to stamp audit entries.
    now_ms: u32,
    started: bool,
    config_dirty: bool,
    unavailable_warned: bool,
}

impl<'d, S: StoragePort> MeterService<'d, S> {
    /// Construct the service.  Does **not** touch the detector or storage;
    /// call [`begin`](Self::begin) next.
    pub fn new(config: MeterConfig, detector: &'d PulseDetector, storage: Option<S>) -> Self {
        let ledger = CounterLedger::new(config.liters_per_pulse);
        let save_timer = IntervalTimer::new(config.save_interval_ms, 0);
        let publish_timer = IntervalTimer::new(config.publish_interval_ms, 0);

        Self {
            config,
            detector,
            ledger,
            calendar: CalendarResetPolicy::new(),
            persistence: PersistenceGateway::new(storage),
            flow: FlowEstimator::new(),
            save_timer,
            publish_timer,
            led_timer: OneShotTimer::default(),
            applied_pulses: 0,
            audit: HistoryBuffer::new(),
            now_ms: 0,
            started: false,
            config_dirty: false,
            unavailable_warned: false,
        }
    }

    // ── Lifecycle ─────────────────────────────────────────────

    /// Arm the boot guard, restore the persisted record, and seed the
    /// ISR tally.  Call before the pulse interrupt is attached.
    pub fn begin(&mut self, now_ms: u32, sink: &mut impl EventSink) {
        if !self.config.enabled {
            info!("Water meter disabled by config");
            return;
        }

        self.now_ms = now_ms;
        self.detector.arm(&self.config, now_ms);

        match self.persistence.load() {
            Ok(record) => {
                self.ledger.restore(record.daily_liters, record.yearly_liters);
                self.detector.channel().set_pulse_count(record.pulse_count);
            }
            Err(PersistError::Unavailable) => {
                warn!("LOAD: storage unavailable, counting in memory only");
                self.unavailable_warned = true;
            }
            Err(e) => {
                warn!("LOAD: read failed ({}), counting in memory only", e);
                self.unavailable_warned = true;
            }
        }
        self.applied_pulses = self.detector.channel().pulse_count();

        self.save_timer.restart(now_ms);
        self.publish_timer.restart(now_ms);
        self.flow.reset();
        self.started = true;

        let snapshot = self.snapshot();
        info!(
            "Water meter started: {} L/pulse, guard {} ms, pulses={}",
            self.config.liters_per_pulse, self.config.boot_guard_ms, snapshot.lifetime_pulses
        );
        sink.emit(&AppEvent::Started(snapshot));
    }

    /// Run one polling cycle.
    ///
    /// Order: drain ISR flags → apply pulses (+ save) → calendar resets
    /// (+ save) → indicator timeout → periodic save → telemetry.
    pub fn poll(
        &mut self,
        clock: &impl ClockPort,
        sink: &mut impl EventSink,
        indicator: &mut impl IndicatorPort,
    ) {
        if !self.started {
            return;
        }
        let now = clock.uptime_ms();
        self.now_ms = now;

        // 1. ISR flags
        let drained = self.detector.channel().drain();
        if drained.guard_opened {
            let after_ms = now.wrapping_sub(self.detector.guard().boot_ms());
            info!("GUARD: boot guard opened after {} ms", after_ms);
            sink.emit(&AppEvent::GuardOpened { after_ms });
        }
        if let Some(gap) = drained.ignored_gap_ms {
            warn!("IGNORED: pulse rejected, {} ms since last accepted", gap);
            sink.emit(&AppEvent::PulseIgnored {
                debounce_gap_ms: gap,
            });
        }
        if drained.new_pulse {
            self.apply_new_pulses(now, sink, indicator);
        }

        // 2. Calendar
        let decision = self.calendar.check(clock.wall_clock());
        if decision.yearly {
            self.reset_yearly_unsaved(CommandSource::Calendar, sink);
        }
        if decision.daily {
            self.reset_daily_unsaved(CommandSource::Calendar, sink);
        }
        if decision.any() {
            let _ = self.save_now(sink);
        }

        // 3. Indicator
        if self.led_timer.expired(now, self.config.led_flash_ms) {
            indicator.set_indicator(false);
        }

        // 4. Periodic save
        if self.save_timer.is_ready(now) {
            let _ = self.save_now(sink);
        }

        // 5. Telemetry
        if self.publish_timer.is_ready(now) {
            let telemetry = self.telemetry(now);
            sink.emit(&AppEvent::Telemetry(telemetry));
        }
    }

    /// Final save before power-down or restart.  Pulses the ISR counted
    /// since the last poll are applied first.
    pub fn shutdown(&mut self, sink: &mut impl EventSink) {
        if !self.started {
            return;
        }
        info!("Water meter shutting down");
        let _ = self.detector.channel().drain();
        if self.absorb_tally() > 0 {
            sink.emit(&self.pulse_counted());
        }
        let _ = self.save_now(sink);
        self.started = false;
    }

    // ── Counter operations ────────────────────────────────────

    /// Zero the daily volume and save immediately.
    pub fn reset_daily(&mut self, source: CommandSource, sink: &mut impl EventSink) {
        self.reset_daily_unsaved(source, sink);
        let _ = self.save_now(sink);
    }

    /// Zero the yearly volume and save immediately.
    pub fn reset_yearly(&mut self, source: CommandSource, sink: &mut impl EventSink) {
        self.reset_yearly_unsaved(source, sink);
        let _ = self.save_now(sink);
    }

    /// Replace one counter with `value`, audit it, and save immediately.
    ///
    /// `value` has already been validated at the command boundary.
    pub fn override_counter(
        &mut self,
        field: CounterField,
        value: u64,
        source: CommandSource,
        sink: &mut impl EventSink,
    ) {
        let previous = match field {
            CounterField::Lifetime => {
                let previous = self.detector.channel().pulse_count();
                self.detector.channel().set_pulse_count(value);
                self.applied_pulses = value;
                self.flow.reset();
                previous
            }
            CounterField::Daily => {
                let previous = self.ledger.daily_liters();
                self.ledger.set_daily(value);
                previous
            }
            CounterField::Yearly => {
                let previous = self.ledger.yearly_liters();
                self.ledger.set_yearly(value);
                previous
            }
        };

        let entry = self.record_audit(source, AuditAction::Override(field), previous, value);
        sink.emit(&AppEvent::CounterOverridden(entry));
        let _ = self.save_now(sink);
    }

    /// Persist the counters now.  Failures are logged and reported but
    /// never retried here; the periodic save tries again.
    pub fn save_now(&mut self, sink: &mut impl EventSink) -> core::result::Result<(), PersistError> {
        let record = PersistedRecord {
            pulse_count: self.applied_pulses,
            daily_liters: self.ledger.daily_liters(),
            yearly_liters: self.ledger.yearly_liters(),
        };

        match self.persistence.save(&record) {
            Ok(()) => {
                self.unavailable_warned = false;
                sink.emit(&AppEvent::Saved);
                Ok(())
            }
            Err(PersistError::Unavailable) => {
                if !self.unavailable_warned {
                    warn!("SAVE: storage unavailable, counters are memory-only");
                    self.unavailable_warned = true;
                }
                Err(PersistError::Unavailable)
            }
            Err(e) => {
                warn!("SAVE: failed: {}", e);
                sink.emit(&AppEvent::SaveFailed);
                Err(e)
            }
        }
    }

    // ── Command handling ──────────────────────────────────────

    /// Process an external command.
    pub fn handle_command(
        &mut self,
        cmd: AppCommand,
        source: CommandSource,
        sink: &mut impl EventSink,
    ) -> Result<CommandReply> {
        match cmd {
            AppCommand::Status => Ok(CommandReply::Status(self.snapshot())),
            AppCommand::ResetDaily => {
                self.reset_daily(source, sink);
                Ok(CommandReply::Done)
            }
            AppCommand::ResetYearly => {
                self.reset_yearly(source, sink);
                Ok(CommandReply::Done)
            }
            AppCommand::Override { field, value } => {
                self.override_counter(field, value, source, sink);
                Ok(CommandReply::Done)
            }
            AppCommand::SaveNow => {
                self.save_now(sink)?;
                Ok(CommandReply::Done)
            }
            AppCommand::UpdateConfig(cfg) => {
                let change = self.update_config(cfg)?;
                Ok(CommandReply::Config(change))
            }
        }
    }

    /// Parse a console line and run it.
    pub fn execute_line(
        &mut self,
        line: &str,
        source: CommandSource,
        sink: &mut impl EventSink,
    ) -> Result<CommandReply> {
        let cmd = AppCommand::parse_console(line)?;
        self.handle_command(cmd, source, sink)
    }

    /// Apply a new configuration at runtime.
    pub fn update_config(&mut self, cfg: MeterConfig) -> Result<ConfigChange> {
        cfg.validate()?;

        let restart = cfg.pulse_input_gpio != self.config.pulse_input_gpio
            || cfg.status_led_gpio != self.config.status_led_gpio
            || cfg.enabled != self.config.enabled;

        self.detector
            .classifier()
            .set_thresholds(cfg.pulse_debounce_ms, cfg.pulse_high_stable_ms);
        self.ledger.set_liters_per_pulse(cfg.liters_per_pulse);
        self.save_timer.set_interval(cfg.save_interval_ms);
        self.publish_timer.set_interval(cfg.publish_interval_ms);

        self.config = cfg;
        self.config_dirty = true;
        info!("Configuration updated at runtime");

        if restart {
            warn!("Pin or enable change takes effect after restart");
            Ok(ConfigChange::RestartRequired)
        } else {
            Ok(ConfigChange::Applied)
        }
    }

    /// Persist the config if it changed since the last save.
    /// Returns `true` if it was written.
    pub fn save_config_if_dirty(&mut self, port: &impl ConfigPort) -> bool {
        store_config(port, &self.config, &mut self.config_dirty)
    }

    // ── Queries ───────────────────────────────────────────────

    /// Counters as of now.  Lifetime pulses come straight from the ISR tally.
    pub fn snapshot(&self) -> CounterSnapshot {
        self.ledger.snapshot(self.detector.channel().pulse_count())
    }

    /// Audit trail, oldest first.
    pub fn audit_log(&self) -> impl Iterator<Item = &AuditEntry> {
        self.audit.oldest_ordered()
    }

    pub fn config(&self) -> &MeterConfig {
        &self.config
    }

    pub fn is_running(&self) -> bool {
        self.started
    }

    pub fn is_config_dirty(&self) -> bool {
        self.config_dirty
    }

    pub fn storage(&self) -> Option<&S> {
        self.persistence.storage()
    }

    pub fn storage_mut(&mut self) -> Option<&mut S> {
        self.persistence.storage_mut()
    }

    // ── Internal ──────────────────────────────────────────────

    /// Flags coalesce, so one drained flag may stand for several pulses.
    fn apply_new_pulses(
        &mut self,
        now: u32,
        sink: &mut impl EventSink,
        indicator: &mut impl IndicatorPort,
    ) {
        if self.absorb_tally() == 0 {
            return;
        }

        if self.config.enable_led {
            indicator.set_indicator(true);
            self.led_timer.start(now);
        }

        sink.emit(&self.pulse_counted());
        let _ = self.save_now(sink);
    }

    /// Bring the ledger up to the ISR tally and return how many pulses
    /// that applied.
    fn absorb_tally(&mut self) -> u64 {
        let tally = self.detector.channel().pulse_count();
        let delta = tally.saturating_sub(self.applied_pulses);
        self.applied_pulses = tally;
        for _ in 0..delta {
            self.ledger.apply_pulse_event();
        }
        if delta > 0 {
            info!(
                "PULSE: count={} daily={} L yearly={} L",
                tally,
                self.ledger.daily_liters(),
                self.ledger.yearly_liters()
            );
        }
        delta
    }

    fn pulse_counted(&self) -> AppEvent {
        AppEvent::PulseCounted {
            lifetime_pulses: self.applied_pulses,
            daily_liters: self.ledger.daily_liters(),
            yearly_liters: self.ledger.yearly_liters(),
        }
    }

    fn reset_daily_unsaved(&mut self, source: CommandSource, sink: &mut impl EventSink) {
        let previous = self.ledger.daily_liters();
        self.ledger.reset_daily();
        info!("RESET: daily counter ({} L) by {}", previous, source);
        self.record_audit(source, AuditAction::ResetDaily, previous, 0);
        sink.emit(&AppEvent::DailyReset);
    }

    fn reset_yearly_unsaved(&mut self, source: CommandSource, sink: &mut impl EventSink) {
        let previous = self.ledger.yearly_liters();
        self.ledger.reset_yearly();
        info!("RESET: yearly counter ({} L) by {}", previous, source);
        self.record_audit(source, AuditAction::ResetYearly, previous, 0);
        sink.emit(&AppEvent::YearlyReset);
    }

    fn record_audit(
        &mut self,
        source: CommandSource,
        action: AuditAction,
        previous: u64,
        value: u64,
    ) -> AuditEntry {
        let entry = AuditEntry {
            source,
            action,
            previous,
            value,
            uptime_ms: self.now_ms,
        };
        info!("AUDIT: {} {} -> {} by {}", action, previous, value, source);
        self.audit.write(entry);
        entry
    }

    fn telemetry(&mut self, now: u32) -> TelemetryData {
        let counters = self.snapshot();
        let reading = self.flow.sample(
            counters.lifetime_pulses,
            now,
            self.ledger.liters_per_pulse(),
        );
        TelemetryData {
            counters,
            flow_l_per_min: reading.liters_per_min,
            uptime_secs: now / 1000,
        }
    }
}

impl<S: StoragePort + ConfigPort> MeterService<'_, S> {
    /// [`save_config_if_dirty`](Self::save_config_if_dirty) against the
    /// backend that already holds the counters.
    pub fn flush_config(&mut self) -> bool {
        match self.persistence.storage() {
            Some(store) => store_config(store, &self.config, &mut self.config_dirty),
            None => false,
        }
    }
}

fn store_config(port: &impl ConfigPort, config: &MeterConfig, dirty: &mut bool) -> bool {
    if !*dirty {
        return false;
    }
    match port.save(config) {
        Ok(()) => {
            *dirty = false;
            info!("Config saved");
            true
        }
        Err(e) => {
            warn!("Config save failed: {}", e);
            false
        }
    }
}
