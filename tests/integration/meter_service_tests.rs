//! Integration tests for the ISR → MeterService → storage pipeline.
//!
//! Each test owns its own `PulseDetector` and drives it with simulated
//! edges, exactly as the GPIO ISR would, then polls the service with mock
//! adapters.

use super::mock_hw::{MemStorage, MockClock, MockConfigStore, MockIndicator, RecordingSink};

use watermeter::app::commands::{AppCommand, CommandError, CommandSource};
use watermeter::app::events::{AppEvent, AuditAction};
use watermeter::app::service::{CommandReply, ConfigChange, MeterService};
use watermeter::config::MeterConfig;
use watermeter::error::Error;
use watermeter::ledger::CounterField;
use watermeter::persistence::PersistError;
use watermeter::sensors::PulseDetector;
use watermeter::sensors::pulse::Verdict;

fn quick_config() -> MeterConfig {
    MeterConfig {
        boot_guard_ms: 0,
        ..Default::default()
    }
}

/// One clean pulse: 200 ms HIGH ending at `t + 200`.
fn pulse(det: &PulseDetector, t: u32) {
    det.on_transition(true, t);
    det.on_transition(false, t + 200);
}

struct Rig<'d> {
    svc: MeterService<'d, MemStorage>,
    clock: MockClock,
    sink: RecordingSink,
    led: MockIndicator,
}

impl<'d> Rig<'d> {
    fn start(det: &'d PulseDetector, cfg: MeterConfig, store: &MemStorage) -> Self {
        let mut svc = MeterService::new(cfg, det, Some(store.clone()));
        let mut sink = RecordingSink::new();
        svc.begin(0, &mut sink);
        Self {
            svc,
            clock: MockClock::at(0),
            sink,
            led: MockIndicator::default(),
        }
    }

    fn poll_at(&mut self, now_ms: u32) {
        self.clock.set_ms(now_ms);
        self.svc.poll(&self.clock, &mut self.sink, &mut self.led);
    }
}

// ── Boot and detection ────────────────────────────────────────

#[test]
fn boot_guard_then_dual_threshold_scenario() {
    let det = PulseDetector::new();
    let store = MemStorage::new();
    let mut rig = Rig::start(
        &det,
        MeterConfig {
            boot_guard_ms: 3_000,
            pulse_debounce_ms: 500,
            pulse_high_stable_ms: 150,
            ..Default::default()
        },
        &store,
    );

    assert_eq!(det.on_transition(false, 1_000), Verdict::Discarded);
    assert_eq!(det.on_transition(true, 3_050), Verdict::Armed);
    assert!(matches!(det.on_transition(false, 3_100), Verdict::Rejected { .. }));
    assert_eq!(det.on_transition(false, 3_300), Verdict::Accepted);

    rig.poll_at(3_400);

    let snap = rig.svc.snapshot();
    assert_eq!(snap.lifetime_pulses, 1);
    assert_eq!(snap.daily_liters, 1);
    assert_eq!(snap.yearly_liters, 1);

    assert_eq!(rig.sink.count(|e| matches!(e, AppEvent::GuardOpened { .. })), 1);
    assert_eq!(rig.sink.count(|e| matches!(e, AppEvent::PulseIgnored { .. })), 1);
    assert_eq!(rig.sink.count(|e| matches!(e, AppEvent::PulseCounted { .. })), 1);

    // Saved immediately after the pulse, not at the periodic interval.
    assert_eq!(store.value("pulse_count"), Some(1));
    assert_eq!(store.value("daily_liters"), Some(1));
}

#[test]
fn first_boot_starts_from_zero() {
    let det = PulseDetector::new();
    let store = MemStorage::new();
    let rig = Rig::start(&det, quick_config(), &store);

    match rig.sink.events.first() {
        Some(AppEvent::Started(s)) => {
            assert_eq!(s.lifetime_pulses, 0);
            assert_eq!(s.daily_liters, 0);
            assert_eq!(s.yearly_liters, 0);
        }
        other => panic!("expected Started, got {:?}", other),
    }
}

#[test]
fn indicator_flashes_per_poll_with_pulses() {
    let det = PulseDetector::new();
    let store = MemStorage::new();
    let mut rig = Rig::start(&det, quick_config(), &store);

    pulse(&det, 1_000);
    rig.poll_at(1_300);
    assert!(rig.led.on);
    rig.poll_at(1_400);
    assert!(!rig.led.on);

    pulse(&det, 2_000);
    rig.poll_at(2_300);
    assert_eq!(rig.led.flashes, 2);
}

#[test]
fn indicator_stays_dark_when_disabled() {
    let det = PulseDetector::new();
    let store = MemStorage::new();
    let mut rig = Rig::start(
        &det,
        MeterConfig {
            enable_led: false,
            ..quick_config()
        },
        &store,
    );
    pulse(&det, 1_000);
    rig.poll_at(1_300);
    assert_eq!(rig.led.flashes, 0);
    assert_eq!(rig.svc.snapshot().lifetime_pulses, 1);
}

// ── Restart and overrides ─────────────────────────────────────

#[test]
fn counters_survive_restart() {
    let store = MemStorage::new();
    {
        let det = PulseDetector::new();
        let mut rig = Rig::start(&det, quick_config(), &store);
        for i in 0..4 {
            pulse(&det, 1_000 + i * 1_000);
            rig.poll_at(1_300 + i * 1_000);
        }
    }

    let det = PulseDetector::new();
    let rig = Rig::start(&det, quick_config(), &store);
    let snap = rig.svc.snapshot();
    assert_eq!(snap.lifetime_pulses, 4);
    assert_eq!(snap.daily_liters, 4);
    assert_eq!(snap.yearly_liters, 4);
    assert_eq!(det.channel().pulse_count(), 4, "ISR tally seeded from storage");
}

#[test]
fn daily_override_survives_restart() {
    let store = MemStorage::new();
    {
        let det = PulseDetector::new();
        let mut rig = Rig::start(&det, quick_config(), &store);
        rig.svc
            .override_counter(CounterField::Daily, 500, CommandSource::Web, &mut rig.sink);
        // Power is cut here: no shutdown, no periodic save.
    }

    let det = PulseDetector::new();
    let rig = Rig::start(&det, quick_config(), &store);
    assert_eq!(rig.svc.snapshot().daily_liters, 500);
}

#[test]
fn override_is_audited_with_source() {
    let det = PulseDetector::new();
    let store = MemStorage::new();
    let mut rig = Rig::start(&det, quick_config(), &store);
    rig.poll_at(7_000);

    rig.svc
        .override_counter(CounterField::Yearly, 12_345, CommandSource::Mqtt, &mut rig.sink);

    let entry = rig.svc.audit_log().last().copied().unwrap();
    assert_eq!(entry.source, CommandSource::Mqtt);
    assert_eq!(entry.action, AuditAction::Override(CounterField::Yearly));
    assert_eq!(entry.previous, 0);
    assert_eq!(entry.value, 12_345);
    assert_eq!(entry.uptime_ms, 7_000);
    assert!(rig
        .sink
        .events
        .iter()
        .any(|e| matches!(e, AppEvent::CounterOverridden(a) if a.value == 12_345)));
}

#[test]
fn interrupted_save_is_repaired_on_restart() {
    let store = MemStorage::new();
    {
        let det = PulseDetector::new();
        let mut rig = Rig::start(&det, quick_config(), &store);
        rig.svc
            .override_counter(CounterField::Lifetime, 100, CommandSource::Console, &mut rig.sink);

        // Journal and commit marker land, then power fails mid-primaries.
        store.fail_after(5);
        pulse(&det, 1_000);
        rig.poll_at(1_300);
        assert!(rig.sink.events.iter().any(|e| *e == AppEvent::SaveFailed));
    }
    store.heal();
    assert_eq!(store.value("pulse_count"), Some(101));
    assert_eq!(store.value("daily_liters"), Some(0), "primary left stale");

    let det = PulseDetector::new();
    let rig = Rig::start(&det, quick_config(), &store);
    let snap = rig.svc.snapshot();
    assert_eq!(snap.lifetime_pulses, 101);
    assert_eq!(snap.daily_liters, 1);
    assert_eq!(store.value("daily_liters"), Some(1));
    assert_eq!(store.value("j_armed"), Some(0));
}

#[test]
fn unreadable_storage_at_boot_is_never_overwritten() {
    let store = MemStorage::new();
    store.seed("pulse_count", 123_456);
    store.seed("daily_liters", 250);
    store.seed("yearly_liters", 12_500);

    let det = PulseDetector::new();
    store.fail_reads(true);
    let mut rig = Rig::start(&det, quick_config(), &store);
    store.fail_reads(false);

    pulse(&det, 1_000);
    rig.poll_at(1_300);
    rig.poll_at(30_000);
    rig.svc.reset_daily(CommandSource::Console, &mut rig.sink);

    assert_eq!(rig.svc.snapshot().lifetime_pulses, 1, "still counts in memory");
    assert_eq!(store.value("pulse_count"), Some(123_456));
    assert_eq!(store.value("daily_liters"), Some(250));
    assert_eq!(store.value("yearly_liters"), Some(12_500));
    assert_eq!(rig.sink.count(|e| *e == AppEvent::Saved), 0);

    let res = rig
        .svc
        .handle_command(AppCommand::SaveNow, CommandSource::Console, &mut rig.sink);
    assert_eq!(res, Err(Error::Persist(PersistError::Unavailable)));

    // Next boot reads cleanly and picks the record back up.
    drop(rig);
    let det = PulseDetector::new();
    let rig = Rig::start(&det, quick_config(), &store);
    assert_eq!(rig.svc.snapshot().lifetime_pulses, 123_456);
    assert_eq!(rig.svc.snapshot().daily_liters, 250);
}

#[test]
fn shutdown_saves_pulses_counted_after_last_poll() {
    let det = PulseDetector::new();
    let store = MemStorage::new();
    let mut rig = Rig::start(&det, quick_config(), &store);

    pulse(&det, 1_000);
    rig.poll_at(1_300);
    pulse(&det, 2_000);
    rig.svc.shutdown(&mut rig.sink);

    assert_eq!(det.channel().pulse_count(), 2);
    assert_eq!(store.value("pulse_count"), Some(2));
    assert_eq!(store.value("daily_liters"), Some(2));
    assert_eq!(store.value("yearly_liters"), Some(2));
}

// ── Calendar ──────────────────────────────────────────────────

#[test]
fn midnight_resets_daily_only() {
    let det = PulseDetector::new();
    let store = MemStorage::new();
    let mut rig = Rig::start(&det, quick_config(), &store);

    rig.clock.set_date(100, 2026);
    pulse(&det, 1_000);
    rig.poll_at(1_300);
    pulse(&det, 2_000);
    rig.poll_at(2_300);
    assert_eq!(rig.svc.snapshot().daily_liters, 2);

    rig.clock.set_date(101, 2026);
    rig.poll_at(3_000);

    let snap = rig.svc.snapshot();
    assert_eq!(snap.daily_liters, 0);
    assert_eq!(snap.yearly_liters, 2);
    assert_eq!(snap.lifetime_pulses, 2);
    assert_eq!(store.value("daily_liters"), Some(0));
    assert_eq!(rig.sink.count(|e| *e == AppEvent::DailyReset), 1);
    assert_eq!(rig.sink.count(|e| *e == AppEvent::YearlyReset), 0);

    let entry = rig.svc.audit_log().last().copied().unwrap();
    assert_eq!(entry.source, CommandSource::Calendar);
    assert_eq!(entry.action, AuditAction::ResetDaily);
    assert_eq!(entry.previous, 2);
}

#[test]
fn new_year_resets_both() {
    let det = PulseDetector::new();
    let store = MemStorage::new();
    let mut rig = Rig::start(&det, quick_config(), &store);

    rig.clock.set_date(364, 2025);
    pulse(&det, 1_000);
    rig.poll_at(1_300);

    rig.clock.set_date(0, 2026);
    rig.poll_at(2_000);

    let snap = rig.svc.snapshot();
    assert_eq!(snap.daily_liters, 0);
    assert_eq!(snap.yearly_liters, 0);
    assert_eq!(snap.lifetime_pulses, 1);
    assert_eq!(store.value("yearly_liters"), Some(0));
}

#[test]
fn reboot_mid_day_does_not_reset() {
    let store = MemStorage::new();
    {
        let det = PulseDetector::new();
        let mut rig = Rig::start(&det, quick_config(), &store);
        rig.clock.set_date(150, 2026);
        pulse(&det, 1_000);
        rig.poll_at(1_300);
    }

    let det = PulseDetector::new();
    let mut rig = Rig::start(&det, quick_config(), &store);
    rig.clock.set_date(150, 2026);
    rig.poll_at(100);
    assert_eq!(rig.svc.snapshot().daily_liters, 1);
}

#[test]
fn unsynced_clock_defers_resets() {
    let det = PulseDetector::new();
    let store = MemStorage::new();
    let mut rig = Rig::start(&det, quick_config(), &store);

    pulse(&det, 1_000);
    rig.poll_at(1_300);
    rig.poll_at(2_000);
    assert_eq!(rig.svc.snapshot().daily_liters, 1);

    rig.clock.set_date(10, 2026);
    rig.poll_at(3_000);
    rig.clock.lose_sync();
    rig.poll_at(4_000);
    assert_eq!(rig.svc.snapshot().daily_liters, 1);
}

// ── Persistence triggers and degraded mode ────────────────────

#[test]
fn periodic_save_fires_on_interval() {
    let det = PulseDetector::new();
    let store = MemStorage::new();
    let mut rig = Rig::start(&det, quick_config(), &store);

    rig.poll_at(29_999);
    assert_eq!(rig.sink.count(|e| *e == AppEvent::Saved), 0);
    rig.poll_at(30_000);
    assert_eq!(rig.sink.count(|e| *e == AppEvent::Saved), 1);
    assert_eq!(store.value("pulse_count"), Some(0));
}

#[test]
fn storage_offline_keeps_counting_in_memory() {
    let det = PulseDetector::new();
    let store = MemStorage::new();
    store.set_offline(true);
    let mut rig = Rig::start(&det, quick_config(), &store);

    pulse(&det, 1_000);
    rig.poll_at(1_300);
    pulse(&det, 2_000);
    rig.poll_at(30_000);

    assert_eq!(rig.svc.snapshot().lifetime_pulses, 2);
    assert_eq!(rig.svc.snapshot().daily_liters, 2);
    assert_eq!(store.value("pulse_count"), None);
    assert_eq!(rig.sink.count(|e| *e == AppEvent::Saved), 0);

    let res = rig
        .svc
        .handle_command(AppCommand::SaveNow, CommandSource::Console, &mut rig.sink);
    assert_eq!(res, Err(Error::Persist(PersistError::Unavailable)));
}

#[test]
fn shutdown_performs_final_save() {
    let det = PulseDetector::new();
    let store = MemStorage::new();
    let mut rig = Rig::start(&det, quick_config(), &store);
    store.set_offline(true);
    rig.svc
        .override_counter(CounterField::Daily, 9, CommandSource::Local, &mut rig.sink);
    assert_eq!(store.value("daily_liters"), None);

    store.set_offline(false);
    rig.svc.shutdown(&mut rig.sink);
    assert!(!rig.svc.is_running());
    assert_eq!(store.value("daily_liters"), Some(9));
}

// ── Telemetry ─────────────────────────────────────────────────

#[test]
fn telemetry_reports_flow_over_publish_window() {
    let det = PulseDetector::new();
    let store = MemStorage::new();
    let mut rig = Rig::start(&det, quick_config(), &store);

    rig.poll_at(5_000);
    for i in 0..5 {
        pulse(&det, 5_100 + i * 1_000);
        rig.poll_at(5_400 + i * 1_000);
    }
    rig.poll_at(10_000);

    let telem: Vec<_> = rig
        .sink
        .events
        .iter()
        .filter_map(|e| match e {
            AppEvent::Telemetry(t) => Some(*t),
            _ => None,
        })
        .collect();
    assert_eq!(telem.len(), 2);
    assert_eq!(telem[0].flow_l_per_min, 0.0);
    assert!((telem[1].flow_l_per_min - 60.0).abs() < 0.01);
    assert_eq!(telem[1].counters.lifetime_pulses, 5);
    assert_eq!(telem[1].uptime_secs, 10);

    let json = serde_json::to_value(telem[1]).unwrap();
    assert_eq!(json["pulse_count"], 5);
    assert_eq!(json["daily_liters"], 5);
    assert!(json.get("flow_l_per_min").is_some());
}

// ── Command boundary ──────────────────────────────────────────

#[test]
fn console_lines_drive_the_service() {
    let det = PulseDetector::new();
    let store = MemStorage::new();
    let mut rig = Rig::start(&det, quick_config(), &store);

    let r = rig
        .svc
        .execute_line("set daily 500", CommandSource::Console, &mut rig.sink);
    assert_eq!(r, Ok(CommandReply::Done));
    assert_eq!(store.value("daily_liters"), Some(500));

    match rig
        .svc
        .execute_line("status", CommandSource::Console, &mut rig.sink)
    {
        Ok(CommandReply::Status(s)) => assert_eq!(s.daily_liters, 500),
        other => panic!("unexpected reply {:?}", other),
    }

    let r = rig
        .svc
        .execute_line("reset daily", CommandSource::Console, &mut rig.sink);
    assert_eq!(r, Ok(CommandReply::Done));
    assert_eq!(rig.svc.snapshot().daily_liters, 0);
}

#[test]
fn invalid_values_never_reach_the_ledger() {
    let det = PulseDetector::new();
    let store = MemStorage::new();
    let mut rig = Rig::start(&det, quick_config(), &store);
    let audit_before = rig.svc.audit_log().count();

    let r = rig
        .svc
        .execute_line("set daily -1", CommandSource::Console, &mut rig.sink);
    assert_eq!(r, Err(Error::Command(CommandError::InvalidValue)));
    assert_eq!(rig.svc.audit_log().count(), audit_before);
    assert_eq!(rig.svc.snapshot().daily_liters, 0);
}

#[test]
fn web_field_override() {
    let det = PulseDetector::new();
    let store = MemStorage::new();
    let mut rig = Rig::start(&det, quick_config(), &store);

    let cmd = AppCommand::parse_web_field("total_pulses", "123456").unwrap();
    rig.svc
        .handle_command(cmd, CommandSource::Web, &mut rig.sink)
        .unwrap();

    pulse(&det, 1_000);
    rig.poll_at(1_300);
    assert_eq!(rig.svc.snapshot().lifetime_pulses, 123_457);
    assert_eq!(store.value("pulse_count"), Some(123_457));
}

#[test]
fn config_update_applies_and_persists() {
    let det = PulseDetector::new();
    let store = MemStorage::new();
    let mut rig = Rig::start(&det, quick_config(), &store);
    let cfg_store = MockConfigStore::default();

    let new_cfg = MeterConfig {
        liters_per_pulse: 10.0,
        ..quick_config()
    };
    let r = rig.svc.handle_command(
        AppCommand::UpdateConfig(new_cfg.clone()),
        CommandSource::Web,
        &mut rig.sink,
    );
    assert_eq!(r, Ok(CommandReply::Config(ConfigChange::Applied)));

    pulse(&det, 1_000);
    rig.poll_at(1_300);
    assert_eq!(rig.svc.snapshot().daily_liters, 10);

    assert!(rig.svc.save_config_if_dirty(&cfg_store));
    assert!(!rig.svc.save_config_if_dirty(&cfg_store));
    assert_eq!(cfg_store.saved.borrow().as_ref(), Some(&new_cfg));
}
