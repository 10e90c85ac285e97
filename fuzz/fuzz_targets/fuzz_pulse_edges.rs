//! Fuzz target: `PulseDetector::on_transition`
//!
//! Feeds an arbitrary edge train (level + time step) through a freshly
//! armed detector and checks the counting bounds: never more accepted
//! pulses than falling edges, and none before the boot guard opens.
//!
//! cargo fuzz run fuzz_pulse_edges

#![no_main]

use libfuzzer_sys::fuzz_target;
use watermeter::config::MeterConfig;
use watermeter::sensors::PulseDetector;
use watermeter::sensors::pulse::Verdict;

fuzz_target!(|data: &[u8]| {
    let det = PulseDetector::new();
    det.arm(&MeterConfig::default(), 0);

    let mut now: u32 = 0;
    let mut falling = 0u64;
    for chunk in data.chunks_exact(3) {
        let level_high = chunk[0] & 1 == 1;
        now = now.wrapping_add(u32::from(u16::from_le_bytes([chunk[1], chunk[2]])));

        let guard_open = det.guard().is_open();
        let v = det.on_transition(level_high, now);
        if !guard_open && v == Verdict::Discarded {
            continue;
        }
        assert_ne!(v, Verdict::Discarded, "open guard must classify");
        if !level_high {
            falling += 1;
        }
        assert_eq!(v == Verdict::Armed, level_high);
    }

    assert!(det.channel().pulse_count() <= falling);
});
