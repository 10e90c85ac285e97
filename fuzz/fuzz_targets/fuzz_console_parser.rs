//! Fuzz target: `AppCommand::parse_console` / `parse_web_field`
//!
//! Arbitrary UTF-8 lines must parse to a command or a typed error, never
//! panic.  An accepted override value is always the last word of the line.
//!
//! cargo fuzz run fuzz_console_parser

#![no_main]

use libfuzzer_sys::fuzz_target;
use watermeter::app::commands::AppCommand;

fuzz_target!(|data: &[u8]| {
    let Ok(line) = core::str::from_utf8(data) else {
        return;
    };

    if let Ok(AppCommand::Override { value, .. }) = AppCommand::parse_console(line) {
        let last = line.split_whitespace().last().unwrap_or_default();
        assert_eq!(last.parse::<u64>().ok(), Some(value));
    }

    // Split at the first '=' like a urlencoded form field.
    if let Some((field, value)) = line.split_once('=') {
        if let Ok(AppCommand::Override { value: v, .. }) = AppCommand::parse_web_field(field, value)
        {
            assert_eq!(value.trim().parse::<u64>().ok(), Some(v));
        }
    }
});
