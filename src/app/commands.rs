//! Inbound commands to the meter service.
//!
//! These represent actions requested by the outside world (web settings
//! page, serial console, MQTT) that the
//! [`MeterService`](super::service::MeterService) interprets and acts upon.
//!
//! Text is parsed and range-checked here, at the boundary.  A command
//! that reaches the service is already well-formed.

use core::fmt;

use crate::config::MeterConfig;
use crate::ledger::CounterField;

/// Who asked for a change.  Recorded in the audit trail.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommandSource {
    Web,
    Console,
    Mqtt,
    /// Code running on the device itself (bring-up, tests).
    Local,
    /// The day/year rollover.
    Calendar,
}

impl fmt::Display for CommandSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Web => "web",
            Self::Console => "console",
            Self::Mqtt => "mqtt",
            Self::Local => "local",
            Self::Calendar => "calendar",
        };
        f.write_str(s)
    }
}

/// Commands that external adapters can send into the meter core.
#[derive(Debug, Clone, PartialEq)]
pub enum AppCommand {
    /// Report the current counters.
    Status,

    /// Zero the daily volume.
    ResetDaily,

    /// Zero the yearly volume.
    ResetYearly,

    /// Replace one counter with an administrator-supplied value.
    Override { field: CounterField, value: u64 },

    /// Persist the counters now instead of at the next periodic save.
    SaveNow,

    /// Hot-reload configuration.
    UpdateConfig(MeterConfig),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommandError {
    /// Empty line.
    Empty,
    /// First word not recognised.
    UnknownCommand,
    /// Counter or form field name not recognised.
    UnknownField,
    /// A required argument is missing.
    MissingArgument,
    /// Value is not a plain decimal `u64`.
    InvalidValue,
    /// Extra words after a complete command.
    TrailingInput,
}

impl fmt::Display for CommandError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Empty => write!(f, "empty command"),
            Self::UnknownCommand => write!(f, "unknown command"),
            Self::UnknownField => write!(f, "unknown field"),
            Self::MissingArgument => write!(f, "missing argument"),
            Self::InvalidValue => write!(f, "value must be a non-negative integer"),
            Self::TrailingInput => write!(f, "unexpected trailing input"),
        }
    }
}

impl AppCommand {
    /// Parse one console line.
    ///
    /// ```text
    /// status
    /// reset daily | reset yearly
    /// set pulses <n> | set daily <n> | set yearly <n>
    /// save
    /// ```
    pub fn parse_console(line: &str) -> Result<Self, CommandError> {
        let mut words = line.split_whitespace();
        let verb = words.next().ok_or(CommandError::Empty)?;

        let cmd = match verb.to_ascii_lowercase().as_str() {
            "status" => Self::Status,
            "save" => Self::SaveNow,
            "reset" => match words.next().map(str::to_ascii_lowercase).as_deref() {
                Some("daily") => Self::ResetDaily,
                Some("yearly") => Self::ResetYearly,
                Some(_) => return Err(CommandError::UnknownField),
                None => return Err(CommandError::MissingArgument),
            },
            "set" => {
                let field = match words.next().map(str::to_ascii_lowercase).as_deref() {
                    Some("pulses") => CounterField::Lifetime,
                    Some("daily") => CounterField::Daily,
                    Some("yearly") => CounterField::Yearly,
                    Some(_) => return Err(CommandError::UnknownField),
                    None => return Err(CommandError::MissingArgument),
                };
                let value = parse_value(words.next().ok_or(CommandError::MissingArgument)?)?;
                Self::Override { field, value }
            }
            _ => return Err(CommandError::UnknownCommand),
        };

        if words.next().is_some() {
            return Err(CommandError::TrailingInput);
        }
        Ok(cmd)
    }

    /// Parse one field submitted from the web settings form.
    pub fn parse_web_field(field: &str, value: &str) -> Result<Self, CommandError> {
        let field = match field {
            "total_pulses" => CounterField::Lifetime,
            "daily_liters" => CounterField::Daily,
            "yearly_liters" => CounterField::Yearly,
            _ => return Err(CommandError::UnknownField),
        };
        Ok(Self::Override {
            field,
            value: parse_value(value.trim())?,
        })
    }
}

/// Plain ASCII decimal only: no sign, no whitespace, no radix prefix.
fn parse_value(s: &str) -> Result<u64, CommandError> {
    if s.is_empty() || !s.bytes().all(|b| b.is_ascii_digit()) {
        return Err(CommandError::InvalidValue);
    }
    s.parse().map_err(|_| CommandError::InvalidValue)
}
