//! Counter persistence over a [`StoragePort`].
//!
//! Three `u64` keys hold the record: `pulse_count`, `daily_liters`,
//! `yearly_liters`.  NVS commits one key at a time, so a save is staged
//! through a small journal:
//!
//! ```text
//!  1. j_pulse_count, j_daily, j_yearly  ← new values
//!  2. j_armed = 1                       ← commit point
//!  3. pulse_count, daily_liters, yearly_liters
//!  4. j_armed = 0
//! ```
//!
//! A power cut before step 2 leaves the old primaries intact; a cut after
//! step 2 is repaired on the next [`PersistenceGateway::load`] by copying
//! the journal over the primaries.  Either way the loaded record is one
//! that was fully written.
//!
//! Storage is optional.  Without it every call returns
//! [`PersistError::Unavailable`] and the meter runs from memory.  A load
//! that fails on a read has the same effect on later saves: the stored
//! record was never seen, so it must not be overwritten with counters
//! that started from zero.

use core::fmt;

use log::{debug, info, warn};

use crate::app::ports::{StorageError, StoragePort};
use crate::ledger::CounterField;

const KEY_PULSES: &str = CounterField::Lifetime.key();
const KEY_DAILY: &str = CounterField::Daily.key();
const KEY_YEARLY: &str = CounterField::Yearly.key();

const J_PULSES: &str = "j_pulse_count";
const J_DAILY: &str = "j_daily";
const J_YEARLY: &str = "j_yearly";
const J_ARMED: &str = "j_armed";

/// Durable image of the three counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PersistedRecord {
    pub pulse_count: u64,
    pub daily_liters: u64,
    pub yearly_liters: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PersistError {
    /// No storage collaborator, or it failed to initialise.
    Unavailable,
    /// The backend rejected a read or write.
    Storage(StorageError),
}

impl fmt::Display for PersistError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Unavailable => write!(f, "storage unavailable"),
            Self::Storage(e) => write!(f, "{e}"),
        }
    }
}

impl From<StorageError> for PersistError {
    fn from(e: StorageError) -> Self {
        Self::Storage(e)
    }
}

/// Loads and saves [`PersistedRecord`]s through an optional backend.
pub struct PersistenceGateway<S: StoragePort> {
    storage: Option<S>,
    /// Set by a failed [`load`](Self::load), cleared by a successful one.
    /// While set, saves are refused.
    load_failed: bool,
}

impl<S: StoragePort> PersistenceGateway<S> {
    pub fn new(storage: Option<S>) -> Self {
        Self {
            storage,
            load_failed: false,
        }
    }

    pub fn is_available(&self) -> bool {
        !self.load_failed && self.storage.as_ref().is_some_and(|s| s.is_available())
    }

    /// Read the record.  Missing keys read as zero (first boot).
    ///
    /// Any read error puts the gateway in memory-only mode until a later
    /// load succeeds.
    pub fn load(&mut self) -> Result<PersistedRecord, PersistError> {
        let result = self.read_record();
        self.load_failed = matches!(result, Err(PersistError::Storage(_)));
        result
    }

    fn read_record(&mut self) -> Result<PersistedRecord, PersistError> {
        let store = self.backend()?;

        if store.get_u64(J_ARMED, 0)? == 1 {
            let record = PersistedRecord {
                pulse_count: store.get_u64(J_PULSES, 0)?,
                daily_liters: store.get_u64(J_DAILY, 0)?,
                yearly_liters: store.get_u64(J_YEARLY, 0)?,
            };
            warn!("LOAD: interrupted save found, restoring from journal");
            // The journal stays armed if the repair fails, so the next
            // load or save still sees a complete record.
            let repaired = write_primaries(store, &record).and_then(|()| store.put_u64(J_ARMED, 0));
            if let Err(e) = repaired {
                warn!("LOAD: journal repair failed ({}), using journal record", e);
            }
            return Ok(record);
        }

        let record = PersistedRecord {
            pulse_count: store.get_u64(KEY_PULSES, 0)?,
            daily_liters: store.get_u64(KEY_DAILY, 0)?,
            yearly_liters: store.get_u64(KEY_YEARLY, 0)?,
        };
        info!(
            "LOAD: pulses={} daily={} L yearly={} L",
            record.pulse_count, record.daily_liters, record.yearly_liters
        );
        Ok(record)
    }

    /// Write the record through the journal.
    pub fn save(&mut self, record: &PersistedRecord) -> Result<(), PersistError> {
        if self.load_failed {
            return Err(PersistError::Unavailable);
        }
        let store = self.backend()?;

        store.put_u64(J_PULSES, record.pulse_count)?;
        store.put_u64(J_DAILY, record.daily_liters)?;
        store.put_u64(J_YEARLY, record.yearly_liters)?;
        store.put_u64(J_ARMED, 1)?;

        write_primaries(store, record)?;
        store.put_u64(J_ARMED, 0)?;

        debug!(
            "SAVE: pulses={} daily={} L yearly={} L",
            record.pulse_count, record.daily_liters, record.yearly_liters
        );
        Ok(())
    }

    pub fn storage(&self) -> Option<&S> {
        self.storage.as_ref()
    }

    pub fn storage_mut(&mut self) -> Option<&mut S> {
        self.storage.as_mut()
    }

    fn backend(&mut self) -> Result<&mut S, PersistError> {
        match self.storage.as_mut() {
            Some(s) if s.is_available() => Ok(s),
            _ => Err(PersistError::Unavailable),
        }
    }
}

fn write_primaries<S: StoragePort>(store: &mut S, r: &PersistedRecord) -> Result<(), StorageError> {
    store.put_u64(KEY_PULSES, r.pulse_count)?;
    store.put_u64(KEY_DAILY, r.daily_liters)?;
    store.put_u64(KEY_YEARLY, r.yearly_liters)
}
