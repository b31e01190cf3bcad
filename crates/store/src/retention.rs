//! Read-triggered history pruning.
//!
//! There is no background sweep. Each history read computes the horizon
//! from "today" and deletes older records from the in-memory document
//! before returning the remainder, so a history read is also a write.

use chrono::{NaiveDate, Utc};

use crate::date_key::DateKey;
use crate::history::{History, HistoryRecord, Snapshot};

/// Two years and one month.
pub const DEFAULT_RETENTION_MONTHS: u32 = 25;

/// Source of "today" for retention decisions.
pub trait Clock: Send {
    fn today(&self) -> NaiveDate;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn today(&self) -> NaiveDate {
        Utc::now().date_naive()
    }
}

/// Clock pinned to one date.
#[derive(Debug, Clone, Copy)]
pub struct FixedClock(pub NaiveDate);

impl Clock for FixedClock {
    fn today(&self) -> NaiveDate {
        self.0
    }
}

/// First day of the month `retention_months` before `today`. Records dated
/// on or before this day are expired.
pub fn horizon(today: NaiveDate, retention_months: u32) -> DateKey {
    DateKey::clamped(today).months_back(retention_months)
}

/// Delete expired records, then return what is left newest first.
pub fn prune_and_read<S: Snapshot>(
    history: &mut History<S>,
    today: NaiveDate,
    retention_months: u32,
) -> (usize, Vec<HistoryRecord<S>>) {
    let removed = history.remove_through(horizon(today, retention_months));
    (removed, history.descending())
}
