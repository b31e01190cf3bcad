//! Monthly-consolidated history for balance-bearing entities.
//!
//! Every upsert of an account, budget account or party account feeds its
//! tracked figures through [`consolidate`]. The policy keeps roughly one
//! record per entity per month while still capturing every month boundary
//! and every material change:
//!
//! 1. A record at the exact date is overwritten.
//! 2. Otherwise the latest record strictly before the date decides: a new
//!    record is inserted when the calendar month differs or any tracked
//!    figure differs. Identical same-month refreshes are dropped.

use std::collections::BTreeMap;

use crate::date_key::DateKey;

/// The figures a history record captures. Equality decides whether a
/// same-month update is material.
pub trait Snapshot: Clone + PartialEq + std::fmt::Debug {}

impl<T: Clone + PartialEq + std::fmt::Debug> Snapshot for T {}

#[derive(Debug, Clone, PartialEq)]
pub struct HistoryRecord<S> {
    pub date: DateKey,
    pub snapshot: S,
}

/// What [`consolidate`] did with an update.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Consolidation {
    /// A record already existed at this date and was overwritten.
    Overwritten,
    /// A new record was inserted.
    Inserted,
    /// The update matched the previous record in the same month.
    Absorbed,
}

/// Ordered history series. At most one record per date.
#[derive(Debug, Clone, PartialEq)]
pub struct History<S> {
    records: BTreeMap<DateKey, S>,
}

impl<S> Default for History<S> {
    fn default() -> Self {
        Self {
            records: BTreeMap::new(),
        }
    }
}

impl<S: Snapshot> History<S> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Series holding a single record.
    pub fn seeded(date: DateKey, snapshot: S) -> Self {
        let mut records = BTreeMap::new();
        records.insert(date, snapshot);
        Self { records }
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn get(&self, date: DateKey) -> Option<&S> {
        self.records.get(&date)
    }

    /// Latest record strictly before `date`.
    pub fn latest_before(&self, date: DateKey) -> Option<(DateKey, &S)> {
        self.records.range(..date).next_back().map(|(k, v)| (*k, v))
    }

    pub fn latest(&self) -> Option<(DateKey, &S)> {
        self.records.iter().next_back().map(|(k, v)| (*k, v))
    }

    /// Records oldest first.
    pub fn iter(&self) -> impl DoubleEndedIterator<Item = (DateKey, &S)> {
        self.records.iter().map(|(k, v)| (*k, v))
    }

    /// Records newest first.
    pub fn descending(&self) -> Vec<HistoryRecord<S>> {
        self.records
            .iter()
            .rev()
            .map(|(date, snapshot)| HistoryRecord {
                date: *date,
                snapshot: snapshot.clone(),
            })
            .collect()
    }

    /// Insert without consolidation. Returns false when the date is taken.
    pub(crate) fn insert_new(&mut self, date: DateKey, snapshot: S) -> bool {
        if self.records.contains_key(&date) {
            return false;
        }
        self.records.insert(date, snapshot);
        true
    }

    /// Drop every record dated on or before `horizon`. Returns how many went.
    pub(crate) fn remove_through(&mut self, horizon: DateKey) -> usize {
        let before = self.records.len();
        self.records.retain(|date, _| *date > horizon);
        before - self.records.len()
    }

    pub(crate) fn records_mut(&mut self) -> &mut BTreeMap<DateKey, S> {
        &mut self.records
    }
}

/// Decide whether an update at `date` becomes its own record.
pub fn make_historic<S: Snapshot>(previous: Option<(DateKey, &S)>, date: DateKey, snapshot: &S) -> bool {
    match previous {
        None => true,
        Some((prev_date, prev)) => !prev_date.same_month(date) || prev != snapshot,
    }
}

/// Apply the consolidation policy for one update.
pub fn consolidate<S: Snapshot>(history: &mut History<S>, date: DateKey, snapshot: S) -> Consolidation {
    if let Some(existing) = history.records_mut().get_mut(&date) {
        *existing = snapshot;
        return Consolidation::Overwritten;
    }

    if make_historic(history.latest_before(date), date, &snapshot) {
        history.records_mut().insert(date, snapshot);
        Consolidation::Inserted
    } else {
        Consolidation::Absorbed
    }
}
