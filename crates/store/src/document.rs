//! In-memory ledger document.
//!
//! The document is an index of ordered maps keyed by accounting id and entity
//! key. The persisted JSON tree only exists at the load/save boundary (see
//! [`crate::wire`]); everything in between works against these maps.

use std::collections::BTreeMap;
use std::fmt;

use chrono::NaiveDate;
use log::{info, warn};

use crate::error::StoreError;
use crate::history::HistoryRecord;
use crate::model::{
    normalize_number, Account, AccountFigures, AccountGroup, Accounting, BudgetAccount, BudgetAccountGroup,
    BudgetFigures, PartyAccount, PartyFigures, PostingLine,
};
use crate::retention::prune_and_read;

// ---------------------------------------------------------------------------
// Version
// ---------------------------------------------------------------------------

/// Document format version, persisted with one decimal (`"1.0"`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct StoreVersion {
    pub major: u16,
    pub minor: u16,
}

impl StoreVersion {
    pub const CURRENT: StoreVersion = StoreVersion { major: 1, minor: 0 };

    pub fn parse(s: &str) -> Option<Self> {
        let (major, minor) = s.split_once('.')?;
        if minor.len() != 1 {
            return None;
        }
        Some(Self {
            major: major.parse().ok()?,
            minor: minor.parse().ok()?,
        })
    }

    /// Same major version means the same schema.
    pub fn is_compatible(&self) -> bool {
        self.major == Self::CURRENT.major
    }
}

impl fmt::Display for StoreVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.major, self.minor)
    }
}

// ---------------------------------------------------------------------------
// Document
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, PartialEq)]
pub struct LedgerDocument {
    version: Option<StoreVersion>,
    /// Raw persisted timestamp; parsed on read by the sync clock.
    pub(crate) last_full_sync: Option<String>,
    pub(crate) accountings: BTreeMap<i32, Accounting>,
    pub(crate) account_groups: BTreeMap<i32, AccountGroup>,
    pub(crate) budget_account_groups: BTreeMap<i32, BudgetAccountGroup>,
}

/// Entity counts, for diagnostics.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, serde::Serialize)]
pub struct DocumentStats {
    pub accountings: usize,
    pub account_groups: usize,
    pub budget_account_groups: usize,
    pub accounts: usize,
    pub budget_accounts: usize,
    pub party_accounts: usize,
    pub posting_lines: usize,
    pub pending_posting_lines: usize,
    pub history_records: usize,
}

impl LedgerDocument {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn version(&self) -> Option<StoreVersion> {
        self.version
    }

    /// Write-once. Returns false, leaving the stamp alone, when already set.
    pub fn stamp_version(&mut self, version: StoreVersion) -> bool {
        if self.version.is_some() {
            return false;
        }
        info!("stamping document version {version}");
        self.version = Some(version);
        true
    }

    pub(crate) fn with_version(mut self, version: Option<StoreVersion>) -> Self {
        self.version = version;
        self
    }

    // -- accountings + groups -----------------------------------------------

    pub fn accounting(&self, id: i32) -> Option<&Accounting> {
        self.accountings.get(&id)
    }

    pub fn accountings(&self) -> impl Iterator<Item = &Accounting> {
        self.accountings.values()
    }

    pub fn account_group(&self, id: i32) -> Option<&AccountGroup> {
        self.account_groups.get(&id)
    }

    pub fn account_groups(&self) -> impl Iterator<Item = &AccountGroup> {
        self.account_groups.values()
    }

    pub fn budget_account_group(&self, id: i32) -> Option<&BudgetAccountGroup> {
        self.budget_account_groups.get(&id)
    }

    pub fn budget_account_groups(&self) -> impl Iterator<Item = &BudgetAccountGroup> {
        self.budget_account_groups.values()
    }

    // -- keyed children -----------------------------------------------------

    pub fn account(&self, accounting_id: i32, number: &str) -> Option<&Account> {
        self.accounting(accounting_id)?
            .accounts
            .get(&normalize_number(number))
    }

    pub fn budget_account(&self, accounting_id: i32, number: &str) -> Option<&BudgetAccount> {
        self.accounting(accounting_id)?
            .budget_accounts
            .get(&normalize_number(number))
    }

    pub fn party_account(&self, accounting_id: i32, id: i32) -> Option<&PartyAccount> {
        self.accounting(accounting_id)?.party_accounts.get(&id)
    }

    pub fn posting_line(&self, accounting_id: i32, sequence: i32) -> Option<&PostingLine> {
        self.accounting(accounting_id)?.posting_lines.get(&sequence)
    }

    /// Accounts belonging to one account group.
    pub fn accounts_in_group(&self, accounting_id: i32, group_id: i32) -> Vec<&Account> {
        self.accounting(accounting_id)
            .map(|a| a.accounts.values().filter(|acc| acc.group_id == group_id).collect())
            .unwrap_or_default()
    }

    /// Posting lines dated within `from..=to`, newest first, ties by
    /// descending sequence.
    pub fn posting_lines_between(&self, accounting_id: i32, from: NaiveDate, to: NaiveDate) -> Vec<&PostingLine> {
        let mut lines: Vec<&PostingLine> = self
            .accounting(accounting_id)
            .map(|a| {
                a.posting_lines
                    .values()
                    .filter(|l| l.date.date() >= from && l.date.date() <= to)
                    .collect()
            })
            .unwrap_or_default();
        lines.sort_by(|a, b| b.date.cmp(&a.date).then(b.sequence.cmp(&a.sequence)));
        lines
    }

    /// Posting lines touching an account, newest first.
    pub fn posting_lines_for_account(&self, accounting_id: i32, number: &str) -> Vec<&PostingLine> {
        let number = normalize_number(number);
        let mut lines: Vec<&PostingLine> = self
            .accounting(accounting_id)
            .map(|a| a.posting_lines.values().filter(|l| l.account_number == number).collect())
            .unwrap_or_default();
        lines.sort_by(|a, b| b.date.cmp(&a.date).then(b.sequence.cmp(&a.sequence)));
        lines
    }

    pub fn stats(&self) -> DocumentStats {
        let mut stats = DocumentStats {
            accountings: self.accountings.len(),
            account_groups: self.account_groups.len(),
            budget_account_groups: self.budget_account_groups.len(),
            ..DocumentStats::default()
        };
        for a in self.accountings.values() {
            stats.accounts += a.accounts.len();
            stats.budget_accounts += a.budget_accounts.len();
            stats.party_accounts += a.party_accounts.len();
            stats.posting_lines += a.posting_lines.len();
            stats.pending_posting_lines += a.posting_lines.values().filter(|l| l.pending).count();
            stats.history_records += a.accounts.values().map(|x| x.history.len()).sum::<usize>()
                + a.budget_accounts.values().map(|x| x.history.len()).sum::<usize>()
                + a.party_accounts.values().map(|x| x.history.len()).sum::<usize>();
        }
        stats
    }

    // -- history reads ------------------------------------------------------
    //
    // These are reads with a side effect: records at or before the retention
    // horizon are deleted from the document before the remainder is
    // returned newest first. Persisting the deletion needs a save.

    pub fn account_history(
        &mut self,
        accounting_id: i32,
        number: &str,
        today: NaiveDate,
        retention_months: u32,
    ) -> Result<Vec<HistoryRecord<AccountFigures>>, StoreError> {
        let number = normalize_number(number);
        let account = self
            .accountings
            .get_mut(&accounting_id)
            .and_then(|a| a.accounts.get_mut(&number))
            .ok_or_else(|| {
                StoreError::ArgumentInvalid(format!("no account {number} in accounting {accounting_id}"))
            })?;
        let (removed, records) = prune_and_read(&mut account.history, today, retention_months);
        log_pruned("account", &number, removed);
        Ok(records)
    }

    pub fn budget_account_history(
        &mut self,
        accounting_id: i32,
        number: &str,
        today: NaiveDate,
        retention_months: u32,
    ) -> Result<Vec<HistoryRecord<BudgetFigures>>, StoreError> {
        let number = normalize_number(number);
        let account = self
            .accountings
            .get_mut(&accounting_id)
            .and_then(|a| a.budget_accounts.get_mut(&number))
            .ok_or_else(|| {
                StoreError::ArgumentInvalid(format!(
                    "no budget account {number} in accounting {accounting_id}"
                ))
            })?;
        let (removed, records) = prune_and_read(&mut account.history, today, retention_months);
        log_pruned("budget account", &number, removed);
        Ok(records)
    }

    pub fn party_account_history(
        &mut self,
        accounting_id: i32,
        id: i32,
        today: NaiveDate,
        retention_months: u32,
    ) -> Result<Vec<HistoryRecord<PartyFigures>>, StoreError> {
        let party = self
            .accountings
            .get_mut(&accounting_id)
            .and_then(|a| a.party_accounts.get_mut(&id))
            .ok_or_else(|| {
                StoreError::ArgumentInvalid(format!("no party account {id} in accounting {accounting_id}"))
            })?;
        let (removed, records) = prune_and_read(&mut party.history, today, retention_months);
        log_pruned("party account", &id.to_string(), removed);
        Ok(records)
    }
}

fn log_pruned(kind: &str, key: &str, removed: usize) {
    if removed > 0 {
        warn!("{kind} {key}: pruned {removed} history record(s) past retention");
    }
}
