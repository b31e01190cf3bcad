//! Synchronization driver against an in-memory remote.

use std::collections::HashSet;
use std::sync::atomic::Ordering;
use std::sync::Mutex;

use chrono::NaiveDate;
use ledgercache_config::StoreConfig;
use ledgercache_store::model::PostingLine;
use ledgercache_store::{
    AccountGroupUpsert, AccountUpsert, AccountingUpsert, Amount, BudgetAccountGroupUpsert, BudgetAccountUpsert,
    DateKey, FixedClock, LedgerStore, PartyAccountUpsert, PostingLineUpsert, SyncStatus,
};
use ledgercache_store::model::BalanceSide;
use ledgercache_sync::{cancel_token, RemoteError, RemoteRepository, SyncDriver, SyncError};

fn date(y: i32, m: u32, d: u32) -> DateKey {
    DateKey::from_ymd(y, m, d).unwrap()
}

fn amount(s: &str) -> Amount {
    s.parse().unwrap()
}

#[derive(Default)]
struct FakeRemote {
    accountings: Vec<AccountingUpsert>,
    groups: Vec<AccountGroupUpsert>,
    budget_groups: Vec<BudgetAccountGroupUpsert>,
    accounts: Vec<AccountUpsert>,
    budget_accounts: Vec<BudgetAccountUpsert>,
    parties: Vec<PartyAccountUpsert>,
    lines: Vec<PostingLineUpsert>,
    fail_accounts: bool,
    reject_sequences: HashSet<i32>,
    posting_windows: Mutex<Vec<DateKey>>,
    submitted: Mutex<Vec<(i32, i32)>>,
}

impl RemoteRepository for FakeRemote {
    async fn accountings(&self) -> Result<Vec<AccountingUpsert>, RemoteError> {
        Ok(self.accountings.clone())
    }

    async fn account_groups(&self) -> Result<Vec<AccountGroupUpsert>, RemoteError> {
        Ok(self.groups.clone())
    }

    async fn budget_account_groups(&self) -> Result<Vec<BudgetAccountGroupUpsert>, RemoteError> {
        Ok(self.budget_groups.clone())
    }

    async fn accounts(&self, accounting_id: i32, _status_date: DateKey) -> Result<Vec<AccountUpsert>, RemoteError> {
        if self.fail_accounts {
            return Err(RemoteError::Network("connection reset".into()));
        }
        Ok(self.accounts.iter().filter(|a| a.accounting_id == accounting_id).cloned().collect())
    }

    async fn budget_accounts(
        &self,
        accounting_id: i32,
        _status_date: DateKey,
    ) -> Result<Vec<BudgetAccountUpsert>, RemoteError> {
        Ok(self.budget_accounts.iter().filter(|a| a.accounting_id == accounting_id).cloned().collect())
    }

    async fn party_accounts(
        &self,
        accounting_id: i32,
        _status_date: DateKey,
    ) -> Result<Vec<PartyAccountUpsert>, RemoteError> {
        Ok(self.parties.iter().filter(|a| a.accounting_id == accounting_id).cloned().collect())
    }

    async fn posting_lines(
        &self,
        accounting_id: i32,
        from_date: DateKey,
    ) -> Result<Vec<PostingLineUpsert>, RemoteError> {
        self.posting_windows.lock().unwrap().push(from_date);
        Ok(self.lines.iter().filter(|l| l.accounting_id == accounting_id).cloned().collect())
    }

    async fn submit_posting(&self, accounting_id: i32, line: &PostingLine) -> Result<(), RemoteError> {
        if self.reject_sequences.contains(&line.sequence) {
            return Err(RemoteError::Rejected {
                status: 422,
                message: "period closed".into(),
            });
        }
        self.submitted.lock().unwrap().push((accounting_id, line.sequence));
        Ok(())
    }
}

fn household() -> FakeRemote {
    FakeRemote {
        accountings: vec![AccountingUpsert { id: 1, name: "Household".into() }],
        groups: vec![AccountGroupUpsert {
            id: 10,
            name: "Bank".into(),
            side: BalanceSide::Asset,
        }],
        budget_groups: vec![BudgetAccountGroupUpsert { id: 20, name: "Living".into() }],
        accounts: vec![AccountUpsert {
            accounting_id: 1,
            number: "4620".into(),
            name: "Checking".into(),
            description: None,
            note: None,
            group_id: 10,
            credit: amount("0.00"),
            balance: amount("1000.00"),
            status_date: date(2024, 10, 19),
        }],
        budget_accounts: vec![BudgetAccountUpsert {
            accounting_id: 1,
            number: "7000".into(),
            name: "Groceries".into(),
            description: None,
            note: None,
            group_id: 20,
            income: amount("0.00"),
            expenses: amount("250.00"),
            posted: amount("250.00"),
            income_last_month: amount("0.00"),
            expenses_last_month: amount("410.00"),
            posted_last_month: amount("410.00"),
            status_date: date(2024, 10, 19),
        }],
        parties: vec![PartyAccountUpsert {
            accounting_id: 1,
            id: 3,
            name: "Landlord".into(),
            primary_phone: None,
            secondary_phone: None,
            payment_term_days: Some(14),
            balance: amount("-900.00"),
            status_date: date(2024, 10, 19),
        }],
        lines: vec![posting(7, "Rent October")],
        ..FakeRemote::default()
    }
}

fn posting(sequence: i32, text: &str) -> PostingLineUpsert {
    PostingLineUpsert {
        accounting_id: 1,
        sequence,
        date: date(2024, 10, 1),
        voucher: None,
        account_number: "4620".into(),
        text: text.into(),
        budget_account_number: None,
        debit: amount("0.00"),
        credit: amount("900.00"),
        party_account_id: Some(3),
    }
}

fn empty_store(dir: &tempfile::TempDir) -> LedgerStore {
    let config = StoreConfig::for_document(dir.path().join("ledger.json"));
    LedgerStore::open(config)
        .unwrap()
        .with_clock(FixedClock(NaiveDate::from_ymd_opt(2024, 10, 19).unwrap()))
}

#[test]
fn full_sync_populates_store_and_records_clock() {
    let dir = tempfile::tempdir().unwrap();
    let mut store = empty_store(&dir);
    let remote = household();
    let cancel = cancel_token();

    let report = smol::block_on(SyncDriver::full_sync(&mut store, &remote, date(2024, 10, 19), &cancel)).unwrap();

    assert_eq!(report.accountings, 1);
    // group, budget group, accounting, account, budget account, party, line
    assert_eq!(report.applied.created, 7);
    assert!(report.applied.failures.is_empty());
    assert_eq!(store.last_full_sync(), SyncStatus::At(report.synced_at));

    let account = store.document().account(1, "4620").unwrap();
    assert_eq!(account.figures.balance, amount("1000.00"));
    let line = store.document().posting_line(1, 7).unwrap();
    assert!(line.synchronized);
    assert!(!line.pending);

    // 25 months back from October 2024
    assert_eq!(*remote.posting_windows.lock().unwrap(), vec![date(2022, 9, 1)]);

    store.save().unwrap();
    assert!(store.has_data());
}

#[test]
fn cancelled_before_start_changes_nothing() {
    let dir = tempfile::tempdir().unwrap();
    let mut store = empty_store(&dir);
    let cancel = cancel_token();
    cancel.store(true, Ordering::Relaxed);

    let err = smol::block_on(SyncDriver::full_sync(&mut store, &household(), date(2024, 10, 19), &cancel)).unwrap_err();

    assert!(matches!(err, SyncError::Cancelled));
    assert_eq!(store.document().stats().accountings, 0);
    assert_eq!(store.last_full_sync(), SyncStatus::Never);
}

#[test]
fn remote_failure_keeps_partial_state_without_clock() {
    let dir = tempfile::tempdir().unwrap();
    let mut store = empty_store(&dir);
    let remote = FakeRemote {
        fail_accounts: true,
        ..household()
    };

    let err = smol::block_on(SyncDriver::full_sync(&mut store, &remote, date(2024, 10, 19), &cancel_token()))
        .unwrap_err();

    assert!(matches!(err, SyncError::Remote { operation: "accounts", .. }));
    assert!(store.document().accounting(1).is_some());
    assert!(store.document().account(1, "4620").is_none());
    assert_eq!(store.last_full_sync(), SyncStatus::Never);
}

#[test]
fn rejected_items_are_isolated_and_pass_completes() {
    let dir = tempfile::tempdir().unwrap();
    let mut store = empty_store(&dir);
    let mut remote = household();
    remote.lines.push(PostingLineUpsert {
        text: "  ".into(),
        ..posting(8, "")
    });

    let report =
        smol::block_on(SyncDriver::full_sync(&mut store, &remote, date(2024, 10, 19), &cancel_token())).unwrap();

    assert_eq!(report.applied.failures.len(), 1);
    assert_eq!(report.applied.failures[0].kind, "posting_line");
    assert!(store.document().posting_line(1, 7).is_some());
    assert!(store.document().posting_line(1, 8).is_none());
    assert!(matches!(store.last_full_sync(), SyncStatus::At(_)));
}

#[test]
fn pending_local_line_survives_full_sync() {
    let dir = tempfile::tempdir().unwrap();
    let mut store = empty_store(&dir);
    let remote = household();
    smol::block_on(SyncDriver::full_sync(&mut store, &remote, date(2024, 10, 19), &cancel_token())).unwrap();

    store.post_local(&posting(7, "Rent October (corrected)")).unwrap();
    let report =
        smol::block_on(SyncDriver::full_sync(&mut store, &remote, date(2024, 10, 19), &cancel_token())).unwrap();

    assert_eq!(report.applied.skipped, 1);
    let line = store.document().posting_line(1, 7).unwrap();
    assert_eq!(line.text, "Rent October (corrected)");
    assert!(line.pending);
}

#[test]
fn submit_pending_commits_acknowledged_lines_only() {
    let dir = tempfile::tempdir().unwrap();
    let mut store = empty_store(&dir);
    let mut remote = household();
    remote.lines.clear();
    remote.reject_sequences.insert(2);
    smol::block_on(SyncDriver::full_sync(&mut store, &remote, date(2024, 10, 19), &cancel_token())).unwrap();

    store.post_local(&posting(1, "Groceries")).unwrap();
    store.post_local(&posting(2, "Late fee")).unwrap();

    let report = smol::block_on(SyncDriver::submit_pending(&mut store, &remote, &cancel_token())).unwrap();

    assert_eq!(report.submitted, 1);
    assert_eq!(report.failures.len(), 1);
    assert_eq!(report.failures[0].sequence, 2);
    assert_eq!(*remote.submitted.lock().unwrap(), vec![(1, 1)]);

    let accepted = store.document().posting_line(1, 1).unwrap();
    assert!(!accepted.pending);
    assert!(accepted.synchronized);
    let rejected = store.document().posting_line(1, 2).unwrap();
    assert!(rejected.pending);
    assert_eq!(store.pending_postings(1).len(), 1);
}

#[test]
fn submit_pending_stops_when_cancelled() {
    let dir = tempfile::tempdir().unwrap();
    let mut store = empty_store(&dir);
    let mut remote = household();
    remote.lines.clear();
    smol::block_on(SyncDriver::full_sync(&mut store, &remote, date(2024, 10, 19), &cancel_token())).unwrap();
    store.post_local(&posting(1, "Groceries")).unwrap();

    let cancel = cancel_token();
    cancel.store(true, Ordering::Relaxed);
    let err = smol::block_on(SyncDriver::submit_pending(&mut store, &remote, &cancel)).unwrap_err();

    assert!(matches!(err, SyncError::Cancelled));
    assert!(remote.submitted.lock().unwrap().is_empty());
    assert_eq!(store.pending_postings(1).len(), 1);
}
