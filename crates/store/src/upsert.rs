//! Insert-or-update of current-state snapshots.
//!
//! Remote snapshots and local edits both come through here. Each upsert
//! validates its whole input before touching the document, so a rejected
//! item never leaves a half-written entity behind.

use log::debug;
use serde::{Deserialize, Serialize};

use crate::amount::Amount;
use crate::date_key::DateKey;
use crate::document::LedgerDocument;
use crate::error::{require, StoreError};
use crate::history::{consolidate, Consolidation, History};
use crate::model::{
    normalize_number, Account, AccountFigures, AccountGroup, Accounting, BalanceSide, BudgetAccount,
    BudgetAccountGroup, BudgetFigures, PartyAccount, PartyFigures,
};
use crate::pending::upsert_posting_line;

// ---------------------------------------------------------------------------
// Inputs
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AccountingUpsert {
    pub id: i32,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AccountGroupUpsert {
    pub id: i32,
    pub name: String,
    pub side: BalanceSide,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BudgetAccountGroupUpsert {
    pub id: i32,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AccountUpsert {
    pub accounting_id: i32,
    pub number: String,
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub note: Option<String>,
    pub group_id: i32,
    pub credit: Amount,
    pub balance: Amount,
    pub status_date: DateKey,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BudgetAccountUpsert {
    pub accounting_id: i32,
    pub number: String,
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub note: Option<String>,
    pub group_id: i32,
    pub income: Amount,
    pub expenses: Amount,
    pub posted: Amount,
    pub income_last_month: Amount,
    pub expenses_last_month: Amount,
    pub posted_last_month: Amount,
    pub status_date: DateKey,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PartyAccountUpsert {
    pub accounting_id: i32,
    pub id: i32,
    pub name: String,
    #[serde(default)]
    pub primary_phone: Option<String>,
    #[serde(default)]
    pub secondary_phone: Option<String>,
    #[serde(default)]
    pub payment_term_days: Option<u16>,
    pub balance: Amount,
    pub status_date: DateKey,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PostingLineUpsert {
    pub accounting_id: i32,
    pub sequence: i32,
    pub date: DateKey,
    #[serde(default)]
    pub voucher: Option<String>,
    pub account_number: String,
    pub text: String,
    #[serde(default)]
    pub budget_account_number: Option<String>,
    #[serde(default)]
    pub debit: Amount,
    #[serde(default)]
    pub credit: Amount,
    #[serde(default)]
    pub party_account_id: Option<i32>,
}

/// Any single upsert, as carried in a batch.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Upsert {
    Accounting(AccountingUpsert),
    AccountGroup(AccountGroupUpsert),
    BudgetAccountGroup(BudgetAccountGroupUpsert),
    Account(AccountUpsert),
    BudgetAccount(BudgetAccountUpsert),
    PartyAccount(PartyAccountUpsert),
    PostingLine(PostingLineUpsert),
}

impl Upsert {
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Accounting(_) => "accounting",
            Self::AccountGroup(_) => "account_group",
            Self::BudgetAccountGroup(_) => "budget_account_group",
            Self::Account(_) => "account",
            Self::BudgetAccount(_) => "budget_account",
            Self::PartyAccount(_) => "party_account",
            Self::PostingLine(_) => "posting_line",
        }
    }
}

// ---------------------------------------------------------------------------
// Outcomes
// ---------------------------------------------------------------------------

/// Which path a write came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WriteOrigin {
    /// Local edit from the presentation layer.
    Local,
    /// Snapshot from the remote reconciliation path.
    Remote,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SkipReason {
    /// The parent accounting does not exist.
    UnknownAccounting,
    /// Remote write onto a line with an unconfirmed local write.
    PendingLocalWrite,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum UpsertOutcome {
    Created,
    Updated,
    Skipped(SkipReason),
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct BatchReport {
    pub created: usize,
    pub updated: usize,
    pub skipped: usize,
    pub failures: Vec<BatchFailure>,
}

#[derive(Debug, Clone, Serialize)]
pub struct BatchFailure {
    pub index: usize,
    pub kind: &'static str,
    pub message: String,
}

impl BatchReport {
    pub fn record(&mut self, outcome: UpsertOutcome) {
        match outcome {
            UpsertOutcome::Created => self.created += 1,
            UpsertOutcome::Updated => self.updated += 1,
            UpsertOutcome::Skipped(_) => self.skipped += 1,
        }
    }

    pub fn merge(&mut self, other: BatchReport) {
        self.created += other.created;
        self.updated += other.updated;
        self.skipped += other.skipped;
        self.failures.extend(other.failures);
    }

    pub fn applied(&self) -> usize {
        self.created + self.updated
    }
}

// ---------------------------------------------------------------------------
// Groups + accounting
// ---------------------------------------------------------------------------

pub fn upsert_accounting(doc: &mut LedgerDocument, input: &AccountingUpsert) -> Result<UpsertOutcome, StoreError> {
    require(&input.name, "Accounting", "name")?;

    if let Some(existing) = doc.accountings.get_mut(&input.id) {
        existing.name = input.name.clone();
        return Ok(UpsertOutcome::Updated);
    }
    debug!("creating accounting {}", input.id);
    doc.accountings
        .insert(input.id, Accounting::new(input.id, input.name.clone()));
    Ok(UpsertOutcome::Created)
}

pub fn upsert_account_group(
    doc: &mut LedgerDocument,
    input: &AccountGroupUpsert,
) -> Result<UpsertOutcome, StoreError> {
    require(&input.name, "AccountGroup", "name")?;

    let group = AccountGroup {
        id: input.id,
        name: input.name.clone(),
        side: input.side,
    };
    Ok(match doc.account_groups.insert(input.id, group) {
        Some(_) => UpsertOutcome::Updated,
        None => UpsertOutcome::Created,
    })
}

pub fn upsert_budget_account_group(
    doc: &mut LedgerDocument,
    input: &BudgetAccountGroupUpsert,
) -> Result<UpsertOutcome, StoreError> {
    require(&input.name, "BudgetAccountGroup", "name")?;

    let group = BudgetAccountGroup {
        id: input.id,
        name: input.name.clone(),
    };
    Ok(match doc.budget_account_groups.insert(input.id, group) {
        Some(_) => UpsertOutcome::Updated,
        None => UpsertOutcome::Created,
    })
}

// ---------------------------------------------------------------------------
// Balance-bearing entities
// ---------------------------------------------------------------------------

fn log_consolidation(kind: &str, key: &str, date: DateKey, result: Consolidation) {
    debug!("{kind} {key}: history at {date} {result:?}");
}

pub fn upsert_account(doc: &mut LedgerDocument, input: &AccountUpsert) -> Result<UpsertOutcome, StoreError> {
    require(&input.number, "Account", "number")?;
    require(&input.name, "Account", "name")?;

    let Some(accounting) = doc.accountings.get_mut(&input.accounting_id) else {
        debug!("account {}: accounting {} absent, skipped", input.number, input.accounting_id);
        return Ok(UpsertOutcome::Skipped(SkipReason::UnknownAccounting));
    };

    let number = normalize_number(&input.number);
    let figures = AccountFigures {
        credit: input.credit,
        balance: input.balance,
    };

    match accounting.accounts.get_mut(&number) {
        Some(account) => {
            account.name = input.name.clone();
            account.description = input.description.clone();
            account.note = input.note.clone();
            account.group_id = input.group_id;
            account.figures = figures;
            account.status_date = input.status_date;
            let result = consolidate(&mut account.history, input.status_date, figures);
            log_consolidation("account", &number, input.status_date, result);
            Ok(UpsertOutcome::Updated)
        }
        None => {
            accounting.accounts.insert(
                number.clone(),
                Account {
                    number,
                    name: input.name.clone(),
                    description: input.description.clone(),
                    note: input.note.clone(),
                    group_id: input.group_id,
                    figures,
                    status_date: input.status_date,
                    history: History::seeded(input.status_date, figures),
                },
            );
            Ok(UpsertOutcome::Created)
        }
    }
}

pub fn upsert_budget_account(
    doc: &mut LedgerDocument,
    input: &BudgetAccountUpsert,
) -> Result<UpsertOutcome, StoreError> {
    require(&input.number, "BudgetAccount", "number")?;
    require(&input.name, "BudgetAccount", "name")?;
    let previous_month_date = input.status_date.end_of_previous_month().ok_or_else(|| {
        StoreError::ArgumentInvalid(format!(
            "budget account {}: no month precedes status date {}",
            input.number, input.status_date
        ))
    })?;

    let Some(accounting) = doc.accountings.get_mut(&input.accounting_id) else {
        debug!(
            "budget account {}: accounting {} absent, skipped",
            input.number, input.accounting_id
        );
        return Ok(UpsertOutcome::Skipped(SkipReason::UnknownAccounting));
    };

    let number = normalize_number(&input.number);
    let figures = BudgetFigures {
        income: input.income,
        expenses: input.expenses,
        posted: input.posted,
    };
    let last_month = BudgetFigures {
        income: input.income_last_month,
        expenses: input.expenses_last_month,
        posted: input.posted_last_month,
    };

    let outcome = match accounting.budget_accounts.get_mut(&number) {
        Some(account) => {
            account.name = input.name.clone();
            account.description = input.description.clone();
            account.note = input.note.clone();
            account.group_id = input.group_id;
            account.figures = figures;
            account.last_month = last_month;
            account.status_date = input.status_date;
            let result = consolidate(&mut account.history, input.status_date, figures);
            log_consolidation("budget account", &number, input.status_date, result);
            UpsertOutcome::Updated
        }
        None => {
            accounting.budget_accounts.insert(
                number.clone(),
                BudgetAccount {
                    number: number.clone(),
                    name: input.name.clone(),
                    description: input.description.clone(),
                    note: input.note.clone(),
                    group_id: input.group_id,
                    figures,
                    last_month,
                    status_date: input.status_date,
                    history: History::seeded(input.status_date, figures),
                },
            );
            UpsertOutcome::Created
        }
    };

    // The last-month figures form their own record at the end of the
    // previous month, consolidated independently.
    if let Some(account) = accounting.budget_accounts.get_mut(&number) {
        let result = consolidate(&mut account.history, previous_month_date, last_month);
        log_consolidation("budget account", &number, previous_month_date, result);
    }

    Ok(outcome)
}

pub fn upsert_party_account(
    doc: &mut LedgerDocument,
    input: &PartyAccountUpsert,
) -> Result<UpsertOutcome, StoreError> {
    require(&input.name, "PartyAccount", "name")?;

    let Some(accounting) = doc.accountings.get_mut(&input.accounting_id) else {
        debug!(
            "party account {}: accounting {} absent, skipped",
            input.id, input.accounting_id
        );
        return Ok(UpsertOutcome::Skipped(SkipReason::UnknownAccounting));
    };

    let figures = PartyFigures {
        balance: input.balance,
    };

    match accounting.party_accounts.get_mut(&input.id) {
        Some(party) => {
            party.name = input.name.clone();
            party.primary_phone = input.primary_phone.clone();
            party.secondary_phone = input.secondary_phone.clone();
            party.payment_term_days = input.payment_term_days;
            party.figures = figures;
            party.status_date = input.status_date;
            let result = consolidate(&mut party.history, input.status_date, figures);
            log_consolidation("party account", &input.id.to_string(), input.status_date, result);
            Ok(UpsertOutcome::Updated)
        }
        None => {
            accounting.party_accounts.insert(
                input.id,
                PartyAccount {
                    id: input.id,
                    name: input.name.clone(),
                    primary_phone: input.primary_phone.clone(),
                    secondary_phone: input.secondary_phone.clone(),
                    payment_term_days: input.payment_term_days,
                    figures,
                    status_date: input.status_date,
                    history: History::seeded(input.status_date, figures),
                },
            );
            Ok(UpsertOutcome::Created)
        }
    }
}

// ---------------------------------------------------------------------------
// Dispatch
// ---------------------------------------------------------------------------

/// Apply one upsert. `origin` only matters for posting lines.
pub fn apply(doc: &mut LedgerDocument, upsert: &Upsert, origin: WriteOrigin) -> Result<UpsertOutcome, StoreError> {
    match upsert {
        Upsert::Accounting(u) => upsert_accounting(doc, u),
        Upsert::AccountGroup(u) => upsert_account_group(doc, u),
        Upsert::BudgetAccountGroup(u) => upsert_budget_account_group(doc, u),
        Upsert::Account(u) => upsert_account(doc, u),
        Upsert::BudgetAccount(u) => upsert_budget_account(doc, u),
        Upsert::PartyAccount(u) => upsert_party_account(doc, u),
        Upsert::PostingLine(u) => upsert_posting_line(doc, u, origin),
    }
}

/// Apply every item in order. A failing item is reported and the rest
/// still apply.
pub fn apply_batch(doc: &mut LedgerDocument, items: &[Upsert], origin: WriteOrigin) -> BatchReport {
    let mut report = BatchReport::default();
    for (index, item) in items.iter().enumerate() {
        match apply(doc, item, origin) {
            Ok(outcome) => report.record(outcome),
            Err(e) => {
                debug!("batch item {index} ({}) rejected: {e}", item.kind());
                report.failures.push(BatchFailure {
                    index,
                    kind: item.kind(),
                    message: e.to_string(),
                });
            }
        }
    }
    report
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key(y: i32, m: u32, d: u32) -> DateKey {
        DateKey::from_ymd(y, m, d).unwrap()
    }

    fn doc_with_accounting() -> LedgerDocument {
        let mut doc = LedgerDocument::new();
        upsert_accounting(
            &mut doc,
            &AccountingUpsert {
                id: 1,
                name: "Household".into(),
            },
        )
        .unwrap();
        doc
    }

    fn account(number: &str, balance: i64, date: DateKey) -> AccountUpsert {
        AccountUpsert {
            accounting_id: 1,
            number: number.into(),
            name: "Checking".into(),
            description: None,
            note: None,
            group_id: 1,
            credit: Amount::ZERO,
            balance: Amount::from_cents(balance),
            status_date: date,
        }
    }

    fn budget(date: DateKey, posted: i64, posted_last_month: i64) -> BudgetAccountUpsert {
        BudgetAccountUpsert {
            accounting_id: 1,
            number: "1000".into(),
            name: "Groceries".into(),
            description: None,
            note: None,
            group_id: 2,
            income: Amount::ZERO,
            expenses: Amount::from_cents(400_00),
            posted: Amount::from_cents(posted),
            income_last_month: Amount::ZERO,
            expenses_last_month: Amount::from_cents(400_00),
            posted_last_month: Amount::from_cents(posted_last_month),
            status_date: date,
        }
    }

    #[test]
    fn accounting_update_touches_name_only() {
        let mut doc = doc_with_accounting();
        upsert_account(&mut doc, &account("4620", 100, key(2024, 1, 1))).unwrap();
        let outcome = upsert_accounting(
            &mut doc,
            &AccountingUpsert {
                id: 1,
                name: "Family".into(),
            },
        )
        .unwrap();
        assert_eq!(outcome, UpsertOutcome::Updated);
        let accounting = doc.accounting(1).unwrap();
        assert_eq!(accounting.name, "Family");
        assert_eq!(accounting.accounts.len(), 1);
    }

    #[test]
    fn child_without_accounting_is_skipped() {
        let mut doc = LedgerDocument::new();
        let outcome = upsert_account(&mut doc, &account("4620", 100, key(2024, 1, 1))).unwrap();
        assert_eq!(outcome, UpsertOutcome::Skipped(SkipReason::UnknownAccounting));
        assert!(doc.accounting(1).is_none());
    }

    #[test]
    fn blank_name_is_missing_value_and_writes_nothing() {
        let mut doc = doc_with_accounting();
        let mut input = account("4620", 100, key(2024, 1, 1));
        input.name = " ".into();
        let err = upsert_account(&mut doc, &input).unwrap_err();
        assert!(matches!(err, StoreError::MissingValue { field: "name", .. }));
        assert!(doc.account(1, "4620").is_none());
    }

    #[test]
    fn account_numbers_match_case_insensitively() {
        let mut doc = doc_with_accounting();
        upsert_account(&mut doc, &account("dkbank", 100, key(2024, 1, 1))).unwrap();
        let outcome = upsert_account(&mut doc, &account("DKBANK", 200, key(2024, 1, 2))).unwrap();
        assert_eq!(outcome, UpsertOutcome::Updated);
        assert_eq!(doc.accounting(1).unwrap().accounts.len(), 1);
        assert_eq!(doc.account(1, "DkBank").unwrap().figures.balance.cents(), 200);
    }

    #[test]
    fn budget_account_records_previous_month_separately() {
        let mut doc = doc_with_accounting();
        upsert_budget_account(&mut doc, &budget(key(2024, 3, 10), -120_00, -380_00)).unwrap();

        let account = doc.budget_account(1, "1000").unwrap();
        assert_eq!(account.history.len(), 2);
        let previous = account.history.get(key(2024, 2, 29)).unwrap();
        assert_eq!(previous.posted.cents(), -380_00);
        let current = account.history.get(key(2024, 3, 10)).unwrap();
        assert_eq!(current.posted.cents(), -120_00);

        // Same figures later in March: both rules absorb.
        upsert_budget_account(&mut doc, &budget(key(2024, 3, 12), -120_00, -380_00)).unwrap();
        assert_eq!(doc.budget_account(1, "1000").unwrap().history.len(), 2);

        // Late correction of February: same synthetic date, overwritten.
        upsert_budget_account(&mut doc, &budget(key(2024, 3, 15), -120_00, -390_00)).unwrap();
        let account = doc.budget_account(1, "1000").unwrap();
        assert_eq!(account.history.len(), 2);
        assert_eq!(account.history.get(key(2024, 2, 29)).unwrap().posted.cents(), -390_00);
    }

    #[test]
    fn budget_without_previous_month_is_refused_before_writing() {
        let mut doc = doc_with_accounting();
        let err = upsert_budget_account(&mut doc, &budget(key(1, 1, 15), 0, 0)).unwrap_err();
        assert!(matches!(err, StoreError::ArgumentInvalid(_)));
        assert!(doc.budget_account(1, "1000").is_none());

        upsert_budget_account(&mut doc, &budget(key(1, 2, 15), 0, 0)).unwrap();
        let account = doc.budget_account(1, "1000").unwrap();
        assert!(account.history.get(key(1, 1, 31)).is_some());
    }

    #[test]
    fn party_account_history_tracks_balance() {
        let mut doc = doc_with_accounting();
        let mut input = PartyAccountUpsert {
            accounting_id: 1,
            id: 12,
            name: "Plumber".into(),
            primary_phone: Some("555-0100".into()),
            secondary_phone: None,
            payment_term_days: Some(14),
            balance: Amount::from_cents(-250_00),
            status_date: key(2024, 5, 2),
        };
        assert_eq!(upsert_party_account(&mut doc, &input).unwrap(), UpsertOutcome::Created);
        input.balance = Amount::ZERO;
        input.status_date = key(2024, 5, 20);
        assert_eq!(upsert_party_account(&mut doc, &input).unwrap(), UpsertOutcome::Updated);
        let party = doc.party_account(1, 12).unwrap();
        assert_eq!(party.history.len(), 2);
        assert_eq!(party.figures.balance, Amount::ZERO);
    }

    #[test]
    fn batch_isolates_failures() {
        let mut doc = LedgerDocument::new();
        let mut bad = account("4621", 100, key(2024, 1, 1));
        bad.number = String::new();
        let items = vec![
            Upsert::Accounting(AccountingUpsert {
                id: 1,
                name: "Household".into(),
            }),
            Upsert::Account(account("4620", 100, key(2024, 1, 1))),
            Upsert::Account(bad),
            Upsert::Account(account("4622", 300, key(2024, 1, 1))),
        ];
        let report = apply_batch(&mut doc, &items, WriteOrigin::Remote);
        assert_eq!(report.created, 3);
        assert_eq!(report.failures.len(), 1);
        assert_eq!(report.failures[0].index, 2);
        assert_eq!(report.failures[0].kind, "account");
        assert!(doc.account(1, "4622").is_some());
    }

    #[test]
    fn upserts_deserialize_from_tagged_json() {
        let json = r#"[
            {"kind": "accounting", "id": 1, "name": "Household"},
            {"kind": "account_group", "id": 1, "name": "Bank", "side": "asset"},
            {"kind": "account", "accountingId": 1, "number": "4620", "name": "Checking",
             "groupId": 1, "credit": "0.00", "balance": "1000.00", "statusDate": "20240115"}
        ]"#;
        let items: Vec<Upsert> = serde_json::from_str(json).unwrap();
        assert_eq!(items.len(), 3);
        assert_eq!(items[2].kind(), "account");
    }
}
