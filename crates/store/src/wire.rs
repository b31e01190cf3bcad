//! Persisted form of the ledger document.
//!
//! These types mirror the JSON tree one to one. They exist only between
//! the file and [`LedgerDocument`]: [`WireDocument::into_document`] builds
//! the keyed index and rejects duplicate keys, [`WireDocument::from_document`]
//! flattens it back.

use std::collections::btree_map::Entry;
use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::amount::Amount;
use crate::date_key::DateKey;
use crate::document::{LedgerDocument, StoreVersion};
use crate::error::StoreError;
use crate::history::History;
use crate::model::{
    normalize_number, Account, AccountFigures, AccountGroup, Accounting, BalanceSide, BudgetAccount,
    BudgetAccountGroup, BudgetFigures, PartyAccount, PartyFigures, PostingLine,
};

// ---------------------------------------------------------------------------
// Tree
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WireDocument {
    pub version: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_full_sync: Option<String>,
    pub accountings: Vec<WireAccounting>,
    pub account_groups: Vec<WireAccountGroup>,
    pub budget_account_groups: Vec<WireBudgetAccountGroup>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WireAccountGroup {
    pub id: i32,
    pub name: String,
    pub side: BalanceSide,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WireBudgetAccountGroup {
    pub id: i32,
    pub name: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WireAccounting {
    pub id: i32,
    pub name: String,
    pub accounts: Vec<WireAccount>,
    pub budget_accounts: Vec<WireBudgetAccount>,
    pub party_accounts: Vec<WirePartyAccount>,
    pub posting_lines: Vec<WirePostingLine>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WireAccount {
    pub number: String,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,
    pub group_id: i32,
    pub credit: Amount,
    pub balance: Amount,
    pub status_date: DateKey,
    pub history: Vec<WireAccountHistory>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WireAccountHistory {
    pub date: DateKey,
    pub credit: Amount,
    pub balance: Amount,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WireBudgetAccount {
    pub number: String,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,
    pub group_id: i32,
    pub income: Amount,
    pub expenses: Amount,
    pub posted: Amount,
    pub income_last_month: Amount,
    pub expenses_last_month: Amount,
    pub posted_last_month: Amount,
    pub status_date: DateKey,
    pub history: Vec<WireBudgetHistory>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WireBudgetHistory {
    pub date: DateKey,
    pub income: Amount,
    pub expenses: Amount,
    pub posted: Amount,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WirePartyAccount {
    pub id: i32,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub primary_phone: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub secondary_phone: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub payment_term_days: Option<u16>,
    pub balance: Amount,
    pub status_date: DateKey,
    pub history: Vec<WirePartyHistory>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WirePartyHistory {
    pub date: DateKey,
    pub balance: Amount,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WirePostingLine {
    pub sequence: i32,
    pub date: DateKey,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub voucher: Option<String>,
    pub account_number: String,
    pub text: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub budget_account_number: Option<String>,
    pub debit: Amount,
    pub credit: Amount,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub party_account_id: Option<i32>,
    pub pending: bool,
    pub synchronized: bool,
}

// ---------------------------------------------------------------------------
// Tree -> index
// ---------------------------------------------------------------------------

fn insert_unique<K: Ord, V>(map: &mut BTreeMap<K, V>, key: K, value: V, path: impl FnOnce() -> String) -> Result<(), StoreError> {
    match map.entry(key) {
        Entry::Occupied(_) => Err(StoreError::schema(path(), "duplicate key")),
        Entry::Vacant(slot) => {
            slot.insert(value);
            Ok(())
        }
    }
}

fn history_from<S, W>(
    rows: Vec<W>,
    path: &str,
    split: impl Fn(W) -> (DateKey, S),
) -> Result<History<S>, StoreError>
where
    S: crate::history::Snapshot,
{
    let mut history = History::new();
    for (i, row) in rows.into_iter().enumerate() {
        let (date, snapshot) = split(row);
        if !history.insert_new(date, snapshot) {
            return Err(StoreError::schema(format!("{path}/history/{i}"), "duplicate history date"));
        }
    }
    Ok(history)
}

impl WireDocument {
    pub fn into_document(self) -> Result<LedgerDocument, StoreError> {
        let version = StoreVersion::parse(&self.version)
            .ok_or_else(|| StoreError::schema("/version", format!("bad version '{}'", self.version)))?;
        if !version.is_compatible() {
            return Err(StoreError::schema(
                "/version",
                format!("version {version} is not supported (expected {}.x)", StoreVersion::CURRENT.major),
            ));
        }

        let mut doc = LedgerDocument::new().with_version(Some(version));
        doc.last_full_sync = self.last_full_sync;

        for (i, g) in self.account_groups.into_iter().enumerate() {
            let group = AccountGroup {
                id: g.id,
                name: g.name,
                side: g.side,
            };
            insert_unique(&mut doc.account_groups, g.id, group, || format!("/accountGroups/{i}"))?;
        }
        for (i, g) in self.budget_account_groups.into_iter().enumerate() {
            let group = BudgetAccountGroup { id: g.id, name: g.name };
            insert_unique(&mut doc.budget_account_groups, g.id, group, || {
                format!("/budgetAccountGroups/{i}")
            })?;
        }
        for (i, a) in self.accountings.into_iter().enumerate() {
            let base = format!("/accountings/{i}");
            let id = a.id;
            let accounting = accounting_from(a, &base)?;
            insert_unique(&mut doc.accountings, id, accounting, || base.clone())?;
        }

        Ok(doc)
    }

    pub fn from_document(doc: &LedgerDocument) -> Self {
        Self {
            version: doc.version().unwrap_or(StoreVersion::CURRENT).to_string(),
            last_full_sync: doc.last_full_sync.clone(),
            accountings: doc.accountings().map(accounting_to).collect(),
            account_groups: doc
                .account_groups()
                .map(|g| WireAccountGroup {
                    id: g.id,
                    name: g.name.clone(),
                    side: g.side,
                })
                .collect(),
            budget_account_groups: doc
                .budget_account_groups()
                .map(|g| WireBudgetAccountGroup {
                    id: g.id,
                    name: g.name.clone(),
                })
                .collect(),
        }
    }
}

fn accounting_from(a: WireAccounting, base: &str) -> Result<Accounting, StoreError> {
    let mut accounting = Accounting::new(a.id, a.name);

    for (i, w) in a.accounts.into_iter().enumerate() {
        let path = format!("{base}/accounts/{i}");
        let number = normalize_number(&w.number);
        let history = history_from(w.history, &path, |h| {
            (h.date, AccountFigures { credit: h.credit, balance: h.balance })
        })?;
        let account = Account {
            number: number.clone(),
            name: w.name,
            description: w.description,
            note: w.note,
            group_id: w.group_id,
            figures: AccountFigures {
                credit: w.credit,
                balance: w.balance,
            },
            status_date: w.status_date,
            history,
        };
        insert_unique(&mut accounting.accounts, number, account, || path.clone())?;
    }

    for (i, w) in a.budget_accounts.into_iter().enumerate() {
        let path = format!("{base}/budgetAccounts/{i}");
        let number = normalize_number(&w.number);
        let history = history_from(w.history, &path, |h| {
            (
                h.date,
                BudgetFigures {
                    income: h.income,
                    expenses: h.expenses,
                    posted: h.posted,
                },
            )
        })?;
        let account = BudgetAccount {
            number: number.clone(),
            name: w.name,
            description: w.description,
            note: w.note,
            group_id: w.group_id,
            figures: BudgetFigures {
                income: w.income,
                expenses: w.expenses,
                posted: w.posted,
            },
            last_month: BudgetFigures {
                income: w.income_last_month,
                expenses: w.expenses_last_month,
                posted: w.posted_last_month,
            },
            status_date: w.status_date,
            history,
        };
        insert_unique(&mut accounting.budget_accounts, number, account, || path.clone())?;
    }

    for (i, w) in a.party_accounts.into_iter().enumerate() {
        let path = format!("{base}/partyAccounts/{i}");
        let history = history_from(w.history, &path, |h| (h.date, PartyFigures { balance: h.balance }))?;
        let party = PartyAccount {
            id: w.id,
            name: w.name,
            primary_phone: w.primary_phone,
            secondary_phone: w.secondary_phone,
            payment_term_days: w.payment_term_days,
            figures: PartyFigures { balance: w.balance },
            status_date: w.status_date,
            history,
        };
        insert_unique(&mut accounting.party_accounts, w.id, party, || path.clone())?;
    }

    for (i, w) in a.posting_lines.into_iter().enumerate() {
        let line = PostingLine {
            sequence: w.sequence,
            date: w.date,
            voucher: w.voucher,
            account_number: normalize_number(&w.account_number),
            text: w.text,
            budget_account_number: w.budget_account_number.as_deref().map(normalize_number),
            debit: w.debit,
            credit: w.credit,
            party_account_id: w.party_account_id,
            pending: w.pending,
            synchronized: w.synchronized,
        };
        insert_unique(&mut accounting.posting_lines, w.sequence, line, || {
            format!("{base}/postingLines/{i}")
        })?;
    }

    Ok(accounting)
}

// ---------------------------------------------------------------------------
// Index -> tree
// ---------------------------------------------------------------------------

fn accounting_to(a: &Accounting) -> WireAccounting {
    WireAccounting {
        id: a.id,
        name: a.name.clone(),
        accounts: a
            .accounts
            .values()
            .map(|x| WireAccount {
                number: x.number.clone(),
                name: x.name.clone(),
                description: x.description.clone(),
                note: x.note.clone(),
                group_id: x.group_id,
                credit: x.figures.credit,
                balance: x.figures.balance,
                status_date: x.status_date,
                history: x
                    .history
                    .iter()
                    .map(|(date, f)| WireAccountHistory {
                        date,
                        credit: f.credit,
                        balance: f.balance,
                    })
                    .collect(),
            })
            .collect(),
        budget_accounts: a
            .budget_accounts
            .values()
            .map(|x| WireBudgetAccount {
                number: x.number.clone(),
                name: x.name.clone(),
                description: x.description.clone(),
                note: x.note.clone(),
                group_id: x.group_id,
                income: x.figures.income,
                expenses: x.figures.expenses,
                posted: x.figures.posted,
                income_last_month: x.last_month.income,
                expenses_last_month: x.last_month.expenses,
                posted_last_month: x.last_month.posted,
                status_date: x.status_date,
                history: x
                    .history
                    .iter()
                    .map(|(date, f)| WireBudgetHistory {
                        date,
                        income: f.income,
                        expenses: f.expenses,
                        posted: f.posted,
                    })
                    .collect(),
            })
            .collect(),
        party_accounts: a
            .party_accounts
            .values()
            .map(|x| WirePartyAccount {
                id: x.id,
                name: x.name.clone(),
                primary_phone: x.primary_phone.clone(),
                secondary_phone: x.secondary_phone.clone(),
                payment_term_days: x.payment_term_days,
                balance: x.figures.balance,
                status_date: x.status_date,
                history: x
                    .history
                    .iter()
                    .map(|(date, f)| WirePartyHistory {
                        date,
                        balance: f.balance,
                    })
                    .collect(),
            })
            .collect(),
        posting_lines: a
            .posting_lines
            .values()
            .map(|l| WirePostingLine {
                sequence: l.sequence,
                date: l.date,
                voucher: l.voucher.clone(),
                account_number: l.account_number.clone(),
                text: l.text.clone(),
                budget_account_number: l.budget_account_number.clone(),
                debit: l.debit,
                credit: l.credit,
                party_account_id: l.party_account_id,
                pending: l.pending,
                synchronized: l.synchronized,
            })
            .collect(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn parse(value: serde_json::Value) -> Result<LedgerDocument, StoreError> {
        serde_json::from_value::<WireDocument>(value).unwrap().into_document()
    }

    #[test]
    fn duplicate_history_dates_are_rejected() {
        let err = parse(json!({
            "version": "1.0",
            "accountings": [{
                "id": 1, "name": "Household",
                "accounts": [{
                    "number": "4620", "name": "Checking", "groupId": 1,
                    "credit": "0.00", "balance": "10.00", "statusDate": "20240101",
                    "history": [
                        { "date": "20240101", "credit": "0.00", "balance": "10.00" },
                        { "date": "20240101", "credit": "0.00", "balance": "12.00" }
                    ]
                }],
                "budgetAccounts": [], "partyAccounts": [], "postingLines": []
            }],
            "accountGroups": [],
            "budgetAccountGroups": []
        }))
        .unwrap_err();
        match err {
            StoreError::SchemaViolation { path, .. } => {
                assert_eq!(path, "/accountings/0/accounts/0/history/1");
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn duplicate_accounting_ids_are_rejected() {
        let accounting = json!({
            "id": 1, "name": "Household",
            "accounts": [], "budgetAccounts": [], "partyAccounts": [], "postingLines": []
        });
        let err = parse(json!({
            "version": "1.0",
            "accountings": [accounting.clone(), accounting],
            "accountGroups": [],
            "budgetAccountGroups": []
        }))
        .unwrap_err();
        assert!(err.to_string().contains("/accountings/1"));
    }

    #[test]
    fn incompatible_major_version_is_rejected() {
        let err = parse(json!({
            "version": "2.0",
            "accountings": [],
            "accountGroups": [],
            "budgetAccountGroups": []
        }))
        .unwrap_err();
        assert!(err.to_string().contains("not supported"));
    }

    #[test]
    fn unversioned_document_writes_current_version() {
        let wire = WireDocument::from_document(&LedgerDocument::new());
        assert_eq!(wire.version, "1.0");
        assert!(wire.last_full_sync.is_none());
    }
}
