use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::amount::Amount;
use crate::date_key::DateKey;
use crate::history::History;

// ---------------------------------------------------------------------------
// Groups
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BalanceSide {
    Asset,
    Liability,
}

impl std::fmt::Display for BalanceSide {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Asset => write!(f, "asset"),
            Self::Liability => write!(f, "liability"),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct AccountGroup {
    pub id: i32,
    pub name: String,
    pub side: BalanceSide,
}

#[derive(Debug, Clone, PartialEq)]
pub struct BudgetAccountGroup {
    pub id: i32,
    pub name: String,
}

// ---------------------------------------------------------------------------
// Tracked figures
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct AccountFigures {
    pub credit: Amount,
    pub balance: Amount,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct BudgetFigures {
    pub income: Amount,
    pub expenses: Amount,
    pub posted: Amount,
}

impl BudgetFigures {
    pub fn budget(&self) -> Amount {
        self.income - self.expenses
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct PartyFigures {
    pub balance: Amount,
}

// ---------------------------------------------------------------------------
// Balance-bearing entities
// ---------------------------------------------------------------------------

/// General ledger account.
#[derive(Debug, Clone, PartialEq)]
pub struct Account {
    pub number: String,
    pub name: String,
    pub description: Option<String>,
    pub note: Option<String>,
    pub group_id: i32,
    pub figures: AccountFigures,
    pub status_date: DateKey,
    pub history: History<AccountFigures>,
}

impl Account {
    /// Credit limit plus balance.
    pub fn available(&self) -> Amount {
        self.figures.credit + self.figures.balance
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct BudgetAccount {
    pub number: String,
    pub name: String,
    pub description: Option<String>,
    pub note: Option<String>,
    pub group_id: i32,
    pub figures: BudgetFigures,
    pub last_month: BudgetFigures,
    pub status_date: DateKey,
    pub history: History<BudgetFigures>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PartyRole {
    Debtor,
    Creditor,
    Settled,
}

/// Debtor or creditor account.
#[derive(Debug, Clone, PartialEq)]
pub struct PartyAccount {
    pub id: i32,
    pub name: String,
    pub primary_phone: Option<String>,
    pub secondary_phone: Option<String>,
    pub payment_term_days: Option<u16>,
    pub figures: PartyFigures,
    pub status_date: DateKey,
    pub history: History<PartyFigures>,
}

impl PartyAccount {
    pub fn role(&self) -> PartyRole {
        match self.figures.balance.cents() {
            c if c > 0 => PartyRole::Debtor,
            c if c < 0 => PartyRole::Creditor,
            _ => PartyRole::Settled,
        }
    }
}

// ---------------------------------------------------------------------------
// Postings
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PostingLine {
    pub sequence: i32,
    pub date: DateKey,
    pub voucher: Option<String>,
    pub account_number: String,
    pub text: String,
    pub budget_account_number: Option<String>,
    pub debit: Amount,
    pub credit: Amount,
    pub party_account_id: Option<i32>,
    /// A local write is in flight and not yet confirmed.
    pub pending: bool,
    /// The last writer was the remote reconciliation path.
    pub synchronized: bool,
}

// ---------------------------------------------------------------------------
// Accounting
// ---------------------------------------------------------------------------

/// One set of books. Owns every keyed child entity.
#[derive(Debug, Clone, PartialEq)]
pub struct Accounting {
    pub id: i32,
    pub name: String,
    pub accounts: BTreeMap<String, Account>,
    pub budget_accounts: BTreeMap<String, BudgetAccount>,
    pub party_accounts: BTreeMap<i32, PartyAccount>,
    pub posting_lines: BTreeMap<i32, PostingLine>,
}

impl Accounting {
    pub fn new(id: i32, name: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
            accounts: BTreeMap::new(),
            budget_accounts: BTreeMap::new(),
            party_accounts: BTreeMap::new(),
            posting_lines: BTreeMap::new(),
        }
    }
}

/// Account numbers are matched case-insensitively and stored upper-case.
pub fn normalize_number(number: &str) -> String {
    number.trim().to_uppercase()
}
