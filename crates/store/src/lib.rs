//! `ledgercache-store`: local ledger store.
//!
//! Keeps current-state snapshots of accounting entities, a bounded
//! monthly-consolidated history per balance-bearing entity, and posting
//! lines guarded against remote overwrites while a local write is pending.
//! No network code: remote snapshots arrive as upsert inputs.

pub mod amount;
pub mod date_key;
pub mod document;
pub mod error;
pub mod history;
pub mod model;
pub mod pending;
pub mod retention;
pub mod schema;
pub mod store;
pub mod sync_clock;
pub mod upsert;
pub mod wire;

pub use amount::Amount;
pub use date_key::DateKey;
pub use document::{DocumentStats, LedgerDocument, StoreVersion};
pub use error::StoreError;
pub use history::{Consolidation, History, HistoryRecord};
pub use pending::CommitOrigin;
pub use retention::{Clock, FixedClock, SystemClock};
pub use store::{has_data, LedgerStore};
pub use sync_clock::SyncStatus;
pub use upsert::{
    AccountGroupUpsert, AccountUpsert, AccountingUpsert, BatchFailure, BatchReport, BudgetAccountGroupUpsert,
    BudgetAccountUpsert, PartyAccountUpsert, PostingLineUpsert, SkipReason, Upsert, UpsertOutcome,
    WriteOrigin,
};
