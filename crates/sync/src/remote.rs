use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use ledgercache_store::model::PostingLine;
use ledgercache_store::{
    AccountGroupUpsert, AccountUpsert, AccountingUpsert, BudgetAccountGroupUpsert, BudgetAccountUpsert,
    DateKey, PartyAccountUpsert, PostingLineUpsert,
};

use crate::error::RemoteError;

/// Cancel token for a synchronization pass.
/// Set to true to stop before the next remote call.
pub type CancelToken = Arc<AtomicBool>;

pub fn cancel_token() -> CancelToken {
    Arc::new(AtomicBool::new(false))
}

pub fn is_cancelled(token: &CancelToken) -> bool {
    token.load(Ordering::Relaxed)
}

/// Snapshot source for one remote bookkeeping service.
///
/// Implementations return entities already shaped as upsert inputs; the
/// driver applies them through the remote write path. Every method is
/// awaited by a single driver, so implementations need not be `Sync`.
#[allow(async_fn_in_trait)]
pub trait RemoteRepository {
    async fn accountings(&self) -> Result<Vec<AccountingUpsert>, RemoteError>;

    async fn account_groups(&self) -> Result<Vec<AccountGroupUpsert>, RemoteError>;

    async fn budget_account_groups(&self) -> Result<Vec<BudgetAccountGroupUpsert>, RemoteError>;

    /// Accounts of one accounting as of `status_date`.
    async fn accounts(&self, accounting_id: i32, status_date: DateKey) -> Result<Vec<AccountUpsert>, RemoteError>;

    async fn budget_accounts(
        &self,
        accounting_id: i32,
        status_date: DateKey,
    ) -> Result<Vec<BudgetAccountUpsert>, RemoteError>;

    async fn party_accounts(
        &self,
        accounting_id: i32,
        status_date: DateKey,
    ) -> Result<Vec<PartyAccountUpsert>, RemoteError>;

    /// Posting lines dated on or after `from_date`.
    async fn posting_lines(
        &self,
        accounting_id: i32,
        from_date: DateKey,
    ) -> Result<Vec<PostingLineUpsert>, RemoteError>;

    /// Submit one locally created line. `Ok` means the service accepted it.
    async fn submit_posting(&self, accounting_id: i32, line: &PostingLine) -> Result<(), RemoteError>;
}
