//! Full synchronization pass and pending-posting submission.
//!
//! The driver awaits one remote call at a time and applies each result to
//! the store before issuing the next, so every mutation happens on the
//! caller's context through `&mut LedgerStore`.

use std::future::Future;

use chrono::{DateTime, SubsecRound, Utc};
use log::{debug, info, warn};

use ledgercache_store::model::PostingLine;
use ledgercache_store::{BatchReport, CommitOrigin, DateKey, LedgerStore, Upsert, WriteOrigin};

use crate::error::{RemoteError, SyncError};
use crate::remote::{is_cancelled, CancelToken, RemoteRepository};

#[derive(Debug, Clone)]
pub struct SyncReport {
    /// Accountings visited in this pass.
    pub accountings: usize,
    /// Combined outcome of every applied batch.
    pub applied: BatchReport,
    pub synced_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Default)]
pub struct SubmitReport {
    pub submitted: usize,
    pub failures: Vec<SubmitFailure>,
}

#[derive(Debug, Clone)]
pub struct SubmitFailure {
    pub accounting_id: i32,
    pub sequence: i32,
    pub error: RemoteError,
}

pub struct SyncDriver;

/// Check the cancel token, then await one remote request.
async fn call<T>(
    cancel: &CancelToken,
    operation: &'static str,
    request: impl Future<Output = Result<T, RemoteError>>,
) -> Result<T, SyncError> {
    if is_cancelled(cancel) {
        return Err(SyncError::Cancelled);
    }
    request
        .await
        .map_err(|source| SyncError::Remote { operation, source })
}

fn apply_remote<T>(store: &mut LedgerStore, report: &mut BatchReport, items: Vec<T>, wrap: fn(T) -> Upsert) {
    if items.is_empty() {
        return;
    }
    let batch: Vec<Upsert> = items.into_iter().map(wrap).collect();
    let outcome = store.apply_batch(&batch, WriteOrigin::Remote);
    for failure in &outcome.failures {
        warn!("remote {} #{} rejected: {}", failure.kind, failure.index, failure.message);
    }
    report.merge(outcome);
}

impl SyncDriver {
    /// Pull every entity kind from `remote` into `store`.
    ///
    /// Groups and accountings come first so that child upserts find their
    /// parents. Posting lines are requested from the start of the retention
    /// window. The sync clock is recorded only if the whole pass completes;
    /// on cancellation or remote failure the batches applied so far stay in
    /// memory and the clock keeps its previous value.
    pub async fn full_sync<R: RemoteRepository>(
        store: &mut LedgerStore,
        remote: &R,
        status_date: DateKey,
        cancel: &CancelToken,
    ) -> Result<SyncReport, SyncError> {
        info!("full sync started (status date {})", status_date);
        let mut applied = BatchReport::default();

        let groups = call(cancel, "account_groups", remote.account_groups()).await?;
        apply_remote(store, &mut applied, groups, Upsert::AccountGroup);

        let budget_groups = call(cancel, "budget_account_groups", remote.budget_account_groups()).await?;
        apply_remote(store, &mut applied, budget_groups, Upsert::BudgetAccountGroup);

        let accountings = call(cancel, "accountings", remote.accountings()).await?;
        let ids: Vec<i32> = accountings.iter().map(|a| a.id).collect();
        apply_remote(store, &mut applied, accountings, Upsert::Accounting);

        let from_date = status_date.months_back(store.config().history.retention_months);
        for &id in &ids {
            debug!("syncing accounting {}", id);

            let accounts = call(cancel, "accounts", remote.accounts(id, status_date)).await?;
            apply_remote(store, &mut applied, accounts, Upsert::Account);

            let budget = call(cancel, "budget_accounts", remote.budget_accounts(id, status_date)).await?;
            apply_remote(store, &mut applied, budget, Upsert::BudgetAccount);

            let parties = call(cancel, "party_accounts", remote.party_accounts(id, status_date)).await?;
            apply_remote(store, &mut applied, parties, Upsert::PartyAccount);

            let lines = call(cancel, "posting_lines", remote.posting_lines(id, from_date)).await?;
            apply_remote(store, &mut applied, lines, Upsert::PostingLine);
        }

        // Persisted with whole-second precision.
        let synced_at = Utc::now().trunc_subsecs(0);
        store.record_full_sync(synced_at);
        info!(
            "full sync finished: {} accountings, {} created, {} updated, {} skipped, {} failed",
            ids.len(),
            applied.created,
            applied.updated,
            applied.skipped,
            applied.failures.len()
        );
        Ok(SyncReport {
            accountings: ids.len(),
            applied,
            synced_at,
        })
    }

    /// Submit every pending posting line and commit the acknowledged ones.
    ///
    /// A rejected line stays pending and is reported; the remaining lines are
    /// still submitted. Cancellation stops before the next submission and
    /// keeps the commits made so far.
    pub async fn submit_pending<R: RemoteRepository>(
        store: &mut LedgerStore,
        remote: &R,
        cancel: &CancelToken,
    ) -> Result<SubmitReport, SyncError> {
        let mut report = SubmitReport::default();
        let ids: Vec<i32> = store.document().accountings().map(|a| a.id).collect();

        for id in ids {
            let lines: Vec<PostingLine> = store.pending_postings(id).into_iter().cloned().collect();
            for line in lines {
                if is_cancelled(cancel) {
                    return Err(SyncError::Cancelled);
                }
                match remote.submit_posting(id, &line).await {
                    Ok(()) => {
                        store.commit_local_posting(id, line.sequence, CommitOrigin::RemoteAcknowledged)?;
                        report.submitted += 1;
                    }
                    Err(error) => {
                        warn!(
                            "posting line {} in accounting {} not accepted: {}",
                            line.sequence, id, error
                        );
                        report.failures.push(SubmitFailure {
                            accounting_id: id,
                            sequence: line.sequence,
                            error,
                        });
                    }
                }
            }
        }

        if report.submitted > 0 || !report.failures.is_empty() {
            info!(
                "submitted {} pending postings, {} rejected",
                report.submitted,
                report.failures.len()
            );
        }
        Ok(report)
    }
}
