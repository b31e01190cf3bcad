//! Posting lines and the pending-write guard.
//!
//! A line carries two independent flags:
//!
//! - `pending`: a local write is in flight and the remote service has not
//!   confirmed it yet. While set, remote reconciliation cannot touch the line.
//! - `synchronized`: the last writer was the remote reconciliation path.
//!
//! Local writes always land and set `pending`. Remote writes onto a pending
//! line are dropped and reported as [`SkipReason::PendingLocalWrite`]; that
//! is an expected race, not an error. The drop happens before the snapshot
//! is validated, so a malformed remote line aimed at a pending one is
//! dropped too rather than failing its batch item. `pending` is only cleared by
//! [`commit_local_posting`], which the synchronization driver calls once the
//! remote service acknowledged the posting, or the presentation layer calls
//! when the user keeps the line as local-only.

use log::{debug, warn};
use serde::{Deserialize, Serialize};

use crate::document::LedgerDocument;
use crate::error::{require, StoreError};
use crate::model::{normalize_number, PostingLine};
use crate::upsert::{PostingLineUpsert, SkipReason, UpsertOutcome, WriteOrigin};

/// Why a pending line is being committed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CommitOrigin {
    /// The remote service accepted the posting. The line counts as synchronized.
    RemoteAcknowledged,
    /// The line is kept locally without remote confirmation.
    LocalOnly,
}

fn validate(input: &PostingLineUpsert) -> Result<(), StoreError> {
    require(&input.account_number, "PostingLine", "account_number")?;
    require(&input.text, "PostingLine", "text")?;
    if input.debit.is_negative() {
        return Err(StoreError::ArgumentInvalid(format!(
            "posting line {}: debit {} is negative",
            input.sequence, input.debit
        )));
    }
    if input.credit.is_negative() {
        return Err(StoreError::ArgumentInvalid(format!(
            "posting line {}: credit {} is negative",
            input.sequence, input.credit
        )));
    }
    Ok(())
}

fn line_from(input: &PostingLineUpsert, origin: WriteOrigin) -> PostingLine {
    PostingLine {
        sequence: input.sequence,
        date: input.date,
        voucher: input.voucher.clone(),
        account_number: normalize_number(&input.account_number),
        text: input.text.clone(),
        budget_account_number: input.budget_account_number.as_deref().map(normalize_number),
        debit: input.debit,
        credit: input.credit,
        party_account_id: input.party_account_id,
        pending: origin == WriteOrigin::Local,
        synchronized: origin == WriteOrigin::Remote,
    }
}

pub fn upsert_posting_line(
    doc: &mut LedgerDocument,
    input: &PostingLineUpsert,
    origin: WriteOrigin,
) -> Result<UpsertOutcome, StoreError> {
    let pending = doc
        .posting_line(input.accounting_id, input.sequence)
        .is_some_and(|line| line.pending);
    if pending && origin == WriteOrigin::Remote {
        warn!(
            "posting line {} in accounting {}: remote write dropped, local write pending",
            input.sequence, input.accounting_id
        );
        return Ok(UpsertOutcome::Skipped(SkipReason::PendingLocalWrite));
    }

    validate(input)?;

    let Some(accounting) = doc.accountings.get_mut(&input.accounting_id) else {
        debug!(
            "posting line {}: accounting {} absent, skipped",
            input.sequence, input.accounting_id
        );
        return Ok(UpsertOutcome::Skipped(SkipReason::UnknownAccounting));
    };

    match accounting.posting_lines.get_mut(&input.sequence) {
        Some(line) => {
            *line = line_from(input, origin);
            Ok(UpsertOutcome::Updated)
        }
        None => {
            accounting
                .posting_lines
                .insert(input.sequence, line_from(input, origin));
            Ok(UpsertOutcome::Created)
        }
    }
}

/// Clear `pending` on a line. Returns false when the line was not pending.
pub fn commit_local_posting(
    doc: &mut LedgerDocument,
    accounting_id: i32,
    sequence: i32,
    origin: CommitOrigin,
) -> Result<bool, StoreError> {
    let line = doc
        .accountings
        .get_mut(&accounting_id)
        .and_then(|a| a.posting_lines.get_mut(&sequence))
        .ok_or_else(|| {
            StoreError::ArgumentInvalid(format!(
                "no posting line {sequence} in accounting {accounting_id}"
            ))
        })?;

    if !line.pending {
        return Ok(false);
    }
    line.pending = false;
    line.synchronized = origin == CommitOrigin::RemoteAcknowledged;
    debug!("posting line {sequence} in accounting {accounting_id} committed ({origin:?})");
    Ok(true)
}

/// Lines awaiting commit, by sequence number.
pub fn pending_postings(doc: &LedgerDocument, accounting_id: i32) -> Vec<&PostingLine> {
    doc.accounting(accounting_id)
        .map(|a| a.posting_lines.values().filter(|l| l.pending).collect())
        .unwrap_or_default()
}

/// Sequence number for a new local line.
pub fn next_sequence_number(doc: &LedgerDocument, accounting_id: i32) -> Result<i32, StoreError> {
    let accounting = doc
        .accounting(accounting_id)
        .ok_or_else(|| StoreError::ArgumentInvalid(format!("no accounting {accounting_id}")))?;
    match accounting.posting_lines.keys().next_back() {
        None => Ok(1),
        Some(&last) => last.checked_add(1).ok_or_else(|| {
            StoreError::ArgumentInvalid(format!(
                "accounting {accounting_id}: sequence numbers exhausted at {last}"
            ))
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::amount::Amount;
    use crate::date_key::DateKey;
    use crate::upsert::{upsert_accounting, AccountingUpsert};

    fn doc() -> LedgerDocument {
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

    fn line(sequence: i32, text: &str) -> PostingLineUpsert {
        PostingLineUpsert {
            accounting_id: 1,
            sequence,
            date: DateKey::from_ymd(2024, 4, 2).unwrap(),
            voucher: Some("A-17".into()),
            account_number: "4620".into(),
            text: text.into(),
            budget_account_number: Some("1000".into()),
            debit: Amount::from_cents(59_95),
            credit: Amount::ZERO,
            party_account_id: None,
        }
    }

    #[test]
    fn local_insert_is_pending() {
        let mut doc = doc();
        let outcome = upsert_posting_line(&mut doc, &line(7, "Groceries"), WriteOrigin::Local).unwrap();
        assert_eq!(outcome, UpsertOutcome::Created);
        let stored = doc.posting_line(1, 7).unwrap();
        assert!(stored.pending);
        assert!(!stored.synchronized);
    }

    #[test]
    fn remote_insert_is_synchronized() {
        let mut doc = doc();
        upsert_posting_line(&mut doc, &line(3, "Rent"), WriteOrigin::Remote).unwrap();
        let stored = doc.posting_line(1, 3).unwrap();
        assert!(!stored.pending);
        assert!(stored.synchronized);
    }

    #[test]
    fn remote_write_onto_pending_line_is_dropped() {
        let mut doc = doc();
        upsert_posting_line(&mut doc, &line(7, "Groceries"), WriteOrigin::Local).unwrap();
        let outcome = upsert_posting_line(&mut doc, &line(7, "Changed remotely"), WriteOrigin::Remote).unwrap();
        assert_eq!(outcome, UpsertOutcome::Skipped(SkipReason::PendingLocalWrite));
        assert_eq!(doc.posting_line(1, 7).unwrap().text, "Groceries");
        assert!(doc.posting_line(1, 7).unwrap().pending);
    }

    #[test]
    fn local_write_onto_pending_line_proceeds() {
        let mut doc = doc();
        upsert_posting_line(&mut doc, &line(7, "Groceries"), WriteOrigin::Local).unwrap();
        let outcome = upsert_posting_line(&mut doc, &line(7, "Groceries and wine"), WriteOrigin::Local).unwrap();
        assert_eq!(outcome, UpsertOutcome::Updated);
        let stored = doc.posting_line(1, 7).unwrap();
        assert_eq!(stored.text, "Groceries and wine");
        assert!(stored.pending);
    }

    #[test]
    fn local_write_onto_synchronized_line_makes_it_pending() {
        let mut doc = doc();
        upsert_posting_line(&mut doc, &line(3, "Rent"), WriteOrigin::Remote).unwrap();
        upsert_posting_line(&mut doc, &line(3, "Rent April"), WriteOrigin::Local).unwrap();
        let stored = doc.posting_line(1, 3).unwrap();
        assert!(stored.pending);
        assert!(!stored.synchronized);
    }

    #[test]
    fn commit_sets_synchronized_by_origin() {
        let mut doc = doc();
        upsert_posting_line(&mut doc, &line(1, "A"), WriteOrigin::Local).unwrap();
        upsert_posting_line(&mut doc, &line(2, "B"), WriteOrigin::Local).unwrap();

        assert!(commit_local_posting(&mut doc, 1, 1, CommitOrigin::RemoteAcknowledged).unwrap());
        assert!(commit_local_posting(&mut doc, 1, 2, CommitOrigin::LocalOnly).unwrap());
        assert!(doc.posting_line(1, 1).unwrap().synchronized);
        assert!(!doc.posting_line(1, 2).unwrap().synchronized);
        assert!(!doc.posting_line(1, 2).unwrap().pending);

        // Second commit is a no-op.
        assert!(!commit_local_posting(&mut doc, 1, 1, CommitOrigin::LocalOnly).unwrap());
        assert!(doc.posting_line(1, 1).unwrap().synchronized);
    }

    #[test]
    fn commit_of_unknown_line_is_invalid() {
        let mut doc = doc();
        let err = commit_local_posting(&mut doc, 1, 99, CommitOrigin::RemoteAcknowledged).unwrap_err();
        assert!(matches!(err, StoreError::ArgumentInvalid(_)));
    }

    #[test]
    fn negative_debit_is_rejected_before_write() {
        let mut doc = doc();
        let mut input = line(5, "Refund");
        input.debit = Amount::from_cents(-100);
        assert!(matches!(
            upsert_posting_line(&mut doc, &input, WriteOrigin::Local),
            Err(StoreError::ArgumentInvalid(_))
        ));
        assert!(doc.posting_line(1, 5).is_none());
    }

    #[test]
    fn pending_listing_and_next_sequence() {
        let mut doc = doc();
        assert_eq!(next_sequence_number(&doc, 1).unwrap(), 1);
        upsert_posting_line(&mut doc, &line(4, "Remote"), WriteOrigin::Remote).unwrap();
        upsert_posting_line(&mut doc, &line(9, "Local"), WriteOrigin::Local).unwrap();
        assert_eq!(next_sequence_number(&doc, 1).unwrap(), 10);
        let pending: Vec<i32> = pending_postings(&doc, 1).iter().map(|l| l.sequence).collect();
        assert_eq!(pending, vec![9]);
        assert!(next_sequence_number(&doc, 2).is_err());
    }

    #[test]
    fn next_sequence_after_max_is_invalid() {
        let mut doc = doc();
        upsert_posting_line(&mut doc, &line(i32::MAX, "Last"), WriteOrigin::Local).unwrap();
        let err = next_sequence_number(&doc, 1).unwrap_err();
        assert!(matches!(err, StoreError::ArgumentInvalid(_)));
    }

    #[test]
    fn malformed_remote_write_onto_pending_line_is_dropped() {
        let mut doc = doc();
        upsert_posting_line(&mut doc, &line(7, "Bakery"), WriteOrigin::Local).unwrap();
        let mut bad = line(7, "  ");
        bad.debit = Amount::from_cents(-100);
        let outcome = upsert_posting_line(&mut doc, &bad, WriteOrigin::Remote).unwrap();
        assert_eq!(outcome, UpsertOutcome::Skipped(SkipReason::PendingLocalWrite));
        assert_eq!(doc.posting_line(1, 7).unwrap().text, "Bakery");

        // Not pending: the same snapshot is validated and refused.
        commit_local_posting(&mut doc, 1, 7, CommitOrigin::LocalOnly).unwrap();
        assert!(upsert_posting_line(&mut doc, &bad, WriteOrigin::Remote).is_err());
    }
}
