//! Timestamp of the last full synchronization pass.
//!
//! Only the synchronization driver writes it, through
//! [`record_full_sync`]. Entity upserts never touch it.

use chrono::{DateTime, SecondsFormat, Utc};
use log::warn;

use crate::document::LedgerDocument;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncStatus {
    Never,
    At(DateTime<Utc>),
}

impl SyncStatus {
    pub fn timestamp(self) -> Option<DateTime<Utc>> {
        match self {
            Self::Never => None,
            Self::At(ts) => Some(ts),
        }
    }
}

/// An absent or unparsable timestamp reads as [`SyncStatus::Never`].
pub fn last_full_sync(doc: &LedgerDocument) -> SyncStatus {
    let Some(raw) = doc.last_full_sync.as_deref() else {
        return SyncStatus::Never;
    };
    match DateTime::parse_from_rfc3339(raw) {
        Ok(ts) => SyncStatus::At(ts.with_timezone(&Utc)),
        Err(e) => {
            warn!("ignoring unparsable last full sync '{raw}': {e}");
            SyncStatus::Never
        }
    }
}

pub fn record_full_sync(doc: &mut LedgerDocument, at: DateTime<Utc>) {
    doc.last_full_sync = Some(at.to_rfc3339_opts(SecondsFormat::Secs, true));
}
