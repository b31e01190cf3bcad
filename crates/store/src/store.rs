//! The ledger store: one document bound to one backing file.
//!
//! `load` and `save` are the only operations that touch the file. Every
//! other operation works on the in-memory document and needs a `save` to
//! persist. History reads prune expired records as a side effect, which is
//! why they take `&mut self`.
//!
//! The store does no locking. A single owner drives it; callers that share
//! it across threads wrap it in a mutex or hand it to one actor.

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use log::info;
use serde_json::Value;

use ledgercache_config::StoreConfig;

use crate::document::{LedgerDocument, StoreVersion};
use crate::error::StoreError;
use crate::history::HistoryRecord;
use crate::model::{AccountFigures, BudgetFigures, PartyFigures, PostingLine};
use crate::pending::{self, CommitOrigin};
use crate::retention::{Clock, SystemClock};
use crate::schema::Schema;
use crate::sync_clock::{self, SyncStatus};
use crate::upsert::{self, BatchReport, PostingLineUpsert, Upsert, UpsertOutcome, WriteOrigin};
use crate::wire::WireDocument;

pub struct LedgerStore {
    config: StoreConfig,
    schema: Schema,
    document: LedgerDocument,
    clock: Box<dyn Clock>,
}

impl std::fmt::Debug for LedgerStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LedgerStore")
            .field("document_path", &self.config.document)
            .field("version", &self.document.version())
            .finish()
    }
}

/// Cheap probe for a non-empty document file. Never fails.
pub fn has_data(path: &Path) -> bool {
    fs::metadata(path).map(|m| m.is_file() && m.len() > 0).unwrap_or(false)
}

fn load_schema(config: &StoreConfig) -> Result<Schema, StoreError> {
    match &config.schema {
        Some(path) => Schema::from_path(path),
        None => Schema::builtin(),
    }
}

/// Read, validate and index a document file.
pub fn read_document(path: &Path, schema: &Schema) -> Result<LedgerDocument, StoreError> {
    if !path.is_file() {
        return Err(StoreError::ResourceNotFound(path.to_path_buf()));
    }
    let text = fs::read_to_string(path).map_err(|e| StoreError::Io(e.to_string()))?;
    let value: Value = serde_json::from_str(&text).map_err(|e| StoreError::Parse(e.to_string()))?;
    schema.validate(&value)?;
    let wire: WireDocument =
        serde_json::from_value(value).map_err(|e| StoreError::schema("/", e.to_string()))?;
    wire.into_document()
}

/// Validate and write a document, replacing the file atomically.
pub fn write_document(path: &Path, doc: &LedgerDocument, schema: &Schema, pretty: bool) -> Result<(), StoreError> {
    let value = serde_json::to_value(WireDocument::from_document(doc))
        .map_err(|e| StoreError::Parse(e.to_string()))?;
    schema.validate(&value)?;

    let text = if pretty {
        serde_json::to_string_pretty(&value)
    } else {
        serde_json::to_string(&value)
    }
    .map_err(|e| StoreError::Parse(e.to_string()))?;

    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent).map_err(|e| StoreError::Io(e.to_string()))?;
    }
    let tmp = temp_sibling(path);
    {
        let mut file = fs::File::create(&tmp).map_err(|e| StoreError::Io(e.to_string()))?;
        file.write_all(text.as_bytes())
            .and_then(|_| file.write_all(b"\n"))
            .and_then(|_| file.sync_all())
            .map_err(|e| StoreError::Io(e.to_string()))?;
    }
    fs::rename(&tmp, path).map_err(|e| {
        let _ = fs::remove_file(&tmp);
        StoreError::Io(e.to_string())
    })
}

fn temp_sibling(path: &Path) -> PathBuf {
    let mut name = path.file_name().map(|n| n.to_os_string()).unwrap_or_default();
    name.push(".tmp");
    path.with_file_name(name)
}

impl LedgerStore {
    /// Load an existing document. Fails with `ResourceNotFound` (wrapped as a
    /// repository error) when the document or configured schema is absent.
    pub fn load(config: StoreConfig) -> Result<Self, StoreError> {
        let path = config.document.clone();
        let schema = load_schema(&config).map_err(|e| e.at_boundary("load", path.clone()))?;
        let document = read_document(&path, &schema).map_err(|e| e.at_boundary("load", path.clone()))?;
        info!(
            "loaded ledger document {} (version {})",
            path.display(),
            document.version().map(|v| v.to_string()).unwrap_or_else(|| "unset".into())
        );
        Ok(Self {
            config,
            schema,
            document,
            clock: Box::new(SystemClock),
        })
    }

    /// Load the document if the file has data, else start an empty one.
    pub fn open(config: StoreConfig) -> Result<Self, StoreError> {
        if has_data(&config.document) {
            return Self::load(config);
        }
        let path = config.document.clone();
        let schema = load_schema(&config).map_err(|e| e.at_boundary("open", path.clone()))?;
        info!("starting empty ledger document at {}", path.display());
        Ok(Self {
            config,
            schema,
            document: LedgerDocument::new(),
            clock: Box::new(SystemClock),
        })
    }

    pub fn with_clock(mut self, clock: impl Clock + 'static) -> Self {
        self.clock = Box::new(clock);
        self
    }

    /// Stamp the version on first save, validate, write.
    pub fn save(&mut self) -> Result<(), StoreError> {
        let path = self.config.document.clone();
        self.document.stamp_version(StoreVersion::CURRENT);
        write_document(&path, &self.document, &self.schema, self.config.output.pretty)
            .map_err(|e| e.at_boundary("save", path.clone()))?;
        info!("saved ledger document {}", path.display());
        Ok(())
    }

    pub fn has_data(&self) -> bool {
        has_data(&self.config.document)
    }

    pub fn config(&self) -> &StoreConfig {
        &self.config
    }

    pub fn document(&self) -> &LedgerDocument {
        &self.document
    }

    // -- upserts ------------------------------------------------------------

    pub fn apply(&mut self, upsert: &Upsert, origin: WriteOrigin) -> Result<UpsertOutcome, StoreError> {
        upsert::apply(&mut self.document, upsert, origin)
    }

    pub fn apply_batch(&mut self, items: &[Upsert], origin: WriteOrigin) -> BatchReport {
        upsert::apply_batch(&mut self.document, items, origin)
    }

    /// Local edit of a posting line. The line becomes pending.
    pub fn post_local(&mut self, line: &PostingLineUpsert) -> Result<UpsertOutcome, StoreError> {
        pending::upsert_posting_line(&mut self.document, line, WriteOrigin::Local)
    }

    pub fn commit_local_posting(
        &mut self,
        accounting_id: i32,
        sequence: i32,
        origin: CommitOrigin,
    ) -> Result<bool, StoreError> {
        pending::commit_local_posting(&mut self.document, accounting_id, sequence, origin)
    }

    pub fn pending_postings(&self, accounting_id: i32) -> Vec<&PostingLine> {
        pending::pending_postings(&self.document, accounting_id)
    }

    pub fn next_sequence_number(&self, accounting_id: i32) -> Result<i32, StoreError> {
        pending::next_sequence_number(&self.document, accounting_id)
    }

    // -- history reads (prune first) ----------------------------------------

    pub fn account_history(
        &mut self,
        accounting_id: i32,
        number: &str,
    ) -> Result<Vec<HistoryRecord<AccountFigures>>, StoreError> {
        let today = self.clock.today();
        let months = self.config.history.retention_months;
        self.document.account_history(accounting_id, number, today, months)
    }

    pub fn budget_account_history(
        &mut self,
        accounting_id: i32,
        number: &str,
    ) -> Result<Vec<HistoryRecord<BudgetFigures>>, StoreError> {
        let today = self.clock.today();
        let months = self.config.history.retention_months;
        self.document.budget_account_history(accounting_id, number, today, months)
    }

    pub fn party_account_history(
        &mut self,
        accounting_id: i32,
        id: i32,
    ) -> Result<Vec<HistoryRecord<PartyFigures>>, StoreError> {
        let today = self.clock.today();
        let months = self.config.history.retention_months;
        self.document.party_account_history(accounting_id, id, today, months)
    }

    // -- sync clock ---------------------------------------------------------

    pub fn last_full_sync(&self) -> SyncStatus {
        sync_clock::last_full_sync(&self.document)
    }

    pub fn record_full_sync(&mut self, at: DateTime<Utc>) {
        sync_clock::record_full_sync(&mut self.document, at);
    }
}
