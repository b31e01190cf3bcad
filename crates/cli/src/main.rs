// ledgerctl - inspect and maintain local ledger store documents

mod exit_codes;

use std::fs;
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use clap::{Parser, Subcommand, ValueEnum};
use serde::Serialize;
use serde_json::Value;
use tracing_subscriber::filter::LevelFilter;
use tracing_subscriber::EnvFilter;

use ledgercache_config::{ConfigError, StoreConfig};
use ledgercache_store::history::HistoryRecord;
use ledgercache_store::model::PostingLine;
use ledgercache_store::{
    BatchReport, CommitOrigin, DateKey, DocumentStats, LedgerStore, StoreError, Upsert, WriteOrigin,
};

use exit_codes::{
    config_exit_code, store_exit_code, EXIT_INVALID, EXIT_PARTIAL, EXIT_SUCCESS, EXIT_USAGE,
};

#[derive(Parser)]
#[command(name = "ledgerctl")]
#[command(about = "Inspect and maintain local ledger store documents")]
#[command(long_version = long_version())]
#[command(version)]
struct Cli {
    /// Store configuration file [default: <config dir>/ledgercache/store.toml, if present]
    #[arg(long, global = true, env = "LEDGERCTL_CONFIG", value_name = "FILE")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Check a document against the schema
    #[command(after_help = "\
Examples:
  ledgerctl validate books/ledger.json
  ledgerctl validate books/ledger.json --schema custom.schema.json")]
    Validate {
        /// Ledger document (defaults to the configured document)
        document: Option<PathBuf>,

        /// Validate against this schema file instead of the built-in one
        #[arg(long)]
        schema: Option<PathBuf>,
    },

    /// Print version, last full sync and entity counts as JSON
    Info {
        /// Ledger document (defaults to the configured document)
        document: Option<PathBuf>,
    },

    /// Apply a JSON array of upserts and save
    #[command(after_help = "\
Each item carries a \"kind\": accounting, account_group, budget_account_group,
account, budget_account, party_account or posting_line.

Examples:
  ledgerctl apply books/ledger.json snapshot.json
  ledgerctl apply books/ledger.json corrections.json --local")]
    Apply {
        /// Ledger document (created if absent)
        document: PathBuf,

        /// Batch file
        batch: PathBuf,

        /// Write through the local path (posting lines become pending)
        #[arg(long)]
        local: bool,
    },

    /// Print the retained history of one entity, newest first
    #[command(after_help = "\
Reading history drops records past the retention horizon. Pass --save to
persist that pruning.

Examples:
  ledgerctl history books/ledger.json account --accounting 1 --key 4620
  ledgerctl history books/ledger.json party --accounting 1 --key 3 --save")]
    History {
        /// Ledger document
        document: PathBuf,

        /// Entity kind
        kind: HistoryKind,

        /// Accounting id
        #[arg(long)]
        accounting: i32,

        /// Account number, or numeric id for party accounts
        #[arg(long)]
        key: String,

        /// Save the document after pruning
        #[arg(long)]
        save: bool,
    },

    /// List posting lines of an accounting
    Postings {
        /// Ledger document
        document: PathBuf,

        /// Accounting id
        #[arg(long)]
        accounting: i32,

        /// Only lines awaiting commit
        #[arg(long)]
        pending: bool,
    },

    /// Clear the pending flag of a posting line and save
    Commit {
        /// Ledger document
        document: PathBuf,

        /// Accounting id
        #[arg(long)]
        accounting: i32,

        /// Sequence number of the line
        #[arg(long)]
        sequence: i32,

        /// Keep the line without remote acknowledgement (stays unsynchronized)
        #[arg(long)]
        local_only: bool,
    },
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum HistoryKind {
    Account,
    Budget,
    Party,
}

fn long_version() -> &'static str {
    concat!(
        env!("CARGO_PKG_VERSION"),
        " (",
        env!("GIT_COMMIT_HASH"),
        ")",
        "\nstore:   ledgercache-store ",
        env!("CARGO_PKG_VERSION"),
        "\nformat:  ledger document 1.x",
    )
}

/// Store and sync crates log through `log`; the subscriber picks those
/// records up via its `tracing-log` bridge. Filter with `RUST_LOG`.
fn init_logging() {
    let filter = EnvFilter::builder()
        .with_default_directive(LevelFilter::WARN.into())
        .from_env_lossy();
    tracing_subscriber::fmt()
        .compact()
        .with_writer(std::io::stderr)
        .with_target(true)
        .with_env_filter(filter)
        .init();
}

fn main() -> ExitCode {
    init_logging();

    let cli = Cli::parse();
    let config = cli.config.as_deref();

    let result = match cli.command {
        Commands::Validate { document, schema } => {
            store_config(config, document).and_then(|c| cmd_validate(c, schema))
        }
        Commands::Info { document } => store_config(config, document).and_then(cmd_info),
        Commands::Apply { document, batch, local } => {
            store_config(config, Some(document)).and_then(|c| cmd_apply(c, &batch, local))
        }
        Commands::History {
            document,
            kind,
            accounting,
            key,
            save,
        } => store_config(config, Some(document)).and_then(|c| cmd_history(c, kind, accounting, &key, save)),
        Commands::Postings {
            document,
            accounting,
            pending,
        } => store_config(config, Some(document)).and_then(|c| cmd_postings(c, accounting, pending)),
        Commands::Commit {
            document,
            accounting,
            sequence,
            local_only,
        } => store_config(config, Some(document)).and_then(|c| cmd_commit(c, accounting, sequence, local_only)),
    };

    match result {
        Ok(()) => ExitCode::from(EXIT_SUCCESS),
        Err(CliError { code, message, hint }) => {
            if !message.is_empty() {
                eprintln!("error: {}", message);
            }
            if let Some(hint) = hint {
                eprintln!("hint:  {}", hint);
            }
            ExitCode::from(code)
        }
    }
}

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

#[derive(Debug)]
pub struct CliError {
    pub code: u8,
    pub message: String,
    pub hint: Option<String>,
}

impl CliError {
    pub fn usage(msg: impl Into<String>) -> Self {
        Self { code: EXIT_USAGE, message: msg.into(), hint: None }
    }

    pub fn store(err: StoreError) -> Self {
        let hint = match err.root() {
            StoreError::ResourceNotFound(_) => {
                Some("check the path; `ledgerctl apply` creates a new document".to_string())
            }
            StoreError::SchemaViolation { .. } => {
                Some("the path in the message is a JSON pointer into the document".to_string())
            }
            _ => None,
        };
        Self { code: store_exit_code(&err), message: err.to_string(), hint }
    }

    pub fn config(err: ConfigError) -> Self {
        Self { code: config_exit_code(&err), message: err.to_string(), hint: None }
    }

    /// Add a hint to an existing error.
    pub fn with_hint(mut self, hint: impl Into<String>) -> Self {
        self.hint = Some(hint.into());
        self
    }
}

// ---------------------------------------------------------------------------
// Config + output helpers
// ---------------------------------------------------------------------------

/// Resolve the store config: explicit file, then the default location, then
/// built-in defaults. A document given on the command line always wins.
fn store_config(config: Option<&Path>, document: Option<PathBuf>) -> Result<StoreConfig, CliError> {
    let loaded = match config {
        Some(path) => Some(StoreConfig::load(path).map_err(CliError::config)?),
        None => {
            let default = StoreConfig::config_path();
            if default.is_file() {
                Some(StoreConfig::load(&default).map_err(CliError::config)?)
            } else {
                None
            }
        }
    };

    match (loaded, document) {
        (Some(mut cfg), Some(document)) => {
            cfg.document = document;
            Ok(cfg)
        }
        (Some(cfg), None) => Ok(cfg),
        (None, Some(document)) => Ok(StoreConfig::for_document(document)),
        (None, None) => Err(CliError::usage("no document given and no config file found")
            .with_hint("pass a document path or --config <FILE>")),
    }
}

fn print_json<T: Serialize + ?Sized>(value: &T) -> Result<(), CliError> {
    let text = serde_json::to_string_pretty(value).map_err(|e| CliError::usage(e.to_string()))?;
    println!("{}", text);
    Ok(())
}

#[derive(Serialize)]
struct HistoryRow<S> {
    date: DateKey,
    #[serde(flatten)]
    figures: S,
}

fn history_json<S: Serialize>(records: Vec<HistoryRecord<S>>) -> Result<Value, CliError> {
    let rows: Vec<HistoryRow<S>> = records
        .into_iter()
        .map(|r| HistoryRow { date: r.date, figures: r.snapshot })
        .collect();
    serde_json::to_value(rows).map_err(|e| CliError::usage(e.to_string()))
}

// ---------------------------------------------------------------------------
// Commands
// ---------------------------------------------------------------------------

#[derive(Serialize)]
struct ValidateOutput {
    valid: bool,
    document: String,
    version: Option<String>,
}

fn cmd_validate(mut config: StoreConfig, schema: Option<PathBuf>) -> Result<(), CliError> {
    if schema.is_some() {
        config.schema = schema;
    }
    let store = LedgerStore::load(config).map_err(CliError::store)?;
    print_json(&ValidateOutput {
        valid: true,
        document: store.config().document.display().to_string(),
        version: store.document().version().map(|v| v.to_string()),
    })
}

#[derive(Serialize)]
struct AccountingSummary {
    id: i32,
    name: String,
    pending_postings: usize,
}

#[derive(Serialize)]
struct InfoOutput {
    document: String,
    version: Option<String>,
    last_full_sync: Option<String>,
    stats: DocumentStats,
    accountings: Vec<AccountingSummary>,
}

fn cmd_info(config: StoreConfig) -> Result<(), CliError> {
    let store = LedgerStore::load(config).map_err(CliError::store)?;
    let doc = store.document();
    let accountings = doc
        .accountings()
        .map(|a| AccountingSummary {
            id: a.id,
            name: a.name.clone(),
            pending_postings: store.pending_postings(a.id).len(),
        })
        .collect();

    print_json(&InfoOutput {
        document: store.config().document.display().to_string(),
        version: doc.version().map(|v| v.to_string()),
        last_full_sync: store.last_full_sync().timestamp().map(|ts| ts.to_rfc3339()),
        stats: doc.stats(),
        accountings,
    })
}

fn cmd_apply(config: StoreConfig, batch: &Path, local: bool) -> Result<(), CliError> {
    let text = fs::read_to_string(batch)
        .map_err(|e| CliError::usage(format!("cannot read {}: {}", batch.display(), e)))?;
    let items: Vec<Upsert> = serde_json::from_str(&text).map_err(|e| {
        CliError::usage(format!("{}: {}", batch.display(), e))
            .with_hint("expected a JSON array of objects tagged with \"kind\"")
    })?;

    let mut store = LedgerStore::open(config).map_err(CliError::store)?;
    let origin = if local { WriteOrigin::Local } else { WriteOrigin::Remote };
    let report: BatchReport = store.apply_batch(&items, origin);
    store.save().map_err(CliError::store)?;
    print_json(&report)?;

    if report.failures.is_empty() {
        Ok(())
    } else {
        Err(CliError {
            code: EXIT_PARTIAL,
            message: format!("{} of {} items rejected", report.failures.len(), items.len()),
            hint: None,
        })
    }
}

fn cmd_history(
    config: StoreConfig,
    kind: HistoryKind,
    accounting: i32,
    key: &str,
    save: bool,
) -> Result<(), CliError> {
    let mut store = LedgerStore::load(config).map_err(CliError::store)?;
    let rows = match kind {
        HistoryKind::Account => history_json(store.account_history(accounting, key).map_err(CliError::store)?)?,
        HistoryKind::Budget => {
            history_json(store.budget_account_history(accounting, key).map_err(CliError::store)?)?
        }
        HistoryKind::Party => {
            let id: i32 = key
                .trim()
                .parse()
                .map_err(|_| CliError::usage(format!("party account key must be numeric, got '{}'", key)))?;
            history_json(store.party_account_history(accounting, id).map_err(CliError::store)?)?
        }
    };
    if save {
        store.save().map_err(CliError::store)?;
    }
    print_json(&rows)
}

fn cmd_postings(config: StoreConfig, accounting: i32, pending_only: bool) -> Result<(), CliError> {
    let store = LedgerStore::load(config).map_err(CliError::store)?;
    let Some(books) = store.document().accounting(accounting) else {
        return Err(CliError {
            code: EXIT_INVALID,
            message: format!("no accounting {}", accounting),
            hint: None,
        });
    };
    let lines: Vec<&PostingLine> = if pending_only {
        store.pending_postings(accounting)
    } else {
        books.posting_lines.values().collect()
    };
    print_json(&lines)
}

#[derive(Serialize)]
struct CommitOutput {
    accounting: i32,
    sequence: i32,
    committed: bool,
}

fn cmd_commit(config: StoreConfig, accounting: i32, sequence: i32, local_only: bool) -> Result<(), CliError> {
    let mut store = LedgerStore::load(config).map_err(CliError::store)?;
    let origin = if local_only {
        CommitOrigin::LocalOnly
    } else {
        CommitOrigin::RemoteAcknowledged
    };
    let committed = store
        .commit_local_posting(accounting, sequence, origin)
        .map_err(CliError::store)?;
    if committed {
        store.save().map_err(CliError::store)?;
    }
    print_json(&CommitOutput { accounting, sequence, committed })
}
