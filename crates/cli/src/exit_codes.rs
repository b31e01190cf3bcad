//! CLI Exit Code Registry
//!
//! Single source of truth for `ledgerctl` exit codes. Scripts rely on them.
//!
//! | Code | Meaning                                          |
//! |------|--------------------------------------------------|
//! | 0    | Success                                          |
//! | 1    | General error (unspecified)                      |
//! | 2    | Usage error (bad args, bad batch file)           |
//! | 3    | Document does not match the schema               |
//! | 4    | Document or schema file not found                |
//! | 5    | Document is not well-formed JSON                 |
//! | 6    | File system error                                |
//! | 7    | Invalid or missing value in an operation         |
//! | 8    | Batch applied partially (some items rejected)    |
//! | 10   | Configuration file invalid                       |
//!
//! New codes go in this table and next to their constant below.

use ledgercache_config::ConfigError;
use ledgercache_store::StoreError;

/// Success - command completed without errors.
pub const EXIT_SUCCESS: u8 = 0;

/// General error - unspecified failure.
/// Avoid using this; prefer a specific error code.
pub const EXIT_ERROR: u8 = 1;

/// Usage error - bad arguments, unreadable batch file.
pub const EXIT_USAGE: u8 = 2;

/// Structural schema violation or unsupported document version.
pub const EXIT_SCHEMA: u8 = 3;

/// Document or schema file is absent.
pub const EXIT_NOT_FOUND: u8 = 4;

/// Malformed JSON in the document.
pub const EXIT_PARSE: u8 = 5;

/// Read, write or rename failed.
pub const EXIT_IO: u8 = 6;

/// Operation refused its input (unknown entity, blank name, negative amount).
pub const EXIT_INVALID: u8 = 7;

/// Batch applied with per-item failures. Successful items were saved.
pub const EXIT_PARTIAL: u8 = 8;

/// Configuration file could not be parsed or failed validation.
pub const EXIT_CONFIG: u8 = 10;

/// Map a store error to its exit code, looking through load/save wrapping.
pub fn store_exit_code(err: &StoreError) -> u8 {
    match err.root() {
        StoreError::SchemaViolation { .. } => EXIT_SCHEMA,
        StoreError::ResourceNotFound(_) => EXIT_NOT_FOUND,
        StoreError::Parse(_) => EXIT_PARSE,
        StoreError::Io(_) => EXIT_IO,
        StoreError::ArgumentInvalid(_) | StoreError::MissingValue { .. } => EXIT_INVALID,
        StoreError::Repository { .. } => EXIT_ERROR,
    }
}

pub fn config_exit_code(err: &ConfigError) -> u8 {
    match err {
        ConfigError::Io(_) => EXIT_IO,
        ConfigError::Parse(_) | ConfigError::Validation(_) => EXIT_CONFIG,
    }
}
