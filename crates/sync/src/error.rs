use std::fmt;

use ledgercache_store::StoreError;

/// Failure reported by a remote repository implementation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RemoteError {
    /// Transport failure (connection refused, timeout, ...)
    Network(String),
    /// The service answered but refused the request
    Rejected { status: u16, message: String },
    /// Response body could not be decoded
    Parse(String),
}

impl fmt::Display for RemoteError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RemoteError::Network(msg) => write!(f, "network error: {}", msg),
            RemoteError::Rejected { status, message } => write!(f, "rejected ({}): {}", status, message),
            RemoteError::Parse(msg) => write!(f, "parse error: {}", msg),
        }
    }
}

impl std::error::Error for RemoteError {}

#[derive(Debug)]
pub enum SyncError {
    /// The cancel token was set before a remote call.
    Cancelled,
    /// A remote call failed; the pass stopped there.
    Remote {
        operation: &'static str,
        source: RemoteError,
    },
    /// The store refused an operation outside batch application.
    Store(StoreError),
}

impl fmt::Display for SyncError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SyncError::Cancelled => write!(f, "synchronization cancelled"),
            SyncError::Remote { operation, source } => write!(f, "remote {} failed: {}", operation, source),
            SyncError::Store(e) => write!(f, "store error: {}", e),
        }
    }
}

impl std::error::Error for SyncError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            SyncError::Cancelled => None,
            SyncError::Remote { source, .. } => Some(source),
            SyncError::Store(e) => Some(e),
        }
    }
}

impl From<StoreError> for SyncError {
    fn from(e: StoreError) -> Self {
        SyncError::Store(e)
    }
}
