// Synchronization driver
//
// Pulls entity snapshots from a remote bookkeeping service into the local
// ledger store and pushes pending local postings back. Network transport
// lives behind `RemoteRepository`; this crate only sequences the calls.

pub mod driver;
pub mod error;
pub mod remote;

pub use driver::{SubmitFailure, SubmitReport, SyncDriver, SyncReport};
pub use error::{RemoteError, SyncError};
pub use remote::{cancel_token, is_cancelled, CancelToken, RemoteRepository};
