// Configuration loading

pub mod error;
pub mod settings;

pub use error::ConfigError;
pub use settings::{HistoryConfig, OutputConfig, StoreConfig, DEFAULT_RETENTION_MONTHS};
