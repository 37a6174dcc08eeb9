pub mod config;
pub mod error;
pub mod load;
pub mod metrics;
pub mod ops;

pub use config::{Config, LoadConfig, LoadProfile, MonitorConfig, DEFAULT_CONFIG};
pub use error::{ConfigError, ExtractionError, JobError, SourceError};
