use std::io;
use std::path::PathBuf;

use thiserror::Error;

/// Why a single metric group could not be read out of a snapshot.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ExtractionError {
    #[error("missing field `{0}`")]
    MissingField(&'static str),
    #[error("field `{field}` is not {expected}")]
    WrongType {
        field: &'static str,
        expected: &'static str,
    },
    #[error("field `{field}` has {found} entries, need {needed}")]
    TooFewEntries {
        field: &'static str,
        found: usize,
        needed: usize,
    },
}

#[derive(Debug, Error)]
pub enum JobError {
    #[error("{size_mb} MB does not fit in the address space")]
    SizeOverflow { size_mb: u64 },
    #[error("failed to reserve {bytes} bytes")]
    Allocation { bytes: usize },
    #[error("scratch file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("http client: {0}")]
    Http(#[from] reqwest::Error),
    #[error("no data for {0:?}")]
    TimedOut(std::time::Duration),
    #[error("worker panicked: {0}")]
    Panicked(String),
    #[error("cancelled")]
    Cancelled,
}

#[derive(Debug, Error)]
pub enum SourceError {
    #[error("stats transport failed: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("stats endpoint returned {status} for {url}")]
    Status {
        status: reqwest::StatusCode,
        url: String,
    },
    #[error("reading {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("undecodable snapshot: {0}")]
    Decode(#[from] serde_json::Error),
    #[error("{path}: line is not valid UTF-8: {source}")]
    Encoding {
        path: PathBuf,
        #[source]
        source: std::string::FromUtf8Error,
    },
}

impl SourceError {
    /// A fatal error means the source cannot produce further snapshots.
    pub fn is_fatal(&self) -> bool {
        !matches!(self, SourceError::Decode(_) | SourceError::Encoding { .. })
    }
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("reading config {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("parsing config {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
}
