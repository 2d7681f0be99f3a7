use std::path::PathBuf;

use reqwest::StatusCode;
use thiserror::Error;

/// The session store could not be read or written.
#[derive(Debug, Error)]
pub enum PersistenceError {
    #[error("no session store at {path}; run `login` first")]
    Missing { path: PathBuf },

    #[error("failed to access session store at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("session store at {path} is corrupt: {source}")]
    Corrupt {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("session store at {path} holds no cookies")]
    Empty { path: PathBuf },
}

/// One (source, page) fetch did not produce a usable page.
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("{source_url} page {page}: proxy answered with status {status}")]
    Status {
        source_url: String,
        page: u32,
        status: StatusCode,
    },

    #[error("{source_url} page {page}: request failed: {error}")]
    Transport {
        source_url: String,
        page: u32,
        #[source]
        error: reqwest::Error,
    },
}

impl FetchError {
    pub fn page(&self) -> u32 {
        match self {
            FetchError::Status { page, .. } | FetchError::Transport { page, .. } => *page,
        }
    }
}

#[derive(Debug, Error)]
pub enum SinkError {
    #[error("failed to write dataset to {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: csv::Error,
    },

    #[error("failed to flush dataset to {path}: {source}")]
    Flush {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to read dataset from {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: csv::Error,
    },
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("no member sources configured (set MEMBER_SOURCES or pass --source)")]
    NoSources,

    #[error("source `{0}` is not an http(s) url")]
    InvalidSource(String),

    #[error("page cap must be at least 1 (MAX_PAGES / --max-pages)")]
    ZeroPageCap,

    #[error("cookie header contains no `name=value` pairs")]
    EmptyCookieHeader,
}
