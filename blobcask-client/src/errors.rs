use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

use blobcask_hash::Fingerprint;

#[derive(Error, Debug)]
pub enum ClientError {
    #[error("payload is too large: {size} > {limit}")]
    PayloadTooLarge { size: u64, limit: u64 },

    #[error("file {path} is too large: {size} > {limit}")]
    FileTooLarge {
        path: PathBuf,
        size: u64,
        limit: u64,
    },

    #[error(transparent)]
    Store(#[from] StoreFault),

    #[error(transparent)]
    Transport(#[from] TransportError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Outcome of a failed store exchange, shared with every caller that
/// joined the in-flight operation. Must stay cheap to clone.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StoreFault {
    #[error("checksum mismatch: stored {expected}, remote recomputed {actual}")]
    ChecksumMismatch {
        expected: Fingerprint,
        actual: Fingerprint,
    },

    #[error(transparent)]
    Transport(#[from] TransportError),

    #[error("store abandoned before completion")]
    Abandoned,
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TransportError {
    #[error("remote channel closed")]
    Closed,

    #[error("remote request timed out after {0:?}")]
    Timeout(Duration),

    #[error("remote rejected request: {0}")]
    Rejected(String),
}

#[derive(Error, Debug)]
pub enum IndexError {
    #[error("index lock not acquired in time")]
    LockTimeout,

    #[error("index backend failure: {0}")]
    Backend(String),
}

pub type Result<T> = std::result::Result<T, ClientError>;
