use std::path::PathBuf;

use bitcoin::bip32::Fingerprint;
use thiserror::Error;

use crate::chain::Chain;
use crate::keystore::KeyKind;

pub type Result<T> = std::result::Result<T, SsmError>;

#[derive(Debug, Error)]
pub enum SsmError {
    #[error("unknown chain: {0}")]
    UnknownChain(String),

    #[error("invalid derivation path {path:?}: {reason}")]
    InvalidPath { path: String, reason: String },

    #[error("missing value: {0}")]
    MissingValue(String),

    #[error("unexpected value: {0}")]
    UnexpectedValue(String),

    #[error("invalid transaction: {0}")]
    InvalidTransaction(String),

    #[error("no {kind} stored for fingerprint {fingerprint} on {chain}")]
    NotFound {
        chain: Chain,
        kind: KeyKind,
        fingerprint: Fingerprint,
    },

    #[error("fingerprint {fingerprint} already names a different {kind} on {chain}")]
    FingerprintCollision {
        chain: Chain,
        kind: KeyKind,
        fingerprint: Fingerprint,
    },

    #[error("{0} is only available in debug mode")]
    Policy(&'static str),

    #[error("storage error at {}: {source}", path.display())]
    Storage {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("corrupt key blob: {0}")]
    CorruptKey(String),

    #[error("key derivation failed: {0}")]
    Derivation(#[from] bitcoin::bip32::Error),
}

impl SsmError {
    pub(crate) fn invalid_path(path: &str, reason: impl Into<String>) -> Self {
        SsmError::InvalidPath {
            path: path.to_string(),
            reason: reason.into(),
        }
    }

    pub(crate) fn storage(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        SsmError::Storage {
            path: path.into(),
            source,
        }
    }
}
