//! Fingerprint-indexed persistence for key blobs.
//!
//! Layout under the root directory:
//!
//! ```text
//! <root>/<chain>/master/<fingerprint>
//! <root>/<chain>/blinding_keys/<fingerprint>
//! <root>/<chain>/salt/<fingerprint>
//! ```
//!
//! Blobs are stored as-is. Encryption at rest, if wanted, belongs to a layer above this one.
//! Nothing here locks: two writers on the same fingerprint race.

use std::fmt;
use std::fs;
use std::io::{self, Write};
use std::path::PathBuf;

use bitcoin::bip32::Fingerprint;
use tempfile::NamedTempFile;
use tracing::debug;

use crate::chain::Chain;
use crate::error::{Result, SsmError};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum KeyKind {
    Master,
    Blinding,
    Salt,
}

impl KeyKind {
    fn dir_name(self) -> &'static str {
        match self {
            KeyKind::Master => "master",
            KeyKind::Blinding => "blinding_keys",
            KeyKind::Salt => "salt",
        }
    }
}

impl fmt::Display for KeyKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            KeyKind::Master => "master key",
            KeyKind::Blinding => "master blinding key",
            KeyKind::Salt => "salt",
        })
    }
}

#[derive(Debug, Clone)]
pub struct KeyStore {
    root: PathBuf,
}

impl KeyStore {
    /// Does not touch the filesystem; directories are created on first write.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    fn dir(&self, chain: Chain, kind: KeyKind) -> PathBuf {
        self.root.join(chain.as_str()).join(kind.dir_name())
    }

    fn blob_path(&self, chain: Chain, kind: KeyKind, fingerprint: Fingerprint) -> PathBuf {
        self.dir(chain, kind).join(fingerprint.to_string())
    }

    /// Writes the blob atomically: a temp file in the target directory is renamed over the
    /// destination, so readers never observe a partial blob.
    pub fn put(
        &self,
        chain: Chain,
        kind: KeyKind,
        fingerprint: Fingerprint,
        blob: &[u8],
    ) -> Result<()> {
        let dir = self.dir(chain, kind);
        fs::create_dir_all(&dir).map_err(|e| SsmError::storage(&dir, e))?;

        let path = dir.join(fingerprint.to_string());
        let mut file = NamedTempFile::new_in(&dir).map_err(|e| SsmError::storage(&dir, e))?;
        file.write_all(blob)
            .and_then(|()| file.as_file().sync_all())
            .map_err(|e| SsmError::storage(file.path(), e))?;
        file.persist(&path)
            .map_err(|e| SsmError::storage(&path, e.error))?;

        debug!(%chain, %kind, %fingerprint, "stored key blob");
        Ok(())
    }

    pub fn get(&self, chain: Chain, kind: KeyKind, fingerprint: Fingerprint) -> Result<Vec<u8>> {
        let path = self.blob_path(chain, kind, fingerprint);
        match fs::read(&path) {
            Ok(blob) => Ok(blob),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Err(SsmError::NotFound {
                chain,
                kind,
                fingerprint,
            }),
            Err(e) => Err(SsmError::storage(path, e)),
        }
    }

    pub fn contains(&self, chain: Chain, kind: KeyKind, fingerprint: Fingerprint) -> bool {
        self.blob_path(chain, kind, fingerprint).is_file()
    }

    /// Removing a blob that is not there is not an error.
    pub fn remove(&self, chain: Chain, kind: KeyKind, fingerprint: Fingerprint) -> Result<()> {
        let path = self.blob_path(chain, kind, fingerprint);
        match fs::remove_file(&path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(SsmError::storage(path, e)),
        }
    }
}
