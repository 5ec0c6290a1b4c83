//! Single-record, write-once store for the wallet's receive address.
//!
//! The file holds exactly one line: the bech32 address. It is created
//! atomically on first run and never rewritten afterwards.

use std::fs;
use std::io::{ErrorKind as IoErrorKind, Write};
use std::path::{Path, PathBuf};

use tempfile::NamedTempFile;
use tracing::{debug, info};

use crate::error::WalletError;
use crate::AddressProvider;

#[derive(Debug, Clone)]
pub struct AddressStore {
    path: PathBuf,
}

impl AddressStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Write `address` if no address has been stored yet.
    ///
    /// The line is written to a temporary file in the same directory and
    /// linked into place without clobbering, so concurrent first runs end
    /// with exactly one winner and no reader ever sees a partial line.
    /// Returns `true` when this call created the file.
    pub fn persist_once(&self, address: &str) -> Result<bool, WalletError> {
        if self.path.exists() {
            debug!(path = %self.path.display(), "address store already present");
            return Ok(false);
        }

        let dir = match self.path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent,
            _ => Path::new("."),
        };
        let mut tmp = NamedTempFile::new_in(dir)
            .map_err(|e| WalletError::store_io(&self.path, "failed to create temporary file", e))?;
        writeln!(tmp, "{address}")
            .and_then(|_| tmp.as_file().sync_all())
            .map_err(|e| WalletError::store_io(&self.path, "failed to write address", e))?;

        match tmp.persist_noclobber(&self.path) {
            Ok(_) => {
                info!(path = %self.path.display(), address, "stored wallet address");
                Ok(true)
            }
            Err(e) if e.error.kind() == IoErrorKind::AlreadyExists => {
                debug!(path = %self.path.display(), "lost address store creation race");
                Ok(false)
            }
            Err(e) => Err(WalletError::store_io(
                &self.path,
                "failed to create address file",
                e.error,
            )),
        }
    }

    /// Read the stored address (first line, surrounding whitespace removed).
    pub fn retrieve(&self) -> Result<String, WalletError> {
        let contents = fs::read_to_string(&self.path)
            .map_err(|e| WalletError::store_io(&self.path, "failed to read address file", e))?;
        let address = contents.lines().next().unwrap_or("").trim();
        if address.is_empty() {
            return Err(WalletError::store(&self.path, "address file is empty"));
        }
        Ok(address.to_owned())
    }

    /// Persist `derived` on first run, then check that the stored address
    /// still equals it.
    ///
    /// A mismatch means the passphrase or seed mode changed since the file
    /// was written; the current keys could not spend the stored address.
    pub fn ensure(&self, derived: &str) -> Result<String, WalletError> {
        self.persist_once(derived)?;
        let stored = self.retrieve()?;
        if stored != derived {
            return Err(WalletError::AddressMismatch {
                stored,
                derived: derived.to_owned(),
            });
        }
        Ok(stored)
    }
}

impl AddressProvider for AddressStore {
    fn address(&self) -> Result<String, WalletError> {
        self.retrieve()
    }
}
