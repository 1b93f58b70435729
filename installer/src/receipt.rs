//! Install receipts: which files each installed package owns.
//!
//! Receipts live in the data directory at `<data_dir>/receipts/<name>.json`.
//! Writers take an exclusive `fs2` lock on `<data_dir>/receipts/.lock` so
//! that concurrent installs do not interleave updates.

use crate::dirs::BaseDirs;
use crate::manifest::error::ManifestError;
use crate::manifest::model::validate_identifier;
use crate::pipeline::InstalledFiles;
use crate::platform::Platform;
use fs2::FileExt;
use serde::{Deserialize, Serialize};
use std::fs::{self, File, OpenOptions};
use std::path::{Path, PathBuf};

const RECEIPTS_DIRNAME: &str = "receipts";
const LOCK_FILENAME: &str = ".lock";

/// What one successful install wrote.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Receipt {
    /// Package name.
    pub name: String,
    /// Installed version.
    pub version: String,
    /// Platform the variant was selected for.
    pub platform: Platform,
    /// Destination files in placement order.
    pub files: InstalledFiles,
}

/// Errors from receipt persistence.
#[derive(Debug, thiserror::Error)]
pub enum ReceiptError {
    /// The data directory could not be resolved.
    #[error("could not determine the tap-installer data directory")]
    MissingDataDirectory,

    /// A package name cannot name a receipt file.
    #[error("invalid package name {name:?}: {source}")]
    InvalidName {
        /// The rejected name.
        name: String,
        /// Why the name was rejected.
        #[source]
        source: ManifestError,
    },

    /// A filesystem operation failed.
    #[error("receipt I/O error at {path}: {source}")]
    Io {
        /// Path involved in the failure.
        path: PathBuf,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// A receipt file is not valid JSON.
    #[error("malformed receipt {path}: {source}")]
    Malformed {
        /// The receipt file.
        path: PathBuf,
        /// Underlying parse error.
        #[source]
        source: serde_json::Error,
    },

    /// Serializing a receipt failed.
    #[error("failed to serialize receipt: {0}")]
    Serialize(#[source] serde_json::Error),
}

/// Directory of receipt files.
#[derive(Debug, Clone)]
pub struct ReceiptStore {
    root: PathBuf,
}

impl ReceiptStore {
    /// Store rooted at `root`.
    #[must_use]
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Store in the platform data directory.
    ///
    /// # Errors
    ///
    /// Returns [`ReceiptError::MissingDataDirectory`] when no data directory
    /// can be resolved.
    pub fn from_dirs(dirs: &dyn BaseDirs) -> Result<Self, ReceiptError> {
        let data_dir = dirs.data_dir().ok_or(ReceiptError::MissingDataDirectory)?;
        Ok(Self::new(data_dir.join(RECEIPTS_DIRNAME)))
    }

    /// Directory holding the receipts.
    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    fn path_for(&self, name: &str) -> Result<PathBuf, ReceiptError> {
        validate_identifier("name", name).map_err(|source| ReceiptError::InvalidName {
            name: name.to_owned(),
            source,
        })?;
        Ok(self.root.join(format!("{name}.json")))
    }

    /// Persist `receipt`, replacing any earlier one for the same package.
    ///
    /// # Errors
    ///
    /// Returns an error when the directory, lock, or file cannot be written.
    pub fn save(&self, receipt: &Receipt) -> Result<(), ReceiptError> {
        let path = self.path_for(&receipt.name)?;
        let _lock = self.lock()?;
        let json = serde_json::to_string_pretty(receipt).map_err(ReceiptError::Serialize)?;
        fs::write(&path, json).map_err(|source| ReceiptError::Io {
            path: path.clone(),
            source,
        })?;
        log::debug!("wrote receipt {}", path.display());
        Ok(())
    }

    /// Load the receipt for `name`, if the package is installed.
    ///
    /// # Errors
    ///
    /// Returns an error when the file exists but cannot be read or parsed.
    pub fn load(&self, name: &str) -> Result<Option<Receipt>, ReceiptError> {
        let path = self.path_for(name)?;
        if !path.exists() {
            return Ok(None);
        }
        read_receipt(&path).map(Some)
    }

    /// Delete the receipt for `name`. Returns whether one existed.
    ///
    /// # Errors
    ///
    /// Returns an error when the lock cannot be taken or the file cannot be
    /// removed.
    pub fn remove(&self, name: &str) -> Result<bool, ReceiptError> {
        let path = self.path_for(name)?;
        let _lock = self.lock()?;
        match fs::remove_file(&path) {
            Ok(()) => Ok(true),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(false),
            Err(source) => Err(ReceiptError::Io { path, source }),
        }
    }

    /// Every receipt, sorted by package name.
    ///
    /// Malformed receipt files are skipped with a warning.
    ///
    /// # Errors
    ///
    /// Returns an error when the directory exists but cannot be listed.
    pub fn list(&self) -> Result<Vec<Receipt>, ReceiptError> {
        if !self.root.exists() {
            return Ok(Vec::new());
        }
        let entries = fs::read_dir(&self.root).map_err(|source| ReceiptError::Io {
            path: self.root.clone(),
            source,
        })?;
        let mut receipts = Vec::new();
        for entry in entries.flatten() {
            let path = entry.path();
            if path.extension().is_none_or(|ext| ext != "json") {
                continue;
            }
            match read_receipt(&path) {
                Ok(receipt) => receipts.push(receipt),
                Err(err) => log::warn!("skipping receipt: {err}"),
            }
        }
        receipts.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(receipts)
    }

    fn lock(&self) -> Result<File, ReceiptError> {
        fs::create_dir_all(&self.root).map_err(|source| ReceiptError::Io {
            path: self.root.clone(),
            source,
        })?;
        let lock_path = self.root.join(LOCK_FILENAME);
        let file = OpenOptions::new()
            .create(true)
            .truncate(false)
            .write(true)
            .open(&lock_path)
            .map_err(|source| ReceiptError::Io {
                path: lock_path.clone(),
                source,
            })?;
        file.lock_exclusive().map_err(|source| ReceiptError::Io {
            path: lock_path,
            source,
        })?;
        Ok(file)
    }
}

fn read_receipt(path: &Path) -> Result<Receipt, ReceiptError> {
    let content = fs::read_to_string(path).map_err(|source| ReceiptError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    serde_json::from_str(&content).map_err(|source| ReceiptError::Malformed {
        path: path.to_path_buf(),
        source,
    })
}
