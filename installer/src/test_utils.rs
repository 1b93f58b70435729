//! Shared test utilities for the installer crate.
//!
//! Exposed to integration tests through the `test-support` feature.

use crate::cancel::CancellationToken;
use crate::dirs::BaseDirs;
use crate::fetch::{FetchError, Fetcher};
use crate::manifest::digest::{ContentDigest, DigestAlgorithm};
use crate::manifest::{FilePlacement, Manifest, PackageInfo, PlatformVariant};
use crate::platform::Platform;
use camino::Utf8PathBuf;
use std::collections::HashMap;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

/// Returns the lowercase SHA-256 hex digest of `bytes`.
pub fn sha256_hex(bytes: &[u8]) -> String {
    ContentDigest::of_bytes(DigestAlgorithm::Sha256, bytes)
        .hex()
        .to_owned()
}

/// Builds an in-memory `.tar.gz` archive of regular files.
///
/// # Panics
///
/// Panics if the archive cannot be assembled.
pub fn tar_gz_bytes(entries: &[(&str, &[u8])]) -> Vec<u8> {
    let encoder = flate2::write::GzEncoder::new(Vec::new(), flate2::Compression::default());
    let mut builder = tar::Builder::new(encoder);
    for (name, data) in entries {
        let mut header = tar::Header::new_gnu();
        header.set_size(u64::try_from(data.len()).expect("entry size fits in u64"));
        header.set_mode(0o755);
        header.set_cksum();
        builder
            .append_data(&mut header, name, *data)
            .expect("append tar entry");
    }
    builder
        .into_inner()
        .expect("finish tar")
        .finish()
        .expect("finish gzip")
}

/// Builds an in-memory `.zip` archive of regular files.
///
/// # Panics
///
/// Panics if the archive cannot be assembled.
pub fn zip_bytes(entries: &[(&str, &[u8])]) -> Vec<u8> {
    let mut writer = zip::ZipWriter::new(std::io::Cursor::new(Vec::new()));
    let options = zip::write::SimpleFileOptions::default();
    for (name, data) in entries {
        writer.start_file(*name, options).expect("start zip entry");
        writer.write_all(data).expect("write zip entry");
    }
    writer.finish().expect("finish zip").into_inner()
}

/// A [`Fetcher`] serving fixed bodies from memory and recording each URL
/// it was asked for. Unknown URLs yield [`FetchError::NotFound`].
#[derive(Debug, Default)]
pub struct StaticFetcher {
    bodies: HashMap<String, Vec<u8>>,
    calls: Mutex<Vec<String>>,
}

impl StaticFetcher {
    /// Creates a fetcher that serves nothing.
    pub fn new() -> Self {
        Self::default()
    }

    /// Serves `body` for `url`.
    #[must_use]
    pub fn serve(mut self, url: impl Into<String>, body: impl Into<Vec<u8>>) -> Self {
        self.bodies.insert(url.into(), body.into());
        self
    }

    /// URLs requested so far, in order.
    ///
    /// # Panics
    ///
    /// Panics if the call log mutex is poisoned.
    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().expect("call log lock").clone()
    }
}

impl Fetcher for StaticFetcher {
    fn fetch(&self, url: &str, dest: &Path, cancel: &CancellationToken) -> Result<u64, FetchError> {
        self.calls
            .lock()
            .map_err(|_| FetchError::Transport {
                url: url.to_owned(),
                reason: "call log poisoned".to_owned(),
            })?
            .push(url.to_owned());
        if cancel.is_cancelled() {
            return Err(FetchError::Cancelled {
                url: url.to_owned(),
            });
        }
        let body = self.bodies.get(url).ok_or_else(|| FetchError::NotFound {
            url: url.to_owned(),
        })?;
        std::fs::write(dest, body).map_err(|source| FetchError::Io {
            url: url.to_owned(),
            source,
        })?;
        Ok(u64::try_from(body.len()).unwrap_or(u64::MAX))
    }
}

/// Builds a single-variant manifest for `platform` whose digest matches
/// `archive`.
///
/// # Panics
///
/// Panics if the resulting manifest is invalid.
pub fn manifest_for(
    name: &str,
    platform: Platform,
    url: &str,
    archive: &[u8],
    steps: Vec<FilePlacement>,
) -> Manifest {
    Manifest::new(
        PackageInfo::new(name, "1.0.0", "MIT"),
        vec![PlatformVariant {
            os: platform.os,
            arch: platform.arch,
            url: url.to_owned(),
            digest: ContentDigest::of_bytes(DigestAlgorithm::Sha256, archive),
        }],
        steps,
    )
    .expect("valid test manifest")
}

/// Creates a temporary directory and returns it with its UTF-8 path.
///
/// # Panics
///
/// Panics if the directory cannot be created or is not UTF-8.
pub fn utf8_tempdir() -> (tempfile::TempDir, Utf8PathBuf) {
    let temp = tempfile::tempdir().expect("temp dir");
    let path = Utf8PathBuf::try_from(temp.path().to_path_buf()).expect("UTF-8 path");
    (temp, path)
}

/// [`BaseDirs`] rooted in a scratch directory: `home/`, `config/`, and
/// `data/` below `root`.
#[derive(Debug, Clone)]
pub struct SandboxDirs {
    root: PathBuf,
}

impl SandboxDirs {
    /// Sandbox below `root`.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// The default prefix, `<root>/home/.local`, as a UTF-8 path.
    ///
    /// # Panics
    ///
    /// Panics if the sandbox root is not UTF-8.
    pub fn prefix(&self) -> Utf8PathBuf {
        Utf8PathBuf::try_from(self.root.join("home").join(".local")).expect("UTF-8 prefix")
    }
}

impl BaseDirs for SandboxDirs {
    fn home_dir(&self) -> Option<PathBuf> {
        Some(self.root.join("home"))
    }

    fn config_dir(&self) -> Option<PathBuf> {
        Some(self.root.join("config"))
    }

    fn data_dir(&self) -> Option<PathBuf> {
        Some(self.root.join("data"))
    }
}

/// Lists every regular file below `root`, sorted.
pub fn files_under(root: &Path) -> Vec<PathBuf> {
    let mut found = Vec::new();
    let mut pending = vec![root.to_path_buf()];
    while let Some(dir) = pending.pop() {
        let Ok(entries) = std::fs::read_dir(&dir) else {
            continue;
        };
        for entry in entries.flatten() {
            let path = entry.path();
            if path.is_dir() {
                pending.push(path);
            } else {
                found.push(path);
            }
        }
    }
    found.sort();
    found
}
