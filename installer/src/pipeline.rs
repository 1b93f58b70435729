//! The install pipeline: select → fetch → verify → extract → place.
//!
//! [`Installer`] runs one manifest's pipeline for one platform. Each step
//! consumes the previous step's output, so the pipeline is strictly
//! sequential. All intermediate data lives in a uniquely named temporary
//! directory that is removed on every exit path.
//!
//! Destination files are only touched during the final placement step. If
//! placement fails part-way, the error reports exactly which files were
//! already written so the caller can remove them.

use crate::cancel::CancellationToken;
use crate::extraction::{ArchiveFormat, ExtractionError, Extractor};
use crate::fetch::{FetchError, Fetcher};
use crate::layout::DestinationLayout;
use crate::manifest::digest::ContentDigest;
use crate::manifest::{Manifest, PlatformVariant};
use crate::placement::{place_file, remove_if_present};
use crate::platform::Platform;
use camino::{Utf8Path, Utf8PathBuf};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::io;
use std::path::Path;

const TEMP_PREFIX: &str = "tap-installer-";
const EXTRACT_DIRNAME: &str = "extracted";
const FALLBACK_ARCHIVE_NAME: &str = "download";

/// A step of the install pipeline, used to report where a failure occurred.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PipelineStep {
    /// Choosing the platform variant.
    Select,
    /// Downloading the archive.
    Fetch,
    /// Checking the archive digest.
    Verify,
    /// Unpacking the archive.
    Extract,
    /// Copying files into host directories.
    Place,
}

impl PipelineStep {
    /// Lowercase step name.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Select => "select",
            Self::Fetch => "fetch",
            Self::Verify => "verify",
            Self::Extract => "extract",
            Self::Place => "place",
        }
    }
}

impl fmt::Display for PipelineStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Progress of one install.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InstallState {
    /// Nothing has happened yet.
    NotStarted,
    /// The archive has been downloaded.
    Fetched,
    /// The archive digest matched.
    Verified,
    /// The archive has been unpacked.
    Extracted,
    /// Every file has been placed. Terminal.
    Placed,
    /// The given step failed. Terminal.
    Failed(PipelineStep),
}

/// Ordered absolute destination paths written by an install.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct InstalledFiles(Vec<Utf8PathBuf>);

impl InstalledFiles {
    /// Return the paths in placement order.
    #[must_use]
    pub fn paths(&self) -> &[Utf8PathBuf] {
        &self.0
    }

    /// Number of files.
    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Whether no file was placed.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    fn push(&mut self, path: Utf8PathBuf) {
        self.0.push(path);
    }
}

impl From<Vec<Utf8PathBuf>> for InstalledFiles {
    fn from(paths: Vec<Utf8PathBuf>) -> Self {
        Self(paths)
    }
}

impl<'a> IntoIterator for &'a InstalledFiles {
    type Item = &'a Utf8PathBuf;
    type IntoIter = std::slice::Iter<'a, Utf8PathBuf>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}

/// Errors that terminate an install.
#[derive(Debug, thiserror::Error)]
pub enum InstallError {
    /// No variant serves the requested platform.
    #[error("{package} has no variant for {platform} (available: {})", join_platforms(.available))]
    UnsupportedPlatform {
        /// Package name.
        package: String,
        /// The requested platform.
        platform: Platform,
        /// Platforms the manifest does provide.
        available: Vec<Platform>,
    },

    /// Downloading the archive failed.
    #[error("failed to fetch {url}: {source}")]
    Fetch {
        /// The variant URL.
        url: String,
        /// The transport failure.
        #[source]
        source: FetchError,
    },

    /// The downloaded bytes do not match the manifest digest.
    #[error("integrity check failed for {url}: expected {expected}, got {actual}")]
    Integrity {
        /// The variant URL.
        url: String,
        /// Digest declared by the manifest.
        expected: ContentDigest,
        /// Digest of the downloaded bytes.
        actual: ContentDigest,
    },

    /// The archive could not be unpacked.
    #[error("failed to extract {url}: {source}")]
    Extract {
        /// The variant URL.
        url: String,
        /// The extraction failure.
        #[source]
        source: ExtractionError,
    },

    /// An install step names a file absent from the archive.
    #[error("archive does not contain {path}")]
    MissingArtifact {
        /// The missing source path.
        path: String,
        /// Files already written in this run.
        placed: InstalledFiles,
    },

    /// Writing a destination file failed.
    #[error("failed to place {path}: {source}")]
    Placement {
        /// The destination being written.
        path: Utf8PathBuf,
        /// The underlying I/O error.
        #[source]
        source: io::Error,
        /// Files already written in this run.
        placed: InstalledFiles,
    },

    /// The cancellation token fired.
    #[error("install cancelled during {step}")]
    Cancelled {
        /// Step that observed the cancellation.
        step: PipelineStep,
        /// Files already written in this run.
        placed: InstalledFiles,
    },
}

impl InstallError {
    /// The pipeline step that failed.
    #[must_use]
    pub fn step(&self) -> PipelineStep {
        match self {
            Self::UnsupportedPlatform { .. } => PipelineStep::Select,
            Self::Fetch { .. } => PipelineStep::Fetch,
            Self::Integrity { .. } => PipelineStep::Verify,
            Self::Extract { .. } => PipelineStep::Extract,
            Self::MissingArtifact { .. } | Self::Placement { .. } => PipelineStep::Place,
            Self::Cancelled { step, .. } => *step,
        }
    }

    /// Destination files written before the failure; empty before placement.
    #[must_use]
    pub fn placed(&self) -> &[Utf8PathBuf] {
        match self {
            Self::MissingArtifact { placed, .. }
            | Self::Placement { placed, .. }
            | Self::Cancelled { placed, .. } => placed.paths(),
            _ => &[],
        }
    }
}

fn join_platforms(platforms: &[Platform]) -> String {
    if platforms.is_empty() {
        return "none".to_owned();
    }
    platforms
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}

/// Errors from [`uninstall`].
#[derive(Debug, thiserror::Error)]
pub enum UninstallError {
    /// A file exists but could not be removed.
    #[error("failed to remove {path}: {source}")]
    Remove {
        /// The file that could not be removed.
        path: Utf8PathBuf,
        /// The underlying I/O error.
        #[source]
        source: io::Error,
    },
}

/// Runs install pipelines against one destination layout.
///
/// The fetcher and extractor are injected so tests can substitute
/// in-memory implementations.
pub struct Installer<'a> {
    layout: &'a DestinationLayout,
    fetcher: &'a dyn Fetcher,
    extractor: &'a dyn Extractor,
    cancel: CancellationToken,
    state: InstallState,
}

impl<'a> Installer<'a> {
    /// Create an installer that is only cancelled explicitly.
    #[must_use]
    pub fn new(
        layout: &'a DestinationLayout,
        fetcher: &'a dyn Fetcher,
        extractor: &'a dyn Extractor,
    ) -> Self {
        Self {
            layout,
            fetcher,
            extractor,
            cancel: CancellationToken::new(),
            state: InstallState::NotStarted,
        }
    }

    /// Observe `cancel` during the pipeline.
    #[must_use]
    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    /// State reached by the most recent install.
    #[must_use]
    pub fn state(&self) -> InstallState {
        self.state
    }

    /// Install `manifest` for `platform`.
    ///
    /// Each call starts again from [`InstallState::NotStarted`].
    ///
    /// # Errors
    ///
    /// Returns an [`InstallError`] naming the failed step. Errors raised
    /// during placement carry the files written before the failure.
    pub fn install(
        &mut self,
        manifest: &Manifest,
        platform: Platform,
    ) -> Result<InstalledFiles, InstallError> {
        self.state = InstallState::NotStarted;
        log::debug!(
            "installing {} {} for {platform}",
            manifest.name(),
            manifest.version()
        );
        let result = self.run(manifest, platform);
        if let Err(err) = &result {
            self.transition(InstallState::Failed(err.step()));
        }
        result
    }

    fn run(
        &mut self,
        manifest: &Manifest,
        platform: Platform,
    ) -> Result<InstalledFiles, InstallError> {
        let variant =
            manifest
                .variant_for(platform)
                .ok_or_else(|| InstallError::UnsupportedPlatform {
                    package: manifest.name().to_owned(),
                    platform,
                    available: manifest.platforms(),
                })?;
        let url = variant.url.as_str();

        self.ensure_not_cancelled(PipelineStep::Fetch)?;
        let workspace = tempfile::Builder::new()
            .prefix(TEMP_PREFIX)
            .tempdir()
            .map_err(|source| InstallError::Fetch {
                url: url.to_owned(),
                source: FetchError::Io {
                    url: url.to_owned(),
                    source,
                },
            })?;
        let archive_path = workspace.path().join(archive_file_name(variant));

        self.fetcher
            .fetch(url, &archive_path, &self.cancel)
            .map_err(|source| match source {
                FetchError::Cancelled { .. } => cancelled(PipelineStep::Fetch),
                source => InstallError::Fetch {
                    url: url.to_owned(),
                    source,
                },
            })?;
        self.transition(InstallState::Fetched);

        self.ensure_not_cancelled(PipelineStep::Verify)?;
        verify(variant, &archive_path)?;
        self.transition(InstallState::Verified);

        self.ensure_not_cancelled(PipelineStep::Extract)?;
        let extract_root = workspace.path().join(EXTRACT_DIRNAME);
        self.extract(variant, &archive_path, &extract_root)?;
        self.transition(InstallState::Extracted);

        let placed = self.place_all(manifest, &extract_root)?;
        self.transition(InstallState::Placed);
        log::info!(
            "installed {} {} ({} files)",
            manifest.name(),
            manifest.version(),
            placed.len()
        );
        Ok(placed)
    }

    fn extract(
        &self,
        variant: &PlatformVariant,
        archive_path: &Path,
        extract_root: &Path,
    ) -> Result<(), InstallError> {
        let url = variant.url.as_str();
        let to_error = |source: ExtractionError| match source {
            ExtractionError::Cancelled => cancelled(PipelineStep::Extract),
            source => InstallError::Extract {
                url: url.to_owned(),
                source,
            },
        };
        let format = ArchiveFormat::from_file_name(variant.file_name()).map_err(to_error)?;
        let files = self
            .extractor
            .extract(archive_path, format, extract_root, &self.cancel)
            .map_err(to_error)?;
        log::trace!("archive {url} held {} files", files.len());
        Ok(())
    }

    fn place_all(
        &self,
        manifest: &Manifest,
        extract_root: &Path,
    ) -> Result<InstalledFiles, InstallError> {
        let mut placed = InstalledFiles::default();
        for step in manifest.install_steps() {
            if self.cancel.is_cancelled() {
                return Err(InstallError::Cancelled {
                    step: PipelineStep::Place,
                    placed,
                });
            }
            let source = extract_root.join(&step.source_path);
            if !source.is_file() {
                return Err(InstallError::MissingArtifact {
                    path: step.source_path.clone(),
                    placed,
                });
            }
            let dest = self.layout.destination(step, manifest.name());
            if let Err(source) = place_file(&source, &dest, step.dest_category.is_executable()) {
                return Err(InstallError::Placement {
                    path: dest,
                    source,
                    placed,
                });
            }
            log::debug!("placed {} as {dest}", step.source_path);
            placed.push(dest);
        }
        Ok(placed)
    }

    fn ensure_not_cancelled(&self, step: PipelineStep) -> Result<(), InstallError> {
        if self.cancel.is_cancelled() {
            return Err(cancelled(step));
        }
        Ok(())
    }

    fn transition(&mut self, next: InstallState) {
        log::debug!("install state {:?} -> {next:?}", self.state);
        self.state = next;
    }
}

fn cancelled(step: PipelineStep) -> InstallError {
    InstallError::Cancelled {
        step,
        placed: InstalledFiles::default(),
    }
}

fn verify(variant: &PlatformVariant, archive_path: &Path) -> Result<(), InstallError> {
    let url = variant.url.as_str();
    let (matches, actual) =
        variant
            .digest
            .verify_file(archive_path)
            .map_err(|source| InstallError::Fetch {
                url: url.to_owned(),
                source: FetchError::Io {
                    url: url.to_owned(),
                    source,
                },
            })?;
    if !matches {
        return Err(InstallError::Integrity {
            url: url.to_owned(),
            expected: variant.digest.clone(),
            actual,
        });
    }
    Ok(())
}

/// Local file name for the downloaded archive, keeping the URL's suffix so
/// the extractor can detect the format.
fn archive_file_name(variant: &PlatformVariant) -> &str {
    match variant.file_name() {
        "" | "." | ".." => FALLBACK_ARCHIVE_NAME,
        name => name,
    }
}

/// Remove every file in `installed`.
///
/// Files that are already gone are skipped, so uninstalling twice succeeds.
///
/// # Errors
///
/// Returns [`UninstallError::Remove`] for the first file that exists but
/// cannot be removed.
pub fn uninstall(installed: &InstalledFiles) -> Result<(), UninstallError> {
    for path in installed {
        remove_path(path)?;
    }
    Ok(())
}

fn remove_path(path: &Utf8Path) -> Result<(), UninstallError> {
    match remove_if_present(path) {
        Ok(true) => {
            log::debug!("removed {path}");
            Ok(())
        }
        Ok(false) => {
            log::debug!("{path} already absent");
            Ok(())
        }
        Err(source) => Err(UninstallError::Remove {
            path: path.to_owned(),
            source,
        }),
    }
}

#[cfg(test)]
#[path = "pipeline_tests.rs"]
mod tests;
