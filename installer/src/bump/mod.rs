//! Manifest regeneration for new upstream releases.
//!
//! For every package in a [`TapConfig`], the bumper asks a
//! [`ReleaseSource`] for the latest version, skips packages whose manifest
//! already carries that version, and otherwise downloads and hashes the four
//! release archives in parallel before rendering a fresh manifest.
//!
//! # Sub-modules
//!
//! - [`github`] - latest-release lookup on the GitHub API.
//! - [`tap_config`] - the tap configuration file.

pub mod github;
pub mod tap_config;

use crate::cancel::CancellationToken;
use crate::fetch::{FetchError, Fetcher};
use crate::manifest::digest::{ContentDigest, DigestAlgorithm};
use crate::manifest::error::ManifestError;
use crate::manifest::{
    Manifest, ManifestParseError, PackageInfo, PlatformVariant, load_manifest, render_manifest,
};
use crate::platform::{Arch, Os};
use std::path::{Path, PathBuf};

pub use github::{GithubClient, ReleaseSource};
pub use tap_config::{PackageSpec, TapConfig};

/// Release targets a manifest is generated for, with their platforms.
pub const RELEASE_TARGETS: [(&str, Os, Arch); 4] = [
    ("aarch64-apple-darwin", Os::MacOs, Arch::Arm64),
    ("x86_64-apple-darwin", Os::MacOs, Arch::X86_64),
    ("aarch64-unknown-linux-musl", Os::Linux, Arch::Arm64),
    ("x86_64-unknown-linux-musl", Os::Linux, Arch::X86_64),
];

/// Errors from the bump workflow.
#[derive(Debug, thiserror::Error)]
pub enum BumpError {
    /// The tap configuration is not valid TOML.
    #[error("invalid tap config {path}: {source}")]
    Config {
        /// The configuration file.
        path: PathBuf,
        /// Underlying TOML error.
        #[source]
        source: toml::de::Error,
    },

    /// A `repo` value is not `owner/name`.
    #[error("repo {repo:?} must have the form owner/name")]
    InvalidRepo {
        /// The rejected value.
        repo: String,
    },

    /// A completion file has an unrecognised shell extension.
    #[error("cannot infer the shell for completion {path}")]
    UnknownCompletion {
        /// The completion path.
        path: String,
    },

    /// The release lookup failed.
    #[error("GitHub lookup for {repo} failed: {reason}")]
    Github {
        /// `owner/name` of the repository.
        repo: String,
        /// Description of the failure.
        reason: String,
    },

    /// Downloading a release archive failed.
    #[error("failed to fetch {url}: {source}")]
    Fetch {
        /// The archive URL.
        url: String,
        /// The transport failure.
        #[source]
        source: FetchError,
    },

    /// The generated manifest is invalid.
    #[error("generated manifest is invalid: {0}")]
    Manifest(#[from] ManifestError),

    /// Rendering the manifest failed.
    #[error(transparent)]
    Render(#[from] ManifestParseError),

    /// A filesystem operation failed.
    #[error("I/O error at {path}: {source}")]
    Io {
        /// Path involved in the failure.
        path: PathBuf,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },
}

/// Where and how to write regenerated manifests.
#[derive(Debug, Clone, Copy)]
pub struct BumpOptions<'a> {
    /// Directory holding `<name>.toml` manifests.
    pub output_dir: &'a Path,
    /// Hash URL strings instead of downloading and write nothing.
    pub dry_run: bool,
}

/// Result of processing one package.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BumpOutcome {
    /// A new manifest was generated (and written unless dry run).
    Bumped {
        /// The regenerated manifest.
        manifest: Manifest,
        /// Where it was or would be written.
        path: PathBuf,
    },
    /// The existing manifest already has the latest version.
    UpToDate {
        /// Package name.
        name: String,
        /// The current version.
        version: String,
    },
    /// The latest release has no tag.
    NoRelease {
        /// Package name.
        name: String,
    },
}

impl BumpOutcome {
    /// `(name, version)` if this outcome bumped a package.
    #[must_use]
    pub fn bumped(&self) -> Option<(String, String)> {
        match self {
            Self::Bumped { manifest, .. } => {
                Some((manifest.name().to_owned(), manifest.version().to_owned()))
            }
            Self::UpToDate { .. } | Self::NoRelease { .. } => None,
        }
    }
}

/// Regenerates manifests using injected release and download sources.
pub struct Bumper<'a> {
    releases: &'a dyn ReleaseSource,
    fetcher: &'a dyn Fetcher,
    cancel: CancellationToken,
}

impl<'a> Bumper<'a> {
    /// Create a bumper.
    #[must_use]
    pub fn new(releases: &'a dyn ReleaseSource, fetcher: &'a dyn Fetcher) -> Self {
        Self {
            releases,
            fetcher,
            cancel: CancellationToken::new(),
        }
    }

    /// Observe `cancel` while downloading archives.
    #[must_use]
    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    /// Process every package in `config`, in order.
    ///
    /// # Errors
    ///
    /// Stops at the first package that fails.
    pub fn bump_all(
        &self,
        config: &TapConfig,
        options: BumpOptions<'_>,
    ) -> Result<Vec<BumpOutcome>, BumpError> {
        if options.dry_run {
            log::info!("dry run enabled");
        }
        let total = config.packages.len();
        let mut outcomes = Vec::with_capacity(total);
        for (index, package) in config.packages.iter().enumerate() {
            log::info!("processing package {} of {total}: {}", index + 1, package.repo);
            outcomes.push(self.bump_package(package, options)?);
        }
        Ok(outcomes)
    }

    /// Process one package.
    ///
    /// # Errors
    ///
    /// Returns an error when the lookup, a download, or writing the manifest
    /// fails.
    pub fn bump_package(
        &self,
        package: &PackageSpec,
        options: BumpOptions<'_>,
    ) -> Result<BumpOutcome, BumpError> {
        let (owner, name) = package.owner_and_name()?;
        let Some(version) = self.releases.latest_version(owner, name)? else {
            log::info!("no version found for {name}, skipping");
            return Ok(BumpOutcome::NoRelease {
                name: name.to_owned(),
            });
        };

        let path = options.output_dir.join(format!("{name}.toml"));
        if current_version(&path).as_deref() == Some(version.as_str()) {
            log::info!("{name} is already up to date at {version}");
            return Ok(BumpOutcome::UpToDate {
                name: name.to_owned(),
                version,
            });
        }

        log::info!("updating manifest for {name} to {version}");
        let urls = release_urls(package, &version)?;
        let digests = self.hash_archives(&urls, options.dry_run)?;
        let variants = RELEASE_TARGETS
            .iter()
            .zip(urls)
            .zip(digests)
            .map(|(((_, os, arch), url), digest)| PlatformVariant {
                os: *os,
                arch: *arch,
                url,
                digest,
            })
            .collect();
        let mut info = PackageInfo::new(name, version, package.license.clone());
        info.homepage = Some(package.homepage.clone());
        info.description = Some(package.description.clone());
        let manifest = Manifest::new(info, variants, package.install_steps()?)?;

        let rendered = render_manifest(&manifest)?;
        if options.dry_run {
            log::info!("dry run: would write {}:\n{rendered}", path.display());
        } else {
            write_manifest(&path, &rendered)?;
            log::info!("manifest written to {}", path.display());
        }
        Ok(BumpOutcome::Bumped { manifest, path })
    }

    /// SHA-256 each archive, downloading them concurrently.
    fn hash_archives(&self, urls: &[String], dry_run: bool) -> Result<Vec<ContentDigest>, BumpError> {
        if dry_run {
            return Ok(urls
                .iter()
                .map(|url| {
                    log::info!("dry run: would fetch {url}");
                    ContentDigest::of_bytes(DigestAlgorithm::Sha256, url.as_bytes())
                })
                .collect());
        }
        std::thread::scope(|scope| {
            let handles: Vec<_> = urls
                .iter()
                .map(|url| scope.spawn(move || self.fetch_and_hash(url)))
                .collect();
            handles
                .into_iter()
                .zip(urls)
                .map(|(handle, url)| {
                    handle.join().unwrap_or_else(|_| {
                        Err(BumpError::Fetch {
                            url: url.clone(),
                            source: FetchError::Transport {
                                url: url.clone(),
                                reason: "download thread panicked".to_owned(),
                            },
                        })
                    })
                })
                .collect()
        })
    }

    fn fetch_and_hash(&self, url: &str) -> Result<ContentDigest, BumpError> {
        log::info!("fetching archive from {url}");
        let io_error = |path: &Path, source| BumpError::Io {
            path: path.to_path_buf(),
            source,
        };
        let workspace = tempfile::tempdir().map_err(|source| io_error(Path::new(url), source))?;
        let archive = workspace.path().join("archive");
        let bytes = self
            .fetcher
            .fetch(url, &archive, &self.cancel)
            .map_err(|source| BumpError::Fetch {
                url: url.to_owned(),
                source,
            })?;
        let digest = ContentDigest::of_file(DigestAlgorithm::Sha256, &archive)
            .map_err(|source| io_error(&archive, source))?;
        log::info!("archive fetched ({bytes} bytes), sha256 {}", digest.hex());
        Ok(digest)
    }
}

/// Download URL of each release target, in [`RELEASE_TARGETS`] order.
///
/// # Errors
///
/// Returns [`BumpError::InvalidRepo`] for a malformed `repo`.
pub fn release_urls(package: &PackageSpec, version: &str) -> Result<Vec<String>, BumpError> {
    let (owner, name) = package.owner_and_name()?;
    RELEASE_TARGETS
        .iter()
        .map(|(target, _, _)| {
            let archive = package.archive_name(version, target)?;
            let url =
                format!("https://github.com/{owner}/{name}/releases/download/{version}/{archive}");
            log::debug!("release URL for {target}: {url}");
            Ok(url)
        })
        .collect()
}

/// Version recorded in the manifest at `path`, if it exists and parses.
fn current_version(path: &Path) -> Option<String> {
    if !path.exists() {
        return None;
    }
    match load_manifest(path) {
        Ok(manifest) => Some(manifest.version().to_owned()),
        Err(err) => {
            log::warn!("ignoring unreadable manifest: {err}");
            None
        }
    }
}

fn write_manifest(path: &Path, rendered: &str) -> Result<(), BumpError> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).map_err(|source| BumpError::Io {
            path: parent.to_path_buf(),
            source,
        })?;
    }
    std::fs::write(path, rendered).map_err(|source| BumpError::Io {
        path: path.to_path_buf(),
        source,
    })
}

#[cfg(test)]
#[path = "bump_tests.rs"]
mod tests;
