//! Error types for the tap-installer CLI.
//!
//! Each library module has its own error enum; [`InstallerError`] wraps them
//! so the binary can report any failure through one `Display` chain.

use crate::bump::BumpError;
use crate::config::ConfigError;
use crate::manifest::ManifestParseError;
use crate::manifest::error::ManifestError;
use crate::pipeline::{InstallError, UninstallError};
use crate::receipt::ReceiptError;
use crate::tap::TapError;
use thiserror::Error;

/// Errors surfaced by CLI commands.
#[derive(Debug, Error)]
pub enum InstallerError {
    /// A manifest could not be loaded.
    #[error(transparent)]
    Manifest(#[from] ManifestParseError),

    /// A command-line value failed validation.
    #[error("invalid argument: {0}")]
    InvalidArgument(#[from] ManifestError),

    /// The install pipeline failed.
    #[error("install failed at {step} step: {0}", step = .0.step())]
    Install(#[from] InstallError),

    /// Removing installed files failed.
    #[error("uninstall failed: {0}")]
    Uninstall(#[from] UninstallError),

    /// Reading or writing install receipts failed.
    #[error(transparent)]
    Receipt(#[from] ReceiptError),

    /// A tap registry operation failed.
    #[error(transparent)]
    Tap(#[from] TapError),

    /// Configuration could not be loaded.
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// Manifest regeneration failed.
    #[error("bump failed: {0}")]
    Bump(#[from] BumpError),

    /// No registered tap provides the requested package.
    #[error("no manifest named {name} in any registered tap; add one with `tap-installer tap add <DIR>`")]
    PackageNotFound {
        /// The requested package name.
        name: String,
    },

    /// The package has no install receipt.
    #[error("{name} is not installed")]
    NotInstalled {
        /// The requested package name.
        name: String,
    },

    /// The host platform cannot be targeted by manifests.
    #[error("unsupported host platform; pass --platform OS/ARCH")]
    UnsupportedHost,

    /// `bump` needs a GitHub token.
    #[error("GITHUB_TOKEN is not set")]
    MissingToken,

    /// Failed to write command output.
    #[error("failed to write output")]
    WriteFailed {
        /// The underlying error that caused the write to fail.
        #[source]
        source: std::io::Error,
    },

    /// An I/O operation failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type alias using [`InstallerError`].
pub type Result<T> = std::result::Result<T, InstallerError>;
