//! Error types for manifest validation and loading.
//!
//! Each variant names the offending value and the constraint it violates so
//! that a broken tap manifest can be fixed without reading the loader.

use thiserror::Error;

/// Errors arising from invalid manifest values.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ManifestError {
    /// A required string field is empty or contains forbidden characters.
    #[error("invalid manifest field `{field}`: {reason}")]
    InvalidField {
        /// The manifest key that failed validation.
        field: &'static str,
        /// Description of the validation failure.
        reason: String,
    },

    /// A content digest is empty or not recognisable as a supported hash.
    #[error("invalid digest \"{value}\": {reason}")]
    InvalidDigest {
        /// The rejected digest text.
        value: String,
        /// Description of the validation failure.
        reason: String,
    },

    /// An operating system name is not one of the supported values.
    #[error("unsupported operating system \"{value}\"; expected one of: {expected}")]
    UnknownOs {
        /// The rejected value.
        value: String,
        /// Comma-separated list of accepted names.
        expected: String,
    },

    /// An architecture name is not one of the supported values.
    #[error("unsupported architecture \"{value}\"; expected one of: {expected}")]
    UnknownArch {
        /// The rejected value.
        value: String,
        /// Comma-separated list of accepted names.
        expected: String,
    },

    /// A platform string is not of the form `os/arch`.
    #[error("invalid platform \"{value}\"; expected `os/arch`, e.g. `linux/x86_64`")]
    InvalidPlatform {
        /// The rejected value.
        value: String,
    },

    /// The manifest declares no platform variants.
    #[error("manifest declares no platform variants")]
    NoVariants,

    /// The manifest declares no install steps.
    #[error("manifest declares no install steps")]
    NoInstallSteps,

    /// Two variants target the same platform.
    #[error("duplicate variant for platform {platform}")]
    DuplicateVariant {
        /// The platform declared twice, formatted as `os/arch`.
        platform: String,
    },

    /// An install step's source path is absolute or escapes the archive root.
    #[error("install source \"{path}\" must be a relative path inside the archive")]
    UnsafeSourcePath {
        /// The offending source path.
        path: String,
    },

    /// An install step's destination name is not a bare file name.
    #[error("destination name \"{name}\" must be a plain file name")]
    InvalidDestName {
        /// The offending destination name.
        name: String,
    },
}

/// Result type alias using [`ManifestError`].
pub type Result<T> = std::result::Result<T, ManifestError>;
