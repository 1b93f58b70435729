//! tap-installer library.
//!
//! This crate installs prebuilt command-line tools described by declarative
//! manifests: it selects the variant for the running platform, downloads it,
//! verifies its digest, extracts it, and places the declared files under a
//! prefix. It is used by the `tap-installer` CLI binary and can be consumed
//! programmatically for testing or custom installation workflows.
//!
//! # Modules
//!
//! - [`bump`] - Manifest regeneration from upstream GitHub releases
//! - [`cancel`] - Cooperative cancellation with an optional deadline
//! - [`cli`] - Command-line argument definitions
//! - [`config`] - Configuration file and install prefix resolution
//! - [`dirs`] - Directory resolution abstraction for platform-specific paths
//! - [`error`] - Crate-level error type for CLI commands
//! - [`extraction`] - Archive format detection and safe extraction
//! - [`fetch`] - HTTP downloads with timeout, retry, and cancellation
//! - [`layout`] - Destination directories for each file category
//! - [`list`] - Listing installed packages
//! - [`manifest`] - Manifest model, digests, and TOML format
//! - [`output`] - User-facing message formatting
//! - [`pipeline`] - The fetch, verify, extract, and place pipeline
//! - [`placement`] - Atomic file placement with permissions
//! - [`platform`] - Operating system and architecture identity
//! - [`receipt`] - Records of what each install wrote
//! - [`tap`] - Registry of manifest directories

pub mod bump;
pub mod cancel;
pub mod cli;
pub mod config;
pub mod dirs;
pub mod error;
pub mod extraction;
pub mod fetch;
pub mod layout;
pub mod list;
pub mod manifest;
pub mod output;
pub mod pipeline;
pub mod placement;
pub mod platform;
pub mod receipt;
pub mod tap;

#[cfg(any(test, feature = "test-support"))]
pub mod test_utils;
