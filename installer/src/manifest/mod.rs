//! Package manifest model, digests, and the TOML manifest format.
//!
//! # Sub-modules
//!
//! - [`digest`] - content digest newtype with algorithm inference.
//! - [`error`] - validation errors.
//! - [`model`] - the immutable [`Manifest`](model::Manifest) and its parts.
//! - [`parser`] - TOML loading and rendering.

pub mod digest;
pub mod error;
pub mod model;
pub mod parser;

pub use model::{DestCategory, FilePlacement, Manifest, PackageInfo, PlatformVariant};
pub use parser::{ManifestParseError, load_manifest, parse_manifest, render_manifest};
