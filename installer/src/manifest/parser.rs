//! TOML manifest loading and rendering.
//!
//! The on-disk document mirrors [`Manifest`] with top-level package fields,
//! a `[[variant]]` array, and an `[[install]]` array. Unknown keys are
//! rejected so that typos fail loudly instead of silently dropping data.

use super::error::ManifestError;
use super::model::{FilePlacement, Manifest, PackageInfo, PlatformVariant};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Errors arising from reading or parsing a manifest file.
#[derive(Debug, thiserror::Error)]
pub enum ManifestParseError {
    /// The manifest file could not be read.
    #[error("failed to read manifest {path}: {source}")]
    Read {
        /// The manifest path.
        path: PathBuf,
        /// The underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// TOML syntax or field deserialisation failed.
    #[error("manifest parse error: {0}")]
    Toml(#[from] toml::de::Error),

    /// The document parsed but violates a manifest invariant.
    #[error(transparent)]
    Invalid(#[from] ManifestError),

    /// Rendering a manifest back to TOML failed.
    #[error("manifest render error: {0}")]
    Render(#[from] toml::ser::Error),
}

/// Serialised form of a manifest.
#[derive(Debug, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
struct ManifestDocument {
    name: String,
    version: String,
    license: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    homepage: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    description: Option<String>,
    #[serde(rename = "variant", default)]
    variants: Vec<PlatformVariant>,
    #[serde(rename = "install", default)]
    install_steps: Vec<FilePlacement>,
}

/// Parse TOML text into a validated [`Manifest`].
///
/// # Errors
///
/// Returns an error if the TOML is malformed, a field has the wrong type or
/// an unknown key, or the result violates a manifest invariant.
///
/// # Examples
///
/// ```
/// use tap_installer::manifest::parser::parse_manifest;
///
/// let text = format!(
///     r#"
/// name = "tool"
/// version = "1.0.0"
/// license = "MIT"
///
/// [[variant]]
/// os = "linux"
/// arch = "x86_64"
/// url = "https://example.test/tool.tar.gz"
/// digest = "{}"
///
/// [[install]]
/// source = "tool"
/// category = "executable"
/// "#,
///     "a".repeat(64)
/// );
/// let manifest = parse_manifest(&text).expect("valid manifest");
/// assert_eq!(manifest.name(), "tool");
/// ```
pub fn parse_manifest(text: &str) -> Result<Manifest, ManifestParseError> {
    let document: ManifestDocument = toml::from_str(text)?;
    let info = PackageInfo {
        name: document.name,
        version: document.version,
        license: document.license,
        homepage: document.homepage,
        description: document.description,
    };
    Ok(Manifest::new(info, document.variants, document.install_steps)?)
}

/// Read and parse the manifest at `path`.
///
/// # Errors
///
/// Returns [`ManifestParseError::Read`] if the file cannot be read, or any
/// error from [`parse_manifest`].
pub fn load_manifest(path: &Path) -> Result<Manifest, ManifestParseError> {
    let text = std::fs::read_to_string(path).map_err(|source| ManifestParseError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    let manifest = parse_manifest(&text)?;
    log::debug!(
        "loaded manifest {} {} from {}",
        manifest.name(),
        manifest.version(),
        path.display()
    );
    Ok(manifest)
}

/// Render a manifest as TOML accepted by [`parse_manifest`].
///
/// # Errors
///
/// Returns [`ManifestParseError::Render`] if serialisation fails.
pub fn render_manifest(manifest: &Manifest) -> Result<String, ManifestParseError> {
    let info = manifest.info().clone();
    let document = ManifestDocument {
        name: info.name,
        version: info.version,
        license: info.license,
        homepage: info.homepage,
        description: info.description,
        variants: manifest.variants().to_vec(),
        install_steps: manifest.install_steps().to_vec(),
    };
    Ok(toml::to_string_pretty(&document)?)
}

#[cfg(test)]
#[path = "manifest_tests.rs"]
mod tests;
