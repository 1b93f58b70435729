//! Immutable manifest model.
//!
//! A [`Manifest`] describes one installable package: its identity, one
//! download variant per supported platform, and the ordered file placements
//! to perform after extraction. Construction validates every invariant, so
//! a `Manifest` value is always installable in principle.

use super::digest::ContentDigest;
use super::error::{ManifestError, Result};
use crate::platform::{Arch, Os, Platform};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;
use std::path::{Component, Path};

/// Destination category of an installed file.
///
/// The host environment maps each category to one directory; see
/// [`crate::layout::DestinationLayout`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum DestCategory {
    /// An executable placed in the bin directory.
    Executable,
    /// A manual page placed under `man<section>`.
    ManPage,
    /// A bash completion script.
    #[serde(alias = "shell-completion-bash")]
    CompletionBash,
    /// A zsh completion function.
    #[serde(alias = "shell-completion-zsh")]
    CompletionZsh,
    /// A fish completion script.
    #[serde(alias = "shell-completion-fish")]
    CompletionFish,
    /// Any other file, placed in the package's share directory.
    Other,
}

impl DestCategory {
    /// Return the manifest spelling of the category.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Executable => "executable",
            Self::ManPage => "man-page",
            Self::CompletionBash => "completion-bash",
            Self::CompletionZsh => "completion-zsh",
            Self::CompletionFish => "completion-fish",
            Self::Other => "other",
        }
    }

    /// Whether files in this category must be executable.
    #[must_use]
    pub const fn is_executable(self) -> bool {
        matches!(self, Self::Executable)
    }
}

impl fmt::Display for DestCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A platform-specific download of the package archive.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PlatformVariant {
    /// Target operating system.
    pub os: Os,
    /// Target CPU architecture.
    pub arch: Arch,
    /// Download location of the archive.
    pub url: String,
    /// Expected digest of the archive bytes.
    pub digest: ContentDigest,
}

impl PlatformVariant {
    /// Return the `(os, arch)` pair this variant serves.
    #[must_use]
    pub const fn platform(&self) -> Platform {
        Platform::new(self.os, self.arch)
    }

    /// Return the last path segment of the URL, ignoring query and fragment.
    ///
    /// # Examples
    ///
    /// ```
    /// use tap_installer::manifest::digest::ContentDigest;
    /// use tap_installer::manifest::model::PlatformVariant;
    /// use tap_installer::platform::{Arch, Os};
    ///
    /// let variant = PlatformVariant {
    ///     os: Os::Linux,
    ///     arch: Arch::X86_64,
    ///     url: "https://example.test/dl/tool-1.0.tar.gz?raw=1".to_owned(),
    ///     digest: ContentDigest::parse(&"a".repeat(64)).expect("digest"),
    /// };
    /// assert_eq!(variant.file_name(), "tool-1.0.tar.gz");
    /// ```
    #[must_use]
    pub fn file_name(&self) -> &str {
        let without_query = self
            .url
            .split(['?', '#'])
            .next()
            .unwrap_or(self.url.as_str());
        without_query
            .trim_end_matches('/')
            .rsplit('/')
            .next()
            .unwrap_or(without_query)
    }
}

/// One file to copy from the extracted archive into a host directory.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FilePlacement {
    /// Relative path of the file inside the extracted archive.
    #[serde(rename = "source")]
    pub source_path: String,
    /// Which host directory receives the file.
    #[serde(rename = "category")]
    pub dest_category: DestCategory,
    /// Optional file name at the destination; defaults to the source name.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dest_name: Option<String>,
}

impl FilePlacement {
    /// Create a placement that keeps the source file name.
    #[must_use]
    pub fn new(source_path: impl Into<String>, dest_category: DestCategory) -> Self {
        Self {
            source_path: source_path.into(),
            dest_category,
            dest_name: None,
        }
    }

    /// Rename the file at its destination.
    #[must_use]
    pub fn renamed(mut self, dest_name: impl Into<String>) -> Self {
        self.dest_name = Some(dest_name.into());
        self
    }

    /// Return the file name written at the destination.
    #[must_use]
    pub fn target_file_name(&self) -> &str {
        match &self.dest_name {
            Some(name) => name,
            None => Path::new(&self.source_path)
                .file_name()
                .and_then(|name| name.to_str())
                .unwrap_or(&self.source_path),
        }
    }
}

/// Identity and descriptive fields of a package.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PackageInfo {
    /// Package identifier, also the receipt and manifest file stem.
    pub name: String,
    /// Release version.
    pub version: String,
    /// SPDX licence expression or free-form licence name.
    pub license: String,
    /// Project homepage.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub homepage: Option<String>,
    /// One-line description.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

impl PackageInfo {
    /// Create package info without the optional descriptive fields.
    #[must_use]
    pub fn new(
        name: impl Into<String>,
        version: impl Into<String>,
        license: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            version: version.into(),
            license: license.into(),
            homepage: None,
            description: None,
        }
    }
}

/// A validated, immutable package manifest.
///
/// # Examples
///
/// ```
/// use tap_installer::manifest::digest::ContentDigest;
/// use tap_installer::manifest::model::{
///     DestCategory, FilePlacement, Manifest, PackageInfo, PlatformVariant,
/// };
/// use tap_installer::platform::{Arch, Os, Platform};
///
/// let manifest = Manifest::new(
///     PackageInfo::new("tool", "1.2.0", "MIT"),
///     vec![PlatformVariant {
///         os: Os::Linux,
///         arch: Arch::X86_64,
///         url: "https://example.test/tool.tar.gz".to_owned(),
///         digest: ContentDigest::parse(&"a".repeat(64)).expect("digest"),
///     }],
///     vec![FilePlacement::new("tool", DestCategory::Executable)],
/// )
/// .expect("valid manifest");
///
/// let linux = Platform::new(Os::Linux, Arch::X86_64);
/// assert!(manifest.variant_for(linux).is_some());
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Manifest {
    info: PackageInfo,
    variants: Vec<PlatformVariant>,
    install_steps: Vec<FilePlacement>,
}

impl Manifest {
    /// Validate and assemble a manifest.
    ///
    /// # Errors
    ///
    /// Returns a [`ManifestError`] when a field is empty or malformed, when
    /// variants or install steps are missing, when two variants share a
    /// platform, or when a placement path is unsafe.
    pub fn new(
        info: PackageInfo,
        variants: Vec<PlatformVariant>,
        install_steps: Vec<FilePlacement>,
    ) -> Result<Self> {
        validate_identifier("name", &info.name)?;
        validate_identifier("version", &info.version)?;
        if info.license.trim().is_empty() {
            return Err(ManifestError::InvalidField {
                field: "license",
                reason: "must not be empty".to_owned(),
            });
        }
        validate_variants(&variants)?;
        validate_steps(&install_steps)?;

        Ok(Self {
            info,
            variants,
            install_steps,
        })
    }

    /// Return the package name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.info.name
    }

    /// Return the package version.
    #[must_use]
    pub fn version(&self) -> &str {
        &self.info.version
    }

    /// Return the licence.
    #[must_use]
    pub fn license(&self) -> &str {
        &self.info.license
    }

    /// Return the identity and descriptive fields.
    #[must_use]
    pub fn info(&self) -> &PackageInfo {
        &self.info
    }

    /// Return the platform variants in declaration order.
    #[must_use]
    pub fn variants(&self) -> &[PlatformVariant] {
        &self.variants
    }

    /// Return the install steps in declaration order.
    #[must_use]
    pub fn install_steps(&self) -> &[FilePlacement] {
        &self.install_steps
    }

    /// Return the first variant serving `platform`.
    #[must_use]
    pub fn variant_for(&self, platform: Platform) -> Option<&PlatformVariant> {
        self.variants
            .iter()
            .find(|variant| variant.platform() == platform)
    }

    /// Return every platform the manifest can be installed on.
    #[must_use]
    pub fn platforms(&self) -> Vec<Platform> {
        self.variants.iter().map(PlatformVariant::platform).collect()
    }
}

pub(crate) fn validate_identifier(field: &'static str, value: &str) -> Result<()> {
    if value.is_empty() {
        return Err(ManifestError::InvalidField {
            field,
            reason: "must not be empty".to_owned(),
        });
    }
    if let Some(bad) = value
        .chars()
        .find(|c| c.is_whitespace() || matches!(c, '/' | '\\'))
    {
        return Err(ManifestError::InvalidField {
            field,
            reason: format!("contains forbidden character {bad:?}"),
        });
    }
    if value == "." || value == ".." {
        return Err(ManifestError::InvalidField {
            field,
            reason: "must not be a relative path component".to_owned(),
        });
    }
    Ok(())
}

fn validate_variants(variants: &[PlatformVariant]) -> Result<()> {
    if variants.is_empty() {
        return Err(ManifestError::NoVariants);
    }
    let mut seen = HashSet::new();
    for variant in variants {
        if variant.url.trim().is_empty() {
            return Err(ManifestError::InvalidField {
                field: "url",
                reason: format!("variant {} has an empty url", variant.platform()),
            });
        }
        if !seen.insert(variant.platform()) {
            return Err(ManifestError::DuplicateVariant {
                platform: variant.platform().to_string(),
            });
        }
    }
    Ok(())
}

fn validate_steps(steps: &[FilePlacement]) -> Result<()> {
    if steps.is_empty() {
        return Err(ManifestError::NoInstallSteps);
    }
    for step in steps {
        if !is_contained_relative_path(Path::new(&step.source_path)) {
            return Err(ManifestError::UnsafeSourcePath {
                path: step.source_path.clone(),
            });
        }
        if let Some(name) = &step.dest_name {
            let is_plain = !name.is_empty()
                && name != "."
                && name != ".."
                && !name.contains(['/', '\\']);
            if !is_plain {
                return Err(ManifestError::InvalidDestName { name: name.clone() });
            }
        }
    }
    Ok(())
}

/// Whether `path` is non-empty, relative, and free of `..` components.
pub(crate) fn is_contained_relative_path(path: &Path) -> bool {
    let mut has_normal = false;
    for component in path.components() {
        match component {
            Component::Normal(_) => has_normal = true,
            Component::CurDir => {}
            Component::ParentDir | Component::RootDir | Component::Prefix(_) => return false,
        }
    }
    has_normal
}
