//! Platform identity: operating system and CPU architecture.
//!
//! Manifests key their download variants by `(os, arch)`. The host platform
//! is derived from the compile-time target, and a platform can also be
//! parsed from `os/arch` text for explicit overrides.

use crate::manifest::error::{ManifestError, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Supported operating systems.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Os {
    /// Apple macOS.
    #[serde(rename = "macos", alias = "darwin", alias = "mac")]
    MacOs,
    /// Linux.
    Linux,
}

/// Supported CPU architectures.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Arch {
    /// 64-bit x86, also known as amd64 or "intel".
    #[serde(rename = "x86_64", alias = "amd64", alias = "intel")]
    X86_64,
    /// 64-bit ARM, also known as aarch64.
    #[serde(rename = "arm64", alias = "aarch64", alias = "arm")]
    Arm64,
}

impl Os {
    const ALL: [Self; 2] = [Self::MacOs, Self::Linux];

    /// Return the canonical manifest spelling.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::MacOs => "macos",
            Self::Linux => "linux",
        }
    }

    /// Return the operating system this binary was compiled for, if supported.
    #[must_use]
    pub fn host() -> Option<Self> {
        std::env::consts::OS.parse().ok()
    }
}

impl Arch {
    const ALL: [Self; 2] = [Self::X86_64, Self::Arm64];

    /// Return the canonical manifest spelling.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::X86_64 => "x86_64",
            Self::Arm64 => "arm64",
        }
    }

    /// Return the architecture this binary was compiled for, if supported.
    #[must_use]
    pub fn host() -> Option<Self> {
        std::env::consts::ARCH.parse().ok()
    }
}

impl FromStr for Os {
    type Err = ManifestError;

    fn from_str(value: &str) -> Result<Self> {
        match value.to_ascii_lowercase().as_str() {
            "macos" | "darwin" | "mac" => Ok(Self::MacOs),
            "linux" => Ok(Self::Linux),
            _ => Err(ManifestError::UnknownOs {
                value: value.to_owned(),
                expected: join_names(Self::ALL.iter().map(|os| os.as_str())),
            }),
        }
    }
}

impl FromStr for Arch {
    type Err = ManifestError;

    fn from_str(value: &str) -> Result<Self> {
        match value.to_ascii_lowercase().as_str() {
            "x86_64" | "amd64" | "intel" => Ok(Self::X86_64),
            "arm64" | "aarch64" | "arm" => Ok(Self::Arm64),
            _ => Err(ManifestError::UnknownArch {
                value: value.to_owned(),
                expected: join_names(Self::ALL.iter().map(|arch| arch.as_str())),
            }),
        }
    }
}

fn join_names<'a>(names: impl Iterator<Item = &'a str>) -> String {
    names.collect::<Vec<_>>().join(", ")
}

impl fmt::Display for Os {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl fmt::Display for Arch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An `(os, arch)` pair identifying where a package is being installed.
///
/// # Examples
///
/// ```
/// use tap_installer::platform::{Arch, Os, Platform};
///
/// let platform: Platform = "linux/aarch64".parse().expect("valid platform");
/// assert_eq!(platform, Platform::new(Os::Linux, Arch::Arm64));
/// assert_eq!(platform.to_string(), "linux/arm64");
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Platform {
    /// Operating system.
    pub os: Os,
    /// CPU architecture.
    pub arch: Arch,
}

impl Platform {
    /// Create a platform from its parts.
    #[must_use]
    pub const fn new(os: Os, arch: Arch) -> Self {
        Self { os, arch }
    }

    /// Detect the platform this binary was compiled for.
    ///
    /// Returns `None` on hosts no manifest can target (for example Windows).
    #[must_use]
    pub fn current() -> Option<Self> {
        Some(Self::new(Os::host()?, Arch::host()?))
    }
}

impl FromStr for Platform {
    type Err = ManifestError;

    fn from_str(value: &str) -> Result<Self> {
        let (os, arch) = value
            .split_once('/')
            .or_else(|| value.split_once('-'))
            .ok_or_else(|| ManifestError::InvalidPlatform {
                value: value.to_owned(),
            })?;
        Ok(Self::new(os.trim().parse()?, arch.trim().parse()?))
    }
}

impl fmt::Display for Platform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.os, self.arch)
    }
}
