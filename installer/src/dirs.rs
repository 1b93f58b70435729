//! Directory resolution abstraction for platform-specific paths.
//!
//! The installer needs the user's home directory (for the default install
//! prefix), a configuration directory, and a data directory for receipts and
//! the tap registry. [`BaseDirs`] hides `directories-next` so tests can
//! substitute fixed paths.

use std::path::PathBuf;

const APPLICATION: &str = "tap-installer";

/// Source of the platform directories the installer depends on.
#[cfg_attr(test, mockall::automock)]
pub trait BaseDirs {
    /// The current user's home directory.
    fn home_dir(&self) -> Option<PathBuf>;

    /// Directory holding `config.toml`.
    fn config_dir(&self) -> Option<PathBuf>;

    /// Directory holding receipts and the tap registry.
    fn data_dir(&self) -> Option<PathBuf>;

    /// Default install prefix, `~/.local` unless overridden.
    fn default_prefix(&self) -> Option<PathBuf> {
        self.home_dir().map(|home| home.join(".local"))
    }
}

/// [`BaseDirs`] backed by `directories-next`.
///
/// # Examples
///
/// ```
/// use tap_installer::dirs::{BaseDirs, SystemBaseDirs};
///
/// let dirs = SystemBaseDirs;
/// if let Some(data) = dirs.data_dir() {
///     assert!(data.to_string_lossy().contains("tap-installer"));
/// }
/// ```
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemBaseDirs;

impl SystemBaseDirs {
    fn project_dirs() -> Option<directories_next::ProjectDirs> {
        directories_next::ProjectDirs::from("", "", APPLICATION)
    }
}

impl BaseDirs for SystemBaseDirs {
    fn home_dir(&self) -> Option<PathBuf> {
        directories_next::BaseDirs::new().map(|dirs| dirs.home_dir().to_path_buf())
    }

    fn config_dir(&self) -> Option<PathBuf> {
        Self::project_dirs().map(|dirs| dirs.config_dir().to_path_buf())
    }

    fn data_dir(&self) -> Option<PathBuf> {
        Self::project_dirs().map(|dirs| dirs.data_dir().to_path_buf())
    }
}
