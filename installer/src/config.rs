//! Installer configuration.
//!
//! Settings come from an optional TOML file, by default
//! `<config_dir>/config.toml`. The install prefix is resolved in order from
//! the `--prefix` flag, the `TAP_INSTALLER_PREFIX` environment variable, the
//! file's `prefix` key, and finally `~/.local`.

use crate::cancel::CancellationToken;
use crate::dirs::BaseDirs;
use crate::fetch::{DEFAULT_TIMEOUT, RetryPolicy};
use crate::layout::DestinationLayout;
use camino::{Utf8Path, Utf8PathBuf};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Environment variable overriding the install prefix.
pub const PREFIX_ENV: &str = "TAP_INSTALLER_PREFIX";

const CONFIG_FILENAME: &str = "config.toml";

/// Default bound on a whole install, from first request to last placed file.
pub const DEFAULT_INSTALL_TIMEOUT: Duration = Duration::from_secs(30 * 60);

/// Errors from loading configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// The configuration file could not be read.
    #[error("failed to read config {path}: {source}")]
    Read {
        /// The configuration file.
        path: PathBuf,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// The configuration file is not valid.
    #[error("invalid config {path}: {source}")]
    Parse {
        /// The configuration file.
        path: PathBuf,
        /// Underlying TOML error.
        #[source]
        source: toml::de::Error,
    },

    /// No prefix was configured and no home directory is known.
    #[error("could not determine an install prefix; pass --prefix or set {PREFIX_ENV}")]
    NoPrefix,

    /// A relative path could not be made absolute.
    #[error("could not make {path} absolute: {source}")]
    Absolute {
        /// The relative path.
        path: Utf8PathBuf,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// A configured path is not valid UTF-8.
    #[error("path is not valid UTF-8: {}", .path.display())]
    NonUtf8Path {
        /// The offending path.
        path: PathBuf,
    },
}

/// Contents of `config.toml`. Every key is optional.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    /// Install prefix.
    pub prefix: Option<Utf8PathBuf>,
    /// Overrides `<prefix>/bin`.
    pub bin_dir: Option<Utf8PathBuf>,
    /// Overrides `<prefix>/share/man`.
    pub man_dir: Option<Utf8PathBuf>,
    /// Overrides the bash completion directory.
    pub bash_completion_dir: Option<Utf8PathBuf>,
    /// Overrides the zsh completion directory.
    pub zsh_completion_dir: Option<Utf8PathBuf>,
    /// Overrides the fish completion directory.
    pub fish_completion_dir: Option<Utf8PathBuf>,
    /// Overrides `<prefix>/share`.
    pub share_dir: Option<Utf8PathBuf>,
    /// Per-attempt download timeout in seconds.
    pub fetch_timeout_secs: Option<u64>,
    /// Total download attempts.
    pub retry_attempts: Option<u32>,
    /// Delay before the first retry, in milliseconds.
    pub retry_backoff_millis: Option<u64>,
    /// Bound on a whole install in seconds.
    pub install_timeout_secs: Option<u64>,
}

impl Config {
    /// Parse configuration from TOML text.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Parse`] for malformed TOML or unknown keys.
    pub fn parse(text: &str, origin: &Path) -> Result<Self, ConfigError> {
        toml::from_str(text).map_err(|source| ConfigError::Parse {
            path: origin.to_path_buf(),
            source,
        })
    }

    /// Load configuration from `path`.
    ///
    /// # Errors
    ///
    /// Returns an error when the file cannot be read or parsed.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        log::debug!("loaded config from {}", path.display());
        Self::parse(&text, path)
    }

    /// Load `explicit` if given, else the default file if it exists, else
    /// defaults.
    ///
    /// # Errors
    ///
    /// Returns an error when an explicit file is missing or any chosen file
    /// is invalid.
    pub fn discover(explicit: Option<&Path>, dirs: &dyn BaseDirs) -> Result<Self, ConfigError> {
        if let Some(path) = explicit {
            return Self::load(path);
        }
        match dirs.config_dir().map(|dir| dir.join(CONFIG_FILENAME)) {
            Some(path) if path.is_file() => Self::load(&path),
            _ => Ok(Self::default()),
        }
    }

    /// Resolve the install prefix.
    ///
    /// Relative values are resolved against the current directory.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::NoPrefix`] when nothing provides a prefix,
    /// [`ConfigError::NonUtf8Path`] for a non-UTF-8 environment value or
    /// home directory, or [`ConfigError::Absolute`] when the current
    /// directory is unavailable.
    pub fn resolve_prefix(
        &self,
        flag: Option<&Utf8Path>,
        dirs: &dyn BaseDirs,
    ) -> Result<Utf8PathBuf, ConfigError> {
        let prefix = if let Some(prefix) = flag {
            prefix.to_owned()
        } else if let Some(value) = std::env::var_os(PREFIX_ENV).filter(|value| !value.is_empty())
        {
            utf8(PathBuf::from(value))?
        } else if let Some(prefix) = &self.prefix {
            prefix.clone()
        } else {
            dirs.default_prefix()
                .ok_or(ConfigError::NoPrefix)
                .and_then(utf8)?
        };
        absolute(&prefix)
    }

    /// Destination layout below `prefix` with this file's overrides applied.
    ///
    /// Relative overrides are resolved against the current directory.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Absolute`] when a relative directory cannot be
    /// resolved.
    pub fn layout(&self, prefix: &Utf8Path) -> Result<DestinationLayout, ConfigError> {
        let mut layout = DestinationLayout::from_prefix(&absolute(prefix)?);
        let overrides = [
            (&self.bin_dir, &mut layout.bin_dir),
            (&self.man_dir, &mut layout.man_dir),
            (&self.bash_completion_dir, &mut layout.bash_completion_dir),
            (&self.zsh_completion_dir, &mut layout.zsh_completion_dir),
            (&self.fish_completion_dir, &mut layout.fish_completion_dir),
            (&self.share_dir, &mut layout.share_dir),
        ];
        for (setting, slot) in overrides {
            if let Some(dir) = setting {
                *slot = absolute(dir)?;
            }
        }
        Ok(layout)
    }

    /// Bound on a whole install.
    #[must_use]
    pub fn install_timeout(&self) -> Duration {
        self.install_timeout_secs
            .map_or(DEFAULT_INSTALL_TIMEOUT, Duration::from_secs)
    }

    /// Cancellation token expiring after [`Config::install_timeout`].
    #[must_use]
    pub fn install_cancellation(&self) -> CancellationToken {
        CancellationToken::with_timeout(self.install_timeout())
    }

    /// Per-attempt download timeout.
    #[must_use]
    pub fn fetch_timeout(&self) -> Duration {
        self.fetch_timeout_secs
            .map_or(DEFAULT_TIMEOUT, Duration::from_secs)
    }

    /// Retry policy for downloads.
    #[must_use]
    pub fn retry_policy(&self) -> RetryPolicy {
        let defaults = RetryPolicy::default();
        RetryPolicy {
            max_attempts: self.retry_attempts.unwrap_or(defaults.max_attempts),
            initial_backoff: self
                .retry_backoff_millis
                .map_or(defaults.initial_backoff, Duration::from_millis),
            max_backoff: defaults.max_backoff,
        }
    }
}

fn absolute(path: &Utf8Path) -> Result<Utf8PathBuf, ConfigError> {
    if path.is_absolute() {
        return Ok(path.to_owned());
    }
    let resolved = std::path::absolute(path).map_err(|source| ConfigError::Absolute {
        path: path.to_owned(),
        source,
    })?;
    utf8(resolved)
}

fn utf8(path: PathBuf) -> Result<Utf8PathBuf, ConfigError> {
    Utf8PathBuf::from_path_buf(path).map_err(|path| ConfigError::NonUtf8Path { path })
}
