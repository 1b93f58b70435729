//! Registry of manifest source directories ("taps").
//!
//! The registry is a JSON list stored at `<data_dir>/taps.json`. Lookup by
//! package name searches each tap in registration order for `<name>.toml`,
//! either directly in the tap or in its `Manifests/` subdirectory.

use crate::dirs::BaseDirs;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

const REGISTRY_FILENAME: &str = "taps.json";
const MANIFESTS_DIRNAME: &str = "Manifests";

/// Errors from tap registry operations.
#[derive(Debug, thiserror::Error)]
pub enum TapError {
    /// The data directory could not be resolved.
    #[error("could not determine the tap-installer data directory")]
    MissingDataDirectory,

    /// The tap directory does not exist or is not a directory.
    #[error("tap directory {path} does not exist")]
    NotADirectory {
        /// The rejected path.
        path: PathBuf,
    },

    /// The tap is not registered.
    #[error("tap {path} is not registered")]
    NotRegistered {
        /// The path that was not found.
        path: PathBuf,
    },

    /// A filesystem operation failed.
    #[error("tap registry I/O error at {path}: {source}")]
    Io {
        /// Path involved in the failure.
        path: PathBuf,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// The registry file is not valid JSON.
    #[error("malformed tap registry {path}: {source}")]
    Malformed {
        /// The registry file.
        path: PathBuf,
        /// Underlying parse error.
        #[source]
        source: serde_json::Error,
    },
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct RegistryFile {
    taps: Vec<PathBuf>,
}

/// Ordered set of registered tap directories.
#[derive(Debug)]
pub struct TapRegistry {
    path: PathBuf,
    taps: Vec<PathBuf>,
}

impl TapRegistry {
    /// Open the registry stored at `path`; a missing file is an empty
    /// registry.
    ///
    /// # Errors
    ///
    /// Returns an error when the file exists but cannot be read or parsed.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self, TapError> {
        let path = path.into();
        if !path.exists() {
            return Ok(Self {
                path,
                taps: Vec::new(),
            });
        }
        let content = fs::read_to_string(&path).map_err(|source| TapError::Io {
            path: path.clone(),
            source,
        })?;
        let file: RegistryFile =
            serde_json::from_str(&content).map_err(|source| TapError::Malformed {
                path: path.clone(),
                source,
            })?;
        Ok(Self {
            path,
            taps: file.taps,
        })
    }

    /// Open the registry in the platform data directory.
    ///
    /// # Errors
    ///
    /// Returns [`TapError::MissingDataDirectory`] when no data directory can
    /// be resolved, or any error from [`TapRegistry::open`].
    pub fn from_dirs(dirs: &dyn BaseDirs) -> Result<Self, TapError> {
        let data_dir = dirs.data_dir().ok_or(TapError::MissingDataDirectory)?;
        Self::open(data_dir.join(REGISTRY_FILENAME))
    }

    /// Registered taps in lookup order.
    #[must_use]
    pub fn taps(&self) -> &[PathBuf] {
        &self.taps
    }

    /// Register `dir`. Returns `false` if it was already registered.
    ///
    /// # Errors
    ///
    /// Returns [`TapError::NotADirectory`] if `dir` cannot be canonicalised
    /// to an existing directory, or an I/O error from saving.
    pub fn add(&mut self, dir: &Path) -> Result<bool, TapError> {
        let canonical = canonical_dir(dir)?;
        if self.taps.contains(&canonical) {
            return Ok(false);
        }
        log::info!("registering tap {}", canonical.display());
        self.taps.push(canonical);
        self.save()?;
        Ok(true)
    }

    /// Unregister `dir`.
    ///
    /// # Errors
    ///
    /// Returns [`TapError::NotRegistered`] if `dir` is not in the registry.
    pub fn remove(&mut self, dir: &Path) -> Result<(), TapError> {
        let key = fs::canonicalize(dir).unwrap_or_else(|_| dir.to_path_buf());
        let before = self.taps.len();
        self.taps.retain(|tap| tap != &key && tap != dir);
        if self.taps.len() == before {
            return Err(TapError::NotRegistered {
                path: dir.to_path_buf(),
            });
        }
        self.save()
    }

    /// Locate the manifest for `name` in the first tap that provides it.
    #[must_use]
    pub fn find(&self, name: &str) -> Option<PathBuf> {
        let file_name = format!("{name}.toml");
        self.taps.iter().find_map(|tap| {
            [tap.join(&file_name), tap.join(MANIFESTS_DIRNAME).join(&file_name)]
                .into_iter()
                .find(|candidate| candidate.is_file())
        })
    }

    fn save(&self) -> Result<(), TapError> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent).map_err(|source| TapError::Io {
                path: parent.to_path_buf(),
                source,
            })?;
        }
        let file = RegistryFile {
            taps: self.taps.clone(),
        };
        let json = serde_json::to_string_pretty(&file).map_err(|source| TapError::Malformed {
            path: self.path.clone(),
            source,
        })?;
        fs::write(&self.path, json).map_err(|source| TapError::Io {
            path: self.path.clone(),
            source,
        })
    }
}

fn canonical_dir(dir: &Path) -> Result<PathBuf, TapError> {
    match fs::canonicalize(dir) {
        Ok(path) if path.is_dir() => Ok(path),
        _ => Err(TapError::NotADirectory {
            path: dir.to_path_buf(),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::{fixture, rstest};

    struct Fixture {
        _temp: tempfile::TempDir,
        root: PathBuf,
        registry_path: PathBuf,
    }

    #[fixture]
    fn sandbox() -> Fixture {
        let temp = tempfile::tempdir().expect("temp dir");
        let root = fs::canonicalize(temp.path()).expect("canonical temp");
        let registry_path = root.join("data").join(REGISTRY_FILENAME);
        Fixture {
            _temp: temp,
            root,
            registry_path,
        }
    }

    fn make_tap(root: &Path, name: &str, manifests: &[&str], nested: bool) -> PathBuf {
        let tap = root.join(name);
        let dir = if nested {
            tap.join(MANIFESTS_DIRNAME)
        } else {
            tap.clone()
        };
        fs::create_dir_all(&dir).expect("mkdir tap");
        for manifest in manifests {
            fs::write(dir.join(format!("{manifest}.toml")), "").expect("write manifest");
        }
        tap
    }

    #[rstest]
    fn add_persists_and_deduplicates(sandbox: Fixture) {
        let tap = make_tap(&sandbox.root, "tap-a", &["rg"], false);
        let mut registry = TapRegistry::open(&sandbox.registry_path).expect("open");

        assert!(registry.add(&tap).expect("first add"));
        assert!(!registry.add(&tap.join(".")).expect("second add"));

        let reopened = TapRegistry::open(&sandbox.registry_path).expect("reopen");
        assert_eq!(reopened.taps(), &[tap]);
    }

    #[rstest]
    fn add_rejects_missing_directory(sandbox: Fixture) {
        let mut registry = TapRegistry::open(&sandbox.registry_path).expect("open");
        let err = registry
            .add(&sandbox.root.join("absent"))
            .expect_err("missing dir");
        assert!(matches!(err, TapError::NotADirectory { .. }));
    }

    #[rstest]
    fn find_prefers_earlier_taps_and_nested_manifests(sandbox: Fixture) {
        let first = make_tap(&sandbox.root, "first", &["fd"], true);
        let second = make_tap(&sandbox.root, "second", &["fd", "bat"], false);
        let mut registry = TapRegistry::open(&sandbox.registry_path).expect("open");
        registry.add(&first).expect("add first");
        registry.add(&second).expect("add second");

        assert_eq!(
            registry.find("fd"),
            Some(first.join(MANIFESTS_DIRNAME).join("fd.toml"))
        );
        assert_eq!(registry.find("bat"), Some(second.join("bat.toml")));
        assert_eq!(registry.find("missing"), None);
    }

    #[rstest]
    fn remove_unregisters_tap(sandbox: Fixture) {
        let tap = make_tap(&sandbox.root, "tap", &[], false);
        let mut registry = TapRegistry::open(&sandbox.registry_path).expect("open");
        registry.add(&tap).expect("add");

        registry.remove(&tap).expect("remove");
        assert!(registry.taps().is_empty());
        assert!(matches!(
            registry.remove(&tap),
            Err(TapError::NotRegistered { .. })
        ));
    }

    #[rstest]
    fn malformed_registry_is_reported(sandbox: Fixture) {
        fs::create_dir_all(sandbox.registry_path.parent().expect("parent")).expect("mkdir");
        fs::write(&sandbox.registry_path, "not json").expect("write");
        assert!(matches!(
            TapRegistry::open(&sandbox.registry_path),
            Err(TapError::Malformed { .. })
        ));
    }
}
