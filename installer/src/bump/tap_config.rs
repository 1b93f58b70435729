//! Tap configuration: the upstream projects a tap tracks.
//!
//! ```toml
//! [[package]]
//! repo = "BurntSushi/ripgrep"
//! homepage = "https://github.com/BurntSushi/ripgrep"
//! description = "Recursively search directories for a regex pattern"
//! license = "MIT OR Unlicense"
//! bins = ["rg"]
//! mans = ["doc/rg.1"]
//! completions = ["complete/rg.bash", "complete/_rg"]
//! archive_fmt = "{name}-{version}-{arch}.{ext}"
//! ```

use super::BumpError;
use crate::manifest::{DestCategory, FilePlacement};
use serde::Deserialize;
use std::path::Path;

const DEFAULT_ARCHIVE_FMT: &str = "{name}-{arch}.{ext}";
const DEFAULT_EXT: &str = "tar.gz";

fn default_archive_fmt() -> String {
    DEFAULT_ARCHIVE_FMT.to_owned()
}

fn default_ext() -> String {
    DEFAULT_EXT.to_owned()
}

/// Parsed tap configuration.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TapConfig {
    /// Tracked packages, processed in order.
    #[serde(rename = "package", alias = "formula", default)]
    pub packages: Vec<PackageSpec>,
}

/// One tracked upstream project.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PackageSpec {
    /// GitHub repository as `owner/name`.
    pub repo: String,
    /// Project homepage.
    pub homepage: String,
    /// One-line description.
    #[serde(alias = "desc")]
    pub description: String,
    /// Licence expression.
    pub license: String,
    /// Executables inside the archive.
    #[serde(default)]
    pub bins: Vec<String>,
    /// Manual pages inside the archive.
    #[serde(default)]
    pub mans: Vec<String>,
    /// Completion scripts inside the archive; the shell is inferred from
    /// the extension, with no extension meaning zsh.
    #[serde(default)]
    pub completions: Vec<String>,
    /// Inter-package dependencies; recorded for compatibility and ignored.
    #[serde(default)]
    pub deps: Vec<String>,
    /// Archive file name template with `{name}`, `{version}`, `{arch}`, and
    /// `{ext}` placeholders.
    #[serde(default = "default_archive_fmt")]
    pub archive_fmt: String,
    /// Archive extension for Linux targets.
    #[serde(default = "default_ext")]
    pub linux_ext: String,
    /// Archive extension for macOS targets.
    #[serde(default = "default_ext")]
    pub darwin_ext: String,
}

impl TapConfig {
    /// Parse and validate a tap configuration.
    ///
    /// # Errors
    ///
    /// Returns [`BumpError::Config`] for malformed TOML and
    /// [`BumpError::InvalidRepo`] for a `repo` that is not `owner/name`.
    pub fn parse(text: &str, origin: &Path) -> Result<Self, BumpError> {
        let config: Self = toml::from_str(text).map_err(|source| BumpError::Config {
            path: origin.to_path_buf(),
            source,
        })?;
        for package in &config.packages {
            package.owner_and_name()?;
        }
        Ok(config)
    }

    /// Load a tap configuration from `path`.
    ///
    /// # Errors
    ///
    /// Returns [`BumpError::Io`] when the file cannot be read, or any error
    /// from [`TapConfig::parse`].
    pub fn load(path: &Path) -> Result<Self, BumpError> {
        let text = std::fs::read_to_string(path).map_err(|source| BumpError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::parse(&text, path)
    }
}

impl PackageSpec {
    /// Split `repo` into owner and repository name.
    ///
    /// # Errors
    ///
    /// Returns [`BumpError::InvalidRepo`] unless `repo` has exactly two
    /// non-empty segments.
    pub fn owner_and_name(&self) -> Result<(&str, &str), BumpError> {
        match self.repo.split_once('/') {
            Some((owner, name))
                if !owner.is_empty() && !name.is_empty() && !name.contains('/') =>
            {
                Ok((owner, name))
            }
            _ => Err(BumpError::InvalidRepo {
                repo: self.repo.clone(),
            }),
        }
    }

    /// Archive file name for `version` on `target`.
    ///
    /// # Errors
    ///
    /// Returns [`BumpError::InvalidRepo`] for a malformed `repo`.
    pub fn archive_name(&self, version: &str, target: &str) -> Result<String, BumpError> {
        let (_, name) = self.owner_and_name()?;
        let ext = if target.ends_with("darwin") {
            &self.darwin_ext
        } else {
            &self.linux_ext
        };
        Ok(self
            .archive_fmt
            .replace("{name}", name)
            .replace("{version}", version)
            .replace("{arch}", target)
            .replace("{ext}", ext))
    }

    /// Install steps derived from `bins`, `mans`, and `completions`.
    ///
    /// # Errors
    ///
    /// Returns [`BumpError::UnknownCompletion`] for a completion whose
    /// extension names an unsupported shell.
    pub fn install_steps(&self) -> Result<Vec<FilePlacement>, BumpError> {
        let bins = self
            .bins
            .iter()
            .map(|bin| FilePlacement::new(bin, DestCategory::Executable));
        let mans = self
            .mans
            .iter()
            .map(|man| FilePlacement::new(man, DestCategory::ManPage));
        let mut steps: Vec<FilePlacement> = bins.chain(mans).collect();
        for completion in &self.completions {
            steps.push(FilePlacement::new(
                completion,
                completion_category(completion)?,
            ));
        }
        Ok(steps)
    }
}

fn completion_category(path: &str) -> Result<DestCategory, BumpError> {
    let extension = Path::new(path)
        .extension()
        .and_then(|ext| ext.to_str())
        .unwrap_or_default();
    match extension {
        "" | "zsh" => Ok(DestCategory::CompletionZsh),
        "bash" => Ok(DestCategory::CompletionBash),
        "fish" => Ok(DestCategory::CompletionFish),
        _ => Err(BumpError::UnknownCompletion {
            path: path.to_owned(),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::{fixture, rstest};

    #[fixture]
    fn package() -> PackageSpec {
        let text = r#"
[[package]]
repo = "sharkdp/fd"
homepage = "https://github.com/sharkdp/fd"
desc = "A simple, fast alternative to find"
license = "MIT"
bins = ["fd"]
mans = ["fd.1"]
completions = ["autocomplete/fd.bash", "autocomplete/_fd", "autocomplete/fd.fish"]
"#;
        TapConfig::parse(text, Path::new("tap.toml"))
            .expect("valid config")
            .packages
            .into_iter()
            .next()
            .expect("one package")
    }

    #[rstest]
    fn defaults_apply(package: PackageSpec) {
        assert_eq!(package.archive_fmt, DEFAULT_ARCHIVE_FMT);
        assert_eq!(package.linux_ext, "tar.gz");
        assert_eq!(package.owner_and_name().expect("repo"), ("sharkdp", "fd"));
    }

    #[rstest]
    #[case::darwin("aarch64-apple-darwin", "fd-aarch64-apple-darwin.zip")]
    #[case::linux("x86_64-unknown-linux-musl", "fd-x86_64-unknown-linux-musl.tar.gz")]
    fn archive_name_uses_target_extension(
        mut package: PackageSpec,
        #[case] target: &str,
        #[case] expected: &str,
    ) {
        package.darwin_ext = "zip".to_owned();
        assert_eq!(package.archive_name("10.2.0", target).expect("name"), expected);
    }

    #[rstest]
    fn archive_name_substitutes_version(mut package: PackageSpec) {
        package.archive_fmt = "{name}-v{version}-{arch}.{ext}".to_owned();
        assert_eq!(
            package.archive_name("10.2.0", "x86_64-unknown-linux-musl")
                .expect("name"),
            "fd-v10.2.0-x86_64-unknown-linux-musl.tar.gz"
        );
    }

    #[rstest]
    fn install_steps_follow_declaration_groups(package: PackageSpec) {
        let categories: Vec<DestCategory> = package
            .install_steps()
            .expect("steps")
            .into_iter()
            .map(|step| step.dest_category)
            .collect();
        assert_eq!(
            categories,
            vec![
                DestCategory::Executable,
                DestCategory::ManPage,
                DestCategory::CompletionBash,
                DestCategory::CompletionZsh,
                DestCategory::CompletionFish,
            ]
        );
    }

    #[rstest]
    fn unknown_completion_shell_is_rejected(mut package: PackageSpec) {
        package.completions = vec!["fd.ps1".to_owned()];
        assert!(matches!(
            package.install_steps(),
            Err(BumpError::UnknownCompletion { .. })
        ));
    }

    #[rstest]
    #[case("no-slash")]
    #[case("/leading")]
    #[case("too/many/parts")]
    fn rejects_malformed_repo(#[case] repo: &str) {
        let text = format!(
            "[[package]]\nrepo = \"{repo}\"\nhomepage = \"h\"\ndescription = \"d\"\nlicense = \"MIT\"\n"
        );
        assert!(matches!(
            TapConfig::parse(&text, Path::new("tap.toml")),
            Err(BumpError::InvalidRepo { .. })
        ));
    }
}
