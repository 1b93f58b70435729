//! Host directory layout for installed files.
//!
//! Maps each [`DestCategory`] to the directory that receives it. The default
//! layout derives every directory from a single prefix in the usual Unix
//! arrangement (`bin`, `share/man`, ...).

use crate::manifest::{DestCategory, FilePlacement};
use camino::{Utf8Path, Utf8PathBuf};
use serde::{Deserialize, Serialize};

/// Directory roots supplied by the host environment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DestinationLayout {
    /// Executables.
    pub bin_dir: Utf8PathBuf,
    /// Root of the manual page tree; pages go to `man<section>` below it.
    pub man_dir: Utf8PathBuf,
    /// Bash completion scripts.
    pub bash_completion_dir: Utf8PathBuf,
    /// Zsh completion functions.
    pub zsh_completion_dir: Utf8PathBuf,
    /// Fish completion scripts.
    pub fish_completion_dir: Utf8PathBuf,
    /// Shared data; `other` files go to `<share_dir>/<package>`.
    pub share_dir: Utf8PathBuf,
}

impl DestinationLayout {
    /// Derive the conventional layout below `prefix`.
    ///
    /// # Examples
    ///
    /// ```
    /// use camino::Utf8Path;
    /// use tap_installer::layout::DestinationLayout;
    ///
    /// let layout = DestinationLayout::from_prefix(Utf8Path::new("/opt/tap"));
    /// assert_eq!(layout.bin_dir, "/opt/tap/bin");
    /// assert_eq!(layout.zsh_completion_dir, "/opt/tap/share/zsh/site-functions");
    /// ```
    #[must_use]
    pub fn from_prefix(prefix: &Utf8Path) -> Self {
        let share = prefix.join("share");
        Self {
            bin_dir: prefix.join("bin"),
            man_dir: share.join("man"),
            bash_completion_dir: share.join("bash-completion").join("completions"),
            zsh_completion_dir: share.join("zsh").join("site-functions"),
            fish_completion_dir: share.join("fish").join("vendor_completions.d"),
            share_dir: share,
        }
    }

    /// Directory receiving a file of `category` named `file_name`.
    #[must_use]
    pub fn dir_for(&self, category: DestCategory, package: &str, file_name: &str) -> Utf8PathBuf {
        match category {
            DestCategory::Executable => self.bin_dir.clone(),
            DestCategory::ManPage => self
                .man_dir
                .join(format!("man{}", man_section(file_name))),
            DestCategory::CompletionBash => self.bash_completion_dir.clone(),
            DestCategory::CompletionZsh => self.zsh_completion_dir.clone(),
            DestCategory::CompletionFish => self.fish_completion_dir.clone(),
            DestCategory::Other => self.share_dir.join(package),
        }
    }

    /// Absolute destination path for `placement` of `package`.
    #[must_use]
    pub fn destination(&self, placement: &FilePlacement, package: &str) -> Utf8PathBuf {
        let file_name = placement.target_file_name();
        self.dir_for(placement.dest_category, package, file_name)
            .join(file_name)
    }
}

/// Manual section from a page's file name: its trailing digit, default `1`.
///
/// A trailing `.gz` is ignored, so `tool.8.gz` is section 8.
fn man_section(file_name: &str) -> char {
    let stem = file_name.strip_suffix(".gz").unwrap_or(file_name);
    stem.chars()
        .last()
        .filter(char::is_ascii_digit)
        .unwrap_or('1')
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::{fixture, rstest};

    #[fixture]
    fn layout() -> DestinationLayout {
        DestinationLayout::from_prefix(Utf8Path::new("/usr/local"))
    }

    #[rstest]
    #[case::executable(DestCategory::Executable, "rg", "/usr/local/bin")]
    #[case::man_default(DestCategory::ManPage, "rg.1", "/usr/local/share/man/man1")]
    #[case::man_section_eight(DestCategory::ManPage, "tool.8", "/usr/local/share/man/man8")]
    #[case::man_gzipped(DestCategory::ManPage, "tool.5.gz", "/usr/local/share/man/man5")]
    #[case::man_no_section(DestCategory::ManPage, "README", "/usr/local/share/man/man1")]
    #[case::bash(
        DestCategory::CompletionBash,
        "rg",
        "/usr/local/share/bash-completion/completions"
    )]
    #[case::zsh(DestCategory::CompletionZsh, "_rg", "/usr/local/share/zsh/site-functions")]
    #[case::fish(
        DestCategory::CompletionFish,
        "rg.fish",
        "/usr/local/share/fish/vendor_completions.d"
    )]
    #[case::other(DestCategory::Other, "LICENSE", "/usr/local/share/ripgrep")]
    fn maps_categories_to_directories(
        layout: DestinationLayout,
        #[case] category: DestCategory,
        #[case] file_name: &str,
        #[case] expected: &str,
    ) {
        assert_eq!(layout.dir_for(category, "ripgrep", file_name), expected);
    }

    #[rstest]
    fn destination_uses_renamed_file(layout: DestinationLayout) {
        let placement =
            FilePlacement::new("complete/rg.bash", DestCategory::CompletionBash).renamed("rg");
        assert_eq!(
            layout.destination(&placement, "ripgrep"),
            "/usr/local/share/bash-completion/completions/rg"
        );
    }

    #[rstest]
    fn destination_keeps_source_file_name(layout: DestinationLayout) {
        let placement = FilePlacement::new("ripgrep-14/doc/rg.1", DestCategory::ManPage);
        assert_eq!(
            layout.destination(&placement, "ripgrep"),
            "/usr/local/share/man/man1/rg.1"
        );
    }
}
