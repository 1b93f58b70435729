//! Output formatting for the installer CLI.

use crate::pipeline::InstalledFiles;
use std::io::Write;

/// Write one line to `stderr`, ignoring write failures.
pub fn write_stderr_line(stderr: &mut dyn Write, message: impl std::fmt::Display) {
    if writeln!(stderr, "{message}").is_err() {
        // Best-effort output; ignore write failures.
    }
}

/// Format a success message after installation.
#[must_use]
pub fn success_message(name: &str, version: &str, files: &InstalledFiles) -> String {
    let count = files.len();
    let plural = if count == 1 { "file" } else { "files" };
    format!("Installed {name} {version} ({count} {plural})")
}

/// Format the summary line after a bump run.
///
/// # Examples
///
/// ```
/// use tap_installer::output::bump_summary;
///
/// let bumped = vec![("rg".to_owned(), "14.1.0".to_owned())];
/// assert_eq!(bump_summary(&bumped), "Bump manifests: rg to 14.1.0");
/// assert_eq!(bump_summary(&[]), "All manifests up to date");
/// ```
#[must_use]
pub fn bump_summary(bumped: &[(String, String)]) -> String {
    if bumped.is_empty() {
        return "All manifests up to date".to_owned();
    }
    let parts: Vec<String> = bumped
        .iter()
        .map(|(name, version)| format!("{name} to {version}"))
        .collect();
    format!("Bump manifests: {}", parts.join(", "))
}
