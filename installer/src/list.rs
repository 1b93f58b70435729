//! List command implementation.
//!
//! Reads every install receipt and prints the installed packages, either as
//! aligned text or as a JSON array of receipts.

use crate::error::{InstallerError, Result};
use crate::receipt::{Receipt, ReceiptError, ReceiptStore};
use std::io::Write;

/// Lists installed packages recorded in `store`.
///
/// # Errors
///
/// Returns an error if the receipts cannot be read or writing to stdout
/// fails.
pub fn run_list(store: &ReceiptStore, json: bool, stdout: &mut dyn Write) -> Result<()> {
    let receipts = store.list()?;
    log::trace!("found {} receipts in {}", receipts.len(), store.root().display());

    let output = if json {
        format_json(&receipts)?
    } else {
        format_human(&receipts)
    };
    writeln!(stdout, "{output}").map_err(|source| InstallerError::WriteFailed { source })
}

/// Format receipts as human-readable text, one package per line.
#[must_use]
pub fn format_human(receipts: &[Receipt]) -> String {
    if receipts.is_empty() {
        return "No packages installed.".to_owned();
    }
    let width = receipts
        .iter()
        .map(|receipt| receipt.name.len())
        .max()
        .unwrap_or_default();
    receipts
        .iter()
        .map(|receipt| {
            let count = receipt.files.len();
            let plural = if count == 1 { "file" } else { "files" };
            format!(
                "{:width$}  {}  {}  ({count} {plural})",
                receipt.name, receipt.version, receipt.platform
            )
        })
        .collect::<Vec<_>>()
        .join("\n")
}

fn format_json(receipts: &[Receipt]) -> Result<String> {
    serde_json::to_string_pretty(receipts)
        .map_err(|err| InstallerError::Receipt(ReceiptError::Serialize(err)))
}
