//! Command handlers for the installer binary.
//!
//! Each handler resolves its inputs (manifest, prefix, receipts, taps) and
//! drives the library, keeping CLI orchestration in `main.rs` small.

use std::io::Write;
use std::path::Path;
use tap_installer::bump::{BumpOptions, Bumper, ReleaseSource, TapConfig};
use tap_installer::cli::{BumpArgs, InstallArgs, TapCommand};
use tap_installer::config::Config;
use tap_installer::dirs::BaseDirs;
use tap_installer::error::{InstallerError, Result};
use tap_installer::extraction::Extractor;
use tap_installer::fetch::Fetcher;
use tap_installer::manifest::{Manifest, load_manifest};
use tap_installer::output::{bump_summary, success_message, write_stderr_line};
use tap_installer::pipeline::{InstalledFiles, Installer, uninstall};
use tap_installer::platform::Platform;
use tap_installer::receipt::{Receipt, ReceiptStore};
use tap_installer::tap::TapRegistry;

/// Everything an install needs besides the command arguments.
pub(crate) struct InstallContext<'a> {
    /// Loaded configuration.
    pub(crate) config: &'a Config,
    /// Base directory provider for receipts, taps, and the default prefix.
    pub(crate) dirs: &'a dyn BaseDirs,
    /// Download transport.
    pub(crate) fetcher: &'a dyn Fetcher,
    /// Archive extractor.
    pub(crate) extractor: &'a dyn Extractor,
    /// Whether progress output is suppressed.
    pub(crate) quiet: bool,
}

/// Load the manifest named by `target`.
///
/// A target ending in `.toml`, or naming an existing file, is loaded
/// directly; anything else is looked up in the registered taps.
pub(crate) fn resolve_manifest(target: &str, dirs: &dyn BaseDirs) -> Result<Manifest> {
    let path = Path::new(target);
    if target.ends_with(".toml") || path.is_file() {
        log::debug!("loading manifest from {}", path.display());
        return Ok(load_manifest(path)?);
    }
    let registry = TapRegistry::from_dirs(dirs)?;
    let found = registry
        .find(target)
        .ok_or_else(|| InstallerError::PackageNotFound {
            name: target.to_owned(),
        })?;
    log::debug!("resolved {target} to {}", found.display());
    Ok(load_manifest(&found)?)
}

/// Install a package and record its receipt.
///
/// If the pipeline fails after writing some files, those files are removed
/// again and no receipt is written.
pub(crate) fn run_install(
    context: &InstallContext<'_>,
    args: &InstallArgs,
    stderr: &mut dyn Write,
) -> Result<()> {
    let manifest = resolve_manifest(&args.target, context.dirs)?;
    let platform = args
        .platform
        .or_else(Platform::current)
        .ok_or(InstallerError::UnsupportedHost)?;
    let prefix = context
        .config
        .resolve_prefix(args.prefix.as_deref(), context.dirs)?;
    let layout = context.config.layout(&prefix)?;
    let store = ReceiptStore::from_dirs(context.dirs)?;

    if !context.quiet {
        write_stderr_line(
            stderr,
            format!(
                "Installing {} {} for {platform} into {prefix}...",
                manifest.name(),
                manifest.version()
            ),
        );
    }

    let mut installer = Installer::new(&layout, context.fetcher, context.extractor)
        .with_cancellation(context.config.install_cancellation());
    let files = match installer.install(&manifest, platform) {
        Ok(files) => files,
        Err(err) => {
            discard_partial_install(err.placed());
            return Err(err.into());
        }
    };

    store.save(&Receipt {
        name: manifest.name().to_owned(),
        version: manifest.version().to_owned(),
        platform,
        files: files.clone(),
    })?;

    if !context.quiet {
        write_stderr_line(
            stderr,
            success_message(manifest.name(), manifest.version(), &files),
        );
    }
    Ok(())
}

fn discard_partial_install(placed: &[camino::Utf8PathBuf]) {
    if placed.is_empty() {
        return;
    }
    log::debug!("removing {} partially installed files", placed.len());
    if let Err(err) = uninstall(&InstalledFiles::from(placed.to_vec())) {
        log::warn!("could not clean up after failed install: {err}");
    }
}

/// Remove a package using its receipt.
pub(crate) fn run_uninstall(
    dirs: &dyn BaseDirs,
    name: &str,
    quiet: bool,
    stderr: &mut dyn Write,
) -> Result<()> {
    let store = ReceiptStore::from_dirs(dirs)?;
    let receipt = store
        .load(name)?
        .ok_or_else(|| InstallerError::NotInstalled {
            name: name.to_owned(),
        })?;
    uninstall(&receipt.files)?;
    store.remove(name)?;

    if !quiet {
        let count = receipt.files.len();
        let plural = if count == 1 { "file" } else { "files" };
        write_stderr_line(
            stderr,
            format!(
                "Uninstalled {} {} ({count} {plural})",
                receipt.name, receipt.version
            ),
        );
    }
    Ok(())
}

/// Add, remove, or list registered taps.
pub(crate) fn run_tap(
    dirs: &dyn BaseDirs,
    command: &TapCommand,
    quiet: bool,
    stdout: &mut dyn Write,
    stderr: &mut dyn Write,
) -> Result<()> {
    let mut registry = TapRegistry::from_dirs(dirs)?;
    match command {
        TapCommand::Add { dir } => {
            let added = registry.add(dir)?;
            if !quiet {
                let verb = if added { "Added" } else { "Already registered:" };
                write_stderr_line(stderr, format!("{verb} tap {}", dir.display()));
            }
        }
        TapCommand::Remove { dir } => {
            registry.remove(dir)?;
            if !quiet {
                write_stderr_line(stderr, format!("Removed tap {}", dir.display()));
            }
        }
        TapCommand::List => {
            for tap in registry.taps() {
                writeln!(stdout, "{}", tap.display())
                    .map_err(|source| InstallerError::WriteFailed { source })?;
            }
        }
    }
    Ok(())
}

/// Regenerate manifests and print the bump summary on stdout.
pub(crate) fn run_bump(
    args: &BumpArgs,
    releases: &dyn ReleaseSource,
    fetcher: &dyn Fetcher,
    stdout: &mut dyn Write,
) -> Result<()> {
    let config = TapConfig::load(&args.tap_config)?;
    let options = BumpOptions {
        output_dir: &args.output,
        dry_run: args.dry_run,
    };
    let bumped: Vec<(String, String)> = Bumper::new(releases, fetcher)
        .bump_all(&config, options)?
        .iter()
        .filter_map(|outcome| outcome.bumped())
        .collect();
    writeln!(stdout, "{}", bump_summary(&bumped))
        .map_err(|source| InstallerError::WriteFailed { source })
}
