//! CLI argument definitions for tap-installer.
//!
//! This module defines the command-line interface using clap. It is separated
//! from the main entrypoint to keep the binary small and focused on
//! orchestration.

use crate::platform::Platform;
use camino::Utf8PathBuf;
use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

/// Install prebuilt command-line tools from declarative manifests.
#[derive(Parser, Debug)]
#[command(name = "tap-installer")]
#[command(version, about)]
#[command(long_about = concat!(
    "Install prebuilt command-line tools from declarative manifests.\n\n",
    "A manifest names a package, one download per platform with its expected ",
    "digest, and the files to copy out of the archive. The installer picks the ",
    "variant for this machine, downloads and verifies it, extracts it, and ",
    "places executables, man pages, and shell completions under a prefix.\n\n",
    "Manifests are looked up by name in registered taps (directories of ",
    "manifests), or loaded directly from a path ending in .toml.",
))]
#[command(after_help = concat!(
    "EXAMPLES:\n",
    "  Register a directory of manifests:\n",
    "    $ tap-installer tap add ~/src/my-tap\n\n",
    "  Install a package into ~/.local:\n",
    "    $ tap-installer install ripgrep\n\n",
    "  Install from a manifest file into another prefix:\n",
    "    $ tap-installer install ./ripgrep.toml --prefix /opt/tools\n\n",
    "  Remove a package:\n",
    "    $ tap-installer uninstall ripgrep\n\n",
    "  Regenerate manifests for new upstream releases:\n",
    "    $ GITHUB_TOKEN=... tap-installer bump --tap-config tap.toml --output Manifests\n",
))]
pub struct Cli {
    /// Configuration file [default: platform config directory].
    #[arg(long, global = true, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Increase log verbosity (repeatable: -v, -vv, -vvv).
    #[arg(
        short,
        long = "verbose",
        global = true,
        action = clap::ArgAction::Count,
        conflicts_with = "quiet"
    )]
    pub verbosity: u8,

    /// Suppress progress output (errors still shown).
    #[arg(short, long, global = true, conflicts_with = "verbosity")]
    pub quiet: bool,

    /// Subcommand to execute.
    #[command(subcommand)]
    pub command: Command,
}

/// Available subcommands.
#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// Manage manifest directories.
    #[command(subcommand)]
    Tap(TapCommand),

    /// Install a package by name or from a manifest file.
    Install(InstallArgs),

    /// Remove an installed package.
    Uninstall(UninstallArgs),

    /// List installed packages.
    List(ListArgs),

    /// Regenerate manifests for the latest upstream releases.
    Bump(BumpArgs),
}

/// `tap` subcommands.
#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum TapCommand {
    /// Register a directory of manifests.
    Add {
        /// Directory to register.
        dir: PathBuf,
    },
    /// Unregister a directory.
    Remove {
        /// Directory to unregister.
        dir: PathBuf,
    },
    /// Show registered directories in lookup order.
    List,
}

/// Arguments for the install command.
#[derive(Args, Debug, Clone)]
pub struct InstallArgs {
    /// Package name, or a path to a manifest ending in `.toml`.
    #[arg(value_name = "NAME|FILE")]
    pub target: String,

    /// Install the variant for another platform, as OS/ARCH.
    #[arg(long, value_name = "OS/ARCH")]
    pub platform: Option<Platform>,

    /// Install prefix [default: ~/.local].
    #[arg(long, value_name = "DIR")]
    pub prefix: Option<Utf8PathBuf>,
}

/// Arguments for the uninstall command.
#[derive(Args, Debug, Clone)]
pub struct UninstallArgs {
    /// Name of the installed package.
    pub name: String,
}

/// Arguments for the list command.
#[derive(Args, Debug, Clone, Default)]
pub struct ListArgs {
    /// Output in JSON format for scripting.
    #[arg(long)]
    pub json: bool,
}

/// Arguments for the bump command.
#[derive(Args, Debug, Clone)]
pub struct BumpArgs {
    /// Tap configuration listing the tracked projects.
    #[arg(long, value_name = "FILE")]
    pub tap_config: PathBuf,

    /// Directory to write `<name>.toml` manifests into.
    #[arg(long, value_name = "DIR")]
    pub output: PathBuf,

    /// Resolve versions and render manifests without downloading or writing.
    #[arg(long)]
    pub dry_run: bool,
}

#[cfg(test)]
#[path = "cli_tests.rs"]
mod tests;
