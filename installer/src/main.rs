//! CLI entrypoint for tap-installer.
//!
//! Parses arguments, sets up logging, loads configuration, and dispatches to
//! the command handlers in `install_flow`.

mod install_flow;

use clap::Parser;
use install_flow::{InstallContext, run_bump, run_install, run_tap, run_uninstall};
use std::io::Write;
use tap_installer::bump::GithubClient;
use tap_installer::bump::github::GITHUB_API_URL;
use tap_installer::cli::{Cli, Command};
use tap_installer::config::Config;
use tap_installer::dirs::{BaseDirs, SystemBaseDirs};
use tap_installer::error::{InstallerError, Result};
use tap_installer::extraction::ArchiveExtractor;
use tap_installer::fetch::HttpFetcher;
use tap_installer::list::run_list;
use tap_installer::output::write_stderr_line;
use tap_installer::receipt::ReceiptStore;
use tracing_subscriber::EnvFilter;

const TOKEN_ENV: &str = "GITHUB_TOKEN";

fn main() {
    let cli = Cli::parse();
    init_logging(cli.verbosity, cli.quiet);
    let mut stdout = std::io::stdout();
    let mut stderr = std::io::stderr();
    let run_result = run(&cli, &mut stdout, &mut stderr);
    let exit_code = exit_code_for_run_result(run_result, &mut stderr);
    if exit_code != 0 {
        std::process::exit(exit_code);
    }
}

/// Install a stderr subscriber; `RUST_LOG` takes precedence over `-v`/`-q`.
fn init_logging(verbosity: u8, quiet: bool) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_log_level(verbosity, quiet)));
    // A global subscriber may already be installed.
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init()
        .ok();
}

fn default_log_level(verbosity: u8, quiet: bool) -> &'static str {
    if quiet {
        return "error";
    }
    match verbosity {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    }
}

fn run(cli: &Cli, stdout: &mut dyn Write, stderr: &mut dyn Write) -> Result<()> {
    let dirs = SystemBaseDirs;
    let config = Config::discover(cli.config.as_deref(), &dirs)?;
    run_command(cli, &config, &dirs, stdout, stderr)
}

fn run_command(
    cli: &Cli,
    config: &Config,
    dirs: &dyn BaseDirs,
    stdout: &mut dyn Write,
    stderr: &mut dyn Write,
) -> Result<()> {
    let fetcher = HttpFetcher::new(config.fetch_timeout(), config.retry_policy());
    match &cli.command {
        Command::Tap(command) => run_tap(dirs, command, cli.quiet, stdout, stderr),
        Command::Install(args) => {
            let context = InstallContext {
                config,
                dirs,
                fetcher: &fetcher,
                extractor: &ArchiveExtractor,
                quiet: cli.quiet,
            };
            run_install(&context, args, stderr)
        }
        Command::Uninstall(args) => run_uninstall(dirs, &args.name, cli.quiet, stderr),
        Command::List(args) => run_list(&ReceiptStore::from_dirs(dirs)?, args.json, stdout),
        Command::Bump(args) => {
            let token = std::env::var(TOKEN_ENV)
                .ok()
                .filter(|token| !token.is_empty())
                .ok_or(InstallerError::MissingToken)?;
            let releases = GithubClient::new(GITHUB_API_URL, token, config.fetch_timeout());
            run_bump(args, &releases, &fetcher, stdout)
        }
    }
}

fn exit_code_for_run_result(result: Result<()>, stderr: &mut dyn Write) -> i32 {
    match result {
        Ok(()) => 0,
        Err(err) => {
            write_stderr_line(stderr, format!("error: {err}"));
            1
        }
    }
}

#[cfg(test)]
mod tests;
