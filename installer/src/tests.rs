//! Tests for the installer CLI entrypoint.

use super::*;
use crate::install_flow::resolve_manifest;
use rstest::{fixture, rstest};
use std::path::Path;
use tap_installer::bump::{BumpError, ReleaseSource};
use tap_installer::cli::{BumpArgs, InstallArgs, ListArgs, TapCommand};
use tap_installer::manifest::{DestCategory, FilePlacement, Manifest, render_manifest};
use tap_installer::platform::{Arch, Os, Platform};
use tap_installer::test_utils::{SandboxDirs, StaticFetcher, manifest_for, tar_gz_bytes};

const URL: &str = "https://example.test/rg-x86_64-unknown-linux-musl.tar.gz";
const LINUX: Platform = Platform::new(Os::Linux, Arch::X86_64);

struct Sandbox {
    _temp: tempfile::TempDir,
    root: std::path::PathBuf,
    dirs: SandboxDirs,
    config: Config,
}

#[fixture]
fn sandbox() -> Sandbox {
    let temp = tempfile::tempdir().expect("temp dir");
    let root = temp.path().to_path_buf();
    Sandbox {
        dirs: SandboxDirs::new(&root),
        root,
        _temp: temp,
        config: Config::default(),
    }
}

fn archive() -> Vec<u8> {
    tar_gz_bytes(&[("rg", b"#!/bin/sh\n"), ("doc/rg.1", b".TH RG 1\n")])
}

fn ripgrep(steps: Vec<FilePlacement>) -> Manifest {
    manifest_for("ripgrep", LINUX, URL, &archive(), steps)
}

fn default_steps() -> Vec<FilePlacement> {
    vec![
        FilePlacement::new("rg", DestCategory::Executable),
        FilePlacement::new("doc/rg.1", DestCategory::ManPage),
    ]
}

fn write_manifest(dir: &Path, manifest: &Manifest) -> std::path::PathBuf {
    std::fs::create_dir_all(dir).expect("manifest dir");
    let path = dir.join(format!("{}.toml", manifest.name()));
    std::fs::write(&path, render_manifest(manifest).expect("render")).expect("write manifest");
    path
}

fn install_args(target: impl Into<String>, sandbox: &Sandbox) -> InstallArgs {
    InstallArgs {
        target: target.into(),
        platform: Some(LINUX),
        prefix: Some(sandbox.dirs.prefix()),
    }
}

fn install(sandbox: &Sandbox, args: &InstallArgs, stderr: &mut Vec<u8>) -> Result<()> {
    let fetcher = StaticFetcher::new().serve(URL, archive());
    let context = InstallContext {
        config: &sandbox.config,
        dirs: &sandbox.dirs,
        fetcher: &fetcher,
        extractor: &ArchiveExtractor,
        quiet: false,
    };
    run_install(&context, args, stderr)
}

fn store(sandbox: &Sandbox) -> ReceiptStore {
    ReceiptStore::from_dirs(&sandbox.dirs).expect("receipt store")
}

#[test]
fn exit_code_for_run_result_returns_zero_on_success() {
    let mut stderr = Vec::new();
    let exit_code = exit_code_for_run_result(Ok(()), &mut stderr);
    assert_eq!(exit_code, 0);
    assert!(stderr.is_empty());
}

#[test]
fn exit_code_for_run_result_prints_error_and_returns_one() {
    let err = InstallerError::NotInstalled {
        name: "ripgrep".to_owned(),
    };

    let mut stderr = Vec::new();
    let exit_code = exit_code_for_run_result(Err(err), &mut stderr);
    assert_eq!(exit_code, 1);

    let stderr_text = String::from_utf8(stderr).expect("stderr was not UTF-8");
    assert_eq!(stderr_text, "error: ripgrep is not installed\n");
}

#[rstest]
#[case::quiet(0, true, "error")]
#[case::default(0, false, "warn")]
#[case::verbose(1, false, "info")]
#[case::debug(2, false, "debug")]
#[case::trace(5, false, "trace")]
fn log_level_follows_flags(#[case] verbosity: u8, #[case] quiet: bool, #[case] expected: &str) {
    assert_eq!(default_log_level(verbosity, quiet), expected);
}

#[rstest]
fn install_from_manifest_file_writes_receipt(sandbox: Sandbox) {
    let path = write_manifest(&sandbox.root.join("work"), &ripgrep(default_steps()));
    let args = install_args(path.to_string_lossy(), &sandbox);
    let mut stderr = Vec::new();

    install(&sandbox, &args, &mut stderr).expect("install succeeds");

    let prefix = sandbox.dirs.prefix();
    assert!(prefix.join("bin/rg").is_file());
    assert!(prefix.join("share/man/man1/rg.1").is_file());
    let receipt = store(&sandbox)
        .load("ripgrep")
        .expect("readable receipt")
        .expect("receipt written");
    assert_eq!(receipt.version, "1.0.0");
    assert_eq!(receipt.platform, LINUX);
    assert_eq!(receipt.files.len(), 2);
    let text = String::from_utf8(stderr).expect("utf8");
    assert!(text.contains("Installed ripgrep 1.0.0 (2 files)"), "{text}");
}

#[rstest]
fn install_by_name_searches_registered_taps(sandbox: Sandbox) {
    let tap = sandbox.root.join("tap");
    write_manifest(&tap.join("Manifests"), &ripgrep(default_steps()));
    let mut stdout = Vec::new();
    let mut stderr = Vec::new();
    run_tap(
        &sandbox.dirs,
        &TapCommand::Add { dir: tap },
        true,
        &mut stdout,
        &mut stderr,
    )
    .expect("tap add");

    install(&sandbox, &install_args("ripgrep", &sandbox), &mut stderr).expect("install by name");

    assert!(sandbox.dirs.prefix().join("bin/rg").is_file());
}

#[rstest]
fn unknown_package_is_reported(sandbox: Sandbox) {
    let err = resolve_manifest("nonexistent", &sandbox.dirs).expect_err("no taps");
    assert!(matches!(err, InstallerError::PackageNotFound { ref name } if name == "nonexistent"));
}

#[rstest]
fn failed_install_removes_placed_files_and_writes_no_receipt(sandbox: Sandbox) {
    let mut steps = default_steps();
    steps.push(FilePlacement::new("missing", DestCategory::Other));
    let path = write_manifest(&sandbox.root.join("work"), &ripgrep(steps));
    let args = install_args(path.to_string_lossy(), &sandbox);

    let err = install(&sandbox, &args, &mut Vec::new()).expect_err("missing artefact");

    assert!(err.to_string().starts_with("install failed at place step"), "{err}");
    let prefix = sandbox.dirs.prefix();
    assert!(!prefix.join("bin/rg").exists());
    assert!(!prefix.join("share/man/man1/rg.1").exists());
    assert!(store(&sandbox).load("ripgrep").expect("readable").is_none());
}

#[rstest]
fn uninstall_removes_files_and_receipt(sandbox: Sandbox) {
    let path = write_manifest(&sandbox.root.join("work"), &ripgrep(default_steps()));
    install(&sandbox, &install_args(path.to_string_lossy(), &sandbox), &mut Vec::new())
        .expect("install");
    let mut stderr = Vec::new();

    run_uninstall(&sandbox.dirs, "ripgrep", false, &mut stderr).expect("uninstall");

    assert!(!sandbox.dirs.prefix().join("bin/rg").exists());
    assert!(store(&sandbox).load("ripgrep").expect("readable").is_none());
    let text = String::from_utf8(stderr).expect("utf8");
    assert!(text.contains("Uninstalled ripgrep 1.0.0 (2 files)"), "{text}");
}

#[rstest]
fn uninstall_unknown_package_fails(sandbox: Sandbox) {
    let err = run_uninstall(&sandbox.dirs, "ripgrep", true, &mut Vec::new())
        .expect_err("nothing installed");
    assert!(matches!(err, InstallerError::NotInstalled { .. }));
}

#[rstest]
fn uninstall_rejects_names_outside_the_receipt_store(sandbox: Sandbox) {
    let decoy = sandbox.root.join("data/evil.json");
    std::fs::create_dir_all(sandbox.root.join("data")).expect("data dir");
    std::fs::write(&decoy, "{}").expect("write decoy");

    let err = run_uninstall(&sandbox.dirs, "../evil", true, &mut Vec::new())
        .expect_err("path-like name");

    assert!(
        matches!(
            err,
            InstallerError::Receipt(tap_installer::receipt::ReceiptError::InvalidName { .. })
        ),
        "{err}"
    );
    assert!(decoy.is_file());
    assert!(!sandbox.root.join("data/receipts").exists());
}

#[rstest]
fn expired_install_deadline_stops_at_fetch(sandbox: Sandbox) {
    let sandbox = Sandbox {
        config: Config {
            install_timeout_secs: Some(0),
            ..Config::default()
        },
        ..sandbox
    };
    let path = write_manifest(&sandbox.root.join("work"), &ripgrep(default_steps()));
    let args = install_args(path.to_string_lossy(), &sandbox);

    let err = install(&sandbox, &args, &mut Vec::new()).expect_err("deadline passed");

    assert!(err.to_string().starts_with("install failed at fetch step"), "{err}");
    assert!(!sandbox.dirs.prefix().join("bin/rg").exists());
    assert!(store(&sandbox).load("ripgrep").expect("readable").is_none());
}

#[rstest]
fn tap_commands_round_trip(sandbox: Sandbox) {
    let tap = sandbox.root.join("tap");
    std::fs::create_dir_all(&tap).expect("tap dir");
    let canonical = std::fs::canonicalize(&tap).expect("canonical");
    let mut stderr = Vec::new();

    run_tap(
        &sandbox.dirs,
        &TapCommand::Add { dir: tap.clone() },
        false,
        &mut Vec::new(),
        &mut stderr,
    )
    .expect("add");
    let mut listed = Vec::new();
    run_tap(&sandbox.dirs, &TapCommand::List, false, &mut listed, &mut stderr).expect("list");
    run_tap(
        &sandbox.dirs,
        &TapCommand::Remove { dir: tap },
        false,
        &mut Vec::new(),
        &mut stderr,
    )
    .expect("remove");
    let mut after = Vec::new();
    run_tap(&sandbox.dirs, &TapCommand::List, false, &mut after, &mut stderr).expect("list");

    assert_eq!(
        String::from_utf8(listed).expect("utf8"),
        format!("{}\n", canonical.display())
    );
    assert!(after.is_empty());
}

#[rstest]
fn list_command_reads_receipts(sandbox: Sandbox) {
    let path = write_manifest(&sandbox.root.join("work"), &ripgrep(default_steps()));
    install(&sandbox, &install_args(path.to_string_lossy(), &sandbox), &mut Vec::new())
        .expect("install");
    let cli = Cli {
        config: None,
        verbosity: 0,
        quiet: true,
        command: Command::List(ListArgs::default()),
    };
    let mut stdout = Vec::new();

    run_command(&cli, &sandbox.config, &sandbox.dirs, &mut stdout, &mut Vec::new())
        .expect("list");

    let text = String::from_utf8(stdout).expect("utf8");
    assert!(text.starts_with("ripgrep  1.0.0  linux/x86_64  (2 files)"), "{text}");
}

struct FixedRelease(&'static str);

impl ReleaseSource for FixedRelease {
    fn latest_version(
        &self,
        _owner: &str,
        _repo: &str,
    ) -> std::result::Result<Option<String>, BumpError> {
        Ok(Some(self.0.to_owned()))
    }
}

#[rstest]
fn bump_dry_run_prints_summary(sandbox: Sandbox) {
    let tap_config = sandbox.root.join("tap.toml");
    std::fs::write(
        &tap_config,
        "[[package]]\nrepo = \"acme/widget\"\nhomepage = \"https://example.test\"\n\
         description = \"Widgets\"\nlicense = \"MIT\"\nbins = [\"widget\"]\n",
    )
    .expect("write tap config");
    let args = BumpArgs {
        tap_config,
        output: sandbox.root.join("Manifests"),
        dry_run: true,
    };
    let mut stdout = Vec::new();

    run_bump(&args, &FixedRelease("2.0.0"), &StaticFetcher::new(), &mut stdout)
        .expect("bump");

    assert_eq!(
        String::from_utf8(stdout).expect("utf8"),
        "Bump manifests: widget to 2.0.0\n"
    );
    assert!(!args.output.exists());
}
