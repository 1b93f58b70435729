//! Log output of the install pipeline.
//!
//! Kept in its own test binary because `logtest` installs a global logger.

use logtest::Logger;
use tap_installer::extraction::ArchiveExtractor;
use tap_installer::layout::DestinationLayout;
use tap_installer::manifest::{DestCategory, FilePlacement};
use tap_installer::pipeline::Installer;
use tap_installer::platform::{Arch, Os, Platform};
use tap_installer::test_utils::{StaticFetcher, manifest_for, tar_gz_bytes, utf8_tempdir};

const URL: &str = "https://example.test/fd.tar.gz";

#[test]
fn install_logs_state_transitions_and_placements() {
    let mut logger = Logger::start();
    let (_temp, root) = utf8_tempdir();
    let platform = Platform::new(Os::Linux, Arch::Arm64);
    let archive = tar_gz_bytes(&[("fd", b"binary")]);
    let manifest = manifest_for(
        "fd",
        platform,
        URL,
        &archive,
        vec![FilePlacement::new("fd", DestCategory::Executable)],
    );
    let fetcher = StaticFetcher::new().serve(URL, archive);
    let layout = DestinationLayout::from_prefix(&root);

    Installer::new(&layout, &fetcher, &ArchiveExtractor)
        .install(&manifest, platform)
        .expect("install succeeds");

    let mut messages = Vec::new();
    while let Some(record) = logger.pop() {
        messages.push((record.level(), record.args().to_string()));
    }
    let debug: Vec<&str> = messages
        .iter()
        .filter(|(level, _)| *level == log::Level::Debug)
        .map(|(_, message)| message.as_str())
        .collect();
    assert!(
        debug.iter().any(|m| m.contains("NotStarted -> Fetched")),
        "{debug:?}"
    );
    assert!(
        debug.iter().any(|m| m.contains("Extracted -> Placed")),
        "{debug:?}"
    );
    assert!(
        debug.iter().any(|m| m.starts_with("placed fd as ")),
        "{debug:?}"
    );
}
