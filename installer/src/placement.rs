//! Atomic file placement into host directories.

use camino::Utf8Path;
use std::fs::{self, File};
use std::io;
use std::path::Path;

/// Copy `source` to `dest`, replacing any existing file atomically.
///
/// Parent directories are created as needed. The bytes are written to a
/// temporary file beside `dest` and renamed over it, so a concurrent reader
/// never sees a half-written file. On Unix, the mode is `0755` when
/// `executable` is set and `0644` otherwise.
///
/// # Errors
///
/// Returns any I/O error from creating directories, copying, setting the
/// mode, or renaming.
pub fn place_file(source: &Path, dest: &Utf8Path, executable: bool) -> io::Result<()> {
    let parent = dest
        .parent()
        .filter(|parent| !parent.as_str().is_empty())
        .ok_or_else(|| io::Error::other(format!("destination {dest} has no parent directory")))?;
    fs::create_dir_all(parent)?;

    let mut input = File::open(source)?;
    let mut staged = tempfile::NamedTempFile::new_in(parent)?;
    io::copy(&mut input, staged.as_file_mut())?;
    staged.as_file().sync_all()?;
    set_mode(staged.path(), executable)?;
    staged.persist(dest).map_err(|err| err.error)?;
    log::trace!("placed {} at {dest}", source.display());
    Ok(())
}

#[cfg(unix)]
fn set_mode(path: &Path, executable: bool) -> io::Result<()> {
    use std::os::unix::fs::PermissionsExt;
    let mode = if executable { 0o755 } else { 0o644 };
    fs::set_permissions(path, fs::Permissions::from_mode(mode))
}

#[cfg(not(unix))]
fn set_mode(_path: &Path, _executable: bool) -> io::Result<()> {
    Ok(())
}

/// Remove `path`, treating an already-missing file as success.
///
/// Returns whether a file was actually removed.
///
/// # Errors
///
/// Returns I/O errors other than [`io::ErrorKind::NotFound`].
pub fn remove_if_present(path: &Utf8Path) -> io::Result<bool> {
    match fs::remove_file(path) {
        Ok(()) => Ok(true),
        Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(false),
        Err(err) => Err(err),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use camino::Utf8PathBuf;

    fn utf8(path: &Path) -> Utf8PathBuf {
        Utf8PathBuf::from_path_buf(path.to_path_buf()).expect("utf-8 temp path")
    }

    #[test]
    fn creates_parents_and_copies_bytes() {
        let temp = tempfile::tempdir().expect("temp dir");
        let source = temp.path().join("tool");
        fs::write(&source, b"payload").expect("write source");
        let dest = utf8(temp.path()).join("prefix/bin/tool");

        place_file(&source, &dest, true).expect("place");

        assert_eq!(fs::read(&dest).expect("read"), b"payload");
    }

    #[test]
    fn overwrites_existing_destination() {
        let temp = tempfile::tempdir().expect("temp dir");
        let source = temp.path().join("tool");
        fs::write(&source, b"new").expect("write source");
        let dest = utf8(temp.path()).join("tool-installed");
        fs::write(&dest, b"old").expect("write old");

        place_file(&source, &dest, false).expect("place");

        assert_eq!(fs::read(&dest).expect("read"), b"new");
    }

    #[cfg(unix)]
    #[test]
    fn sets_mode_by_category() {
        use std::os::unix::fs::PermissionsExt;
        let temp = tempfile::tempdir().expect("temp dir");
        let source = temp.path().join("src");
        fs::write(&source, b"x").expect("write source");
        let exe = utf8(temp.path()).join("exe");
        let doc = utf8(temp.path()).join("doc");

        place_file(&source, &exe, true).expect("place exe");
        place_file(&source, &doc, false).expect("place doc");

        let mode = |p: &Utf8Path| fs::metadata(p).expect("meta").permissions().mode() & 0o777;
        assert_eq!(mode(&exe), 0o755);
        assert_eq!(mode(&doc), 0o644);
    }

    #[test]
    fn missing_source_is_an_error() {
        let temp = tempfile::tempdir().expect("temp dir");
        let dest = utf8(temp.path()).join("out");
        let err = place_file(&temp.path().join("absent"), &dest, false).expect_err("missing");
        assert_eq!(err.kind(), io::ErrorKind::NotFound);
        assert!(!dest.exists());
    }

    #[test]
    fn remove_if_present_tolerates_missing_files() {
        let temp = tempfile::tempdir().expect("temp dir");
        let path = utf8(temp.path()).join("gone");
        fs::write(&path, b"x").expect("write");

        assert!(remove_if_present(&path).expect("first removal"));
        assert!(!remove_if_present(&path).expect("second removal"));
    }
}
