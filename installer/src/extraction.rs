//! Archive extraction for fetched release archives.
//!
//! Detects the archive format from the download's file name and unpacks it
//! into an isolated directory, rejecting entries that would escape it.

use crate::cancel::CancellationToken;
use std::fs::{self, File};
use std::io::{self, Read};
use std::path::{Component, Path, PathBuf};

/// Archive formats understood by the extractor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArchiveFormat {
    /// Gzip-compressed tarball (`.tar.gz`, `.tgz`).
    TarGz,
    /// Zstandard-compressed tarball (`.tar.zst`, `.tzst`).
    TarZst,
    /// Uncompressed tarball.
    Tar,
    /// Zip archive.
    Zip,
    /// A single file that is not an archive at all.
    Raw,
}

const UNSUPPORTED_SUFFIXES: &[&str] = &[".tar.xz", ".txz", ".tar.bz2", ".tbz2", ".tbz", ".7z"];

impl ArchiveFormat {
    /// Detect the format from a file name.
    ///
    /// # Errors
    ///
    /// Returns [`ExtractionError::UnsupportedFormat`] for archive suffixes
    /// that are recognised but cannot be unpacked.
    ///
    /// # Examples
    ///
    /// ```
    /// use tap_installer::extraction::ArchiveFormat;
    ///
    /// assert_eq!(ArchiveFormat::from_file_name("rg.tar.gz").ok(), Some(ArchiveFormat::TarGz));
    /// assert_eq!(ArchiveFormat::from_file_name("tool.ZIP").ok(), Some(ArchiveFormat::Zip));
    /// assert_eq!(ArchiveFormat::from_file_name("jq-linux64").ok(), Some(ArchiveFormat::Raw));
    /// assert!(ArchiveFormat::from_file_name("rg.tar.xz").is_err());
    /// ```
    pub fn from_file_name(name: &str) -> Result<Self, ExtractionError> {
        let lower = name.to_ascii_lowercase();
        let format = if lower.ends_with(".tar.gz") || lower.ends_with(".tgz") {
            Self::TarGz
        } else if lower.ends_with(".tar.zst") || lower.ends_with(".tzst") {
            Self::TarZst
        } else if lower.ends_with(".tar") {
            Self::Tar
        } else if lower.ends_with(".zip") {
            Self::Zip
        } else if UNSUPPORTED_SUFFIXES
            .iter()
            .any(|suffix| lower.ends_with(suffix))
        {
            return Err(ExtractionError::UnsupportedFormat {
                file_name: name.to_owned(),
            });
        } else {
            Self::Raw
        };
        Ok(format)
    }
}

/// Trait for unpacking archives, enabling test mocking.
#[cfg_attr(test, mockall::automock)]
pub trait Extractor: Send + Sync {
    /// Extract `archive_path` into `dest_dir`.
    ///
    /// Returns the relative paths of the regular files written.
    ///
    /// # Errors
    ///
    /// Returns [`ExtractionError::PathTraversal`] if an entry would escape
    /// `dest_dir`, [`ExtractionError::EmptyArchive`] if no file was found,
    /// and [`ExtractionError::Cancelled`] once `cancel` fires.
    fn extract(
        &self,
        archive_path: &Path,
        format: ArchiveFormat,
        dest_dir: &Path,
        cancel: &CancellationToken,
    ) -> Result<Vec<PathBuf>, ExtractionError>;
}

/// Errors arising from archive extraction.
#[derive(Debug, thiserror::Error)]
pub enum ExtractionError {
    /// I/O error during extraction.
    #[error("extraction I/O error: {0}")]
    Io(#[from] io::Error),

    /// A path in the archive attempts to traverse outside the destination.
    #[error("path traversal detected: {path}")]
    PathTraversal {
        /// The offending path from the archive entry.
        path: String,
    },

    /// The archive contains no files.
    #[error("archive contains no files")]
    EmptyArchive,

    /// The archive suffix is known but cannot be unpacked.
    #[error("unsupported archive format: {file_name}")]
    UnsupportedFormat {
        /// The archive's file name.
        file_name: String,
    },

    /// The archive structure could not be read.
    #[error("corrupt archive: {reason}")]
    Corrupt {
        /// Description from the archive decoder.
        reason: String,
    },

    /// Extraction was cancelled between entries.
    #[error("extraction was cancelled")]
    Cancelled,
}

impl From<zip::result::ZipError> for ExtractionError {
    fn from(err: zip::result::ZipError) -> Self {
        match err {
            zip::result::ZipError::Io(io) => Self::Io(io),
            other => Self::Corrupt {
                reason: other.to_string(),
            },
        }
    }
}

/// Default extractor using `tar`, `flate2`, `zstd`, and `zip`.
#[derive(Debug, Default, Clone, Copy)]
pub struct ArchiveExtractor;

impl Extractor for ArchiveExtractor {
    fn extract(
        &self,
        archive_path: &Path,
        format: ArchiveFormat,
        dest_dir: &Path,
        cancel: &CancellationToken,
    ) -> Result<Vec<PathBuf>, ExtractionError> {
        log::debug!(
            "extracting {} as {format:?} into {}",
            archive_path.display(),
            dest_dir.display()
        );
        fs::create_dir_all(dest_dir)?;
        let extracted = match format {
            ArchiveFormat::TarGz => {
                let decoder = flate2::read::GzDecoder::new(File::open(archive_path)?);
                extract_tar(decoder, dest_dir, cancel)?
            }
            ArchiveFormat::TarZst => {
                let decoder = zstd::Decoder::new(File::open(archive_path)?)?;
                extract_tar(decoder, dest_dir, cancel)?
            }
            ArchiveFormat::Tar => extract_tar(File::open(archive_path)?, dest_dir, cancel)?,
            ArchiveFormat::Zip => extract_zip(archive_path, dest_dir, cancel)?,
            ArchiveFormat::Raw => extract_raw(archive_path, dest_dir, cancel)?,
        };

        if extracted.is_empty() {
            return Err(ExtractionError::EmptyArchive);
        }
        log::trace!("extracted {} files", extracted.len());
        Ok(extracted)
    }
}

fn extract_tar<R: Read>(
    reader: R,
    dest_dir: &Path,
    cancel: &CancellationToken,
) -> Result<Vec<PathBuf>, ExtractionError> {
    let mut archive = tar::Archive::new(reader);
    let mut extracted = Vec::new();

    for entry_result in archive.entries()? {
        if cancel.is_cancelled() {
            return Err(ExtractionError::Cancelled);
        }
        let mut entry = entry_result?;
        let entry_path = entry.path()?.into_owned();
        validate_entry_path(&entry_path)?;

        let entry_type = entry.header().entry_type();
        let dest_path = dest_dir.join(&entry_path);
        if entry_type.is_dir() {
            fs::create_dir_all(&dest_path)?;
            continue;
        }
        if !entry_type.is_file() {
            log::debug!("skipping non-regular entry {}", entry_path.display());
            continue;
        }
        if let Some(parent) = dest_path.parent() {
            fs::create_dir_all(parent)?;
        }
        entry.unpack(&dest_path)?;
        extracted.push(normalise(&entry_path));
    }

    Ok(extracted)
}

fn extract_zip(
    archive_path: &Path,
    dest_dir: &Path,
    cancel: &CancellationToken,
) -> Result<Vec<PathBuf>, ExtractionError> {
    let mut archive = zip::ZipArchive::new(File::open(archive_path)?)?;
    let mut extracted = Vec::new();

    for index in 0..archive.len() {
        if cancel.is_cancelled() {
            return Err(ExtractionError::Cancelled);
        }
        let mut file = archive.by_index(index)?;
        let Some(entry_path) = file.enclosed_name().map(|path| path.to_path_buf()) else {
            return Err(ExtractionError::PathTraversal {
                path: file.name().to_owned(),
            });
        };
        validate_entry_path(&entry_path)?;

        let dest_path = dest_dir.join(&entry_path);
        if file.is_dir() {
            fs::create_dir_all(&dest_path)?;
            continue;
        }
        if let Some(parent) = dest_path.parent() {
            fs::create_dir_all(parent)?;
        }
        let mut out = File::create(&dest_path)?;
        io::copy(&mut file, &mut out)?;
        #[cfg(unix)]
        if let Some(mode) = file.unix_mode() {
            use std::os::unix::fs::PermissionsExt;
            fs::set_permissions(&dest_path, fs::Permissions::from_mode(mode & 0o777))?;
        }
        extracted.push(normalise(&entry_path));
    }

    Ok(extracted)
}

fn extract_raw(
    archive_path: &Path,
    dest_dir: &Path,
    cancel: &CancellationToken,
) -> Result<Vec<PathBuf>, ExtractionError> {
    if cancel.is_cancelled() {
        return Err(ExtractionError::Cancelled);
    }
    let Some(file_name) = archive_path.file_name() else {
        return Err(ExtractionError::EmptyArchive);
    };
    fs::copy(archive_path, dest_dir.join(file_name))?;
    Ok(vec![PathBuf::from(file_name)])
}

/// Validate that an entry path does not escape the destination directory
/// via `..` components or absolute paths.
fn validate_entry_path(path: &Path) -> Result<(), ExtractionError> {
    if path.is_absolute() {
        return Err(ExtractionError::PathTraversal {
            path: path.display().to_string(),
        });
    }
    for component in path.components() {
        if matches!(
            component,
            Component::ParentDir | Component::RootDir | Component::Prefix(_)
        ) {
            return Err(ExtractionError::PathTraversal {
                path: path.display().to_string(),
            });
        }
    }
    Ok(())
}

/// Drop `.` components so reported paths compare cleanly.
fn normalise(path: &Path) -> PathBuf {
    path.components()
        .filter(|component| !matches!(component, Component::CurDir))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;
    use std::io::Write;

    fn write_tar_gz(path: &Path, entries: &[(&str, &[u8])]) {
        let file = File::create(path).expect("create archive");
        let encoder = flate2::write::GzEncoder::new(file, flate2::Compression::default());
        let mut builder = tar::Builder::new(encoder);
        for (name, data) in entries {
            let mut header = tar::Header::new_gnu();
            header.set_size(data.len() as u64);
            header.set_mode(0o755);
            header.set_cksum();
            builder
                .append_data(&mut header, name, *data)
                .expect("append entry");
        }
        let encoder = builder.into_inner().expect("tar finish");
        encoder.finish().expect("gzip finish");
    }

    #[rstest]
    #[case::tgz("tool.tgz", ArchiveFormat::TarGz)]
    #[case::tar_gz("tool-1.0-x86_64.tar.gz", ArchiveFormat::TarGz)]
    #[case::tar_zst("tool.tar.zst", ArchiveFormat::TarZst)]
    #[case::tzst("tool.tzst", ArchiveFormat::TarZst)]
    #[case::tar("tool.tar", ArchiveFormat::Tar)]
    #[case::zip("tool.zip", ArchiveFormat::Zip)]
    #[case::bare("jq-linux-amd64", ArchiveFormat::Raw)]
    fn detects_formats(#[case] name: &str, #[case] expected: ArchiveFormat) {
        assert_eq!(
            ArchiveFormat::from_file_name(name).expect("known format"),
            expected
        );
    }

    #[rstest]
    #[case("tool.tar.xz")]
    #[case("tool.txz")]
    #[case("tool.tar.bz2")]
    #[case("tool.7z")]
    fn rejects_unsupported_formats(#[case] name: &str) {
        assert!(matches!(
            ArchiveFormat::from_file_name(name),
            Err(ExtractionError::UnsupportedFormat { .. })
        ));
    }

    #[test]
    fn extracts_nested_tar_gz_entries() {
        let temp = tempfile::tempdir().expect("temp dir");
        let archive = temp.path().join("tool.tar.gz");
        write_tar_gz(
            &archive,
            &[("tool-1.0/bin/tool", b"#!/bin/sh\n"), ("tool-1.0/README", b"hi")],
        );
        let dest = temp.path().join("out");

        let files = ArchiveExtractor
            .extract(&archive, ArchiveFormat::TarGz, &dest, &CancellationToken::new())
            .expect("extract");

        assert_eq!(
            files,
            vec![
                PathBuf::from("tool-1.0/bin/tool"),
                PathBuf::from("tool-1.0/README")
            ]
        );
        assert!(dest.join("tool-1.0/bin/tool").is_file());
    }

    #[test]
    fn extracts_tar_zst() {
        let temp = tempfile::tempdir().expect("temp dir");
        let archive = temp.path().join("test.tar.zst");
        let dest = temp.path().join("out");
        let source_file = temp.path().join("hello.txt");
        fs::write(&source_file, b"hello world").expect("write source");

        let output_file = File::create(&archive).expect("create archive");
        let encoder = zstd::Encoder::new(output_file, 0).expect("zstd encoder");
        let mut builder = tar::Builder::new(encoder);
        builder
            .append_path_with_name(&source_file, "hello.txt")
            .expect("append");
        let encoder = builder.into_inner().expect("tar finish");
        encoder.finish().expect("zstd finish");

        let files = ArchiveExtractor
            .extract(&archive, ArchiveFormat::TarZst, &dest, &CancellationToken::new())
            .expect("extract");
        assert_eq!(files, vec![PathBuf::from("hello.txt")]);
    }

    #[test]
    fn extracts_zip_entries() {
        let temp = tempfile::tempdir().expect("temp dir");
        let archive = temp.path().join("tool.zip");
        let file = File::create(&archive).expect("create zip");
        let mut writer = zip::ZipWriter::new(file);
        let options = zip::write::SimpleFileOptions::default().unix_permissions(0o755);
        writer.add_directory("bin/", options).expect("dir");
        writer.start_file("bin/tool", options).expect("start file");
        writer.write_all(b"binary").expect("write");
        writer.finish().expect("finish zip");
        let dest = temp.path().join("out");

        let files = ArchiveExtractor
            .extract(&archive, ArchiveFormat::Zip, &dest, &CancellationToken::new())
            .expect("extract");

        assert_eq!(files, vec![PathBuf::from("bin/tool")]);
        assert_eq!(fs::read(dest.join("bin/tool")).expect("read"), b"binary");
    }

    #[test]
    fn raw_file_is_copied_under_its_name() {
        let temp = tempfile::tempdir().expect("temp dir");
        let archive = temp.path().join("jq-linux64");
        fs::write(&archive, b"ELF").expect("write");
        let dest = temp.path().join("out");

        let files = ArchiveExtractor
            .extract(&archive, ArchiveFormat::Raw, &dest, &CancellationToken::new())
            .expect("extract");

        assert_eq!(files, vec![PathBuf::from("jq-linux64")]);
        assert_eq!(fs::read(dest.join("jq-linux64")).expect("read"), b"ELF");
    }

    #[test]
    fn empty_archive_is_rejected() {
        let temp = tempfile::tempdir().expect("temp dir");
        let archive = temp.path().join("empty.tar.gz");
        write_tar_gz(&archive, &[]);

        let result = ArchiveExtractor.extract(
            &archive,
            ArchiveFormat::TarGz,
            &temp.path().join("out"),
            &CancellationToken::new(),
        );
        assert!(matches!(result, Err(ExtractionError::EmptyArchive)));
    }

    #[test]
    fn corrupt_gzip_is_an_error() {
        let temp = tempfile::tempdir().expect("temp dir");
        let archive = temp.path().join("bad.tar.gz");
        fs::write(&archive, b"definitely not gzip").expect("write");

        let result = ArchiveExtractor.extract(
            &archive,
            ArchiveFormat::TarGz,
            &temp.path().join("out"),
            &CancellationToken::new(),
        );
        assert!(result.is_err());
    }

    #[test]
    fn cancelled_token_stops_extraction() {
        let temp = tempfile::tempdir().expect("temp dir");
        let archive = temp.path().join("tool.tar.gz");
        write_tar_gz(&archive, &[("tool", b"x")]);
        let cancel = CancellationToken::new();
        cancel.cancel();

        let result = ArchiveExtractor.extract(
            &archive,
            ArchiveFormat::TarGz,
            &temp.path().join("out"),
            &cancel,
        );
        assert!(matches!(result, Err(ExtractionError::Cancelled)));
    }

    #[rstest]
    #[case::parent_dir("../escape.txt")]
    #[case::nested_parent("foo/../../escape.txt")]
    #[case::absolute("/etc/passwd")]
    fn rejects_path_traversal(#[case] bad_path: &str) {
        let result = validate_entry_path(Path::new(bad_path));
        assert!(
            matches!(result, Err(ExtractionError::PathTraversal { .. })),
            "expected PathTraversal for {bad_path}"
        );
    }

    #[rstest]
    #[case("lib/libfoo.so")]
    #[case("./tool")]
    fn accepts_contained_paths(#[case] path: &str) {
        assert!(validate_entry_path(Path::new(path)).is_ok());
    }

    #[test]
    fn normalise_strips_current_dir_components() {
        assert_eq!(normalise(Path::new("./bin/./tool")), PathBuf::from("bin/tool"));
    }
}
