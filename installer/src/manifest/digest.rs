//! Content digests for downloaded release archives.
//!
//! The hash algorithm is implied by the digest text: 64 hex characters are
//! SHA-256 and 128 are SHA-512. An explicit `sha256:` or `sha512:` prefix is
//! accepted too. Digests are normalised to lowercase on construction.

use super::error::{ManifestError, Result};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use sha2::{Digest, Sha256, Sha512};
use std::fmt;
use std::fs::File;
use std::io::{self, Read};
use std::path::Path;

const SHA256_HEX_LEN: usize = 64;
const SHA512_HEX_LEN: usize = 128;
const READ_CHUNK: usize = 64 * 1024;

/// Hash algorithm used to verify an archive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DigestAlgorithm {
    /// SHA-256, hex length 64.
    Sha256,
    /// SHA-512, hex length 128.
    Sha512,
}

impl DigestAlgorithm {
    /// Return the lowercase algorithm label used in prefixed digests.
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::Sha256 => "sha256",
            Self::Sha512 => "sha512",
        }
    }

    const fn hex_len(self) -> usize {
        match self {
            Self::Sha256 => SHA256_HEX_LEN,
            Self::Sha512 => SHA512_HEX_LEN,
        }
    }

    fn from_label(label: &str) -> Option<Self> {
        match label.to_ascii_lowercase().as_str() {
            "sha256" => Some(Self::Sha256),
            "sha512" => Some(Self::Sha512),
            _ => None,
        }
    }

    fn from_hex_len(len: usize) -> Option<Self> {
        match len {
            SHA256_HEX_LEN => Some(Self::Sha256),
            SHA512_HEX_LEN => Some(Self::Sha512),
            _ => None,
        }
    }
}

impl fmt::Display for DigestAlgorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// A validated, lowercase hex content digest.
///
/// # Examples
///
/// ```
/// use tap_installer::manifest::digest::{ContentDigest, DigestAlgorithm};
///
/// let digest = ContentDigest::parse(&"AB".repeat(32)).expect("valid digest");
/// assert_eq!(digest.algorithm(), DigestAlgorithm::Sha256);
/// assert_eq!(digest.hex(), "ab".repeat(32));
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ContentDigest {
    algorithm: DigestAlgorithm,
    hex: String,
}

impl ContentDigest {
    /// Parse digest text, inferring the algorithm from its shape.
    ///
    /// # Errors
    ///
    /// Returns [`ManifestError::InvalidDigest`] when the text is empty, has
    /// an unknown prefix, the wrong length, or non-hex characters.
    pub fn parse(value: &str) -> Result<Self> {
        let trimmed = value.trim();
        if trimmed.is_empty() {
            return Err(invalid(value, "digest must not be empty"));
        }

        let (algorithm, hex) = match trimmed.split_once(':') {
            Some((label, hex)) => {
                let algorithm = DigestAlgorithm::from_label(label)
                    .ok_or_else(|| invalid(value, format!("unknown algorithm \"{label}\"")))?;
                (algorithm, hex)
            }
            None => {
                let algorithm = DigestAlgorithm::from_hex_len(trimmed.len()).ok_or_else(|| {
                    invalid(
                        value,
                        format!(
                            "expected {SHA256_HEX_LEN} (sha256) or {SHA512_HEX_LEN} (sha512) hex characters, got {}",
                            trimmed.len()
                        ),
                    )
                })?;
                (algorithm, trimmed)
            }
        };

        if hex.len() != algorithm.hex_len() {
            return Err(invalid(
                value,
                format!(
                    "{algorithm} digest needs {} hex characters, got {}",
                    algorithm.hex_len(),
                    hex.len()
                ),
            ));
        }
        if let Some(bad) = hex.chars().find(|c| !c.is_ascii_hexdigit()) {
            return Err(invalid(value, format!("non-hex character '{bad}'")));
        }

        Ok(Self {
            algorithm,
            hex: hex.to_ascii_lowercase(),
        })
    }

    /// Return the hash algorithm.
    #[must_use]
    pub fn algorithm(&self) -> DigestAlgorithm {
        self.algorithm
    }

    /// Return the lowercase hex digest without a prefix.
    #[must_use]
    pub fn hex(&self) -> &str {
        &self.hex
    }

    /// Hash `bytes` with `algorithm`.
    #[must_use]
    pub fn of_bytes(algorithm: DigestAlgorithm, bytes: &[u8]) -> Self {
        let hex = match algorithm {
            DigestAlgorithm::Sha256 => format!("{:x}", Sha256::digest(bytes)),
            DigestAlgorithm::Sha512 => format!("{:x}", Sha512::digest(bytes)),
        };
        Self { algorithm, hex }
    }

    /// Hash the file at `path` with `algorithm`, reading it in chunks.
    ///
    /// # Errors
    ///
    /// Returns an I/O error if the file cannot be opened or read.
    pub fn of_file(algorithm: DigestAlgorithm, path: &Path) -> io::Result<Self> {
        let file = File::open(path)?;
        let hex = match algorithm {
            DigestAlgorithm::Sha256 => hash_reader::<Sha256>(file)?,
            DigestAlgorithm::Sha512 => hash_reader::<Sha512>(file)?,
        };
        Ok(Self { algorithm, hex })
    }

    /// Hash `path` with this digest's algorithm and report whether it matches.
    ///
    /// Returns the actual digest so a mismatch can be reported in full.
    ///
    /// # Errors
    ///
    /// Returns an I/O error if the file cannot be read.
    pub fn verify_file(&self, path: &Path) -> io::Result<(bool, Self)> {
        let actual = Self::of_file(self.algorithm, path)?;
        Ok((actual == *self, actual))
    }
}

fn hash_reader<D: Digest>(mut reader: impl Read) -> io::Result<String> {
    let mut hasher = D::new();
    let mut buffer = vec![0u8; READ_CHUNK];
    loop {
        let read = reader.read(&mut buffer)?;
        if read == 0 {
            break;
        }
        hasher.update(buffer.get(..read).unwrap_or_default());
    }
    let bytes = hasher.finalize();
    Ok(bytes.iter().map(|b| format!("{b:02x}")).collect())
}

fn invalid(value: &str, reason: impl Into<String>) -> ManifestError {
    ManifestError::InvalidDigest {
        value: value.to_owned(),
        reason: reason.into(),
    }
}

impl fmt::Display for ContentDigest {
    /// Formats as `algorithm:hex`, which [`ContentDigest::parse`] accepts.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.algorithm, self.hex)
    }
}

impl TryFrom<&str> for ContentDigest {
    type Error = ManifestError;

    fn try_from(value: &str) -> Result<Self> {
        Self::parse(value)
    }
}

impl Serialize for ContentDigest {
    /// Serialises the bare hex; the algorithm is recovered from its length.
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.hex)
    }
}

impl<'de> Deserialize<'de> for ContentDigest {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let text = String::deserialize(deserializer)?;
        Self::parse(&text).map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[test]
    fn infers_sha256_from_length() {
        let digest = ContentDigest::parse(&"a".repeat(64)).expect("valid");
        assert_eq!(digest.algorithm(), DigestAlgorithm::Sha256);
    }

    #[test]
    fn infers_sha512_from_length() {
        let digest = ContentDigest::parse(&"b".repeat(128)).expect("valid");
        assert_eq!(digest.algorithm(), DigestAlgorithm::Sha512);
    }

    #[test]
    fn accepts_prefixed_digest() {
        let text = format!("SHA256:{}", "c".repeat(64));
        let digest = ContentDigest::parse(&text).expect("valid");
        assert_eq!(digest.algorithm(), DigestAlgorithm::Sha256);
        assert_eq!(digest.to_string(), format!("sha256:{}", "c".repeat(64)));
    }

    #[rstest]
    #[case::empty("")]
    #[case::blank("   ")]
    #[case::short("abcdef")]
    #[case::non_hex(&format!("{}g", "a".repeat(63)))]
    #[case::unknown_prefix(&format!("md5:{}", "a".repeat(32)))]
    #[case::prefix_length_mismatch(&format!("sha512:{}", "a".repeat(64)))]
    fn rejects_malformed_digests(#[case] text: &str) {
        let result = ContentDigest::parse(text);
        assert!(
            matches!(result, Err(ManifestError::InvalidDigest { .. })),
            "expected rejection of {text:?}"
        );
    }

    #[test]
    fn hashes_known_vector() {
        let digest = ContentDigest::of_bytes(DigestAlgorithm::Sha256, b"abc");
        assert_eq!(
            digest.hex(),
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
    }

    #[test]
    fn file_hash_matches_byte_hash() {
        let temp = tempfile::tempdir().expect("temp dir");
        let path = temp.path().join("blob");
        std::fs::write(&path, b"hello world").expect("write blob");

        for algorithm in [DigestAlgorithm::Sha256, DigestAlgorithm::Sha512] {
            let from_file = ContentDigest::of_file(algorithm, &path).expect("hash file");
            assert_eq!(from_file, ContentDigest::of_bytes(algorithm, b"hello world"));
        }
    }

    #[test]
    fn verify_file_reports_actual_digest_on_mismatch() {
        let temp = tempfile::tempdir().expect("temp dir");
        let path = temp.path().join("blob");
        std::fs::write(&path, b"tampered").expect("write blob");

        let expected = ContentDigest::of_bytes(DigestAlgorithm::Sha256, b"original");
        let (matches, actual) = expected.verify_file(&path).expect("hash file");
        assert!(!matches);
        assert_eq!(actual, ContentDigest::of_bytes(DigestAlgorithm::Sha256, b"tampered"));
    }
}
