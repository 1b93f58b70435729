//! Archive retrieval over HTTPS.
//!
//! Provides a trait-based abstraction for downloading a variant's archive
//! into a local file, so that the install pipeline can be exercised without
//! network access. The production implementation uses `ureq` with a global
//! timeout and bounded exponential-backoff retry.

use crate::cancel::CancellationToken;
use std::fs::File;
use std::io::{self, Read, Write};
use std::path::Path;
use std::time::Duration;

/// User agent sent with every request.
pub const USER_AGENT: &str = concat!("tap-installer/", env!("CARGO_PKG_VERSION"));

/// Default network timeout for one download attempt.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(300);

const COPY_CHUNK: usize = 64 * 1024;
const SLEEP_SLICE: Duration = Duration::from_millis(50);

/// Trait for fetching a URL into a local file.
///
/// Implementations must truncate `dest` before writing and must return
/// [`FetchError::Cancelled`] promptly once `cancel` fires.
#[cfg_attr(test, mockall::automock)]
pub trait Fetcher: Send + Sync {
    /// Download `url` into `dest`, returning the number of bytes written.
    ///
    /// # Errors
    ///
    /// Returns a [`FetchError`] describing the transport, HTTP status, or
    /// local I/O failure.
    fn fetch(&self, url: &str, dest: &Path, cancel: &CancellationToken) -> Result<u64, FetchError>;
}

/// Errors arising from fetch operations.
#[derive(Debug, thiserror::Error)]
pub enum FetchError {
    /// The server answered 404.
    #[error("not found: {url}")]
    NotFound {
        /// The requested URL.
        url: String,
    },

    /// The server answered with another non-success status.
    #[error("HTTP status {status} for {url}")]
    Status {
        /// The requested URL.
        url: String,
        /// The HTTP status code.
        status: u16,
    },

    /// The connection failed, timed out, or the body stream broke.
    #[error("request failed for {url}: {reason}")]
    Transport {
        /// The requested URL.
        url: String,
        /// A human-readable description of the failure.
        reason: String,
    },

    /// Writing the downloaded bytes locally failed.
    #[error("I/O error writing download of {url}: {source}")]
    Io {
        /// The requested URL.
        url: String,
        /// The underlying I/O error.
        #[source]
        source: io::Error,
    },

    /// The caller cancelled the download or its deadline passed.
    #[error("download of {url} was cancelled")]
    Cancelled {
        /// The requested URL.
        url: String,
    },
}

impl FetchError {
    /// Whether another attempt could plausibly succeed.
    ///
    /// Transport failures, server errors, and throttling responses are
    /// retryable; client errors, local I/O errors, and cancellation are not.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Transport { .. } => true,
            Self::Status { status, .. } => *status >= 500 || matches!(status, 408 | 429),
            Self::NotFound { .. } | Self::Io { .. } | Self::Cancelled { .. } => false,
        }
    }
}

/// Bounded exponential backoff.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts including the first; at least one is always made.
    pub max_attempts: u32,
    /// Delay before the second attempt.
    pub initial_backoff: Duration,
    /// Upper bound for any single delay.
    pub max_backoff: Duration,
}

impl RetryPolicy {
    /// A policy that makes exactly one attempt.
    #[must_use]
    pub const fn none() -> Self {
        Self {
            max_attempts: 1,
            initial_backoff: Duration::ZERO,
            max_backoff: Duration::ZERO,
        }
    }

    /// Delay to wait after failed attempt number `attempt` (1-based).
    ///
    /// # Examples
    ///
    /// ```
    /// use std::time::Duration;
    /// use tap_installer::fetch::RetryPolicy;
    ///
    /// let policy = RetryPolicy {
    ///     max_attempts: 5,
    ///     initial_backoff: Duration::from_millis(100),
    ///     max_backoff: Duration::from_millis(300),
    /// };
    /// assert_eq!(policy.backoff_after(1), Duration::from_millis(100));
    /// assert_eq!(policy.backoff_after(2), Duration::from_millis(200));
    /// assert_eq!(policy.backoff_after(3), Duration::from_millis(300));
    /// ```
    #[must_use]
    pub fn backoff_after(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1).min(16);
        self.initial_backoff
            .saturating_mul(1u32 << exponent)
            .min(self.max_backoff)
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            initial_backoff: Duration::from_millis(500),
            max_backoff: Duration::from_secs(8),
        }
    }
}

/// Run `attempt` until it succeeds, fails permanently, or the policy is
/// exhausted, sleeping with backoff between tries.
///
/// # Errors
///
/// Returns the last attempt's error, or [`FetchError::Cancelled`] if the
/// token fires while waiting.
pub fn with_retry<F>(
    policy: &RetryPolicy,
    url: &str,
    cancel: &CancellationToken,
    mut attempt: F,
) -> Result<u64, FetchError>
where
    F: FnMut() -> Result<u64, FetchError>,
{
    let max_attempts = policy.max_attempts.max(1);
    let mut tries = 0;
    loop {
        tries += 1;
        match attempt() {
            Ok(bytes) => return Ok(bytes),
            Err(err) if err.is_retryable() && tries < max_attempts => {
                let delay = policy.backoff_after(tries);
                log::warn!(
                    "attempt {tries}/{max_attempts} for {url} failed: {err}; retrying in {}ms",
                    delay.as_millis()
                );
                sleep_cancellable(delay, cancel).map_err(|()| FetchError::Cancelled {
                    url: url.to_owned(),
                })?;
            }
            Err(err) => return Err(err),
        }
    }
}

fn sleep_cancellable(delay: Duration, cancel: &CancellationToken) -> Result<(), ()> {
    let mut remaining = delay;
    while !remaining.is_zero() {
        if cancel.is_cancelled() {
            return Err(());
        }
        let slice = remaining.min(SLEEP_SLICE);
        std::thread::sleep(slice);
        remaining = remaining.saturating_sub(slice);
    }
    if cancel.is_cancelled() {
        return Err(());
    }
    Ok(())
}

/// Copy `reader` into `writer` in chunks, checking `cancel` between chunks.
///
/// Read failures are reported as [`FetchError::Transport`] since they come
/// from the network stream; write failures as [`FetchError::Io`].
///
/// # Errors
///
/// Returns [`FetchError::Cancelled`] once the token fires.
pub fn copy_cancellable(
    url: &str,
    reader: &mut dyn Read,
    writer: &mut dyn Write,
    cancel: &CancellationToken,
) -> Result<u64, FetchError> {
    let mut buffer = vec![0u8; COPY_CHUNK];
    let mut total: u64 = 0;
    loop {
        if cancel.is_cancelled() {
            return Err(FetchError::Cancelled {
                url: url.to_owned(),
            });
        }
        let read = match reader.read(&mut buffer) {
            Ok(0) => break,
            Ok(read) => read,
            Err(err) if err.kind() == io::ErrorKind::Interrupted => continue,
            Err(err) => {
                return Err(FetchError::Transport {
                    url: url.to_owned(),
                    reason: err.to_string(),
                });
            }
        };
        let chunk = buffer.get(..read).unwrap_or_default();
        writer.write_all(chunk).map_err(|source| FetchError::Io {
            url: url.to_owned(),
            source,
        })?;
        total = total.saturating_add(u64::try_from(read).unwrap_or(u64::MAX));
    }
    writer.flush().map_err(|source| FetchError::Io {
        url: url.to_owned(),
        source,
    })?;
    Ok(total)
}

/// HTTP fetcher using a shared `ureq` agent.
pub struct HttpFetcher {
    agent: ureq::Agent,
    retry: RetryPolicy,
}

impl HttpFetcher {
    /// Create a fetcher with the given per-attempt timeout and retry policy.
    #[must_use]
    pub fn new(timeout: Duration, retry: RetryPolicy) -> Self {
        let config = ureq::Agent::config_builder()
            .timeout_global(Some(timeout))
            .build();
        Self {
            agent: ureq::Agent::new_with_config(config),
            retry,
        }
    }

    fn fetch_once(
        &self,
        url: &str,
        dest: &Path,
        cancel: &CancellationToken,
    ) -> Result<u64, FetchError> {
        let response = self
            .agent
            .get(url)
            .header("User-Agent", USER_AGENT)
            .call()
            .map_err(|e| map_ureq_error(url, &e))?;
        let mut file = File::create(dest).map_err(|source| FetchError::Io {
            url: url.to_owned(),
            source,
        })?;
        let mut body = response.into_body();
        let mut reader = body.as_reader();
        copy_cancellable(url, &mut reader, &mut file, cancel)
    }
}

impl Default for HttpFetcher {
    fn default() -> Self {
        Self::new(DEFAULT_TIMEOUT, RetryPolicy::default())
    }
}

impl Fetcher for HttpFetcher {
    fn fetch(&self, url: &str, dest: &Path, cancel: &CancellationToken) -> Result<u64, FetchError> {
        log::debug!("fetching {url} into {}", dest.display());
        let bytes = with_retry(&self.retry, url, cancel, || {
            self.fetch_once(url, dest, cancel)
        })?;
        log::info!("fetched {bytes} bytes from {url}");
        Ok(bytes)
    }
}

/// Map a ureq error to a [`FetchError`].
fn map_ureq_error(url: &str, err: &ureq::Error) -> FetchError {
    match err {
        ureq::Error::StatusCode(404) => FetchError::NotFound {
            url: url.to_owned(),
        },
        ureq::Error::StatusCode(status) => FetchError::Status {
            url: url.to_owned(),
            status: *status,
        },
        other => FetchError::Transport {
            url: url.to_owned(),
            reason: other.to_string(),
        },
    }
}
