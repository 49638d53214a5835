//! Downloading release assets and model files.
//!
//! The installer talks to the network only through the [`Fetcher`] trait so
//! the reconciler can be exercised offline.
use std::{io::Write, time::Duration};

use reqwest::{
    blocking::Client,
    header::{HeaderMap, HeaderValue, ACCEPT, USER_AGENT},
    StatusCode,
};
use serde::Deserialize;

use crate::error::{InstallerError, InstallerErrorKind};

const DOWNLOAD_TIMEOUT_SECS: u64 = 600;
const CONNECT_TIMEOUT_SECS: u64 = 30;
const USER_AGENT_STRING: &str = concat!("grars-setup/", env!("CARGO_PKG_VERSION"));
const GITHUB_API_URL: &str = "https://api.github.com";

/// Error returned by a [`Fetcher`].
#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum FetchError {
    /// The HTTP client failed to connect or to read the response.
    #[error(transparent)]
    Http(#[from] reqwest::Error),

    /// The server answered with an unsuccessful status code.
    #[error("server responded with HTTP status {0}")]
    Status(u16),

    /// Writing the response failed.
    #[error(transparent)]
    Io(#[from] std::io::Error),

    /// The network is not available to this fetcher.
    #[error("network unavailable")]
    Offline,

    /// Any other error.
    #[error("{0}")]
    Other(String),
}

impl FetchError {
    /// Returns whether trying the same request again may succeed.
    ///
    /// Connection errors, timeouts, HTTP 5xx and HTTP 429 are transient.
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Http(error) => error.is_timeout() || error.is_connect(),
            Self::Status(code) => *code == 429 || (500..600).contains(code),
            Self::Io(error) => matches!(
                error.kind(),
                std::io::ErrorKind::TimedOut
                    | std::io::ErrorKind::ConnectionReset
                    | std::io::ErrorKind::ConnectionAborted
                    | std::io::ErrorKind::UnexpectedEof
            ),
            Self::Offline | Self::Other(_) => false,
        }
    }
}

impl From<FetchError> for InstallerError {
    fn from(value: FetchError) -> Self {
        InstallerError::new(InstallerErrorKind::DownloadFailure).with_source(value)
    }
}

/// Source of remote files.
pub trait Fetcher {
    /// Returns the tag name of the latest published release of a GitHub
    /// repository given as `owner/name`.
    fn latest_release_tag(&self, repo: &str) -> Result<String, FetchError>;

    /// Streams the body of `url` into `output` and returns the number of bytes written.
    fn download(&self, url: &str, output: &mut dyn Write) -> Result<u64, FetchError>;
}

#[derive(Debug, Deserialize)]
struct ReleaseInfo {
    tag_name: String,
}

/// Blocking HTTPS implementation of [`Fetcher`].
#[derive(Debug, Clone)]
pub struct HttpFetcher {
    client: Client,
    api_url: String,
}

impl HttpFetcher {
    /// Creates a client with the default timeouts and user agent.
    pub fn new() -> Result<Self, InstallerError> {
        let mut headers = HeaderMap::new();
        headers.insert(USER_AGENT, HeaderValue::from_static(USER_AGENT_STRING));
        headers.insert(ACCEPT, HeaderValue::from_static("*/*"));

        let client = Client::builder()
            .timeout(Duration::from_secs(DOWNLOAD_TIMEOUT_SECS))
            .connect_timeout(Duration::from_secs(CONNECT_TIMEOUT_SECS))
            .default_headers(headers)
            .redirect(reqwest::redirect::Policy::limited(10))
            .build()
            .map_err(|error| {
                InstallerError::new(InstallerErrorKind::Other)
                    .with_context("failed to build HTTP client")
                    .with_source(error)
            })?;

        Ok(Self {
            client,
            api_url: GITHUB_API_URL.to_string(),
        })
    }

    /// Uses another base URL for the releases API.
    pub fn with_api_url<S: Into<String>>(mut self, api_url: S) -> Self {
        self.api_url = api_url.into();
        self
    }

    fn check_status(url: &str, status: StatusCode) -> Result<(), FetchError> {
        if status.is_success() {
            Ok(())
        } else {
            tracing::warn!(url, %status, "unsuccessful HTTP response");
            Err(FetchError::Status(status.as_u16()))
        }
    }
}

impl Fetcher for HttpFetcher {
    fn latest_release_tag(&self, repo: &str) -> Result<String, FetchError> {
        let url = format!("{}/repos/{}/releases/latest", self.api_url, repo);
        tracing::debug!(url, "requesting latest release");

        let response = self
            .client
            .get(&url)
            .header(ACCEPT, "application/vnd.github+json")
            .send()?;
        Self::check_status(&url, response.status())?;

        let info = response.json::<ReleaseInfo>()?;
        tracing::info!(repo, tag = info.tag_name, "found latest release");

        Ok(info.tag_name)
    }

    fn download(&self, url: &str, output: &mut dyn Write) -> Result<u64, FetchError> {
        tracing::info!(url, "downloading");

        let mut response = self.client.get(url).send()?;
        Self::check_status(url, response.status())?;

        let len = response.copy_to(output)?;
        tracing::debug!(url, len, "downloaded");

        Ok(len)
    }
}

/// A [`Fetcher`] that never reaches the network.
#[derive(Debug, Clone, Copy, Default)]
pub struct OfflineFetcher;

impl Fetcher for OfflineFetcher {
    fn latest_release_tag(&self, _repo: &str) -> Result<String, FetchError> {
        Err(FetchError::Offline)
    }

    fn download(&self, _url: &str, _output: &mut dyn Write) -> Result<u64, FetchError> {
        Err(FetchError::Offline)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transient() {
        assert!(FetchError::Status(503).is_transient());
        assert!(FetchError::Status(429).is_transient());
        assert!(!FetchError::Status(404).is_transient());
        assert!(!FetchError::Offline.is_transient());
        assert!(
            FetchError::Io(std::io::Error::from(std::io::ErrorKind::TimedOut)).is_transient()
        );
        assert!(
            !FetchError::Io(std::io::Error::from(std::io::ErrorKind::PermissionDenied))
                .is_transient()
        );
    }

    #[test]
    fn test_offline() {
        let mut buf = Vec::new();

        assert!(matches!(
            OfflineFetcher.download("https://example.com/", &mut buf),
            Err(FetchError::Offline)
        ));
        assert!(OfflineFetcher.latest_release_tag("a/b").is_err());
        assert!(buf.is_empty());
    }

    #[test]
    fn test_release_info() {
        let info: ReleaseInfo =
            serde_json::from_str(r#"{"tag_name": "v0.4.1", "name": "Release"}"#).unwrap();

        assert_eq!(info.tag_name, "v0.4.1");
    }
}
