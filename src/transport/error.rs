//! Error types for the transport module.
//!
//! Only transport-level failures live here. HTTP 4xx/5xx responses are not
//! errors at this layer; they come back as ordinary [`HttpResponse`]s and
//! callers decide what a status code means.
//!
//! [`HttpResponse`]: super::HttpResponse

use std::error::Error as StdError;
use std::fmt;

use thiserror::Error;

type BoxError = Box<dyn StdError + Send + Sync + 'static>;

/// Coarse classification of a transport failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NetworkErrorKind {
    /// The request did not complete within its timeout.
    Timeout,
    /// The host name could not be resolved.
    Dns,
    /// The remote end refused the TCP connection.
    ConnectionRefused,
    /// TLS handshake or certificate validation failed.
    Tls,
    /// Any other I/O failure, including a body stream that broke mid-read.
    Io,
}

impl NetworkErrorKind {
    /// Returns the stable label used in error messages and log fields.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Timeout => "timeout",
            Self::Dns => "dns",
            Self::ConnectionRefused => "connection refused",
            Self::Tls => "tls",
            Self::Io => "io",
        }
    }
}

impl fmt::Display for NetworkErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Errors raised by an [`HttpTransport`](super::HttpTransport).
#[derive(Debug, Error)]
pub enum NetworkError {
    /// The request failed below the HTTP layer.
    #[error("{kind} error: {message}")]
    Transport {
        /// The URL being accessed.
        url: String,
        /// What kind of failure occurred.
        kind: NetworkErrorKind,
        /// Human-readable description of the failure.
        message: String,
        /// The underlying error, when one exists.
        #[source]
        source: Option<BoxError>,
    },

    /// The URL is not an absolute http/https URL.
    #[error("invalid URL: {url}")]
    InvalidUrl {
        /// The rejected URL string.
        url: String,
    },

    /// The credentials cannot be carried in an `Authorization` header.
    #[error("invalid credentials for {url}: not representable as an Authorization header")]
    InvalidCredentials {
        /// The URL of the rejected request.
        url: String,
    },

    /// The request timeout was zero.
    #[error("invalid timeout for {url}: timeout must be greater than zero")]
    InvalidTimeout {
        /// The URL of the rejected request.
        url: String,
    },
}

impl NetworkError {
    /// Creates a transport error without an underlying source.
    pub fn new(url: impl Into<String>, kind: NetworkErrorKind, message: impl Into<String>) -> Self {
        Self::Transport {
            url: url.into(),
            kind,
            message: message.into(),
            source: None,
        }
    }

    /// Creates a timeout error.
    pub fn timeout(url: impl Into<String>) -> Self {
        Self::new(url, NetworkErrorKind::Timeout, "request timed out")
    }

    /// Creates an invalid URL error.
    pub fn invalid_url(url: impl Into<String>) -> Self {
        Self::InvalidUrl { url: url.into() }
    }

    /// Creates an invalid timeout error.
    pub fn invalid_timeout(url: impl Into<String>) -> Self {
        Self::InvalidTimeout { url: url.into() }
    }

    /// Creates an invalid credentials error.
    pub fn invalid_credentials(url: impl Into<String>) -> Self {
        Self::InvalidCredentials { url: url.into() }
    }

    /// Wraps a reqwest error, classifying it by walking its source chain.
    pub fn from_reqwest(url: impl Into<String>, source: reqwest::Error) -> Self {
        let kind = classify_reqwest_error(&source);
        let message = root_cause_message(&source);
        Self::Transport {
            url: url.into(),
            kind,
            message,
            source: Some(Box::new(source)),
        }
    }

    /// Returns the failure kind, or `None` for request validation errors.
    #[must_use]
    pub fn kind(&self) -> Option<NetworkErrorKind> {
        match self {
            Self::Transport { kind, .. } => Some(*kind),
            Self::InvalidUrl { .. }
            | Self::InvalidCredentials { .. }
            | Self::InvalidTimeout { .. } => None,
        }
    }

    /// Returns the URL the failed request targeted.
    #[must_use]
    pub fn url(&self) -> &str {
        match self {
            Self::Transport { url, .. }
            | Self::InvalidUrl { url }
            | Self::InvalidCredentials { url }
            | Self::InvalidTimeout { url } => url,
        }
    }
}

// Note: there is deliberately no `From<reqwest::Error>`; every variant needs the
// URL for context, which the source error does not reliably carry.

fn classify_reqwest_error(error: &reqwest::Error) -> NetworkErrorKind {
    if error.is_timeout() {
        return NetworkErrorKind::Timeout;
    }

    let mut current: Option<&(dyn StdError + 'static)> = Some(error);
    while let Some(err) = current {
        if let Some(io) = err.downcast_ref::<std::io::Error>() {
            match io.kind() {
                std::io::ErrorKind::ConnectionRefused => {
                    return NetworkErrorKind::ConnectionRefused;
                }
                std::io::ErrorKind::TimedOut => return NetworkErrorKind::Timeout,
                _ => {}
            }
        }

        let text = err.to_string().to_lowercase();
        if text.contains("dns error")
            || text.contains("failed to lookup address")
            || text.contains("name or service not known")
            || text.contains("no such host")
        {
            return NetworkErrorKind::Dns;
        }
        if text.contains("certificate")
            || text.contains("tls")
            || text.contains("ssl")
            || text.contains("handshake")
        {
            return NetworkErrorKind::Tls;
        }
        if text.contains("connection refused") {
            return NetworkErrorKind::ConnectionRefused;
        }

        current = err.source();
    }

    NetworkErrorKind::Io
}

fn root_cause_message(error: &reqwest::Error) -> String {
    let mut message = error.to_string();
    let mut current = error.source();
    while let Some(err) = current {
        message = err.to_string();
        current = err.source();
    }
    message
}
