//! Request and response types exchanged with an [`HttpTransport`](super::HttpTransport).

use std::fmt;
use std::time::Duration;

use bytes::Bytes;
use futures_util::StreamExt;
use futures_util::stream::{self, BoxStream};
use reqwest::header::{CONTENT_TYPE, HeaderMap, HeaderName, HeaderValue};
use url::Url;

use super::constants::{DEFAULT_REQUEST_TIMEOUT, HTTP_CONTENT_TYPE_TEXT_XML};
use super::error::NetworkError;
use crate::credentials::ServerCredentials;

/// HTTP methods the OpenRosa client issues.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HttpMethod {
    Get,
    Head,
    Post,
}

impl HttpMethod {
    /// Returns the method token as sent on the wire.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Get => "GET",
            Self::Head => "HEAD",
            Self::Post => "POST",
        }
    }
}

impl fmt::Display for HttpMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single request handed to a transport.
#[derive(Debug, Clone)]
pub struct TransportRequest {
    /// Request method.
    pub method: HttpMethod,
    /// Absolute http/https URL.
    pub url: String,
    /// Extra request headers.
    pub headers: HeaderMap,
    /// Credentials to authenticate with; empty means anonymous.
    pub credentials: ServerCredentials,
    /// Whole-request timeout. Must be non-zero.
    pub timeout: Duration,
    /// Request body, only sent for POST.
    pub body: Option<Bytes>,
}

impl TransportRequest {
    /// Creates an anonymous request with the default timeout.
    pub fn new(method: HttpMethod, url: impl Into<String>) -> Self {
        Self {
            method,
            url: url.into(),
            headers: HeaderMap::new(),
            credentials: ServerCredentials::default(),
            timeout: DEFAULT_REQUEST_TIMEOUT,
            body: None,
        }
    }

    /// Creates a GET request.
    pub fn get(url: impl Into<String>) -> Self {
        Self::new(HttpMethod::Get, url)
    }

    /// Creates a HEAD request.
    pub fn head(url: impl Into<String>) -> Self {
        Self::new(HttpMethod::Head, url)
    }

    /// Creates a POST request carrying an XML `body`.
    pub fn post(url: impl Into<String>, body: impl Into<Bytes>) -> Self {
        let mut request = Self::new(HttpMethod::Post, url).with_header(
            CONTENT_TYPE,
            HeaderValue::from_static(HTTP_CONTENT_TYPE_TEXT_XML),
        );
        request.body = Some(body.into());
        request
    }

    /// Adds or replaces one header.
    #[must_use]
    pub fn with_header(mut self, name: HeaderName, value: HeaderValue) -> Self {
        self.headers.insert(name, value);
        self
    }

    /// Merges `headers` into the request, replacing duplicates.
    #[must_use]
    pub fn with_headers(mut self, headers: HeaderMap) -> Self {
        for (name, value) in &headers {
            self.headers.insert(name.clone(), value.clone());
        }
        self
    }

    /// Sets the credentials used for this request.
    #[must_use]
    pub fn with_credentials(mut self, credentials: ServerCredentials) -> Self {
        self.credentials = credentials;
        self
    }

    /// Sets the whole-request timeout.
    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Checks the request constraints and returns the parsed URL.
    ///
    /// # Errors
    ///
    /// Returns [`NetworkError::InvalidUrl`] unless the URL is absolute with an
    /// http/https scheme and a host, and [`NetworkError::InvalidTimeout`] for a
    /// zero timeout.
    pub fn validate(&self) -> Result<Url, NetworkError> {
        let url = validate_url(&self.url)?;
        if self.timeout.is_zero() {
            return Err(NetworkError::invalid_timeout(&self.url));
        }
        Ok(url)
    }
}

/// Parses `raw` and accepts it only as an absolute http/https URL with a host.
///
/// # Errors
///
/// Returns [`NetworkError::InvalidUrl`] for anything else.
pub fn validate_url(raw: &str) -> Result<Url, NetworkError> {
    let url = Url::parse(raw.trim()).map_err(|_| NetworkError::invalid_url(raw))?;
    if !matches!(url.scheme(), "http" | "https") || url.host_str().is_none() {
        return Err(NetworkError::invalid_url(raw));
    }
    Ok(url)
}

/// A response produced by a transport.
///
/// The body, when present, belongs to whoever holds the response; it is
/// closed when dropped.
#[derive(Debug)]
pub struct HttpResponse {
    status: u16,
    headers: HeaderMap,
    body: Option<ResponseBody>,
}

impl HttpResponse {
    /// Creates a response from its parts.
    #[must_use]
    pub fn new(status: u16, headers: HeaderMap, body: Option<ResponseBody>) -> Self {
        Self {
            status,
            headers,
            body,
        }
    }

    /// Returns the HTTP status code.
    #[must_use]
    pub fn status(&self) -> u16 {
        self.status
    }

    /// Returns all response headers. Lookups are case-insensitive.
    #[must_use]
    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    /// Returns a header value as text, if present and valid ASCII.
    #[must_use]
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).and_then(|value| value.to_str().ok())
    }

    /// Returns the `Content-Type` header value.
    #[must_use]
    pub fn content_type(&self) -> Option<&str> {
        self.headers
            .get(CONTENT_TYPE)
            .and_then(|value| value.to_str().ok())
    }

    /// Takes the body out of the response, leaving `None` behind.
    pub fn take_body(&mut self) -> Option<ResponseBody> {
        self.body.take()
    }
}

/// A lazily-read response body.
pub struct ResponseBody {
    stream: BoxStream<'static, Result<Bytes, NetworkError>>,
}

impl ResponseBody {
    /// Wraps an arbitrary chunk stream.
    pub fn from_stream(
        stream: impl futures_util::Stream<Item = Result<Bytes, NetworkError>> + Send + 'static,
    ) -> Self {
        Self {
            stream: stream.boxed(),
        }
    }

    /// Creates a body that yields `bytes` as a single chunk.
    pub fn from_bytes(bytes: impl Into<Bytes>) -> Self {
        let bytes = bytes.into();
        Self::from_stream(stream::once(async move { Ok(bytes) }))
    }

    /// Streams the body of a reqwest response.
    pub(crate) fn from_reqwest(url: String, response: reqwest::Response) -> Self {
        Self::from_stream(
            response
                .bytes_stream()
                .map(move |chunk| chunk.map_err(|e| NetworkError::from_reqwest(url.clone(), e))),
        )
    }

    /// Reads the whole body into memory.
    ///
    /// # Errors
    ///
    /// Returns the first [`NetworkError`] raised while reading a chunk.
    pub async fn collect(mut self) -> Result<Vec<u8>, NetworkError> {
        let mut buffer = Vec::new();
        while let Some(chunk) = self.stream.next().await {
            buffer.extend_from_slice(&chunk?);
        }
        Ok(buffer)
    }
}

impl fmt::Debug for ResponseBody {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ResponseBody").finish_non_exhaustive()
    }
}
