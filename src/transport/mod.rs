//! HTTP transport for OpenRosa servers.
//!
//! This module provides the [`HttpTransport`] seam the rest of the crate talks
//! through, plus its reqwest-backed implementation.
//!
//! # Features
//!
//! - GET/HEAD/POST with per-request credentials and timeouts
//! - Pre-emptive Basic auth, Digest auth (RFC 7616) on 401 challenges
//! - HTTP error statuses returned as data, never as errors
//! - OpenRosa response classification and request headers
//!
//! # Example
//!
//! ```no_run
//! use openrosa_core::transport::{HttpTransport, ReqwestTransport, TransportRequest};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let transport = ReqwestTransport::new();
//! let response = transport
//!     .execute(TransportRequest::head("https://example.com/submission"))
//!     .await?;
//! if let Some(response) = response {
//!     println!("status: {}", response.status());
//! }
//! # Ok(())
//! # }
//! ```

use async_trait::async_trait;

mod client;
mod constants;
pub mod digest;
mod error;
mod message;
pub mod openrosa;

pub use client::{ReqwestTransport, TransportBuildError};
pub use constants::{
    CONNECT_TIMEOUT_SECS, DEFAULT_REQUEST_TIMEOUT, HTTP_CONTENT_TYPE_TEXT_XML,
    PLAIN_TEXT_MIME_TYPE, REQUEST_TIMEOUT_SECS, XML_MIME_TYPE,
};
pub use error::{NetworkError, NetworkErrorKind};
pub use message::{HttpMethod, HttpResponse, ResponseBody, TransportRequest, validate_url};
pub use openrosa::{accept_content_length, is_open_rosa_response, open_rosa_request_headers};

/// Executes HTTP requests on behalf of the client.
///
/// Uses `async_trait` so sessions can hold an `Arc<dyn HttpTransport>`; test
/// code swaps in scripted transports through the same seam.
#[async_trait]
pub trait HttpTransport: Send + Sync {
    /// Executes one request.
    ///
    /// Returns `Ok(None)` when the transport produced no response at all.
    /// HTTP 4xx/5xx statuses are returned as `Ok(Some(_))`.
    ///
    /// # Errors
    ///
    /// Returns [`NetworkError`] for invalid requests and transport failures
    /// (timeout, DNS, refused connection, TLS, I/O).
    async fn execute(
        &self,
        request: TransportRequest,
    ) -> Result<Option<HttpResponse>, NetworkError>;

    /// MIME type for plain text bodies.
    fn plain_text_mime_type(&self) -> &'static str {
        PLAIN_TEXT_MIME_TYPE
    }
}
