//! Constants for the transport module (timeouts, MIME types).

use std::time::Duration;

/// Default HTTP connect timeout (30 seconds).
pub const CONNECT_TIMEOUT_SECS: u64 = 30;

/// Default whole-request timeout used by the document fetcher (60 seconds).
pub const REQUEST_TIMEOUT_SECS: u64 = 60;

/// [`REQUEST_TIMEOUT_SECS`] as a [`Duration`].
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(REQUEST_TIMEOUT_SECS);

/// MIME type for plain text bodies.
pub const PLAIN_TEXT_MIME_TYPE: &str = "text/plain";

/// MIME type requested for XML documents (form lists, manifests, forms).
pub const XML_MIME_TYPE: &str = "text/xml";

/// `Content-Type` value used when posting XML with an explicit charset.
pub const HTTP_CONTENT_TYPE_TEXT_XML: &str = "text/xml; charset=utf-8";
