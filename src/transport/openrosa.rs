//! OpenRosa protocol headers and response classification.
//!
//! OpenRosa servers answer every request with an `X-OpenRosa-Version` header.
//! Its presence is the only reliable signal that the remote end speaks the
//! protocol, as opposed to a generic web server that happens to return XML.

use std::time::SystemTime;

use reqwest::header::{DATE, HeaderMap, HeaderName, HeaderValue};

use super::HttpResponse;

/// Name of the OpenRosa version header.
pub const OPEN_ROSA_VERSION_HEADER: &str = "X-OpenRosa-Version";

/// Protocol version this client announces.
pub const OPEN_ROSA_VERSION: &str = "1.0";

/// Name of the header advertising the largest submission body the server accepts.
pub const OPEN_ROSA_ACCEPT_CONTENT_LENGTH_HEADER: &str = "X-OpenRosa-Accept-Content-Length";

const VERSION_HEADER_KEY: &str = "x-openrosa-version";
const ACCEPT_CONTENT_LENGTH_HEADER_KEY: &str = "x-openrosa-accept-content-length";

/// Returns true when the response carries a non-empty `X-OpenRosa-Version` header.
///
/// Status code and body are ignored.
#[must_use]
pub fn is_open_rosa_response(response: &HttpResponse) -> bool {
    response
        .headers()
        .get(VERSION_HEADER_KEY)
        .is_some_and(|value| !value.as_bytes().trim_ascii().is_empty())
}

/// Reads `X-OpenRosa-Accept-Content-Length`, if the server sent a valid one.
#[must_use]
pub fn accept_content_length(response: &HttpResponse) -> Option<u64> {
    response
        .headers()
        .get(ACCEPT_CONTENT_LENGTH_HEADER_KEY)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.trim().parse::<u64>().ok())
}

/// Headers a well-behaved OpenRosa client sends with every request.
#[must_use]
pub fn open_rosa_request_headers() -> HeaderMap {
    let mut headers = HeaderMap::new();
    headers.insert(
        HeaderName::from_static(VERSION_HEADER_KEY),
        HeaderValue::from_static(OPEN_ROSA_VERSION),
    );
    if let Ok(date) = HeaderValue::from_str(&httpdate::fmt_http_date(SystemTime::now())) {
        headers.insert(DATE, date);
    }
    headers
}
