//! OpenRosa document fetching.
//!
//! [`ServerClient::get_xml_document`] performs one GET, drives the auth
//! challenge protocol on 401/403 and parses the body into an [`XmlDocument`].
//! It never fails with `Err`: every outcome is a [`DocumentFetchResult`].

use reqwest::StatusCode;
use reqwest::header::{ACCEPT, HeaderMap, HeaderValue, LOCATION};
use tracing::{debug, info, instrument, warn};

use crate::auth::{ChallengeOutcome, is_auth_challenge};
use crate::session::ClientSession;
use crate::transport::{
    HttpMethod, HttpResponse, NetworkError, NetworkErrorKind, TransportRequest, XML_MIME_TYPE,
    accept_content_length, is_open_rosa_response, open_rosa_request_headers, validate_url,
};

pub mod xml;

pub use xml::{XmlDocument, XmlElement, XmlNode, XmlParseError};

/// Outcome of fetching one XML document.
///
/// Exactly one of [`document`](Self::document) and
/// [`error_message`](Self::error_message) is present.
#[derive(Debug, Clone)]
pub struct DocumentFetchResult {
    document: Option<XmlDocument>,
    error_message: Option<String>,
    response_code: u16,
    is_open_rosa_response: bool,
}

impl DocumentFetchResult {
    /// A parsed document.
    #[must_use]
    pub fn success(document: XmlDocument, response_code: u16, is_open_rosa_response: bool) -> Self {
        Self {
            document: Some(document),
            error_message: None,
            response_code,
            is_open_rosa_response,
        }
    }

    /// A failed fetch. `response_code` is 0 when no HTTP response was received.
    #[must_use]
    pub fn failure(
        error_message: impl Into<String>,
        response_code: u16,
        is_open_rosa_response: bool,
    ) -> Self {
        Self {
            document: None,
            error_message: Some(error_message.into()),
            response_code,
            is_open_rosa_response,
        }
    }

    #[must_use]
    pub fn document(&self) -> Option<&XmlDocument> {
        self.document.as_ref()
    }

    /// Consumes the result, returning the document if the fetch succeeded.
    #[must_use]
    pub fn into_document(self) -> Option<XmlDocument> {
        self.document
    }

    #[must_use]
    pub fn error_message(&self) -> Option<&str> {
        self.error_message.as_deref()
    }

    #[must_use]
    pub fn response_code(&self) -> u16 {
        self.response_code
    }

    #[must_use]
    pub fn is_open_rosa_response(&self) -> bool {
        self.is_open_rosa_response
    }

    #[must_use]
    pub fn is_success(&self) -> bool {
        self.document.is_some()
    }
}

/// Result of an OpenRosa HEAD probe.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HeadResult {
    pub status: u16,
    pub is_open_rosa_response: bool,
    /// Largest submission the server accepts, from `X-OpenRosa-Accept-Content-Length`.
    pub accept_content_length: Option<u64>,
    /// Redirect target, when the server moved the endpoint.
    pub location: Option<String>,
}

/// Fetches documents from the server configured in a [`ClientSession`].
#[derive(Debug, Clone, Copy)]
pub struct ServerClient<'a> {
    session: &'a ClientSession,
}

impl<'a> ServerClient<'a> {
    #[must_use]
    pub fn new(session: &'a ClientSession) -> Self {
        Self { session }
    }

    /// Fetches and parses the XML document at `url`.
    ///
    /// A 401/403 asks the session's credential prompt once; if it supplies
    /// credentials the request is retried exactly once.
    #[instrument(skip(self))]
    pub async fn get_xml_document(&self, url: &str) -> DocumentFetchResult {
        if let Err(error) = validate_url(url) {
            return DocumentFetchResult::failure(format!("{error} while accessing {url}"), 0, false);
        }

        let response = match self
            .execute_with_challenge(url, HttpMethod::Get, &xml_accept_headers())
            .await
        {
            Ok(Some(response)) => response,
            Ok(None) => {
                warn!("transport returned no response");
                return DocumentFetchResult::failure(
                    format!("Parsing failed with null while accessing {url}"),
                    0,
                    false,
                );
            }
            Err(error) => {
                warn!(error = %error, "request failed");
                return DocumentFetchResult::failure(format!("{error} while accessing {url}"), 0, false);
            }
        };

        read_document(url, response).await
    }

    /// Sends an OpenRosa HEAD probe to `url`.
    ///
    /// # Errors
    ///
    /// Returns [`NetworkError`] for invalid URLs and transport failures, or
    /// when the transport produced no response.
    #[instrument(skip(self))]
    pub async fn head(&self, url: &str) -> Result<HeadResult, NetworkError> {
        validate_url(url)?;
        let response = self
            .execute_with_challenge(url, HttpMethod::Head, &HeaderMap::new())
            .await?
            .ok_or_else(|| NetworkError::new(url, NetworkErrorKind::Io, "no response received"))?;

        let result = HeadResult {
            status: response.status(),
            is_open_rosa_response: is_open_rosa_response(&response),
            accept_content_length: accept_content_length(&response),
            location: response.header(LOCATION.as_str()).map(str::to_string),
        };
        debug!(status = result.status, open_rosa = result.is_open_rosa_response, "head probe");
        Ok(result)
    }

    /// Runs a request, answering at most one auth challenge.
    async fn execute_with_challenge(
        &self,
        url: &str,
        method: HttpMethod,
        headers: &HeaderMap,
    ) -> Result<Option<HttpResponse>, NetworkError> {
        let mut handler = self.session.challenge_handler();
        loop {
            let request = TransportRequest::new(method, url)
                .with_headers(open_rosa_request_headers())
                .with_headers(headers.clone())
                .with_credentials(self.session.credentials().get(url))
                .with_timeout(self.session.settings().request_timeout);

            let Some(response) = self.session.transport().execute(request).await? else {
                return Ok(None);
            };

            let status = response.status();
            if is_auth_challenge(status)
                && handler.on_challenge(url, status).await == ChallengeOutcome::Retry
            {
                debug!(status, "retrying with new credentials");
                continue;
            }
            return Ok(Some(response));
        }
    }
}

fn xml_accept_headers() -> HeaderMap {
    let mut headers = HeaderMap::new();
    headers.insert(ACCEPT, HeaderValue::from_static(XML_MIME_TYPE));
    headers
}

async fn read_document(url: &str, mut response: HttpResponse) -> DocumentFetchResult {
    let status = response.status();
    let open_rosa = is_open_rosa_response(&response);

    if status != StatusCode::OK.as_u16() {
        info!(status, "server returned an error status");
        return DocumentFetchResult::failure(
            format!("{} while accessing {url}", status_line(status)),
            status,
            open_rosa,
        );
    }

    debug!(content_type = response.content_type().unwrap_or("-"), "reading document body");
    let bytes = match response.take_body() {
        Some(body) => match body.collect().await {
            Ok(bytes) => bytes,
            Err(error) => {
                warn!(error = %error, "failed reading response body");
                return DocumentFetchResult::failure(
                    format!("{error} while accessing {url}"),
                    status,
                    open_rosa,
                );
            }
        },
        None => Vec::new(),
    };

    match XmlDocument::parse(&bytes) {
        Ok(document) => {
            debug!(root = document.root().name(), bytes = bytes.len(), "document parsed");
            DocumentFetchResult::success(document, status, open_rosa)
        }
        Err(error) => {
            warn!(error = %error, "document failed to parse");
            DocumentFetchResult::failure(
                format!("Parsing failed with {error} while accessing {url}"),
                status,
                open_rosa,
            )
        }
    }
}

/// `"404 Not Found"`, or just the code when it has no canonical reason.
fn status_line(status: u16) -> String {
    match StatusCode::from_u16(status)
        .ok()
        .and_then(|code| code.canonical_reason())
    {
        Some(reason) => format!("{status} {reason}"),
        None => status.to_string(),
    }
}
