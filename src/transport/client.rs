//! reqwest-backed [`HttpTransport`] implementation.
//!
//! Sends pre-emptive Basic credentials until a host answers with a Digest
//! challenge. From then on that host's challenge is remembered and every
//! request to it carries a Digest `Authorization` header with an increasing
//! nonce count.

use std::collections::HashMap;
use std::sync::{Mutex, PoisonError};
use std::time::Duration;

use async_trait::async_trait;
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use reqwest::header::{AUTHORIZATION, HeaderValue, WWW_AUTHENTICATE};
use reqwest::{Client, ClientBuilder};
use tracing::{debug, instrument, warn};
use url::Url;

use super::constants::CONNECT_TIMEOUT_SECS;
use super::digest::{DigestChallenge, generate_cnonce};
use super::error::NetworkError;
use super::message::{HttpMethod, HttpResponse, ResponseBody, TransportRequest};
use super::HttpTransport;
use crate::credentials::ServerCredentials;
use crate::user_agent;

/// Errors raised while constructing a [`ReqwestTransport`].
#[derive(Debug, thiserror::Error)]
#[error("failed to build HTTP client: {0}")]
pub struct TransportBuildError(#[source] reqwest::Error);

#[derive(Debug)]
struct CachedChallenge {
    challenge: DigestChallenge,
    nonce_count: u32,
}

/// HTTP transport over a reqwest client.
///
/// Create it once and share it (behind an `Arc`) for the lifetime of a
/// [`ClientSession`](crate::ClientSession).
#[derive(Debug)]
pub struct ReqwestTransport {
    client: Client,
    digest_challenges: Mutex<HashMap<String, CachedChallenge>>,
}

impl ReqwestTransport {
    /// Creates a transport with the default connect timeout.
    ///
    /// # Panics
    ///
    /// Panics if the HTTP client builder fails with the static configuration.
    /// This should never happen in practice.
    #[must_use]
    #[allow(clippy::expect_used)]
    pub fn new() -> Self {
        Self::with_connect_timeout(Duration::from_secs(CONNECT_TIMEOUT_SECS))
            .expect("failed to build HTTP client with static configuration")
    }

    /// Creates a transport with an explicit connect timeout.
    ///
    /// # Errors
    ///
    /// Returns [`TransportBuildError`] when reqwest cannot build the client
    /// (for example, when no TLS backend can be initialised).
    pub fn with_connect_timeout(connect_timeout: Duration) -> Result<Self, TransportBuildError> {
        let client = base_client_builder(connect_timeout)
            .build()
            .map_err(TransportBuildError)?;
        Ok(Self {
            client,
            digest_challenges: Mutex::new(HashMap::new()),
        })
    }

    /// Returns true when `host` has already answered with a Digest challenge.
    #[must_use]
    pub fn has_digest_challenge(&self, url: &str) -> bool {
        let Ok(parsed) = Url::parse(url) else {
            return false;
        };
        self.challenges().contains_key(&host_key(&parsed))
    }

    fn challenges(&self) -> std::sync::MutexGuard<'_, HashMap<String, CachedChallenge>> {
        self.digest_challenges
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    /// Builds the `Authorization` value for a request, if credentials exist.
    fn authorization_for(
        &self,
        request: &TransportRequest,
        url: &Url,
    ) -> Option<String> {
        let credentials = &request.credentials;
        if !credentials.has_credentials() {
            return None;
        }

        let mut challenges = self.challenges();
        if let Some(cached) = challenges.get_mut(&host_key(url)) {
            cached.nonce_count = cached.nonce_count.saturating_add(1);
            return Some(cached.challenge.authorization(
                credentials,
                request.method.as_str(),
                &request_target(url),
                cached.nonce_count,
                &generate_cnonce(),
            ));
        }
        drop(challenges);

        Some(basic_authorization(credentials))
    }

    /// Stores a fresh challenge for the host and answers it.
    fn answer_challenge(
        &self,
        request: &TransportRequest,
        url: &Url,
        challenge: DigestChallenge,
    ) -> String {
        let header = challenge.authorization(
            &request.credentials,
            request.method.as_str(),
            &request_target(url),
            1,
            &generate_cnonce(),
        );
        self.challenges().insert(
            host_key(url),
            CachedChallenge {
                challenge,
                nonce_count: 1,
            },
        );
        header
    }

    async fn send(
        &self,
        request: &TransportRequest,
        url: &Url,
        authorization: Option<&str>,
    ) -> Result<reqwest::Response, NetworkError> {
        let mut builder = match request.method {
            HttpMethod::Get => self.client.get(url.clone()),
            HttpMethod::Head => self.client.head(url.clone()),
            HttpMethod::Post => self.client.post(url.clone()),
        };
        builder = builder.timeout(request.timeout).headers(request.headers.clone());
        if let Some(value) = authorization {
            builder = builder.header(AUTHORIZATION, authorization_header(&request.url, value)?);
        }
        if request.method == HttpMethod::Post
            && let Some(body) = &request.body
        {
            builder = builder.body(body.clone());
        }

        builder.send().await.map_err(|e| {
            if e.is_timeout() {
                NetworkError::timeout(&request.url)
            } else {
                NetworkError::from_reqwest(&request.url, e)
            }
        })
    }
}

impl Default for ReqwestTransport {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl HttpTransport for ReqwestTransport {
    #[instrument(skip(self, request), fields(method = %request.method, url = %request.url))]
    async fn execute(
        &self,
        request: TransportRequest,
    ) -> Result<Option<HttpResponse>, NetworkError> {
        let url = request.validate()?;

        let authorization = self.authorization_for(&request, &url);
        let response = self.send(&request, &url, authorization.as_deref()).await?;

        if response.status().as_u16() == 401 && request.credentials.has_credentials() {
            let challenge = response
                .headers()
                .get_all(WWW_AUTHENTICATE)
                .iter()
                .filter_map(|value| value.to_str().ok())
                .find_map(DigestChallenge::parse);

            if let Some(challenge) = challenge {
                debug!(realm = %challenge.realm, stale = challenge.stale, "answering digest challenge");
                drop(response);
                let header = self.answer_challenge(&request, &url, challenge);
                let retried = self.send(&request, &url, Some(&header)).await?;
                return Ok(Some(into_http_response(&request.url, retried)));
            }
        }

        debug!(status = response.status().as_u16(), "response received");
        Ok(Some(into_http_response(&request.url, response)))
    }
}

fn into_http_response(url: &str, response: reqwest::Response) -> HttpResponse {
    let status = response.status().as_u16();
    let headers = response.headers().clone();
    HttpResponse::new(
        status,
        headers,
        Some(ResponseBody::from_reqwest(url.to_string(), response)),
    )
}

/// One connection per call: idle connections are never kept for reuse.
fn base_client_builder(connect_timeout: Duration) -> ClientBuilder {
    Client::builder()
        .connect_timeout(connect_timeout)
        .pool_max_idle_per_host(0)
        .gzip(true)
        .user_agent(user_agent::default_user_agent())
}

/// Digest headers quote the username verbatim, so non-ASCII names are sent as
/// raw UTF-8 bytes. Control characters cannot be sent at all.
fn authorization_header(url: &str, value: &str) -> Result<HeaderValue, NetworkError> {
    let mut header = HeaderValue::from_bytes(value.as_bytes()).map_err(|_| {
        warn!(url, "credentials not representable as an Authorization header");
        NetworkError::invalid_credentials(url)
    })?;
    header.set_sensitive(true);
    Ok(header)
}

fn basic_authorization(credentials: &ServerCredentials) -> String {
    let token = STANDARD.encode(format!(
        "{}:{}",
        credentials.username,
        credentials.password()
    ));
    format!("Basic {token}")
}

/// Digest challenges are scoped to scheme, host and port.
fn host_key(url: &Url) -> String {
    format!(
        "{}://{}:{}",
        url.scheme(),
        url.host_str().unwrap_or_default(),
        url.port_or_known_default().unwrap_or_default()
    )
}

fn request_target(url: &Url) -> String {
    match url.query() {
        Some(query) => format!("{}?{query}", url.path()),
        None => url.path().to_string(),
    }
}
