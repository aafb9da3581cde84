//! Authentication challenge handling.
//!
//! When a server answers 401/403, the [`AuthChallengeHandler`] asks a
//! host-provided [`CredentialPrompt`] for credentials, stores what it gets and
//! tells the caller to retry. A handler lives for exactly one fetch and allows
//! a single retry; a second challenge in the same fetch is abandoned.
//!
//! ```text
//! AwaitingChallenge --401/403--> Challenged --credentials--> Retrying
//!                                           \--cancel------> Abandoned
//! ```

use async_trait::async_trait;
use tracing::{debug, info, instrument};

use crate::credentials::{CredentialStore, is_url_prefix, normalize_key};

mod prompt;

pub use prompt::{DenyingPrompt, StaticCredentialPrompt};

/// Query fragment some servers append to submission URLs; stripped before
/// credentials are stored for an overridden URL.
pub const DEVICE_ID_QUERY: &str = "?deviceID=";

/// What the host was asked to authenticate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CredentialRequest {
    /// URL the credentials will be stored under.
    pub target_url: String,
    /// Status code that triggered the challenge.
    pub status: u16,
    /// Whether the request URL lies outside the configured server.
    pub overridden: bool,
    /// Username to pre-fill, when known.
    pub prefill_username: Option<String>,
}

/// The host's answer to a [`CredentialRequest`].
#[derive(Clone, PartialEq, Eq)]
pub enum CredentialDecision {
    /// Retry with these credentials.
    Provide { username: String, password: String },
    /// Give up; the original failure is surfaced.
    Cancel,
}

impl std::fmt::Debug for CredentialDecision {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Provide { username, .. } => f
                .debug_struct("Provide")
                .field("username", username)
                .field("password", &"[REDACTED]")
                .finish(),
            Self::Cancel => f.write_str("Cancel"),
        }
    }
}

/// Host-provided mechanism that supplies credentials on demand.
///
/// Uses `async_trait` so sessions can hold an `Arc<dyn CredentialPrompt>`.
#[async_trait]
pub trait CredentialPrompt: Send + Sync {
    /// Asks for credentials for `request.target_url`.
    async fn request_credentials(&self, request: &CredentialRequest) -> CredentialDecision;
}

/// Where a handler is in its challenge protocol.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChallengeState {
    AwaitingChallenge,
    Challenged,
    Retrying,
    Abandoned,
}

/// What the fetcher should do after a challenge.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChallengeOutcome {
    /// New credentials were stored; re-issue the request once.
    Retry,
    /// Surface the failure unchanged.
    Abandon,
}

/// Per-fetch auth challenge state machine.
pub struct AuthChallengeHandler<'a> {
    store: &'a CredentialStore,
    prompt: &'a dyn CredentialPrompt,
    server_url: &'a str,
    state: ChallengeState,
}

impl<'a> AuthChallengeHandler<'a> {
    /// Creates a handler for one fetch against the configured `server_url`.
    #[must_use]
    pub fn new(
        store: &'a CredentialStore,
        prompt: &'a dyn CredentialPrompt,
        server_url: &'a str,
    ) -> Self {
        Self {
            store,
            prompt,
            server_url,
            state: ChallengeState::AwaitingChallenge,
        }
    }

    /// Current state.
    #[must_use]
    pub fn state(&self) -> ChallengeState {
        self.state
    }

    /// Reacts to a 401/403 for `url`.
    ///
    /// Only the first challenge of a fetch can lead to a retry.
    #[instrument(level = "debug", skip(self), fields(state = ?self.state))]
    pub async fn on_challenge(&mut self, url: &str, status: u16) -> ChallengeOutcome {
        if self.state != ChallengeState::AwaitingChallenge {
            debug!("repeated challenge in the same fetch; abandoning");
            self.state = ChallengeState::Abandoned;
            return ChallengeOutcome::Abandon;
        }
        self.state = ChallengeState::Challenged;

        let (target_url, overridden) = credential_target(self.server_url, url);
        let prefill_username = if overridden {
            None
        } else {
            Some(self.store.get(&target_url).username).filter(|name| !name.is_empty())
        };
        let request = CredentialRequest {
            target_url,
            status,
            overridden,
            prefill_username,
        };

        match self.prompt.request_credentials(&request).await {
            CredentialDecision::Provide { username, password } => {
                self.store.set(&request.target_url, &username, &password);
                self.state = ChallengeState::Retrying;
                info!(target_url = %request.target_url, "credentials updated; retrying");
                ChallengeOutcome::Retry
            }
            CredentialDecision::Cancel => {
                self.state = ChallengeState::Abandoned;
                info!(target_url = %request.target_url, "credential prompt cancelled");
                ChallengeOutcome::Abandon
            }
        }
    }
}

/// Returns true for status codes that trigger the challenge protocol.
#[must_use]
pub fn is_auth_challenge(status: u16) -> bool {
    matches!(status, 401 | 403)
}

/// Picks the URL credentials are stored under.
///
/// URLs under the configured server, matched on URL boundaries the same way
/// the store matches, use the server URL. Anything else is an overridden URL, stored as requested minus any `?deviceID=` suffix.
#[must_use]
pub fn credential_target(server_url: &str, url: &str) -> (String, bool) {
    let server_url = normalize_key(server_url);
    if is_url_prefix(&server_url, url.trim()) {
        return (server_url, false);
    }

    let overridden = match url.find(DEVICE_ID_QUERY) {
        Some(index) => &url[..index],
        None => url,
    };
    (overridden.to_string(), true)
}
