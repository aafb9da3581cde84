//! Explicitly constructed client state.
//!
//! A [`ClientSession`] owns everything a fetch needs: server settings, the
//! credential store, the transport and the credential prompt. Build one at
//! startup and pass it by reference.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use crate::auth::{AuthChallengeHandler, CredentialPrompt, DenyingPrompt};
use crate::credentials::CredentialStore;
use crate::fetch::ServerClient;
use crate::transport::{DEFAULT_REQUEST_TIMEOUT, HttpTransport};

/// Server-level settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerSettings {
    /// Configured server URL; credentials for URLs under it are stored here.
    pub server_url: String,
    /// Whole-request timeout for fetches.
    pub request_timeout: Duration,
}

impl ServerSettings {
    pub fn new(server_url: impl Into<String>) -> Self {
        Self {
            server_url: server_url.into(),
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
        }
    }

    #[must_use]
    pub fn with_request_timeout(mut self, request_timeout: Duration) -> Self {
        self.request_timeout = request_timeout;
        self
    }
}

/// Shared state threaded through every fetch.
pub struct ClientSession {
    settings: ServerSettings,
    credentials: Arc<CredentialStore>,
    transport: Arc<dyn HttpTransport>,
    prompt: Arc<dyn CredentialPrompt>,
}

impl ClientSession {
    /// Creates a session with an empty credential store and a prompt that
    /// declines every challenge.
    pub fn new(settings: ServerSettings, transport: Arc<dyn HttpTransport>) -> Self {
        Self {
            settings,
            credentials: Arc::new(CredentialStore::new()),
            transport,
            prompt: Arc::new(DenyingPrompt),
        }
    }

    #[must_use]
    pub fn with_credential_store(mut self, credentials: Arc<CredentialStore>) -> Self {
        self.credentials = credentials;
        self
    }

    #[must_use]
    pub fn with_prompt(mut self, prompt: Arc<dyn CredentialPrompt>) -> Self {
        self.prompt = prompt;
        self
    }

    #[must_use]
    pub fn settings(&self) -> &ServerSettings {
        &self.settings
    }

    #[must_use]
    pub fn credentials(&self) -> &CredentialStore {
        &self.credentials
    }

    /// Shared handle to the credential store, e.g. for persisting it later.
    #[must_use]
    pub fn credential_store(&self) -> Arc<CredentialStore> {
        Arc::clone(&self.credentials)
    }

    #[must_use]
    pub fn transport(&self) -> &dyn HttpTransport {
        self.transport.as_ref()
    }

    /// The document fetcher bound to this session.
    #[must_use]
    pub fn server_client(&self) -> ServerClient<'_> {
        ServerClient::new(self)
    }

    /// A fresh challenge handler; one per fetch.
    pub(crate) fn challenge_handler(&self) -> AuthChallengeHandler<'_> {
        AuthChallengeHandler::new(
            &self.credentials,
            self.prompt.as_ref(),
            &self.settings.server_url,
        )
    }
}

impl fmt::Debug for ClientSession {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClientSession")
            .field("settings", &self.settings)
            .field("credentials", &self.credentials)
            .finish_non_exhaustive()
    }
}
