//! Non-interactive [`CredentialPrompt`] implementations.

use async_trait::async_trait;

use super::{CredentialDecision, CredentialPrompt, CredentialRequest};

/// Always declines. The default for sessions without an interactive host.
#[derive(Debug, Clone, Copy, Default)]
pub struct DenyingPrompt;

#[async_trait]
impl CredentialPrompt for DenyingPrompt {
    async fn request_credentials(&self, _request: &CredentialRequest) -> CredentialDecision {
        CredentialDecision::Cancel
    }
}

/// Answers every challenge with the same credentials.
///
/// Suited to automated contexts where credentials come from configuration.
#[derive(Clone)]
pub struct StaticCredentialPrompt {
    username: String,
    password: String,
}

impl StaticCredentialPrompt {
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            password: password.into(),
        }
    }
}

impl std::fmt::Debug for StaticCredentialPrompt {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StaticCredentialPrompt")
            .field("username", &self.username)
            .finish_non_exhaustive()
    }
}

#[async_trait]
impl CredentialPrompt for StaticCredentialPrompt {
    async fn request_credentials(&self, _request: &CredentialRequest) -> CredentialDecision {
        CredentialDecision::Provide {
            username: self.username.clone(),
            password: self.password.clone(),
        }
    }
}
