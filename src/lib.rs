//! OpenRosa Client Core
//!
//! Fetches XML documents (form lists, manifests, forms) from OpenRosa-compatible
//! servers, authenticating with stored credentials and asking the host for new
//! ones when the server challenges.
//!
//! # Architecture
//!
//! - [`transport`] - HTTP transport seam, reqwest implementation, Basic/Digest
//!   auth, OpenRosa header classification
//! - [`credentials`] - Credential store keyed by server URL prefix, encrypted
//!   persistence
//! - [`auth`] - 401/403 challenge handling and credential prompts
//! - [`fetch`] - Document fetcher and XML document tree
//! - [`session`] - Explicitly constructed client session tying it together

// Clippy lints - strict for library code
#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod auth;
pub mod credentials;
pub mod fetch;
pub mod session;
#[cfg(test)]
pub mod test_support;
pub mod transport;
pub(crate) mod user_agent;

// Re-export commonly used types
pub use auth::{
    AuthChallengeHandler, ChallengeOutcome, ChallengeState, CredentialDecision, CredentialPrompt,
    CredentialRequest, DenyingPrompt, StaticCredentialPrompt,
};
pub use credentials::{CredentialStore, ServerCredentials, StorageError};
pub use fetch::{DocumentFetchResult, HeadResult, ServerClient, XmlDocument, XmlElement};
pub use session::{ClientSession, ServerSettings};
pub use transport::{
    HttpResponse, HttpTransport, NetworkError, NetworkErrorKind, PLAIN_TEXT_MIME_TYPE,
    ReqwestTransport, TransportRequest, is_open_rosa_response,
};
