//! Server credential management.
//!
//! [`CredentialStore`] maps server URL prefixes to username/password pairs.
//! Lookups pick the longest stored prefix of the requested URL, so a
//! credential registered for `https://example.com/v1` wins over one for
//! `https://example.com` when fetching `https://example.com/v1/formList`.
//!
//! Stores can be persisted encrypted at rest, see [`CredentialStore::save_to`].

use std::collections::BTreeMap;
use std::fmt;
use std::sync::{Mutex, MutexGuard, PoisonError};

use tracing::{debug, instrument};

mod storage;

pub use storage::{StorageError, load_or_create_key, persisted_credentials_path};

/// Credentials for one server URL prefix.
///
/// The password is redacted in `Debug` output.
#[derive(Clone, Default, PartialEq, Eq)]
pub struct ServerCredentials {
    /// The stored URL key these credentials were found under (or the
    /// requested URL when nothing matched).
    pub server_url: String,
    /// Username; empty for anonymous access.
    pub username: String,
    /// Password (sensitive, never log).
    password: String,
}

impl ServerCredentials {
    /// Creates a credential entry.
    pub fn new(
        server_url: impl Into<String>,
        username: impl Into<String>,
        password: impl Into<String>,
    ) -> Self {
        Self {
            server_url: server_url.into(),
            username: username.into(),
            password: password.into(),
        }
    }

    /// Creates anonymous credentials for `server_url`.
    pub fn empty(server_url: impl Into<String>) -> Self {
        Self {
            server_url: server_url.into(),
            ..Self::default()
        }
    }

    /// Returns the password. Avoid logging the return value.
    #[must_use]
    pub fn password(&self) -> &str {
        &self.password
    }

    /// Returns true when a username is set.
    #[must_use]
    pub fn has_credentials(&self) -> bool {
        !self.username.is_empty()
    }
}

impl fmt::Debug for ServerCredentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ServerCredentials")
            .field("server_url", &self.server_url)
            .field("username", &self.username)
            .field("password", &"[REDACTED]")
            .finish()
    }
}

#[derive(Clone)]
struct StoredCredential {
    username: String,
    password: String,
}

#[derive(Default)]
struct StoreState {
    entries: BTreeMap<String, StoredCredential>,
    revision: u64,
}

/// Thread-safe credential store keyed by normalized server URL.
///
/// Reads and writes are serialized behind a mutex.
#[derive(Default)]
pub struct CredentialStore {
    state: Mutex<StoreState>,
}

impl CredentialStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, StoreState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Returns credentials for the longest stored prefix of `server_url`,
    /// or empty credentials when nothing matches.
    #[must_use]
    pub fn get(&self, server_url: &str) -> ServerCredentials {
        let target = server_url.trim();
        let state = self.lock();
        let matched = state
            .entries
            .iter()
            .filter(|(key, _)| is_url_prefix(key, target))
            .max_by_key(|(key, _)| key.len());

        match matched {
            Some((key, stored)) => {
                ServerCredentials::new(key.clone(), &stored.username, &stored.password)
            }
            None => ServerCredentials::empty(target),
        }
    }

    /// Stores credentials under `server_url`, replacing any prior entry for
    /// that exact key.
    #[instrument(level = "debug", skip(self, username, password))]
    pub fn set(&self, server_url: &str, username: &str, password: &str) {
        let key = normalize_key(server_url);
        let mut state = self.lock();
        state.entries.insert(
            key,
            StoredCredential {
                username: username.to_string(),
                password: password.to_string(),
            },
        );
        state.revision += 1;
        debug!("credentials stored");
    }

    /// Removes the entry stored under `server_url`.
    ///
    /// Returns `true` when an entry existed.
    #[instrument(level = "debug", skip(self))]
    pub fn clear(&self, server_url: &str) -> bool {
        let key = normalize_key(server_url);
        let mut state = self.lock();
        let removed = state.entries.remove(&key).is_some();
        if removed {
            state.revision += 1;
            debug!("credentials cleared");
        }
        removed
    }

    /// Returns the stored URL keys in sorted order.
    #[must_use]
    pub fn server_urls(&self) -> Vec<String> {
        self.lock().entries.keys().cloned().collect()
    }

    /// Number of stored entries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.lock().entries.len()
    }

    /// Returns true when nothing is stored.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.lock().entries.is_empty()
    }

    /// Counter bumped by every mutation; lets callers detect unsaved changes.
    #[must_use]
    pub fn revision(&self) -> u64 {
        self.lock().revision
    }

    fn snapshot(&self) -> Vec<ServerCredentials> {
        self.lock()
            .entries
            .iter()
            .map(|(key, stored)| ServerCredentials::new(key, &stored.username, &stored.password))
            .collect()
    }

    fn from_entries(entries: impl IntoIterator<Item = ServerCredentials>) -> Self {
        let store = Self::new();
        {
            let mut state = store.lock();
            for credentials in entries {
                state.entries.insert(
                    normalize_key(&credentials.server_url),
                    StoredCredential {
                        username: credentials.username,
                        password: credentials.password,
                    },
                );
            }
        }
        store
    }
}

impl fmt::Debug for CredentialStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CredentialStore")
            .field("server_urls", &self.server_urls())
            .finish_non_exhaustive()
    }
}

/// Trims whitespace and trailing slashes so `http://a/` and `http://a` share a key.
pub(crate) fn normalize_key(server_url: &str) -> String {
    server_url.trim().trim_end_matches('/').to_string()
}

/// Prefix match that stops at URL boundaries, so `http://a.com` does not
/// match `http://a.com.evil.net`.
pub(crate) fn is_url_prefix(prefix: &str, url: &str) -> bool {
    if prefix.is_empty() {
        return false;
    }
    match url.strip_prefix(prefix) {
        Some(rest) => rest.is_empty() || rest.starts_with(['/', '?', '#']),
        None => false,
    }
}
