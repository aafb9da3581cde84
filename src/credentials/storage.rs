//! Credential persistence with encrypted-at-rest storage.
//!
//! Stores are written to `~/.config/openrosa/credentials.enc`
//! (or `$XDG_CONFIG_HOME/openrosa/credentials.enc`) as XChaCha20-Poly1305
//! encrypted JSON. The key comes from `OPENROSA_MASTER_KEY` or the system
//! keychain.

use std::env;
use std::ffi::OsString;
use std::fs;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::path::{Path, PathBuf};

use chacha20poly1305::aead::{Aead, KeyInit};
use chacha20poly1305::{Key, XChaCha20Poly1305, XNonce};
use rand::RngCore;
use sha2::{Digest, Sha256};
use tracing::{debug, instrument};

use super::{CredentialStore, ServerCredentials};

const CREDENTIALS_FILE_NAME: &str = "credentials.enc";
const APP_DIR_NAME: &str = "openrosa";
const MASTER_KEY_ENV: &str = "OPENROSA_MASTER_KEY";
const KEYRING_SERVICE: &str = "openrosa";
const KEYRING_ENTRY_NAME: &str = "credential-master-key-v1";
const MAGIC: &[u8; 4] = b"ORC1";
const NONCE_LEN: usize = 24;
const KEY_LEN: usize = 32;

/// Errors for persisted credential storage operations.
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    /// No suitable user config directory is available.
    #[error("unable to determine config directory (set XDG_CONFIG_HOME or HOME)")]
    ConfigDirUnavailable,
    /// Filesystem I/O failed.
    #[error(transparent)]
    Io(#[from] std::io::Error),
    /// Serialization/deserialization failed.
    #[error(transparent)]
    Json(#[from] serde_json::Error),
    /// Could not access keychain and no env fallback key was provided.
    #[error(
        "unable to access system keychain for credential encryption key; set OPENROSA_MASTER_KEY or configure keychain access"
    )]
    KeychainUnavailable,
    /// Stored encrypted payload is malformed.
    #[error("persisted credential payload is invalid")]
    InvalidPayload,
    /// Encryption failed.
    #[error("failed to encrypt persisted credentials")]
    EncryptionFailed,
    /// Decryption failed.
    #[error("failed to decrypt persisted credentials")]
    DecryptionFailed,
}

#[derive(Debug, serde::Serialize, serde::Deserialize)]
struct PersistedCredential {
    server_url: String,
    username: String,
    password: String,
}

impl From<ServerCredentials> for PersistedCredential {
    fn from(credentials: ServerCredentials) -> Self {
        Self {
            server_url: credentials.server_url,
            username: credentials.username,
            password: credentials.password,
        }
    }
}

impl From<PersistedCredential> for ServerCredentials {
    fn from(persisted: PersistedCredential) -> Self {
        ServerCredentials::new(persisted.server_url, persisted.username, persisted.password)
    }
}

impl CredentialStore {
    /// Encrypts the whole store and writes it to `path`.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError`] when serialization, encryption, or the file
    /// write fails.
    #[instrument(level = "debug", skip(self, key_material), fields(path = %path.display()))]
    pub fn save_to(&self, path: &Path, key_material: &str) -> Result<(), StorageError> {
        let persisted = self
            .snapshot()
            .into_iter()
            .map(PersistedCredential::from)
            .collect::<Vec<_>>();
        let plaintext = serde_json::to_vec(&persisted)?;
        let encrypted = encrypt_bytes(&plaintext, key_material)?;
        write_encrypted_payload(path, &encrypted)?;
        debug!(entries = persisted.len(), "credentials persisted");
        Ok(())
    }

    /// Reads and decrypts a store previously written by [`save_to`](Self::save_to).
    ///
    /// # Errors
    ///
    /// Returns [`StorageError`] when the file cannot be read, the key is
    /// wrong, or the payload is malformed.
    #[instrument(level = "debug", skip(key_material), fields(path = %path.display()))]
    pub fn load_from(path: &Path, key_material: &str) -> Result<Self, StorageError> {
        let bytes = fs::read(path)?;
        let plaintext = decrypt_bytes(&bytes, key_material)?;
        let persisted = serde_json::from_slice::<Vec<PersistedCredential>>(&plaintext)?;
        Ok(Self::from_entries(
            persisted.into_iter().map(ServerCredentials::from),
        ))
    }

    /// Loads the store from the default location, returning an empty store
    /// when no file exists yet.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError`] when key retrieval or decryption fails.
    pub fn load_persisted() -> Result<Self, StorageError> {
        let path = persisted_credentials_path()?;
        if !path.exists() {
            return Ok(Self::new());
        }
        let key = load_or_create_key()?;
        Self::load_from(&path, &key)
    }

    /// Saves the store to the default location.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError`] when key retrieval, encryption, or file
    /// writing fails.
    pub fn save_persisted(&self) -> Result<PathBuf, StorageError> {
        let path = persisted_credentials_path()?;
        let key = load_or_create_key()?;
        self.save_to(&path, &key)?;
        Ok(path)
    }
}

/// Returns the default persisted credential path.
///
/// # Errors
///
/// Returns [`StorageError::ConfigDirUnavailable`] if no usable config dir is found.
pub fn persisted_credentials_path() -> Result<PathBuf, StorageError> {
    Ok(default_config_dir()?.join(CREDENTIALS_FILE_NAME))
}

/// Returns the encryption key material, creating and storing a keychain
/// entry on first use.
///
/// # Errors
///
/// Returns [`StorageError::KeychainUnavailable`] when neither the env var nor
/// the keychain can supply a key.
pub fn load_or_create_key() -> Result<String, StorageError> {
    if let Some(from_env) = env::var_os(MASTER_KEY_ENV) {
        let key = from_env.to_string_lossy().trim().to_string();
        if !key.is_empty() {
            return Ok(key);
        }
    }

    let entry = safe_keyring_entry()?;

    match safe_keyring_get_password(&entry) {
        Ok(existing) if !existing.trim().is_empty() => Ok(existing),
        _ => {
            let generated = generate_key_material();
            safe_keyring_set_password(&entry, &generated)?;
            Ok(generated)
        }
    }
}

fn default_config_dir() -> Result<PathBuf, StorageError> {
    resolve_config_dir(
        sanitize_env_path(env::var_os("XDG_CONFIG_HOME")),
        sanitize_env_path(env::var_os("HOME")),
        sanitize_env_path(env::var_os("APPDATA")),
    )
}

fn sanitize_env_path(value: Option<OsString>) -> Option<PathBuf> {
    let value = value?;
    if value.to_string_lossy().trim().is_empty() {
        return None;
    }

    Some(PathBuf::from(value))
}

fn resolve_config_dir(
    xdg_config_home: Option<PathBuf>,
    home: Option<PathBuf>,
    app_data: Option<PathBuf>,
) -> Result<PathBuf, StorageError> {
    if let Some(xdg) = xdg_config_home {
        return Ok(xdg.join(APP_DIR_NAME));
    }
    if let Some(home) = home {
        return Ok(home.join(".config").join(APP_DIR_NAME));
    }
    if let Some(app_data) = app_data {
        return Ok(app_data.join(APP_DIR_NAME));
    }

    Err(StorageError::ConfigDirUnavailable)
}

// keyring backends can panic on some platforms without a secret service.
fn safe_keyring_entry() -> Result<keyring::Entry, StorageError> {
    catch_unwind(|| keyring::Entry::new(KEYRING_SERVICE, KEYRING_ENTRY_NAME))
        .map_err(|_| StorageError::KeychainUnavailable)?
        .map_err(|_| StorageError::KeychainUnavailable)
}

fn safe_keyring_get_password(entry: &keyring::Entry) -> Result<String, StorageError> {
    catch_unwind(AssertUnwindSafe(|| entry.get_password()))
        .map_err(|_| StorageError::KeychainUnavailable)?
        .map_err(|_| StorageError::KeychainUnavailable)
}

fn safe_keyring_set_password(entry: &keyring::Entry, password: &str) -> Result<(), StorageError> {
    catch_unwind(AssertUnwindSafe(|| entry.set_password(password)))
        .map_err(|_| StorageError::KeychainUnavailable)?
        .map_err(|_| StorageError::KeychainUnavailable)
}

fn generate_key_material() -> String {
    let mut bytes = [0_u8; KEY_LEN];
    rand::thread_rng().fill_bytes(&mut bytes);
    bytes.iter().map(|byte| format!("{byte:02x}")).collect()
}

fn derive_key_bytes(key_material: &str) -> [u8; KEY_LEN] {
    let digest = Sha256::digest(key_material.as_bytes());
    let mut key = [0_u8; KEY_LEN];
    key.copy_from_slice(&digest[..KEY_LEN]);
    key
}

fn write_encrypted_payload(path: &Path, payload: &[u8]) -> Result<(), StorageError> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }

    fs::write(path, payload)?;
    set_owner_only_permissions(path)?;
    Ok(())
}

#[cfg(unix)]
fn set_owner_only_permissions(path: &Path) -> Result<(), StorageError> {
    use std::os::unix::fs::PermissionsExt;

    fs::set_permissions(path, fs::Permissions::from_mode(0o600))?;
    Ok(())
}

#[cfg(not(unix))]
fn set_owner_only_permissions(_path: &Path) -> Result<(), StorageError> {
    Ok(())
}

fn encrypt_bytes(plaintext: &[u8], key_material: &str) -> Result<Vec<u8>, StorageError> {
    let key_bytes = derive_key_bytes(key_material);
    let cipher = XChaCha20Poly1305::new(Key::from_slice(&key_bytes));

    let mut nonce = [0_u8; NONCE_LEN];
    rand::thread_rng().fill_bytes(&mut nonce);

    let ciphertext = cipher
        .encrypt(XNonce::from_slice(&nonce), plaintext)
        .map_err(|_| StorageError::EncryptionFailed)?;

    let mut output = Vec::with_capacity(MAGIC.len() + NONCE_LEN + ciphertext.len());
    output.extend_from_slice(MAGIC);
    output.extend_from_slice(&nonce);
    output.extend_from_slice(&ciphertext);
    Ok(output)
}

fn decrypt_bytes(payload: &[u8], key_material: &str) -> Result<Vec<u8>, StorageError> {
    if payload.len() < MAGIC.len() + NONCE_LEN || &payload[..MAGIC.len()] != MAGIC {
        return Err(StorageError::InvalidPayload);
    }

    let key_bytes = derive_key_bytes(key_material);
    let cipher = XChaCha20Poly1305::new(Key::from_slice(&key_bytes));
    let nonce_end = MAGIC.len() + NONCE_LEN;
    let nonce = XNonce::from_slice(&payload[MAGIC.len()..nonce_end]);

    cipher
        .decrypt(nonce, &payload[nonce_end..])
        .map_err(|_| StorageError::DecryptionFailed)
}
