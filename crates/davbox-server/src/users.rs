//! Credential store loaded from `users.json`.
//!
//! The store is re-read from disk on every authentication attempt so that
//! credential edits apply immediately, without a restart. There is no
//! coordination with concurrent rewrites of the file; a torn read surfaces
//! as an authentication failure for that one request and nothing else.

use crate::error::{DispatchError, DispatchResult};
use serde::Deserialize;
use sha2::{Digest, Sha256};
use std::path::Path;

/// One credential record.
#[derive(Debug, Clone, Deserialize)]
pub struct User {
    /// Login name.
    pub name: String,
    /// Lowercase-hex SHA-256 digest of the plaintext password. The
    /// plaintext is never stored.
    pub password: String,
}

/// The on-disk credential document: `{"Users": [...]}`.
#[derive(Debug, Deserialize)]
pub struct UserFile {
    #[serde(rename = "Users")]
    pub users: Vec<User>,
}

/// Lowercase-hex SHA-256 digest of a plaintext password.
pub fn password_digest(password: &str) -> String {
    hex::encode(Sha256::digest(password.as_bytes()))
}

/// Load the store from `path` and check `(username, password)` against it.
///
/// The first `(name, digest)` match wins; duplicate names are not rejected.
/// A missing or malformed store fails exactly like a wrong password.
pub async fn verify(path: &Path, username: &str, password: &str) -> DispatchResult<()> {
    let raw = tokio::fs::read(path)
        .await
        .map_err(DispatchError::CredentialStoreRead)?;
    let store: UserFile =
        serde_json::from_slice(&raw).map_err(DispatchError::CredentialStoreParse)?;

    let digest = password_digest(password);
    if store
        .users
        .iter()
        .any(|user| user.name == username && user.password == digest)
    {
        Ok(())
    } else {
        Err(DispatchError::BadCredentials)
    }
}
