//! Access gate: establishes an identity and root scope per request.
//!
//! In `Open` mode the gate waves everything through; the anonymous filename
//! tag is checked later, per file, by the path resolver. In the
//! authenticated modes it parses HTTP Basic credentials and checks them
//! against the credential store, and in private mode it also makes sure the
//! caller's sandbox directory exists before any path is resolved into it.

use crate::config::{AccessMode, ServerConfig};
use crate::error::{DispatchError, DispatchResult};
use crate::users;
use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64;
use hyper::HeaderMap;
use hyper::header::AUTHORIZATION;
use std::io;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// The authorization outcome: who the caller is and where their tree roots.
#[derive(Debug, Clone)]
pub struct Scope {
    /// Username used to scope paths; empty in `Open` and shared modes.
    pub identity: String,
    /// Filesystem root all paths for this request resolve under.
    pub root: PathBuf,
}

/// Decide whether the caller may proceed, and under which scope.
pub async fn authorize(config: &ServerConfig, headers: &HeaderMap) -> DispatchResult<Scope> {
    if !config.mode.auth_enabled() {
        return Ok(Scope {
            identity: String::new(),
            root: config.root.clone(),
        });
    }

    let (username, password) =
        basic_credentials(headers).ok_or(DispatchError::MissingCredentials)?;
    if username.is_empty() {
        return Err(DispatchError::MissingCredentials);
    }

    users::verify(&config.users_file(), &username, &password).await?;
    debug!(user = %username, "authenticated");

    match config.mode {
        AccessMode::PrivateAuthenticated => {
            ensure_user_dir(&config.root, &username).await?;
            Ok(Scope {
                identity: username,
                root: config.root.clone(),
            })
        }
        // Shared mode: the identity is established but not used for scoping.
        AccessMode::SharedAuthenticated | AccessMode::Open => Ok(Scope {
            identity: String::new(),
            root: config.root.clone(),
        }),
    }
}

/// Parse `Authorization: Basic <base64(user:pass)>` into its parts.
fn basic_credentials(headers: &HeaderMap) -> Option<(String, String)> {
    let value = headers.get(AUTHORIZATION)?.to_str().ok()?;
    let encoded = value.strip_prefix("Basic ")?;
    let decoded = BASE64.decode(encoded.trim()).ok()?;
    let decoded = String::from_utf8(decoded).ok()?;
    let (user, pass) = decoded.split_once(':')?;
    Some((user.to_string(), pass.to_string()))
}

/// Make sure `<root>/<user>/` exists, creating it with permissive mode so
/// the WebDAV engine can write into it regardless of the process umask.
async fn ensure_user_dir(root: &Path, username: &str) -> DispatchResult<()> {
    let dir = root.join(username);
    match tokio::fs::create_dir(&dir).await {
        Ok(()) => {
            #[cfg(unix)]
            {
                use std::fs::Permissions;
                use std::os::unix::fs::PermissionsExt;
                if let Err(e) =
                    tokio::fs::set_permissions(&dir, Permissions::from_mode(0o777)).await
                {
                    warn!(path = %dir.display(), error = %e, "failed to relax user directory permissions");
                }
            }
            debug!(path = %dir.display(), "created user directory");
            Ok(())
        }
        Err(e) if e.kind() == io::ErrorKind::AlreadyExists => Ok(()),
        Err(e) => Err(DispatchError::UserDir {
            path: dir,
            source: e,
        }),
    }
}
