//! Immutable server configuration.
//!
//! All request handlers read their settings from a [`ServerConfig`] built
//! once at startup and shared behind an `Arc`; nothing in the request path
//! consults ambient process state.

use std::path::PathBuf;

/// Default ceiling for a single upload request body, in bytes.
pub const DEFAULT_MAX_UPLOAD_BYTES: u64 = 512_000_000;

/// Name of the credential store inside the config directory.
pub const USERS_FILE: &str = "users.json";

/// Name of the directory-listing template inside the config directory.
pub const TEMPLATE_FILE: &str = "template.html";

/// The access policy governing every request for the lifetime of the process.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AccessMode {
    /// No authentication; on-disk filenames carry anonymous `__<pass>` tags.
    Open,
    /// HTTP Basic authentication; each user is confined to `<root>/<user>/`.
    PrivateAuthenticated,
    /// HTTP Basic authentication; all users share `<root>/`.
    SharedAuthenticated,
}

impl AccessMode {
    /// Derive the mode from the two boot toggles.
    ///
    /// Sharing requires authentication; requesting sharing without it
    /// silently degrades to the non-shared behavior.
    pub fn from_flags(basic: bool, share: bool) -> Self {
        match (basic, share) {
            (true, true) => AccessMode::SharedAuthenticated,
            (true, false) => AccessMode::PrivateAuthenticated,
            (false, _) => AccessMode::Open,
        }
    }

    /// True when HTTP Basic authentication is required.
    pub fn auth_enabled(self) -> bool {
        !matches!(self, AccessMode::Open)
    }
}

/// Server configuration, built once at startup.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Root of the served directory tree.
    pub root: PathBuf,
    /// Directory holding `users.json`, `template.html` and TLS material.
    pub config_dir: PathBuf,
    /// Active access policy.
    pub mode: AccessMode,
    /// Upper bound on a single upload request body, in bytes.
    pub max_upload_bytes: u64,
}

impl ServerConfig {
    /// Build a configuration from its parts.
    pub fn new(
        root: impl Into<PathBuf>,
        config_dir: impl Into<PathBuf>,
        mode: AccessMode,
        max_upload_bytes: u64,
    ) -> Self {
        Self {
            root: root.into(),
            config_dir: config_dir.into(),
            mode,
            max_upload_bytes,
        }
    }

    /// Path of the credential store.
    pub fn users_file(&self) -> PathBuf {
        self.config_dir.join(USERS_FILE)
    }

    /// Path of the directory-listing template.
    pub fn template_file(&self) -> PathBuf {
        self.config_dir.join(TEMPLATE_FILE)
    }
}
