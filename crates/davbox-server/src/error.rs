//! Error taxonomy for the dispatch layer.
//!
//! Every failure in the request path maps onto one of four client-visible
//! statuses: 401 for anything that went wrong while establishing an
//! identity (the client never learns whether the store was unreadable,
//! malformed, or simply had no matching user), 404 for paths that cannot be
//! resolved, 204 for upload-step failures, and 405 for methods with no
//! handler under the active access mode. The distinguishing detail goes to
//! the operator log only.

use hyper::StatusCode;
use std::io;
use std::path::PathBuf;
use thiserror::Error;

/// A failure while dispatching one request.
#[derive(Debug, Error)]
pub enum DispatchError {
    /// No usable `Authorization: Basic` credentials on the request.
    #[error("missing or malformed credentials")]
    MissingCredentials,

    /// The credential store could not be read.
    #[error("failed to read credential store: {0}")]
    CredentialStoreRead(#[source] io::Error),

    /// The credential store is not valid JSON.
    #[error("failed to parse credential store: {0}")]
    CredentialStoreParse(#[source] serde_json::Error),

    /// Credentials did not match any stored user.
    #[error("no matching user")]
    BadCredentials,

    /// The private per-user directory could not be created.
    #[error("failed to create user directory {path}: {source}")]
    UserDir {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// The resolved path does not exist, after any anonymous tag fallback.
    #[error("path not found: {0}")]
    NotFound(PathBuf),

    /// The anonymous tag fallback needs exactly one `pass` query value.
    #[error("missing or ambiguous pass parameter")]
    PassParameter,

    /// The listing template is missing or unreadable.
    #[error("failed to read listing template: {0}")]
    Template(#[source] io::Error),

    /// The request body is not a usable multipart form.
    #[error("invalid multipart request: {0}")]
    Multipart(#[source] multer::Error),

    /// Reading an uploaded part failed.
    #[error("failed to read upload part: {0}")]
    UploadRead(#[source] multer::Error),

    /// An upload part had no matching anonymous `pass` form value.
    #[error("missing pass value for upload part {0}")]
    UploadPass(usize),

    /// Writing an uploaded file failed.
    #[error("failed to save upload to {path}: {source}")]
    UploadSave {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// The request path could not be rewritten under the identity prefix.
    #[error("failed to scope request path: {0}")]
    PathRewrite(String),

    /// The method has no handler under the active access mode.
    #[error("method not allowed in this access mode")]
    Rejected,
}

impl DispatchError {
    /// The HTTP status surfaced to the client.
    pub fn status(&self) -> StatusCode {
        match self {
            DispatchError::MissingCredentials
            | DispatchError::CredentialStoreRead(_)
            | DispatchError::CredentialStoreParse(_)
            | DispatchError::BadCredentials
            | DispatchError::UserDir { .. } => StatusCode::UNAUTHORIZED,
            DispatchError::NotFound(_)
            | DispatchError::PassParameter
            | DispatchError::Template(_)
            | DispatchError::PathRewrite(_) => StatusCode::NOT_FOUND,
            DispatchError::Multipart(_)
            | DispatchError::UploadRead(_)
            | DispatchError::UploadPass(_)
            | DispatchError::UploadSave { .. } => StatusCode::NO_CONTENT,
            DispatchError::Rejected => StatusCode::METHOD_NOT_ALLOWED,
        }
    }

    /// True for failures that must carry the Basic challenge header.
    pub fn is_auth_failure(&self) -> bool {
        self.status() == StatusCode::UNAUTHORIZED
    }
}

/// Result type for dispatch operations.
pub type DispatchResult<T> = Result<T, DispatchError>;
