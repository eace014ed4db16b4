//! Dispatch and access-control core of the davbox file server.
//!
//! davbox exposes a directory tree over HTTP, optionally via WebDAV, under
//! one of three access policies fixed at boot:
//!
//! - **Open**: no authentication; uploaded files carry an anonymous
//!   `__<pass>` name tag that doubles as a crude per-file secret.
//! - **Private**: HTTP Basic authentication; every user is confined to a
//!   private directory `<root>/<username>/`.
//! - **Shared**: HTTP Basic authentication; all users share `<root>/`.
//!
//! Every request flows through the [`router::Dispatcher`]: the access gate
//! establishes an identity and root scope, the path resolver turns the URL
//! path into a filesystem candidate, and the request is routed to one of
//! four behaviors: forced download, directory listing, multipart upload,
//! or WebDAV passthrough. The WebDAV protocol itself (PROPFIND, locking,
//! COPY/MOVE, ...) is delegated to the `dav-server` crate; this layer only
//! rewrites the request path under the caller's identity before handing it
//! over.
//!
//! # Example
//!
//! ```ignore
//! use davbox_server::{AccessMode, Dispatcher, FileServer, ListenConfig, ServerConfig};
//! use std::sync::Arc;
//!
//! let config = Arc::new(ServerConfig::new(
//!     "./files",
//!     "./config",
//!     AccessMode::from_flags(true, false),
//!     davbox_server::config::DEFAULT_MAX_UPLOAD_BYTES,
//! ));
//! let server = FileServer::start(Dispatcher::new(config), ListenConfig::default()).await?;
//! println!("serving on {}", server.url());
//! ```

pub mod config;
pub mod error;
pub mod gate;
pub mod listing;
pub mod resolve;
pub mod router;
pub mod server;
pub mod upload;
pub mod users;

// Public exports
pub use config::{AccessMode, ServerConfig};
pub use error::{DispatchError, DispatchResult};
pub use router::{Dispatch, Dispatcher, route};
pub use server::{FileServer, ListenConfig};
