//! Request routing and the four dispatch behaviors.
//!
//! The routing decision is a pure function of the access mode, the HTTP
//! method and the `Translate` header, so it can be tested without a socket.
//! Everything WebDAV is delegated to a [`DavHandler`] built once per
//! process; this layer only rewrites the request path under the caller's
//! identity before handing over.

use crate::config::{AccessMode, ServerConfig};
use crate::error::{DispatchError, DispatchResult};
use crate::gate::{self, Scope};
use crate::listing;
use crate::resolve;
use crate::upload;
use dav_server::DavHandler;
use dav_server::body::Body;
use dav_server::localfs::LocalFs;
use dav_server::memls::MemLs;
use http_body_util::BodyExt;
use hyper::body::Incoming;
use hyper::header::{CONTENT_DISPOSITION, CONTENT_LENGTH, CONTENT_TYPE, WWW_AUTHENTICATE};
use hyper::http::HeaderValue;
use hyper::{Method, Request, Response};
use std::net::SocketAddr;
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, warn};

/// Header whose value `f` asks for raw (WebDAV) semantics on a GET.
const TRANSLATE_HEADER: &str = "translate";

/// Challenge sent with every 401.
const BASIC_CHALLENGE: &str = "Basic realm=\"Check Login User\"";

/// Content type that forces browsers to download rather than render.
const FORCE_DOWNLOAD: &str = "application/force-download";

/// Where a request is sent after the gate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dispatch {
    /// GET: directory listing or forced download.
    Browse,
    /// POST: multipart upload.
    Upload,
    /// Hand the request to the WebDAV engine.
    Passthrough,
    /// No handler for this method under the active access mode.
    Rejected,
}

/// Pick the behavior for a request.
///
/// `translate_passthrough` is true when the client sent `Translate: f`,
/// asking for the raw resource instead of the browse behavior. WebDAV is
/// only reachable in the authenticated modes; anything that would need it
/// under `Open` is rejected outright.
pub fn route(mode: AccessMode, method: &Method, translate_passthrough: bool) -> Dispatch {
    if translate_passthrough {
        return if mode.auth_enabled() {
            Dispatch::Passthrough
        } else {
            Dispatch::Rejected
        };
    }
    match *method {
        Method::GET => Dispatch::Browse,
        Method::POST => Dispatch::Upload,
        _ => {
            if mode.auth_enabled() {
                Dispatch::Passthrough
            } else {
                Dispatch::Rejected
            }
        }
    }
}

/// Per-process request handler: the configuration plus the WebDAV engine.
#[derive(Clone)]
pub struct Dispatcher {
    config: Arc<ServerConfig>,
    dav: DavHandler,
}

impl Dispatcher {
    /// Build a dispatcher serving `config.root` with in-memory WebDAV locks.
    pub fn new(config: Arc<ServerConfig>) -> Self {
        let dav = DavHandler::builder()
            .filesystem(LocalFs::new(&config.root, false, false, false))
            .locksystem(MemLs::new())
            .build_handler();
        Self { config, dav }
    }

    /// Handle one request end to end, mapping every failure to its status.
    pub async fn handle(&self, peer: SocketAddr, req: Request<Incoming>) -> Response<Body> {
        let method = req.method().clone();
        let uri = req.uri().clone();
        match self.dispatch(req).await {
            Ok(response) => {
                debug!(peer = %peer, method = %method, uri = %uri, status = %response.status(), "request handled");
                response
            }
            Err(e) => {
                warn!(peer = %peer, method = %method, uri = %uri, error = %e, "request failed");
                error_response(&e)
            }
        }
    }

    async fn dispatch(&self, req: Request<Incoming>) -> DispatchResult<Response<Body>> {
        let scope = gate::authorize(&self.config, req.headers()).await?;
        let translate = req
            .headers()
            .get(TRANSLATE_HEADER)
            .and_then(|v| v.to_str().ok())
            == Some("f");

        match route(self.config.mode, req.method(), translate) {
            Dispatch::Browse => self.browse(&scope, &req).await,
            Dispatch::Upload => self.upload(&scope, req).await,
            Dispatch::Passthrough => self.passthrough(&scope, req).await,
            Dispatch::Rejected => Err(DispatchError::Rejected),
        }
    }

    /// GET: list a directory, or force-download a file. The raw path is
    /// percent-decoded once before resolution, so encoded names reach
    /// their on-disk counterparts. In `Open` mode a path with no direct
    /// hit gets one retry under its tagged name, keyed by the `pass`
    /// query value.
    async fn browse(
        &self,
        scope: &Scope,
        req: &Request<Incoming>,
    ) -> DispatchResult<Response<Body>> {
        let url_path = resolve::decode_url_path(req.uri().path());
        let path = resolve::candidate(&scope.root, &scope.identity, &url_path);

        match tokio::fs::metadata(&path).await {
            Ok(meta) if meta.is_dir() => self.list(&path, &url_path).await,
            Ok(_) => download(&path, &url_path).await,
            Err(_) if self.config.mode == AccessMode::Open => {
                let tagged = resolve::tagged_candidate(&path, req.uri().query())?;
                download(&tagged, &url_path).await
            }
            Err(_) => Err(DispatchError::NotFound(path)),
        }
    }

    async fn list(&self, dir: &Path, url_path: &str) -> DispatchResult<Response<Body>> {
        let auth_enabled = self.config.mode.auth_enabled();
        let entries = listing::list_directory(dir, url_path, !auth_enabled).await?;
        let template = tokio::fs::read_to_string(self.config.template_file())
            .await
            .map_err(DispatchError::Template)?;
        let page = listing::render(&template, &entries, auth_enabled);

        let mut response = Response::new(Body::from(page));
        response.headers_mut().insert(
            CONTENT_TYPE,
            HeaderValue::from_static("text/html; charset=utf-8"),
        );
        Ok(response)
    }

    /// POST: receive a multipart form into the directory the URL names.
    async fn upload(
        &self,
        scope: &Scope,
        req: Request<Incoming>,
    ) -> DispatchResult<Response<Body>> {
        let content_type = req
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .unwrap_or_default();
        let boundary = multer::parse_boundary(content_type).map_err(DispatchError::Multipart)?;

        let dest_dir = resolve::candidate(
            &scope.root,
            &scope.identity,
            &resolve::decode_url_path(req.uri().path()),
        );
        let stream = req.into_body().into_data_stream();
        let saved = upload::receive(&self.config, &dest_dir, stream, boundary).await?;
        debug!(saved, dir = %dest_dir.display(), "upload complete");
        Ok(Response::new(Body::empty()))
    }

    async fn passthrough(
        &self,
        scope: &Scope,
        req: Request<Incoming>,
    ) -> DispatchResult<Response<Body>> {
        let req = rewrite_scoped(req, &scope.identity)?;
        Ok(self.dav.handle(req).await)
    }
}

/// Prefix the request path with the caller's identity so the WebDAV engine,
/// which serves the whole root, only ever sees paths inside the sandbox.
fn rewrite_scoped(req: Request<Incoming>, identity: &str) -> DispatchResult<Request<Incoming>> {
    if identity.is_empty() {
        return Ok(req);
    }
    let (mut parts, body) = req.into_parts();
    let mut target = format!("/{identity}{}", parts.uri.path());
    if let Some(query) = parts.uri.query() {
        target.push('?');
        target.push_str(query);
    }
    parts.uri = target
        .parse()
        .map_err(|e: hyper::http::uri::InvalidUri| DispatchError::PathRewrite(e.to_string()))?;
    Ok(Request::from_parts(parts, body))
}

/// Read a file fully and serve it as a forced download. The advertised
/// filename is the final URL segment, never the on-disk (possibly tagged)
/// name.
async fn download(path: &Path, url_path: &str) -> DispatchResult<Response<Body>> {
    let data = tokio::fs::read(path)
        .await
        .map_err(|_| DispatchError::NotFound(path.to_path_buf()))?;
    let filename = url_path.rsplit('/').next().unwrap_or_default();
    debug!(path = %path.display(), bytes = data.len(), "serving download");

    let length = data.len();
    let mut response = Response::new(Body::from(bytes::Bytes::from(data)));
    let headers = response.headers_mut();
    headers.insert(CONTENT_TYPE, HeaderValue::from_static(FORCE_DOWNLOAD));
    headers.insert(
        CONTENT_DISPOSITION,
        HeaderValue::from_str(&format!("attachment; filename=\"{filename}\""))
            .unwrap_or_else(|_| HeaderValue::from_static("attachment")),
    );
    headers.insert(CONTENT_LENGTH, HeaderValue::from(length));
    Ok(response)
}

/// Turn a dispatch failure into its client-visible response.
fn error_response(error: &DispatchError) -> Response<Body> {
    let mut response = Response::new(Body::empty());
    *response.status_mut() = error.status();
    if error.is_auth_failure() {
        response
            .headers_mut()
            .insert(WWW_AUTHENTICATE, HeaderValue::from_static(BASIC_CHALLENGE));
    }
    response
}
