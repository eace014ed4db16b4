//! HTTP and HTTPS server lifecycle management.
//!
//! This module owns the listener sockets and the accept loops and handles
//! the server lifecycle (start, stop). Request semantics live entirely in
//! the [`Dispatcher`]; a TLS listener runs the same dispatcher behind a
//! handshake.

use crate::router::Dispatcher;
use hyper::Request;
use hyper::body::Incoming;
use hyper::service::service_fn;
use hyper_util::rt::{TokioExecutor, TokioIo};
use hyper_util::server::conn::auto;
use std::convert::Infallible;
use std::fs::File;
use std::io::{self, BufReader};
use std::net::SocketAddr;
use std::path::Path;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::sync::oneshot;
use tokio_rustls::rustls::pki_types::{CertificateDer, PrivateKeyDer};
use tokio_rustls::{TlsAcceptor, rustls};
use tracing::{debug, error, info, warn};

/// Listener configuration.
#[derive(Debug, Clone)]
pub struct ListenConfig {
    /// Port to bind to (0 = auto-assign).
    pub port: u16,
    /// Bind address.
    pub bind_address: std::net::IpAddr,
}

impl Default for ListenConfig {
    fn default() -> Self {
        Self {
            port: 0, // Auto-assign
            bind_address: std::net::IpAddr::V4(std::net::Ipv4Addr::LOCALHOST),
        }
    }
}

/// A running file server instance.
pub struct FileServer {
    /// The actual bound address.
    pub addr: SocketAddr,
    /// True when this listener speaks TLS.
    tls: bool,
    /// Shutdown signal sender.
    shutdown_tx: Option<oneshot::Sender<()>>,
    /// Server task handle.
    server_handle: Option<tokio::task::JoinHandle<()>>,
}

impl FileServer {
    /// Start a plain HTTP listener driving `dispatcher`.
    pub async fn start(dispatcher: Dispatcher, config: ListenConfig) -> Result<Self, io::Error> {
        let addr = SocketAddr::new(config.bind_address, config.port);
        let listener = TcpListener::bind(addr).await?;
        let actual_addr = listener.local_addr()?;

        info!(addr = %actual_addr, "starting HTTP listener");

        let (shutdown_tx, shutdown_rx) = oneshot::channel::<()>();
        let server_handle = tokio::spawn(async move {
            tokio::select! {
                () = run_server(listener, dispatcher) => {
                    debug!("server loop ended");
                }
                _ = shutdown_rx => {
                    info!("received shutdown signal");
                }
            }
        });

        Ok(Self {
            addr: actual_addr,
            tls: false,
            shutdown_tx: Some(shutdown_tx),
            server_handle: Some(server_handle),
        })
    }

    /// Start an HTTPS listener driving `dispatcher`, using PEM-encoded
    /// certificate and key files.
    pub async fn start_tls(
        dispatcher: Dispatcher,
        config: ListenConfig,
        cert_path: &Path,
        key_path: &Path,
    ) -> Result<Self, io::Error> {
        let tls_config = load_tls_config(cert_path, key_path)?;
        let acceptor = TlsAcceptor::from(tls_config);

        let addr = SocketAddr::new(config.bind_address, config.port);
        let listener = TcpListener::bind(addr).await?;
        let actual_addr = listener.local_addr()?;

        info!(addr = %actual_addr, "starting HTTPS listener");

        let (shutdown_tx, shutdown_rx) = oneshot::channel::<()>();
        let server_handle = tokio::spawn(async move {
            tokio::select! {
                () = run_tls_server(listener, acceptor, dispatcher) => {
                    debug!("server loop ended");
                }
                _ = shutdown_rx => {
                    info!("received shutdown signal");
                }
            }
        });

        Ok(Self {
            addr: actual_addr,
            tls: true,
            shutdown_tx: Some(shutdown_tx),
            server_handle: Some(server_handle),
        })
    }

    /// Get the URL for this server.
    pub fn url(&self) -> String {
        let scheme = if self.tls { "https" } else { "http" };
        format!("{scheme}://{}", self.addr)
    }

    /// Stop the server.
    pub async fn stop(mut self) {
        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.send(());
        }
        if let Some(handle) = self.server_handle.take() {
            let _ = handle.await;
        }
        info!("file server stopped");
    }

    /// Stop the server synchronously (for use in Drop).
    fn stop_sync(&mut self) {
        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.send(());
        }
        if let Some(handle) = self.server_handle.take() {
            handle.abort();
        }
    }
}

impl Drop for FileServer {
    fn drop(&mut self) {
        self.stop_sync();
    }
}

/// Run the plain HTTP accept loop.
async fn run_server(listener: TcpListener, dispatcher: Dispatcher) {
    loop {
        match listener.accept().await {
            Ok((stream, peer_addr)) => {
                let dispatcher = dispatcher.clone();
                tokio::spawn(async move {
                    serve_connection(TokioIo::new(stream), peer_addr, dispatcher).await;
                });
            }
            Err(e) => {
                error!(error = %e, "failed to accept connection");
            }
        }
    }
}

/// Run the TLS accept loop. A failed handshake drops that connection only.
async fn run_tls_server(listener: TcpListener, acceptor: TlsAcceptor, dispatcher: Dispatcher) {
    loop {
        match listener.accept().await {
            Ok((stream, peer_addr)) => {
                let acceptor = acceptor.clone();
                let dispatcher = dispatcher.clone();
                tokio::spawn(async move {
                    match acceptor.accept(stream).await {
                        Ok(tls_stream) => {
                            serve_connection(TokioIo::new(tls_stream), peer_addr, dispatcher).await;
                        }
                        Err(e) => {
                            warn!(peer = %peer_addr, error = %e, "TLS handshake failed");
                        }
                    }
                });
            }
            Err(e) => {
                error!(error = %e, "failed to accept connection");
            }
        }
    }
}

/// Serve one connection with auto HTTP/1.1 and HTTP/2 negotiation.
async fn serve_connection<I>(io: I, peer_addr: SocketAddr, dispatcher: Dispatcher)
where
    I: hyper::rt::Read + hyper::rt::Write + Unpin + Send + 'static,
{
    let service = service_fn(move |req: Request<Incoming>| {
        let dispatcher = dispatcher.clone();
        async move {
            let resp = dispatcher.handle(peer_addr, req).await;
            Ok::<_, Infallible>(resp)
        }
    });

    if let Err(e) = auto::Builder::new(TokioExecutor::new())
        .serve_connection(io, service)
        .await
    {
        warn!(peer = %peer_addr, error = %e, "HTTP connection error");
    }
}

/// Load a rustls server configuration from PEM certificate and key files.
pub fn load_tls_config(cert_path: &Path, key_path: &Path) -> io::Result<Arc<rustls::ServerConfig>> {
    let certs: Vec<CertificateDer<'static>> =
        rustls_pemfile::certs(&mut BufReader::new(File::open(cert_path)?))
            .collect::<Result<_, _>>()?;
    let key: PrivateKeyDer<'static> =
        rustls_pemfile::private_key(&mut BufReader::new(File::open(key_path)?))?.ok_or_else(
            || io::Error::new(io::ErrorKind::InvalidData, "no private key in PEM file"),
        )?;

    let config = rustls::ServerConfig::builder()
        .with_no_client_auth()
        .with_single_cert(certs, key)
        .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e.to_string()))?;
    Ok(Arc::new(config))
}
