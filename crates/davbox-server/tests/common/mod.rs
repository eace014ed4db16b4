//! Test server harness for the file server integration tests.
//!
//! Provides a `TestServer` that runs a full server on a random port against
//! a temporary root and config directory, along with HTTP convenience
//! methods for the behaviors under test.

#![allow(dead_code)]

use davbox_server::users::password_digest;
use davbox_server::{AccessMode, Dispatcher, FileServer, ListenConfig, ServerConfig};
use reqwest::multipart::{Form, Part};
use reqwest::{Client, Method, Response};
use std::net::SocketAddr;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;

/// Seeded credentials.
pub const ALICE: (&str, &str) = ("alice", "correct horse");
pub const BOB: (&str, &str) = ("bob", "builder");

/// Listing template with both placeholder slots, separated for parsing.
pub const TEMPLATE: &str = "<pre>${files}</pre><div>${files}</div>";

/// Test server with HTTP client and automatic cleanup.
pub struct TestServer {
    /// The running file server.
    server: FileServer,
    /// HTTP client for making requests.
    client: Client,
    /// Base URL for the server.
    pub base_url: String,
    /// Served root directory (cleaned up on drop).
    root: TempDir,
    /// Config directory holding users.json and template.html.
    config_dir: TempDir,
}

impl TestServer {
    /// Start a server in the given access mode with seeded users and
    /// template files.
    pub async fn with_mode(mode: AccessMode) -> Self {
        let root = TempDir::new().expect("Failed to create temp root");
        let config_dir = TempDir::new().expect("Failed to create temp config dir");

        std::fs::write(config_dir.path().join("template.html"), TEMPLATE)
            .expect("Failed to write template");
        let users = serde_json::json!({
            "Users": [
                {"name": ALICE.0, "password": password_digest(ALICE.1)},
                {"name": BOB.0, "password": password_digest(BOB.1)},
            ]
        });
        std::fs::write(config_dir.path().join("users.json"), users.to_string())
            .expect("Failed to write users.json");

        let config = Arc::new(ServerConfig::new(
            root.path(),
            config_dir.path(),
            mode,
            16 * 1024 * 1024,
        ));
        let server = FileServer::start(Dispatcher::new(config), ListenConfig::default())
            .await
            .expect("Failed to start file server");
        let base_url = server.url();

        let client = Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .expect("Failed to create HTTP client");

        let test_server = Self {
            server,
            client,
            base_url,
            root,
            config_dir,
        };
        test_server.wait_ready().await;
        test_server
    }

    pub async fn open() -> Self {
        Self::with_mode(AccessMode::Open).await
    }

    pub async fn private() -> Self {
        Self::with_mode(AccessMode::PrivateAuthenticated).await
    }

    pub async fn shared() -> Self {
        Self::with_mode(AccessMode::SharedAuthenticated).await
    }

    /// Wait until the listener answers; any status counts as ready.
    async fn wait_ready(&self) {
        for _ in 0..50 {
            if self.client.get(&self.base_url).send().await.is_ok() {
                return;
            }
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
        panic!("Server did not become ready");
    }

    /// The served root on disk, for seeding and inspecting files.
    pub fn root(&self) -> &Path {
        self.root.path()
    }

    /// The directory holding users.json and template.html.
    pub fn config_dir(&self) -> &Path {
        self.config_dir.path()
    }

    /// The bound socket address, for raw-socket tests.
    pub fn addr(&self) -> SocketAddr {
        self.server.addr
    }

    pub fn url(&self, path: &str) -> String {
        format!("{}{path}", self.base_url)
    }

    /// Unauthenticated GET.
    pub async fn get(&self, path: &str) -> Response {
        self.client
            .get(self.url(path))
            .send()
            .await
            .expect("GET failed")
    }

    /// GET with Basic credentials.
    pub async fn get_as(&self, path: &str, user: (&str, &str)) -> Response {
        self.client
            .get(self.url(path))
            .basic_auth(user.0, Some(user.1))
            .send()
            .await
            .expect("GET failed")
    }

    /// Arbitrary method with optional Basic credentials and headers.
    pub async fn request(
        &self,
        method: &str,
        path: &str,
        user: Option<(&str, &str)>,
    ) -> Response {
        let method = Method::from_bytes(method.as_bytes()).expect("bad method");
        let mut req = self.client.request(method, self.url(path));
        if let Some((name, pass)) = user {
            req = req.basic_auth(name, Some(pass));
        }
        req.send().await.expect("request failed")
    }

    /// PUT with Basic credentials, for WebDAV passthrough tests.
    pub async fn put_as(&self, path: &str, body: &[u8], user: (&str, &str)) -> Response {
        self.client
            .put(self.url(path))
            .basic_auth(user.0, Some(user.1))
            .body(body.to_vec())
            .send()
            .await
            .expect("PUT failed")
    }

    /// PROPFIND with depth 1 and Basic credentials.
    pub async fn propfind_as(&self, path: &str, user: (&str, &str)) -> Response {
        self.client
            .request(
                Method::from_bytes(b"PROPFIND").expect("bad method"),
                self.url(path),
            )
            .header("Depth", "1")
            .basic_auth(user.0, Some(user.1))
            .send()
            .await
            .expect("PROPFIND failed")
    }

    /// GET with `Translate: f`, asking for raw WebDAV semantics.
    pub async fn get_translated(&self, path: &str, user: Option<(&str, &str)>) -> Response {
        let mut req = self.client.get(self.url(path)).header("translate", "f");
        if let Some((name, pass)) = user {
            req = req.basic_auth(name, Some(pass));
        }
        req.send().await.expect("GET failed")
    }

    /// Multipart upload of `(filename, content)` file parts plus `pass`
    /// text parts, optionally authenticated.
    pub async fn upload(
        &self,
        path: &str,
        files: &[(&str, &[u8])],
        passes: &[&str],
        user: Option<(&str, &str)>,
    ) -> Response {
        let mut form = Form::new();
        for (name, content) in files {
            form = form.part(
                "file",
                Part::bytes(content.to_vec()).file_name(name.to_string()),
            );
        }
        for pass in passes {
            form = form.text("pass", pass.to_string());
        }

        let mut req = self.client.post(self.url(path)).multipart(form);
        if let Some((name, pass)) = user {
            req = req.basic_auth(name, Some(pass));
        }
        req.send().await.expect("upload failed")
    }
}
