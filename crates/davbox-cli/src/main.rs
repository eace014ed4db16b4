#![deny(unsafe_code)]

use std::net::IpAddr;
use std::path::PathBuf;

use anyhow::{Context, Result, bail};
use clap::Parser;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use davbox_server::config::DEFAULT_MAX_UPLOAD_BYTES;
use davbox_server::users::password_digest;
use davbox_server::{AccessMode, Dispatcher, FileServer, ListenConfig, ServerConfig};

/// Certificate file expected in the config directory when TLS is enabled.
const CERT_FILE: &str = "cert.pem";
/// Key file expected in the config directory when TLS is enabled.
const KEY_FILE: &str = "key.pem";

/// Personal file server with WebDAV, uploads and per-user sandboxes
#[derive(Parser)]
#[command(name = "davbox")]
#[command(author, version)]
#[command(after_help = "EXAMPLES:
    # Anonymous sharing from ./files
    davbox

    # Per-user sandboxes with HTTP Basic authentication
    davbox --basic

    # One shared tree for all authenticated users, with TLS
    davbox --basic --share --ssl

    # Print the password digest for a users.json entry
    davbox --hash hunter2
")]
struct Cli {
    /// Directory tree to serve
    #[arg(long, default_value = "./files")]
    dir: PathBuf,

    /// Directory holding users.json, template.html and TLS material
    #[arg(long, default_value = "./config")]
    config: PathBuf,

    /// HTTP port
    #[arg(long, default_value_t = 80)]
    http: u16,

    /// HTTPS port (only used with --ssl)
    #[arg(long, default_value_t = 443)]
    https: u16,

    /// Bind address
    #[arg(long, default_value = "0.0.0.0")]
    bind: IpAddr,

    /// Also listen for HTTPS using cert.pem and key.pem from the config dir
    #[arg(long)]
    ssl: bool,

    /// Require HTTP Basic authentication (per-user sandboxes)
    #[arg(long)]
    basic: bool,

    /// Share one tree between all authenticated users (ignored without --basic)
    #[arg(long)]
    share: bool,

    /// Upper bound on a single upload request body, in bytes
    #[arg(long, default_value_t = DEFAULT_MAX_UPLOAD_BYTES)]
    ram: u64,

    /// Print the users.json digest for a password and exit
    #[arg(long, value_name = "PASSWORD")]
    hash: Option<String>,

    /// Verbosity level (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    if let Some(password) = cli.hash {
        println!("{password} => {}", password_digest(&password));
        return Ok(());
    }

    setup_tracing(cli.verbose);

    let mode = AccessMode::from_flags(cli.basic, cli.share);
    let config = std::sync::Arc::new(ServerConfig::new(&cli.dir, &cli.config, mode, cli.ram));

    std::fs::create_dir_all(&cli.dir)
        .with_context(|| format!("failed to create served directory {}", cli.dir.display()))?;
    if mode.auth_enabled() && !config.users_file().exists() {
        bail!(
            "authentication enabled but {} does not exist",
            config.users_file().display()
        );
    }

    info!(
        dir = %cli.dir.display(),
        config = %cli.config.display(),
        mode = ?mode,
        "starting davbox"
    );

    let dispatcher = Dispatcher::new(config.clone());
    let http = FileServer::start(
        dispatcher.clone(),
        ListenConfig {
            port: cli.http,
            bind_address: cli.bind,
        },
    )
    .await
    .with_context(|| format!("failed to start HTTP listener on port {}", cli.http))?;
    info!(url = %http.url(), "HTTP listener ready");

    let https = if cli.ssl {
        let cert = cli.config.join(CERT_FILE);
        let key = cli.config.join(KEY_FILE);
        if cert.exists() && key.exists() {
            let server = FileServer::start_tls(
                dispatcher,
                ListenConfig {
                    port: cli.https,
                    bind_address: cli.bind,
                },
                &cert,
                &key,
            )
            .await
            .with_context(|| format!("failed to start HTTPS listener on port {}", cli.https))?;
            info!(url = %server.url(), "HTTPS listener ready");
            Some(server)
        } else {
            // TLS trouble never takes down the HTTP listener.
            warn!(
                cert = %cert.display(),
                key = %key.display(),
                "TLS material missing, skipping HTTPS listener"
            );
            None
        }
    } else {
        None
    };

    shutdown_signal().await;
    info!("shutting down");

    http.stop().await;
    if let Some(server) = https {
        server.stop().await;
    }
    Ok(())
}

/// Wait for Ctrl-C or, on Unix, SIGTERM.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!(error = %e, "failed to listen for Ctrl-C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                warn!(error = %e, "failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {}
        () = terminate => {}
    }
}

/// Set up tracing/logging based on verbosity level.
fn setup_tracing(verbose: u8) {
    let filter = match verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| filter.into());
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}
