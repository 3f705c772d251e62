//! coedit daemon (coeditd)
//!
//! The server process for coedit - real-time collaborative document editing.
//!
//! # Usage
//!
//! ```bash
//! # Start with defaults (WebSocket on 3004)
//! coeditd
//!
//! # Custom port and bind address
//! coeditd --ws-port 4000 --bind 127.0.0.1
//!
//! # Shorter element lock window
//! coeditd --debounce-ms 500
//!
//! # With configuration file
//! coeditd --config /etc/coedit/config.toml
//! ```

mod config;

use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

use anyhow::Result;
use clap::Parser;
use tracing::{info, Level};
use tracing_subscriber::FmtSubscriber;

use coedit_core::{Engine, EngineActor};
use coedit_protocol::Topic;
use coedit_transport::{Broadcaster, WebSocketServer};

use crate::config::ConfigFile;

const STATS_INTERVAL: Duration = Duration::from_secs(60);

/// coedit daemon - collaborative document sync server
#[derive(Parser, Debug)]
#[command(name = "coeditd")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// WebSocket port to listen on
    #[arg(long, env = "COEDIT_WS_PORT")]
    ws_port: Option<u16>,

    /// Bind address
    #[arg(long, env = "COEDIT_BIND")]
    bind: Option<String>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, env = "COEDIT_LOG_LEVEL")]
    log_level: Option<String>,

    /// Element lock debounce window in milliseconds
    #[arg(long, env = "COEDIT_DEBOUNCE_MS")]
    debounce_ms: Option<u64>,

    /// Configuration file path
    #[arg(short, long, env = "COEDIT_CONFIG")]
    config: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // Load config file, if any; CLI flags and env vars take precedence
    let file = match &args.config {
        Some(path) => ConfigFile::load(path)?,
        None => ConfigFile::default(),
    };

    let ws_port = args.ws_port.or(file.ws_port).unwrap_or(3004);
    let bind = args.bind.or(file.bind).unwrap_or_else(|| "0.0.0.0".into());
    let log_level = args
        .log_level
        .or(file.log_level)
        .unwrap_or_else(|| "info".into());
    let debounce_ms = args.debounce_ms.or(file.debounce_ms).unwrap_or(2000);

    // Initialize logging
    let level = match log_level.to_lowercase().as_str() {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "info" => Level::INFO,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    };

    FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(false)
        .init();

    print_banner();

    info!(
        ws_port,
        bind = %bind,
        debounce_ms,
        "Starting coedit daemon"
    );

    // Construct the engine explicitly and inject it: one engine per live
    // document, no process-wide state
    let engine = EngineActor::spawn(Engine::with_debounce(Duration::from_millis(debounce_ms)));
    let broadcaster = Broadcaster::default();

    let topics: Vec<&str> = Topic::ALL.iter().map(|t| t.as_str()).collect();
    info!(topics = ?topics, "Supported topics");

    let ws_addr: SocketAddr = format!("{}:{}", bind, ws_port).parse()?;
    let server = WebSocketServer::new(engine.clone(), broadcaster, ws_addr);
    tokio::spawn(async move {
        if let Err(e) = server.run().await {
            tracing::error!(error = %e, "WebSocket server error");
        }
    });

    // Periodic document stats via the read-only query surface
    let stats_engine = engine.clone();
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(STATS_INTERVAL);
        interval.tick().await; // first tick is immediate
        loop {
            interval.tick().await;
            match stats_engine.document().await {
                Ok(snapshot) => {
                    info!(
                        elements = snapshot.elements.len(),
                        next_revision = snapshot.next_revision,
                        "Document status"
                    );
                }
                Err(e) => {
                    tracing::error!(error = %e, "Engine stopped");
                    break;
                }
            }
        }
    });

    // Wait for shutdown signal
    tokio::signal::ctrl_c().await?;
    info!("Shutting down...");

    Ok(())
}

fn print_banner() {
    println!(
        r#"
                      _ _ _
   ___ ___   ___  __| (_) |_
  / __/ _ \ / _ \/ _` | | __|
 | (_| (_) |  __/ (_| | | |_
  \___\___/ \___|\__,_|_|\__|
  Collaborative document sync server
  Version {}
"#,
        env!("CARGO_PKG_VERSION")
    );
}
