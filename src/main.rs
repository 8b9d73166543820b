//! lantern - remote-controlled lantern
//!
//! `lantern server` plays a command script to every client that connects.
//! `lantern client` connects, applies received commands to a local lantern,
//! and reconnects when the server goes away.

use clap::{Parser, Subcommand};
use colored::Colorize;
use lantern_client::{Client, ClientConfig, Lantern};
use lantern_protocol::{DEFAULT_HOST, DEFAULT_PORT};
use lantern_server::{ScriptConfig, ScriptedServer};
use std::path::PathBuf;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "lantern")]
#[command(about = "Remote-controlled lantern over a binary command protocol")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Serve a command script to connecting clients
    Server {
        /// Address to bind to
        #[arg(long, env = "LANTERN_HOST", default_value = DEFAULT_HOST)]
        host: String,

        /// Port to bind to
        #[arg(short, long, env = "LANTERN_PORT", default_value_t = DEFAULT_PORT)]
        port: u16,

        /// YAML command script (defaults to LANTERN_SCRIPT, then the demo script)
        #[arg(short, long)]
        script: Option<PathBuf>,

        /// Stop after serving this many connections
        #[arg(short = 'n', long)]
        connections: Option<u32>,

        /// Delay between commands in milliseconds
        #[arg(long)]
        pacing_ms: Option<u64>,
    },

    /// Connect to a server and drive a local lantern
    Client {
        /// Server host
        #[arg(long, env = "LANTERN_HOST", default_value = DEFAULT_HOST)]
        host: String,

        /// Server port
        #[arg(short, long, env = "LANTERN_PORT", default_value_t = DEFAULT_PORT)]
        port: u16,

        /// Stop after processing this many connections
        #[arg(short = 'n', long, env = "LANTERN_MAX_CONNECTIONS")]
        connections: Option<u32>,
    },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Server {
            host,
            port,
            script,
            connections,
            pacing_ms,
        } => run_server(host, port, script, connections, pacing_ms).await,
        Commands::Client {
            host,
            port,
            connections,
        } => run_client(host, port, connections).await,
    }
}

async fn run_server(
    host: String,
    port: u16,
    script: Option<PathBuf>,
    connections: Option<u32>,
    pacing_ms: Option<u64>,
) -> Result<(), Box<dyn std::error::Error>> {
    let mut script_config = ScriptConfig::load_from(script.as_deref())?;
    if let Some(ms) = pacing_ms {
        script_config.pacing_ms = ms;
    }
    if connections.is_some() {
        script_config.max_connections = connections;
    }

    tracing::info!("Starting lantern server on {}:{}", host, port);
    match script_config.max_connections {
        Some(n) => tracing::info!("  Connections to serve: {}", n),
        None => tracing::info!("  Connections to serve: unbounded"),
    }

    let server = Arc::new(ScriptedServer::from_script(host, port, &script_config)?);

    // Spawn shutdown signal handler
    let shutdown_server = server.clone();
    tokio::spawn(async move {
        shutdown_signal().await;
        tracing::info!("Stopping server...");
        shutdown_server.shutdown();
    });

    server.run().await?;
    tracing::info!("Server done");
    Ok(())
}

async fn run_client(
    host: String,
    port: u16,
    connections: Option<u32>,
) -> Result<(), Box<dyn std::error::Error>> {
    let mut config = ClientConfig::new(host, port);
    if let Some(max) = connections {
        config = config.with_max_connections(max);
    }

    let client = Client::new(config);

    // Spawn shutdown signal handler
    let handle = client.stop_handle();
    tokio::spawn(async move {
        shutdown_signal().await;
        handle.stop();
    });

    let mut lantern = Lantern::new();
    let stats = client
        .run(|command| {
            lantern.apply(&command)?;
            println!("{}", render(&lantern));
            Ok(())
        })
        .await?;

    tracing::info!(
        "Client done: {} connection(s), {} command(s)",
        stats.connections,
        stats.commands
    );
    Ok(())
}

/// Resolves on Ctrl-C, or on SIGTERM on unix.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::warn!("Failed to listen for Ctrl-C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{signal, SignalKind};
        match signal(SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                tracing::warn!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => tracing::info!("Interrupt received"),
        _ = terminate => tracing::info!("Terminate signal received"),
    }
}

/// Renders the lantern as a coloured status line.
fn render(lantern: &Lantern) -> String {
    let color = lantern.color();
    let swatch = "●".truecolor(color.r, color.g, color.b);
    let state = if lantern.is_active() {
        "ON".bold().green()
    } else {
        "OFF".dimmed()
    };
    format!("{} lantern {} {}", swatch, state, color)
}
