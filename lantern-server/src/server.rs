//! Scripted TCP server.
//!
//! Plays a fixed command sequence to every accepted connection, pausing
//! between commands, then closes the connection.

use crate::config::ScriptConfig;
use crate::error::ServerError;
use lantern_protocol::{Command, Registry, Transport, DEFAULT_HOST, DEFAULT_PORT};
use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::watch;
use tokio::task::JoinSet;

/// Default delay between scripted commands.
pub const DEFAULT_PACING: Duration = Duration::from_secs(1);

/// The demo script used when none is configured.
pub fn default_script() -> Vec<Command> {
    vec![
        Command::color(1, 2, 10),
        Command::on(),
        Command::color(100, 2, 10),
        Command::off(),
        Command::unknown(),
    ]
}

/// Server configuration.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Host to bind to.
    pub host: String,
    /// Port to bind to.
    pub port: u16,
    /// Number of connections to serve before shutting down (None = unbounded).
    pub max_connections: Option<u32>,
    /// Delay after each command.
    pub pacing: Duration,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: DEFAULT_HOST.to_string(),
            port: DEFAULT_PORT,
            max_connections: None,
            pacing: DEFAULT_PACING,
        }
    }
}

impl ServerConfig {
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
            ..Default::default()
        }
    }

    pub fn with_max_connections(mut self, max: u32) -> Self {
        self.max_connections = Some(max);
        self
    }

    pub fn with_pacing(mut self, pacing: Duration) -> Self {
        self.pacing = pacing;
        self
    }

    /// Returns the `host:port` bind address.
    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

/// Server statistics.
#[derive(Debug, Default)]
pub struct ServerStats {
    pub connections_total: AtomicU64,
    pub connections_active: AtomicU64,
    pub commands_sent: AtomicU64,
    pub errors_total: AtomicU64,
}

/// Tracks an active connection; released when its task ends or is aborted.
struct ActiveConnection {
    stats: Arc<ServerStats>,
}

impl ActiveConnection {
    fn new(stats: Arc<ServerStats>) -> Self {
        stats.connections_active.fetch_add(1, Ordering::Relaxed);
        Self { stats }
    }
}

impl Drop for ActiveConnection {
    fn drop(&mut self) {
        self.stats.connections_active.fetch_sub(1, Ordering::Relaxed);
    }
}

/// Scripted lantern server.
pub struct ScriptedServer {
    config: ServerConfig,
    script: Arc<Vec<Command>>,
    stats: Arc<ServerStats>,
    shutdown: watch::Sender<bool>,
    running: AtomicBool,
}

impl ScriptedServer {
    pub fn new(config: ServerConfig, script: Vec<Command>) -> Self {
        let (shutdown, _) = watch::channel(false);
        Self {
            config,
            script: Arc::new(script),
            stats: Arc::new(ServerStats::default()),
            shutdown,
            running: AtomicBool::new(false),
        }
    }

    /// Creates a server from a loaded script file.
    pub fn from_script(
        host: impl Into<String>,
        port: u16,
        script: &ScriptConfig,
    ) -> Result<Self, ServerError> {
        let mut config = ServerConfig::new(host, port).with_pacing(script.pacing());
        config.max_connections = script.max_connections;
        Ok(Self::new(config, script.commands()?))
    }

    /// Binds the configured address and serves until shutdown or until the
    /// connection bound is reached.
    pub async fn run(&self) -> Result<(), ServerError> {
        let listener = TcpListener::bind(self.config.addr()).await?;
        self.serve(listener).await
    }

    /// Serves connections from an already-bound listener.
    ///
    /// With a connection bound, stops accepting once that many connections
    /// have been accepted and returns after each has been served. On
    /// shutdown, in-flight connections are aborted.
    pub async fn serve(&self, listener: TcpListener) -> Result<(), ServerError> {
        self.running.store(true, Ordering::SeqCst);
        tracing::info!(
            "Server listening on {} ({} command(s), pacing {:?})",
            listener.local_addr()?,
            self.script.len(),
            self.config.pacing
        );

        let mut shutdown_rx = self.shutdown.subscribe();
        let mut connections = JoinSet::new();
        let mut remaining = self.config.max_connections;
        let mut aborted = false;

        while remaining != Some(0) {
            if *shutdown_rx.borrow_and_update() {
                aborted = true;
                break;
            }

            tokio::select! {
                result = listener.accept() => {
                    match result {
                        Ok((stream, addr)) => {
                            if let Some(n) = remaining.as_mut() {
                                *n -= 1;
                            }
                            self.stats.connections_total.fetch_add(1, Ordering::Relaxed);

                            let active = ActiveConnection::new(self.stats.clone());
                            let script = self.script.clone();
                            let pacing = self.config.pacing;

                            connections.spawn(async move {
                                let stats = &active.stats;
                                if let Err(e) = Self::handle_connection(stream, addr, &script, pacing, stats).await {
                                    tracing::debug!("Connection {} error: {}", addr, e);
                                    stats.errors_total.fetch_add(1, Ordering::Relaxed);
                                }
                                tracing::info!("Closed client connection {}", addr);
                            });
                        }
                        Err(e) => {
                            tracing::error!("Accept error: {}", e);
                        }
                    }
                }
                _ = shutdown_rx.changed() => {}
            }
        }

        if aborted {
            tracing::info!("Server shutting down");
            connections.abort_all();
        } else {
            tracing::info!("Connection limit reached, finishing in-flight connections");
        }

        loop {
            let result = tokio::select! {
                result = connections.join_next() => match result {
                    Some(result) => result,
                    None => break,
                },
                _ = shutdown_requested(&mut shutdown_rx), if !aborted => {
                    tracing::info!("Server shutting down, aborting in-flight connections");
                    connections.abort_all();
                    aborted = true;
                    continue;
                }
            };
            if let Err(e) = result {
                if !e.is_cancelled() {
                    tracing::error!("Connection task failed: {}", e);
                    self.stats.errors_total.fetch_add(1, Ordering::Relaxed);
                }
            }
        }

        self.running.store(false, Ordering::SeqCst);
        tracing::info!("Server stopped");
        Ok(())
    }

    /// Sends the script to one connection.
    async fn handle_connection(
        stream: TcpStream,
        addr: SocketAddr,
        script: &[Command],
        pacing: Duration,
        stats: &ServerStats,
    ) -> Result<(), ServerError> {
        tracing::info!("Client connected: {}", addr);
        if let Err(e) = stream.set_nodelay(true) {
            tracing::debug!("[{}] Failed to set TCP_NODELAY: {}", addr, e);
        }

        let (reader, writer) = stream.into_split();
        // The server never decodes, so its transport needs no registry entries.
        let mut transport = Transport::new(reader, writer, Arc::new(Registry::new()));

        for command in script {
            tracing::info!("[{}] Writing command: {}", addr, command);
            transport.send(command).await?;
            stats.commands_sent.fetch_add(1, Ordering::Relaxed);
            tokio::time::sleep(pacing).await;
        }

        tracing::debug!("[{}] Script complete, closing", addr);
        transport.close().await?;
        Ok(())
    }

    /// Initiates server shutdown.
    pub fn shutdown(&self) {
        self.shutdown.send_replace(true);
    }

    /// Returns whether the server is running.
    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    /// Returns server statistics.
    pub fn stats(&self) -> &ServerStats {
        &self.stats
    }

    pub fn script(&self) -> &[Command] {
        &self.script
    }
}

/// Resolves once shutdown has been requested.
async fn shutdown_requested(rx: &mut watch::Receiver<bool>) {
    while !*rx.borrow_and_update() {
        if rx.changed().await.is_err() {
            // Sender gone: shutdown can no longer be requested
            std::future::pending::<()>().await;
        }
    }
}
