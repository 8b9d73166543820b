//! Client session.
//!
//! The session loops Connecting -> Connected -> Disconnected until it is
//! stopped or its connection budget is spent. Every decoded command is handed
//! to a caller-supplied handler; handler failures are logged and counted but
//! never end the session.

use crate::config::ClientConfig;
use crate::error::ClientError;
use lantern_protocol::{Command, Registry, Transport};
use parking_lot::Mutex;
use std::any::Any;
use std::io;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use tokio::net::TcpStream;
use tokio::sync::watch;

/// Error type returned by command handlers.
pub type HandlerError = Box<dyn std::error::Error + Send + Sync>;

/// Session lifecycle state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// Created, `run` not called yet.
    Idle,
    /// Trying to open a connection.
    Connecting,
    /// Receiving commands.
    Connected,
    /// Connection ended; will reconnect if still running.
    Disconnected,
    /// Terminal.
    Stopped,
}

/// Counters collected over one `run`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SessionStats {
    /// Connections established.
    pub connections: u64,
    /// Commands decoded and passed to the handler.
    pub commands: u64,
    /// Handler invocations that returned an error or panicked.
    pub handler_failures: u64,
    /// Connections dropped because a frame failed to decode.
    pub malformed_frames: u64,
}

struct Control {
    stop: watch::Sender<bool>,
    state: Mutex<SessionState>,
}

/// Stops a running session from another task.
///
/// The session notices the request before its next connect attempt, during
/// reconnect backoff, or while waiting for the next frame.
#[derive(Clone)]
pub struct StopHandle {
    control: Arc<Control>,
}

impl StopHandle {
    pub fn stop(&self) {
        tracing::info!("Stop requested");
        self.control.stop.send_replace(true);
    }

    pub fn is_running(&self) -> bool {
        !*self.control.stop.borrow()
    }

    pub fn state(&self) -> SessionState {
        *self.control.state.lock()
    }
}

/// Lantern client session.
pub struct Client {
    config: ClientConfig,
    registry: Arc<Registry>,
    control: Arc<Control>,
    stop_rx: watch::Receiver<bool>,
}

impl Client {
    /// Creates a client that decodes with the built-in commands.
    pub fn new(config: ClientConfig) -> Self {
        Self::with_registry(config, Arc::new(Registry::global().clone()))
    }

    /// Creates a client that decodes with a custom registry.
    pub fn with_registry(config: ClientConfig, registry: Arc<Registry>) -> Self {
        let (stop, stop_rx) = watch::channel(false);
        Self {
            config,
            registry,
            control: Arc::new(Control {
                stop,
                state: Mutex::new(SessionState::Idle),
            }),
            stop_rx,
        }
    }

    pub fn stop_handle(&self) -> StopHandle {
        StopHandle {
            control: self.control.clone(),
        }
    }

    pub fn is_running(&self) -> bool {
        !*self.stop_rx.borrow()
    }

    pub fn state(&self) -> SessionState {
        *self.control.state.lock()
    }

    /// Runs the session until stopped or until the connection budget is
    /// spent.
    ///
    /// Only a connect failure other than "connection refused" is returned as
    /// an error. A stopped session stays stopped; calling `run` again returns
    /// immediately.
    pub async fn run<H>(&self, mut handler: H) -> Result<SessionStats, ClientError>
    where
        H: FnMut(Command) -> Result<(), HandlerError>,
    {
        let mut stats = SessionStats::default();
        let mut remaining = self.config.max_connections;

        let result = self.session_loop(&mut handler, &mut remaining, &mut stats).await;

        self.control.stop.send_replace(true);
        self.set_state(SessionState::Stopped);
        tracing::info!(
            "Session stopped: {} connection(s), {} command(s), {} handler failure(s)",
            stats.connections,
            stats.commands,
            stats.handler_failures
        );

        result.map(|()| stats)
    }

    async fn session_loop<H>(
        &self,
        handler: &mut H,
        remaining: &mut Option<u32>,
        stats: &mut SessionStats,
    ) -> Result<(), ClientError>
    where
        H: FnMut(Command) -> Result<(), HandlerError>,
    {
        while self.is_running() {
            let stream = match self.connect(remaining).await? {
                Some(stream) => stream,
                None => break,
            };
            stats.connections += 1;

            self.receive(stream, handler, stats).await;

            tracing::info!("Server disconnected");
            self.set_state(SessionState::Disconnected);
        }
        Ok(())
    }

    /// Opens a connection, backing off while the server refuses.
    ///
    /// Returns `None` once stopped or out of connections.
    async fn connect(&self, remaining: &mut Option<u32>) -> Result<Option<TcpStream>, ClientError> {
        let addr = self.config.addr();
        let mut stop_rx = self.stop_rx.clone();

        while self.is_running() && *remaining != Some(0) {
            self.set_state(SessionState::Connecting);
            tracing::info!("Connecting to server {}", addr);

            match TcpStream::connect(addr.as_str()).await {
                Ok(stream) => {
                    if let Some(n) = remaining.as_mut() {
                        *n -= 1;
                    }
                    if let Err(e) = stream.set_nodelay(true) {
                        tracing::debug!("Failed to set TCP_NODELAY: {}", e);
                    }
                    self.set_state(SessionState::Connected);
                    tracing::info!("Connected to {}", addr);
                    return Ok(Some(stream));
                }
                Err(e) if e.kind() == io::ErrorKind::ConnectionRefused => {
                    tracing::warn!("Could not connect to {}: {}", addr, e);
                    tokio::select! {
                        _ = tokio::time::sleep(self.config.reconnect_delay) => {}
                        _ = stopped(&mut stop_rx) => {}
                    }
                }
                Err(e) => {
                    tracing::error!("Connection to {} failed: {}", addr, e);
                    return Err(ClientError::Connect { addr, source: e });
                }
            }
        }
        Ok(None)
    }

    /// Receives commands until the stream ends, a frame fails to decode, or
    /// the session is stopped.
    async fn receive<H>(&self, stream: TcpStream, handler: &mut H, stats: &mut SessionStats)
    where
        H: FnMut(Command) -> Result<(), HandlerError>,
    {
        let (reader, writer) = stream.into_split();
        let mut transport = Transport::new(reader, writer, self.registry.clone())
            .with_read_delay(self.config.read_delay);
        let mut stop_rx = self.stop_rx.clone();

        while self.is_running() && !transport.at_eof() {
            let received = tokio::select! {
                biased;
                _ = stopped(&mut stop_rx) => break,
                received = transport.recv() => received,
            };

            match received {
                Ok(Some(command)) => {
                    tracing::info!("Received command: {}", command);
                    stats.commands += 1;
                    if !dispatch(handler, command) {
                        stats.handler_failures += 1;
                    }
                }
                // End of stream or a dropped frame
                Ok(None) => {}
                Err(e) => {
                    tracing::error!("Dropping connection after undecodable frame: {}", e);
                    if e.is_malformed() {
                        stats.malformed_frames += 1;
                    }
                    break;
                }
            }
        }
    }

    fn set_state(&self, state: SessionState) {
        let mut current = self.control.state.lock();
        if *current != state {
            tracing::debug!("Session state {:?} -> {:?}", *current, state);
            *current = state;
        }
    }
}

/// Calls the handler, capturing both errors and panics.
fn dispatch<H>(handler: &mut H, command: Command) -> bool
where
    H: FnMut(Command) -> Result<(), HandlerError>,
{
    match panic::catch_unwind(AssertUnwindSafe(|| handler(command))) {
        Ok(Ok(())) => true,
        Ok(Err(e)) => {
            tracing::error!("Error while running handler: {}", e);
            false
        }
        Err(payload) => {
            tracing::error!("Handler panicked: {}", panic_message(payload.as_ref()));
            false
        }
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> &str {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.as_str()
    } else {
        "non-string panic payload"
    }
}

/// Resolves once a stop has been requested.
async fn stopped(rx: &mut watch::Receiver<bool>) {
    loop {
        let stop = *rx.borrow_and_update();
        if stop {
            return;
        }
        if rx.changed().await.is_err() {
            return;
        }
    }
}
