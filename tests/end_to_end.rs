//! Scripted server to reconnecting client over real TCP.

use lantern_client::{Client, ClientConfig, HandlerError, Lantern, SessionState};
use lantern_protocol::{Command, CommandKind, Registry, Rgb};
use lantern_server::{ScriptedServer, ServerConfig};
use parking_lot::Mutex;
use std::net::SocketAddr;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;

async fn start_server(
    script: Vec<Command>,
    max_connections: u32,
) -> (Arc<ScriptedServer>, SocketAddr, tokio::task::JoinHandle<()>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let server = Arc::new(ScriptedServer::new(
        ServerConfig::new("127.0.0.1", addr.port())
            .with_max_connections(max_connections)
            .with_pacing(Duration::from_millis(5)),
        script,
    ));
    let handle = {
        let server = server.clone();
        tokio::spawn(async move { server.serve(listener).await.unwrap() })
    };
    (server, addr, handle)
}

fn client_config(addr: SocketAddr, max_connections: u32) -> ClientConfig {
    ClientConfig::new(addr.ip().to_string(), addr.port())
        .with_max_connections(max_connections)
        .with_reconnect_delay(Duration::from_millis(20))
        .with_read_delay(Duration::from_millis(1))
}

fn registry_without_unknown() -> Arc<Registry> {
    let mut registry = Registry::with_defaults();
    registry.unregister(CommandKind::Unknown.type_byte());
    Arc::new(registry)
}

fn collector() -> (
    Arc<Mutex<Vec<Command>>>,
    impl FnMut(Command) -> Result<(), HandlerError>,
) {
    let received = Arc::new(Mutex::new(Vec::new()));
    let sink = received.clone();
    (received, move |command| {
        sink.lock().push(command);
        Ok(())
    })
}

#[tokio::test]
async fn test_unregistered_commands_never_reach_handler() {
    let script = vec![
        Command::unknown(),
        Command::color(10, 20, 30),
        Command::on(),
        Command::off(),
        Command::color(40, 50, 60),
    ];
    let (server, addr, serving) = start_server(script, 1).await;

    let client = Client::with_registry(client_config(addr, 1), registry_without_unknown());
    let (received, handler) = collector();
    let stats = tokio::time::timeout(Duration::from_secs(10), client.run(handler))
        .await
        .expect("client did not finish")
        .unwrap();
    serving.await.unwrap();

    assert_eq!(
        *received.lock(),
        vec![
            Command::color(10, 20, 30),
            Command::on(),
            Command::off(),
            Command::color(40, 50, 60),
        ]
    );
    assert_eq!(stats.connections, 1);
    assert_eq!(stats.commands, 4);
    assert_eq!(client.state(), SessionState::Stopped);
    assert_eq!(server.stats().commands_sent.load(Ordering::Relaxed), 5);
}

#[tokio::test]
async fn test_lantern_follows_default_script() {
    let (_server, addr, serving) = start_server(lantern_server::default_script(), 1).await;

    let client = Client::new(client_config(addr, 1));
    let lantern = Arc::new(Mutex::new(Lantern::new()));
    let state = lantern.clone();
    let stats = tokio::time::timeout(
        Duration::from_secs(10),
        client.run(move |command| {
            state.lock().apply(&command)?;
            Ok(())
        }),
    )
    .await
    .expect("client did not finish")
    .unwrap();
    serving.await.unwrap();

    assert_eq!(stats.commands, 5);
    assert_eq!(stats.handler_failures, 0);
    let lantern = lantern.lock();
    assert!(!lantern.is_active());
    assert_eq!(lantern.color(), Rgb::new(100, 2, 10));
}

#[tokio::test]
async fn test_client_reconnects_for_each_scripted_session() {
    let script = vec![Command::on(), Command::off()];
    let (server, addr, serving) = start_server(script, 3).await;

    let client = Client::new(client_config(addr, 3));
    let (received, handler) = collector();
    let stats = tokio::time::timeout(Duration::from_secs(10), client.run(handler))
        .await
        .expect("client did not finish")
        .unwrap();
    tokio::time::timeout(Duration::from_secs(5), serving)
        .await
        .expect("server did not stop after bound")
        .unwrap();

    assert_eq!(stats.connections, 3);
    assert_eq!(received.lock().len(), 6);
    assert_eq!(server.stats().connections_total.load(Ordering::Relaxed), 3);
    assert_eq!(server.stats().connections_active.load(Ordering::Relaxed), 0);
}

#[tokio::test]
async fn test_client_started_before_server() {
    let addr = {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        listener.local_addr().unwrap()
    };

    let client = Arc::new(Client::new(client_config(addr, 1)));
    let (received, handler) = collector();
    let running = {
        let client = client.clone();
        tokio::spawn(async move { client.run(handler).await })
    };

    // Let a few connection attempts be refused
    tokio::time::sleep(Duration::from_millis(100)).await;
    assert!(client.is_running());

    let listener = TcpListener::bind(addr).await.unwrap();
    let server = ScriptedServer::new(
        ServerConfig::new("127.0.0.1", addr.port())
            .with_max_connections(1)
            .with_pacing(Duration::ZERO),
        vec![Command::color(7, 8, 9)],
    );
    server.serve(listener).await.unwrap();

    let stats = tokio::time::timeout(Duration::from_secs(10), running)
        .await
        .expect("client did not finish")
        .unwrap()
        .unwrap();
    assert_eq!(stats.connections, 1);
    assert_eq!(*received.lock(), vec![Command::color(7, 8, 9)]);
}

#[tokio::test]
async fn test_stop_during_paced_script() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let server = Arc::new(ScriptedServer::new(
        ServerConfig::new("127.0.0.1", addr.port()).with_pacing(Duration::from_secs(30)),
        vec![Command::on(), Command::off()],
    ));
    let serving = {
        let server = server.clone();
        tokio::spawn(async move { server.serve(listener).await })
    };

    let client = Arc::new(Client::new(client_config(addr, 5)));
    let received = Arc::new(Mutex::new(Vec::new()));
    let handle = client.stop_handle();
    let running = {
        let client = client.clone();
        let sink = received.clone();
        tokio::spawn(async move {
            client
                .run(move |command| {
                    sink.lock().push(command);
                    // Stop as soon as the first command lands
                    handle.stop();
                    Ok(())
                })
                .await
        })
    };

    let stats = tokio::time::timeout(Duration::from_secs(10), running)
        .await
        .expect("client did not stop")
        .unwrap()
        .unwrap();
    assert_eq!(stats.commands, 1);
    assert_eq!(*received.lock(), vec![Command::on()]);
    assert!(!client.is_running());

    server.shutdown();
    tokio::time::timeout(Duration::from_secs(5), serving)
        .await
        .expect("server did not shut down")
        .unwrap()
        .unwrap();
}
