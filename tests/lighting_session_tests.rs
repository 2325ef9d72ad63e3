//! Lighting session tests against an in-process fake processor

use savant_relay::config::LightingConfig;
use savant_relay::directory::LightKind;
use savant_relay::lighting::LightingSession;
use savant_relay::state::StateCache;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;
use tokio::time::Instant;

fn session_config(port: u16, reconnect: Duration) -> LightingConfig {
    LightingConfig {
        host: "127.0.0.1".to_string(),
        port,
        password: "integration".to_string(),
        handshake_timeout: Duration::from_secs(5),
        reconnect_delay: reconnect,
    }
}

fn kinds() -> HashMap<u32, LightKind> {
    HashMap::from([(21, LightKind::Dimmer), (30, LightKind::Switch)])
}

/// Answer the telnet handshake on one accepted connection, asserting the
/// configured login arrives, then push `payload` and hold the stream open.
async fn serve_handshake(stream: &mut tokio::net::TcpStream, payload: &[u8]) {
    stream.write_all(b"\r\nlogin: ").await.unwrap();
    let mut buf = [0u8; 128];
    let n = stream.read(&mut buf).await.unwrap();
    assert!(
        String::from_utf8_lossy(&buf[..n]).contains("integration"),
        "expected the configured login"
    );
    stream.write_all(b"GNET> \r\n").await.unwrap();
    stream.write_all(payload).await.unwrap();
}

async fn wait_for<F>(cache: &StateCache, predicate: F)
where
    F: Fn(&HashMap<u32, u8>) -> bool,
{
    let deadline = Instant::now() + Duration::from_secs(5);
    loop {
        let status = cache.light_status().await;
        if predicate(&status) {
            return;
        }
        assert!(
            Instant::now() < deadline,
            "cache never reached expected state: {status:?}"
        );
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
}

#[tokio::test]
async fn authenticates_and_applies_output_updates() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();

    let server = tokio::spawn(async move {
        let (mut stream, _) = listener.accept().await.unwrap();
        serve_handshake(
            &mut stream,
            b"~OUTPUT,21,50.00\r\n~DEVICE,32,4,3\r\n~OUTPUT,30,75\r\n",
        )
        .await;
        tokio::time::sleep(Duration::from_secs(10)).await;
    });

    let cache = Arc::new(StateCache::new());
    let session = tokio::spawn(
        LightingSession::new(
            session_config(port, Duration::from_secs(60)),
            cache.clone(),
            kinds(),
        )
        .run(),
    );

    // dimmer keeps its level, switch normalizes to 100, chatter is dropped
    wait_for(&cache, |s| {
        s.get(&21) == Some(&50) && s.get(&30) == Some(&100)
    })
    .await;
    assert_eq!(cache.light_status().await.len(), 2);

    session.abort();
    server.abort();
}

#[tokio::test]
async fn reconnects_after_connection_loss() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();

    let server = tokio::spawn(async move {
        // first connection dies before the handshake completes
        let (stream, _) = listener.accept().await.unwrap();
        drop(stream);

        // second connection works
        let (mut stream, _) = listener.accept().await.unwrap();
        serve_handshake(&mut stream, b"~OUTPUT,21,80\r\n").await;
        tokio::time::sleep(Duration::from_secs(10)).await;
    });

    let cache = Arc::new(StateCache::new());
    let session = tokio::spawn(
        LightingSession::new(
            session_config(port, Duration::from_millis(100)),
            cache.clone(),
            kinds(),
        )
        .run(),
    );

    wait_for(&cache, |s| s.get(&21) == Some(&80)).await;

    session.abort();
    server.abort();
}
