//! Shared fixtures for integration tests

#![allow(dead_code)]

use savant_relay::command::CommandSender;
use savant_relay::config::ControlConfig;
use savant_relay::directory::ServiceDirectory;
use savant_relay::discovery::UisDiscovery;
use savant_relay::http::{router, AppState};
use savant_relay::state::StateCache;
use sqlx::sqlite::SqliteConnectOptions;
use sqlx::{Connection, SqliteConnection};
use std::path::Path;
use std::sync::Arc;
use std::time::Instant;
use tokio::net::UdpSocket;

/// Create a service implementation database with one dimmer in Kitchen,
/// one switch in Family Room, and a non-lighting audio service.
pub async fn seed_directory_db(path: &Path) {
    let options = SqliteConnectOptions::new()
        .filename(path)
        .create_if_missing(true);
    let mut conn = SqliteConnection::connect_with(&options).await.unwrap();

    let statements = [
        "CREATE TABLE ServiceImplementationZonedService (
            zone TEXT,
            alias TEXT,
            component TEXT,
            logicalComponent TEXT,
            serviceVariantID INTEGER,
            serviceType TEXT,
            service TEXT,
            address INTEGER
        )",
        "CREATE TABLE Zones (id INTEGER PRIMARY KEY, name TEXT)",
        "CREATE TABLE LightEntities (
            id INTEGER PRIMARY KEY,
            zoneID INTEGER,
            name TEXT,
            addresses TEXT,
            entityType TEXT,
            dimmerCommand TEXT,
            fadeTime INTEGER,
            delayTime INTEGER
        )",
        "INSERT INTO ServiceImplementationZonedService VALUES
            ('Kitchen', 'Kitchen Lights', 'Lutron', 'Lighting_controller', 1,
             'SVC_ENV_LIGHTING', 'Lighting', 21),
            ('Kitchen', 'Kitchen Audio', 'AudioMatrix', 'Audio_switch', 2,
             'SVC_AV_LIVEAUDIO', 'Audio', 3),
            ('Family Room', 'Family Room Lights', 'Lutron', 'Lighting_controller', 1,
             'SVC_ENV_LIGHTING', 'Lighting', 30)",
        "INSERT INTO Zones VALUES (1, 'Kitchen'), (2, 'Family Room')",
        "INSERT INTO LightEntities VALUES
            (1, 1, 'Ceiling', '21,22', 'Dimmer', 'DimmerSet', 2, 0),
            (2, 2, 'Sconce', '30', 'Switch', NULL, NULL, NULL)",
    ];
    for sql in statements {
        sqlx::query(sql).execute(&mut conn).await.unwrap();
    }
    conn.close().await.unwrap();
}

/// UDP socket standing in for the UIS, plus its port
pub async fn udp_capture() -> (UdpSocket, u16) {
    let socket = UdpSocket::bind("127.0.0.1:0").await.unwrap();
    let port = socket.local_addr().unwrap().port();
    (socket, port)
}

/// Discovery instance that will never resolve anything
pub fn dead_discovery(fallback_port: u16) -> UisDiscovery {
    UisDiscovery::new(&ControlConfig {
        service_type: "_savant-relay-test._udp.local.".to_string(),
        discovery_timeout: std::time::Duration::from_millis(200),
        fallback_port,
        ..ControlConfig::default()
    })
}

/// Router wired to a seeded directory, a fresh cache, and a sender aimed
/// at `uis_port` on loopback.
pub fn test_app(db_path: &Path, cache: Arc<StateCache>, uis_port: u16) -> axum::Router {
    let sender = CommandSender::with_endpoint(
        "127.0.0.1".to_string(),
        uis_port,
        dead_discovery(uis_port),
    );
    router(Arc::new(AppState {
        directory: ServiceDirectory::new(db_path.to_path_buf()),
        cache,
        sender,
        started_at: Instant::now(),
    }))
}
