//! Read-only queries against the service implementation database
//!
//! The database is produced by the configuration tooling and rewritten only
//! when a new configuration is deployed, so every call opens a fresh
//! read-only connection and closes it again. No caching here: the store is
//! local and the queries are cheap, and per-call connections keep request
//! handlers from contending on shared connection state.

use crate::error::{RelayError, Result};
use serde::Serialize;
use sqlx::sqlite::SqliteConnectOptions;
use sqlx::{Connection, Row, SqliteConnection};
use std::collections::HashMap;
use std::path::PathBuf;
use tracing::warn;

/// A named grouping of addressable services (a room, typically)
#[derive(Debug, Clone, Serialize)]
pub struct Zone {
    pub id: String,
    pub services: Vec<Service>,
}

/// One addressable service implementation within a zone
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Service {
    pub name: String,
    pub service_type: String,
    pub service: String,
    pub logical_component: String,
    #[serde(rename = "serviceVariantID")]
    pub service_variant_id: String,
    pub component: String,
    pub address: u32,
}

/// Lighting-capable entity kind
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum LightKind {
    /// Reports and accepts 0-100 levels
    Dimmer,
    /// Binary; levels normalize to 0 or 100
    Switch,
}

/// Derived view over lighting-capable services
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Light {
    pub id: String,
    pub zone: String,
    pub name: String,
    pub kind: LightKind,
    pub component: String,
    pub logical_component: String,
    pub service: String,
    #[serde(rename = "serviceVariantID")]
    pub service_variant_id: String,
    pub address: u32,
    pub dimmer_command: String,
    pub fade_time: i64,
    pub delay_time: i64,
}

const ZONED_SERVICES_SQL: &str = "\
SELECT zone,
       alias,
       COALESCE(component, '') AS component,
       COALESCE(logicalComponent, '') AS logicalComponent,
       CAST(COALESCE(serviceVariantID, 1) AS TEXT) AS serviceVariantID,
       COALESCE(serviceType, '') AS serviceType,
       COALESCE(service, '') AS service,
       CAST(COALESCE(address, 0) AS INTEGER) AS address
FROM ServiceImplementationZonedService
WHERE alias IS NOT NULL
ORDER BY zone, alias";

const LIGHT_ENTITIES_SQL: &str = "\
SELECT z.name AS zone,
       le.name AS name,
       COALESCE(le.addresses, '') AS addresses,
       le.entityType AS entityType,
       COALESCE(le.dimmerCommand, 'DimmerSet') AS dimmerCommand,
       CAST(COALESCE(le.fadeTime, 0) AS INTEGER) AS fadeTime,
       CAST(COALESCE(le.delayTime, 0) AS INTEGER) AS delayTime
FROM LightEntities le
JOIN Zones z ON le.zoneID = z.id
WHERE le.entityType IN ('Dimmer', 'Switch')
ORDER BY z.name, le.name";

const LIGHTING_SERVICES_SQL: &str = "\
SELECT zone,
       COALESCE(component, 'Lutron') AS component,
       COALESCE(logicalComponent, 'Lighting_controller') AS logicalComponent,
       CAST(COALESCE(serviceVariantID, 1) AS TEXT) AS serviceVariantID
FROM ServiceImplementationZonedService
WHERE serviceType = 'SVC_ENV_LIGHTING'";

/// Query interface over the zone/service/address metadata store
#[derive(Debug, Clone)]
pub struct ServiceDirectory {
    db_path: PathBuf,
}

impl ServiceDirectory {
    pub fn new(db_path: PathBuf) -> Self {
        Self { db_path }
    }

    async fn open(&self) -> Result<SqliteConnection> {
        let options = SqliteConnectOptions::new()
            .filename(&self.db_path)
            .read_only(true);
        SqliteConnection::connect_with(&options).await.map_err(|e| {
            RelayError::directory_unavailable(format!(
                "cannot open {}: {e}",
                self.db_path.display()
            ))
        })
    }

    /// All zones with their services, ordered by zone then service name
    pub async fn list_zones(&self) -> Result<Vec<Zone>> {
        let mut conn = self.open().await?;
        let rows = sqlx::query(ZONED_SERVICES_SQL)
            .fetch_all(&mut conn)
            .await
            .map_err(|e| RelayError::directory_unavailable(format!("zone query failed: {e}")))?;
        conn.close().await.ok();

        let mut zones: Vec<Zone> = Vec::new();
        for row in rows {
            let zone_name: String = row.get("zone");
            let service = Service {
                name: row.get("alias"),
                service_type: row.get("serviceType"),
                service: row.get("service"),
                logical_component: row.get("logicalComponent"),
                service_variant_id: row.get("serviceVariantID"),
                component: row.get("component"),
                address: row.get::<i64, _>("address") as u32,
            };
            // rows arrive ordered by zone, so groups are contiguous
            if zones.last().map_or(true, |z| z.id != zone_name) {
                zones.push(Zone {
                    id: zone_name,
                    services: Vec::new(),
                });
            }
            if let Some(zone) = zones.last_mut() {
                zone.services.push(service);
            }
        }
        Ok(zones)
    }

    /// Lighting-capable entities joined with their zone's lighting service.
    ///
    /// Entity types other than Dimmer/Switch never appear here; they are
    /// still visible through [`list_zones`](Self::list_zones).
    pub async fn list_lights(&self) -> Result<Vec<Light>> {
        let mut conn = self.open().await?;
        let entity_rows = sqlx::query(LIGHT_ENTITIES_SQL)
            .fetch_all(&mut conn)
            .await
            .map_err(|e| RelayError::directory_unavailable(format!("light query failed: {e}")))?;
        let service_rows = sqlx::query(LIGHTING_SERVICES_SQL)
            .fetch_all(&mut conn)
            .await
            .map_err(|e| {
                RelayError::directory_unavailable(format!("lighting service query failed: {e}"))
            })?;
        conn.close().await.ok();

        let mut zone_service: HashMap<String, (String, String, String)> = HashMap::new();
        for row in service_rows {
            zone_service.insert(
                row.get("zone"),
                (
                    row.get("component"),
                    row.get("logicalComponent"),
                    row.get("serviceVariantID"),
                ),
            );
        }

        let mut lights = Vec::new();
        for row in entity_rows {
            let zone: String = row.get("zone");
            let name: String = row.get("name");
            let addresses: String = row.get("addresses");

            // First entry of the comma-separated address list is the one
            // the processor reports output levels against.
            let address = match addresses.split(',').next().map(str::trim) {
                Some(first) if !first.is_empty() => match first.parse::<u32>() {
                    Ok(address) => address,
                    Err(_) => {
                        warn!("skipping light '{zone}/{name}': bad address '{first}'");
                        continue;
                    }
                },
                _ => {
                    warn!("skipping light '{zone}/{name}': no address");
                    continue;
                }
            };

            let kind = match row.get::<String, _>("entityType").as_str() {
                "Dimmer" => LightKind::Dimmer,
                _ => LightKind::Switch,
            };

            let (component, logical_component, service_variant_id) = zone_service
                .get(&zone)
                .cloned()
                .unwrap_or_else(|| {
                    (
                        "Lutron".to_string(),
                        "Lighting_controller".to_string(),
                        "1".to_string(),
                    )
                });

            lights.push(Light {
                id: light_id(&zone, &name),
                zone,
                name,
                kind,
                component,
                logical_component,
                service: "SVC_ENV_LIGHTING".to_string(),
                service_variant_id,
                address,
                dimmer_command: row.get("dimmerCommand"),
                fade_time: row.get("fadeTime"),
                delay_time: row.get("delayTime"),
            });
        }
        Ok(lights)
    }

    /// Address -> kind map the lighting session normalizes levels with
    pub async fn light_kinds(&self) -> Result<HashMap<u32, LightKind>> {
        Ok(self
            .list_lights()
            .await?
            .into_iter()
            .map(|light| (light.address, light.kind))
            .collect())
    }
}

/// Stable identifier for a light, derived from zone and entity name
fn light_id(zone: &str, name: &str) -> String {
    format!("{zone}_{name}")
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() {
                c.to_ascii_lowercase()
            } else {
                '_'
            }
        })
        .collect()
}
