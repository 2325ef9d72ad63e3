//! JSON request server
//!
//! Read endpoints answer from the directory (queried on demand) and the
//! state cache (snapshot copies); the only write endpoint forwards to the
//! command sender. Handlers never block on anything slower than one
//! directory query or one datagram send.

use crate::command::{CommandRequest, CommandSender};
use crate::directory::ServiceDirectory;
use crate::error::{RelayError, Result};
use crate::state::StateCache;
use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::routing::{get, post};
use axum::{Json, Router};
use chrono::{DateTime, Utc};
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Instant;
use tower_http::trace::TraceLayer;

/// Shared state for all request handlers
pub struct AppState {
    pub directory: ServiceDirectory,
    pub cache: Arc<StateCache>,
    pub sender: CommandSender,
    pub started_at: Instant,
}

/// Build the relay's router
pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/zones", get(get_zones))
        .route("/lights", get(get_lights))
        .route("/lights/status", get(get_light_status))
        .route("/state", get(get_component_states))
        .route("/command", post(post_command))
        .route("/health", get(get_health))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn get_zones(State(state): State<Arc<AppState>>) -> Result<Json<Value>> {
    let zones = state.directory.list_zones().await?;
    Ok(Json(serde_json::to_value(zones)?))
}

async fn get_lights(State(state): State<Arc<AppState>>) -> Result<Json<Value>> {
    let lights = state.directory.list_lights().await?;
    Ok(Json(serde_json::to_value(lights)?))
}

/// Light id -> level, for every light the session has reported on
async fn get_light_status(State(state): State<Arc<AppState>>) -> Result<Json<Value>> {
    let lights = state.directory.list_lights().await?;
    let status = state.cache.light_status().await;

    let mut out = serde_json::Map::new();
    for light in lights {
        if let Some(level) = status.get(&light.address) {
            out.insert(light.id, json!(level));
        }
    }
    Ok(Json(Value::Object(out)))
}

async fn get_component_states(State(state): State<Arc<AppState>>) -> Result<Json<Value>> {
    let states = state.cache.component_states().await;
    Ok(Json(serde_json::to_value(states)?))
}

/// Validate, then hand the command to the sender. A malformed body is a
/// 400 before any datagram leaves the host.
async fn post_command(
    State(state): State<Arc<AppState>>,
    body: std::result::Result<Json<CommandRequest>, JsonRejection>,
) -> Result<Json<Value>> {
    let Json(request) = body.map_err(|e| RelayError::bad_request(e.body_text()))?;
    request.validate()?;
    state.sender.send(&request).await?;
    Ok(Json(json!({ "status": "ok" })))
}

async fn get_health(State(state): State<Arc<AppState>>) -> Json<Value> {
    let now = Utc::now();
    let age = |t: Option<DateTime<Utc>>| t.map(|t| (now - t).num_seconds());
    Json(json!({
        "status": "ok",
        "uptime_seconds": state.started_at.elapsed().as_secs(),
        "lighting": {
            "last_update_age_seconds": age(state.cache.last_light_update().await),
        },
        "status_files": {
            "last_update_age_seconds": age(state.cache.last_file_update().await),
        },
    }))
}
