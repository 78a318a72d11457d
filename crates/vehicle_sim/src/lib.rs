use std::sync::Arc;

use axum::{
    extract::{State, WebSocketUpgrade},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use shared::{
    domain::VehicleCommandState,
    error::ApiError,
    protocol::{
        UpdateAccepted, VehicleEvent, VehicleStatus, HEALTHZ_ROUTE, VEHICLE_EVENTS_ROUTE,
        VEHICLE_STATUS_ROUTE, VEHICLE_UPDATE_ROUTE,
    },
};
use tracing::warn;

pub mod api;
pub mod app_state;
pub mod config;

pub use api::SimVehicle;
pub use app_state::AppState;

pub fn build_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route(HEALTHZ_ROUTE, get(healthz))
        .route(VEHICLE_STATUS_ROUTE, get(vehicle_status))
        .route(VEHICLE_UPDATE_ROUTE, post(vehicle_update))
        .route(VEHICLE_EVENTS_ROUTE, get(ws_handler))
        .with_state(state)
}

async fn healthz() -> &'static str {
    "ok"
}

async fn vehicle_status(State(state): State<Arc<AppState>>) -> Json<VehicleStatus> {
    Json(state.vehicle.status().await)
}

async fn vehicle_update(
    State(state): State<Arc<AppState>>,
    Json(update): Json<VehicleCommandState>,
) -> Result<Json<UpdateAccepted>, (StatusCode, Json<ApiError>)> {
    let event = state.vehicle.apply_update(update).await.map_err(|e| {
        warn!(message = %e.message, "sim: update rejected");
        (StatusCode::BAD_REQUEST, Json(e))
    })?;

    let updates_received = match &event {
        VehicleEvent::StateApplied {
            updates_received, ..
        } => *updates_received,
        VehicleEvent::Error(_) => 0,
    };
    let _ = state.events.send(event);
    Ok(Json(UpdateAccepted { updates_received }))
}

async fn ws_handler(ws: WebSocketUpgrade, State(state): State<Arc<AppState>>) -> impl IntoResponse {
    ws.on_upgrade(move |socket| ws_connection(state, socket))
}

async fn ws_connection(state: Arc<AppState>, socket: axum::extract::ws::WebSocket) {
    use axum::extract::ws::Message;
    use futures::{SinkExt, StreamExt};

    let (mut sender, mut receiver) = socket.split();
    let mut events_rx = state.events.subscribe();

    let send_task = tokio::spawn(async move {
        while let Ok(event) = events_rx.recv().await {
            let text = match serde_json::to_string(&event) {
                Ok(v) => v,
                Err(_) => continue,
            };
            if sender.send(Message::Text(text)).await.is_err() {
                break;
            }
        }
    });

    while let Some(Ok(_msg)) = receiver.next().await {}

    send_task.abort();
}

#[cfg(test)]
#[path = "tests/router_tests.rs"]
mod tests;
