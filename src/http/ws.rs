//! WebSocket upgrade dispatch (spec §4.7, §6.2): resolves `{code}`, then
//! hands the raw socket off to `network::connection::handle`, which owns
//! the connection from that point on.

use axum::extract::ws::WebSocketUpgrade;
use axum::extract::{Path, State};
use axum::response::IntoResponse;

use crate::http::AppState;
use crate::network::connection::{self, ConnectionConfig};

pub async fn ws_upgrade(
    ws: WebSocketUpgrade,
    Path(code): Path<String>,
    State(state): State<AppState>,
) -> impl IntoResponse {
    let registry = state.registry.clone();
    let auth = state.config.auth.clone();
    let conn_config = ConnectionConfig {
        heartbeat_interval_seconds: state.config.heartbeat_interval_seconds,
        heartbeat_timeout_seconds: state.config.heartbeat_timeout_seconds,
        outbound_queue_capacity: state.config.outbound_queue_capacity,
    };

    ws.on_upgrade(move |socket| async move {
        connection::handle(socket, code, registry, conn_config, auth).await;
    })
}
