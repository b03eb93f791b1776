use axum::{
    extract::{State, WebSocketUpgrade},
    http::HeaderMap,
    response::Response,
};

use crate::AppState;
use crate::broker;
use crate::urls::request_origin;

/// Broker WebSocket endpoint shared by presenters, remotes and followers
pub async fn broker_websocket_handler(
    State(state): State<AppState>,
    headers: HeaderMap,
    ws: WebSocketUpgrade,
) -> Response {
    let origin = request_origin(&headers, state.config.https);
    let ctx = state.broker.clone();
    let ws_config = state.config.websocket.clone();
    let shutdown = state.shutdown.clone();

    ws.on_upgrade(move |socket| broker::handle_broker_ws(socket, ctx, origin, ws_config, shutdown))
}
