use axum::extract::ws::{WebSocket, WebSocketUpgrade};
use axum::extract::State;
use axum::response::IntoResponse;
use futures::StreamExt;

use crate::state::AppState;
use crate::ws::client;

/// HTTP handler that upgrades the connection to WebSocket.
///
/// After the upgrade the socket is split and served by the client pumps
/// until either side goes away.
pub async fn ws_handler(ws: WebSocketUpgrade, State(state): State<AppState>) -> impl IntoResponse {
    let settings = state.connection_settings;
    ws.max_message_size(settings.max_message_size)
        .on_upgrade(move |socket| handle_socket(socket, state))
}

async fn handle_socket(socket: WebSocket, state: AppState) {
    let (sink, stream) = socket.split();
    client::serve(state.hub.clone(), state.connection_settings, sink, stream).await;
}
