//! WebSocket upgrade and connection lifecycle.

use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::State;
use axum::response::IntoResponse;
use futures::{SinkExt, StreamExt};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use crate::state::AppState;
use crate::ws::messages::{ClientCommand, ServerMessage};
use crate::ws::session::Session;

/// `GET /ws` upgrade handler.
pub async fn ws_handler(ws: WebSocketUpgrade, State(state): State<AppState>) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_socket(socket, state))
}

async fn handle_socket(socket: WebSocket, state: AppState) {
    let connection_id = Uuid::new_v4();
    tracing::info!(%connection_id, "WebSocket connected");

    let (mut sender, mut receiver) = socket.split();
    let (tx, mut rx) = mpsc::unbounded_channel::<ServerMessage>();
    let cancel = CancellationToken::new();

    // Outbound: serialize session pushes onto the socket.
    let send_cancel = cancel.clone();
    let send_task = tokio::spawn(async move {
        while let Some(message) = rx.recv().await {
            let text = match serde_json::to_string(&message) {
                Ok(text) => text,
                Err(e) => {
                    tracing::error!(error = %e, "Failed to serialize outbound message");
                    continue;
                }
            };
            if sender.send(Message::Text(text.into())).await.is_err() {
                break;
            }
        }
        send_cancel.cancel();
    });

    let session = Session::new(
        state.farm.clone(),
        state.commentary.clone(),
        tx,
        cancel.clone(),
    );

    // Inbound: parse commands, ignore anything malformed.
    while let Some(Ok(message)) = receiver.next().await {
        match message {
            Message::Text(text) => match serde_json::from_str::<ClientCommand>(&text) {
                Ok(command) => session.handle_command(command).await,
                Err(e) => {
                    tracing::warn!(%connection_id, error = %e, "Ignoring malformed message");
                }
            },
            Message::Close(_) => break,
            _ => {}
        }
    }

    cancel.cancel();
    send_task.abort();
    tracing::info!(%connection_id, "WebSocket disconnected");
}
