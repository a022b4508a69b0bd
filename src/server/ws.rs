use axum::{
    extract::{
        State, WebSocketUpgrade,
        ws::{Message, WebSocket},
    },
    response::IntoResponse,
};
use futures::{SinkExt as _, StreamExt as _};
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::server::AppState;

/// Upgrades a subscriber connection (the monitoring GUI).
pub async fn ws_upgrade(
    State(state): State<Arc<AppState>>,
    ws: WebSocketUpgrade,
) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_socket(socket, state))
}

async fn handle_socket(socket: WebSocket, state: Arc<AppState>) {
    let (mut ws_tx, mut ws_rx) = socket.split();
    let (id, mut rx) = state.registry.connect().await;
    let total = state.registry.count().await;
    info!("Subscriber {id} connected ({total} total)");

    // Drain the subscriber's buffer into the socket as text frames.
    let forward = tokio::spawn(async move {
        while let Some(payload) = rx.recv().await {
            if ws_tx.send(Message::Text(payload.into())).await.is_err() {
                break;
            }
        }
    });

    // Inbound traffic from the subscriber is logged only, never acted upon.
    while let Some(inbound) = ws_rx.next().await {
        match inbound {
            Ok(Message::Text(text)) => debug!("Message from subscriber {id}: {text}"),
            Ok(Message::Close(_)) => break,
            Ok(_) => {}
            Err(err) => {
                warn!("Subscriber {id} transport error: {err}");
                break;
            }
        }
    }

    state.registry.disconnect(id).await;
    forward.abort();
    info!("Subscriber {id} disconnected");
}
