//! WebSocket transport: one task pair per socket, feeding the relay.

use axum::{
    extract::{
        ws::{rejection::WebSocketUpgradeRejection, Message, WebSocket},
        State, WebSocketUpgrade,
    },
    response::{IntoResponse, Response},
};
use futures_util::{SinkExt, StreamExt};
use tokio::sync::mpsc;

use crate::relay::Outbound;
use crate::state::AppState;

/// WebSocket upgrade handler. Plain GETs on the same path get a health reply.
pub async fn ws_handler(
    State(state): State<AppState>,
    ws: Result<WebSocketUpgrade, WebSocketUpgradeRejection>,
) -> Response {
    match ws {
        Ok(ws) => ws.on_upgrade(move |socket| handle_socket(socket, state)),
        Err(_) => "OK".into_response(),
    }
}

/// Drive one socket until either side goes away.
async fn handle_socket(socket: WebSocket, state: AppState) {
    let (mut sender, mut receiver) = socket.split();
    let (outbox, mut outbound_rx) = mpsc::unbounded_channel::<Outbound>();

    let conn_id = state.relay.lock().await.connect(outbox);

    // Task to forward queued frames to the WebSocket
    let mut send_task = tokio::spawn(async move {
        while let Some(outbound) = outbound_rx.recv().await {
            match outbound {
                Outbound::Message(msg) => {
                    let json = match serde_json::to_string(&msg) {
                        Ok(json) => json,
                        Err(e) => {
                            tracing::error!("[WS {}] Failed to encode {:?}: {}", conn_id, msg, e);
                            continue;
                        }
                    };
                    if sender.send(Message::Text(json.into())).await.is_err() {
                        break;
                    }
                }
                Outbound::Close => {
                    let _ = sender.send(Message::Close(None)).await;
                    break;
                }
            }
        }
    });

    // Receive loop, one frame at a time in socket order
    let relay = state.relay.clone();
    let mut recv_task = tokio::spawn(async move {
        while let Some(msg) = receiver.next().await {
            match msg {
                Ok(Message::Text(text)) => {
                    relay.lock().await.handle_text(conn_id, text.as_str());
                }
                Ok(Message::Close(_)) => break,
                Err(e) => {
                    tracing::warn!("[WS {}] Socket error: {}", conn_id, e);
                    break;
                }
                _ => {}
            }
        }
    });

    tokio::select! {
        _ = &mut send_task => recv_task.abort(),
        _ = &mut recv_task => send_task.abort(),
    }

    state.relay.lock().await.disconnect(conn_id);
    tracing::info!("[WS {}] Connection closed", conn_id);
}
