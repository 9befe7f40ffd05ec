use axum::{
    extract::{State, ws::{WebSocket, WebSocketUpgrade, Message}},
    response::IntoResponse,
};
use std::sync::Arc;
use tokio::sync::broadcast::error::RecvError;
use futures::{SinkExt, StreamExt};
use crate::api::rest::AppState;
use crate::models::PriceBoardUpdate;

pub async fn ws_handler(
    ws: WebSocketUpgrade,
    State(state): State<Arc<AppState>>,
) -> impl IntoResponse {
    ws.on_upgrade(|socket| handle_socket(socket, state))
}

fn board_message(update: &PriceBoardUpdate) -> Message {
    let msg = serde_json::json!({
        "type": "price_update",
        "timestamp": update.timestamp,
        "data": update.boards,
    });
    Message::Text(msg.to_string())
}

async fn handle_socket(socket: WebSocket, state: Arc<AppState>) {
    let (mut sender, mut receiver) = socket.split();

    let Some(feed) = state.updates.as_ref() else {
        let msg = r#"{"type":"error","error":"price updates are disabled"}"#;
        let _ = sender.send(Message::Text(msg.to_string())).await;
        return;
    };

    let mut updates = feed.subscribe();

    // Send the last board right away so clients don't wait a full cycle.
    if let Some(latest) = feed.latest() {
        if sender.send(board_message(&latest)).await.is_err() {
            return;
        }
    }

    loop {
        tokio::select! {
            update = updates.recv() => {
                match update {
                    Ok(update) => {
                        if sender.send(board_message(&update)).await.is_err() {
                            break;
                        }
                    }
                    Err(RecvError::Lagged(skipped)) => {
                        tracing::debug!("WebSocket client lagged, skipped {} updates", skipped);
                    }
                    Err(RecvError::Closed) => break,
                }
            }

            msg = receiver.next() => {
                match msg {
                    Some(Ok(Message::Text(text))) => {
                        if let Ok(cmd) = serde_json::from_str::<serde_json::Value>(&text) {
                            if cmd["type"] == "ping" {
                                let _ = sender.send(Message::Text(r#"{"type":"pong"}"#.to_string())).await;
                            }
                        }
                    }
                    Some(Ok(Message::Close(_))) | None => break,
                    _ => {}
                }
            }
        }
    }
}
