use std::sync::Arc;

use futures_util::{SinkExt, StreamExt};
use serde::Deserialize;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc;
use tokio_tungstenite::{accept_async, tungstenite::Message as WsFrame, WebSocketStream};
use tracing::{error, info, warn};

use crate::message::{validate_text, Message, NewMessage};
use crate::registry::{ConnectionId, ConnectionRegistry};
use crate::store::MessageStore;
use crate::AppState;

/// What a client sends over the socket. Both fields are optional so that
/// malformed payloads can be dropped instead of failing to parse; extra
/// fields (`type`, `timestamp`) are ignored.
#[derive(Debug, Deserialize)]
struct InboundText {
    #[serde(default)]
    body: Option<String>,
    #[serde(default, rename = "from")]
    from: Option<String>,
}

/// Accept WebSocket connections until the listener fails. A handshake error
/// affects only that one connection.
pub async fn accept_loop(listener: TcpListener, state: Arc<AppState>) {
    loop {
        match listener.accept().await {
            Ok((stream, peer_addr)) => {
                let state = state.clone();
                tokio::spawn(async move {
                    match accept_async(stream).await {
                        Ok(ws_stream) => handle_connection(ws_stream, state).await,
                        Err(e) => error!("WebSocket handshake failed for {}: {}", peer_addr, e),
                    }
                });
            }
            Err(e) => error!("failed to accept connection: {}", e),
        }
    }
}

/// Drive a single client connection: register it for broadcasts, forward
/// fan-out frames to its socket, and persist+broadcast whatever it sends.
/// Every exit path removes the connection from the registry.
pub async fn handle_connection(ws_stream: WebSocketStream<TcpStream>, state: Arc<AppState>) {
    let (mut ws_sender, mut ws_receiver) = ws_stream.split();

    // Channel the fan-out writes into; a dedicated task drains it to the socket
    let (tx, mut rx) = mpsc::unbounded_channel::<String>();
    let conn_id = state.registry.add(tx);
    info!(
        "client connected: {} ({} online)",
        conn_id,
        state.registry.len()
    );

    let mut send_task = tokio::spawn(async move {
        while let Some(frame) = rx.recv().await {
            if ws_sender.send(WsFrame::Text(frame.into())).await.is_err() {
                break;
            }
        }
    });

    loop {
        tokio::select! {
            res = ws_receiver.next() => {
                match res {
                    Some(Ok(WsFrame::Text(text))) => {
                        handle_text_frame(&text, conn_id, &state).await;
                    }
                    Some(Ok(WsFrame::Close(_))) => {
                        info!("client {} sent close frame", conn_id);
                        break;
                    }
                    Some(Ok(_)) => {}
                    Some(Err(e)) => {
                        error!("WebSocket error for client {}: {}", conn_id, e);
                        break;
                    }
                    None => {
                        info!("stream ended for client {}", conn_id);
                        break;
                    }
                }
            }
            _ = &mut send_task => {
                info!("send task finished for client {} (connection lost)", conn_id);
                break;
            }
        }
    }

    send_task.abort();
    state.registry.remove(&conn_id);
    info!(
        "client disconnected: {} ({} online)",
        conn_id,
        state.registry.len()
    );
}

/// One inbound text event: validate, persist, fan out. Invalid payloads are
/// dropped without telling the sender, and store failures lose the message
/// after a log line; this path has no acknowledgment channel.
pub async fn handle_text_frame(text: &str, conn_id: ConnectionId, state: &AppState) {
    let event: InboundText = match serde_json::from_str(text) {
        Ok(event) => event,
        Err(e) => {
            warn!("unparseable frame from {}: {}", conn_id, e);
            return;
        }
    };

    let (body, from) = match (event.body, event.from) {
        (Some(body), Some(from)) => (body, from),
        _ => {
            warn!("dropping frame from {} with missing fields", conn_id);
            return;
        }
    };
    if let Err(e) = validate_text(&body, &from) {
        warn!("dropping invalid message from {}: {}", conn_id, e);
        return;
    }

    match state.store.save(NewMessage::text(body.trim(), from)).await {
        Ok(message) => broadcast_message(&state.registry, &message),
        Err(e) => error!("failed to persist message from {}: {}", conn_id, e),
    }
}

/// Serialize a persisted message and send it to every live connection,
/// including the one it came from. Shared by the relay and the HTTP
/// creation endpoints.
pub fn broadcast_message(registry: &ConnectionRegistry, message: &Message) {
    match serde_json::to_string(message) {
        Ok(frame) => registry.broadcast(&frame),
        Err(e) => error!("failed to serialize message {}: {}", message.id, e),
    }
}
