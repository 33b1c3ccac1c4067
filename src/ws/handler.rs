//! WebSocket upgrade handler

use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        State,
    },
    response::Response,
};
use bytes::Bytes;
use futures::{stream::SplitSink, SinkExt, StreamExt};
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::app::AppState;
use crate::game::ServerEvent;
use crate::util::rate_limit::PlayerRateLimiter;

use super::connection::{ClientConnection, OUTBOUND_CAPACITY};
use super::protocol::ClientMsg;

/// WebSocket upgrade handler
pub async fn ws_handler(ws: WebSocketUpgrade, State(state): State<AppState>) -> Response {
    ws.on_upgrade(move |socket| handle_socket(socket, state))
}

/// Handle the upgraded WebSocket connection
async fn handle_socket(socket: WebSocket, state: AppState) {
    let (connection, frame_rx) = ClientConnection::channel(OUTBOUND_CAPACITY);
    let conn_id = connection.conn_id();
    info!(conn_id = %conn_id, "New WebSocket connection");

    let (ws_sink, ws_stream) = socket.split();

    let events_tx = state.game.events_tx.clone();
    if events_tx
        .send(ServerEvent::Connected {
            conn_id,
            connection,
        })
        .await
        .is_err()
    {
        error!(conn_id = %conn_id, "Game loop is gone, closing connection");
        return;
    }

    // Spawn writer task: game loop frames -> WebSocket
    let writer_handle = tokio::spawn(run_writer(conn_id, ws_sink, frame_rx));

    let rate_limiter = PlayerRateLimiter::new(state.config.input_rate_limit);
    run_reader(conn_id, ws_stream, &events_tx, &rate_limiter).await;

    // Signal disconnect to the game loop
    let _ = events_tx.send(ServerEvent::Disconnected { conn_id }).await;

    writer_handle.abort();
    info!(conn_id = %conn_id, "WebSocket connection closed");
}

/// Reader loop: WebSocket -> game loop
async fn run_reader(
    conn_id: Uuid,
    mut ws_stream: futures::stream::SplitStream<WebSocket>,
    events_tx: &mpsc::Sender<ServerEvent>,
    rate_limiter: &PlayerRateLimiter,
) {
    while let Some(result) = ws_stream.next().await {
        match result {
            Ok(Message::Binary(data)) => {
                if !rate_limiter.check_input() {
                    warn!(conn_id = %conn_id, "Rate limited input message");
                    continue;
                }

                let msg = match ClientMsg::decode(&data) {
                    Ok(msg) => msg,
                    Err(e) if e.is_malformed() => {
                        warn!(
                            conn_id = %conn_id,
                            error = %e,
                            len = data.len(),
                            "Dropping malformed message"
                        );
                        continue;
                    }
                    Err(e) => {
                        debug!(conn_id = %conn_id, error = %e, "Ignoring unknown message type");
                        continue;
                    }
                };

                if events_tx
                    .send(ServerEvent::Message { conn_id, msg })
                    .await
                    .is_err()
                {
                    debug!(conn_id = %conn_id, "Event channel closed");
                    break;
                }
            }
            Ok(Message::Text(_)) => {
                warn!(conn_id = %conn_id, "Received text message, ignoring");
            }
            Ok(Message::Ping(_)) => {
                debug!(conn_id = %conn_id, "Received ping");
            }
            Ok(Message::Pong(_)) => {
                debug!(conn_id = %conn_id, "Received pong");
            }
            Ok(Message::Close(_)) => {
                info!(conn_id = %conn_id, "Client initiated close");
                break;
            }
            Err(e) => {
                error!(conn_id = %conn_id, error = %e, "WebSocket error");
                break;
            }
        }
    }
}

/// Writer task: drain pre-encoded frames into the socket
async fn run_writer(
    conn_id: Uuid,
    mut ws_sink: SplitSink<WebSocket, Message>,
    mut frame_rx: mpsc::Receiver<Bytes>,
) {
    while let Some(frame) = frame_rx.recv().await {
        if let Err(e) = send_frame(&mut ws_sink, frame).await {
            debug!(conn_id = %conn_id, error = %e, "WebSocket send failed");
            break;
        }
    }
    let _ = ws_sink.close().await;
}

/// Send one binary frame over WebSocket
async fn send_frame(
    sink: &mut SplitSink<WebSocket, Message>,
    frame: Bytes,
) -> Result<(), axum::Error> {
    sink.send(Message::Binary(frame.to_vec())).await
}
