//! Outbound handle to one WebSocket connection

use bytes::Bytes;
use tokio::sync::mpsc::{self, error::TrySendError};
use tracing::{trace, warn};
use uuid::Uuid;

use super::protocol::ServerMsg;

/// Frames buffered per connection before sends start failing
pub const OUTBOUND_CAPACITY: usize = 256;

/// Cloneable sender feeding a connection's writer task.
///
/// Sends never block the game loop: a full or closed channel drops the
/// frame for this recipient only.
#[derive(Debug, Clone)]
pub struct ClientConnection {
    conn_id: Uuid,
    tx: mpsc::Sender<Bytes>,
}

impl ClientConnection {
    pub fn new(conn_id: Uuid, tx: mpsc::Sender<Bytes>) -> Self {
        Self { conn_id, tx }
    }

    /// Create a connection together with the receiving end of its frames
    pub fn channel(capacity: usize) -> (Self, mpsc::Receiver<Bytes>) {
        let (tx, rx) = mpsc::channel(capacity);
        (Self::new(Uuid::new_v4(), tx), rx)
    }

    pub fn conn_id(&self) -> Uuid {
        self.conn_id
    }

    /// Encode and queue a message. Returns false if the frame was dropped.
    pub fn send(&self, msg: &ServerMsg) -> bool {
        self.send_frame(msg.encode())
    }

    /// Queue an already encoded frame, so broadcasts encode once
    pub fn send_frame(&self, frame: Bytes) -> bool {
        match self.tx.try_send(frame) {
            Ok(()) => true,
            Err(TrySendError::Full(_)) => {
                warn!(conn_id = %self.conn_id, "Outbound buffer full, dropping frame");
                false
            }
            Err(TrySendError::Closed(_)) => {
                trace!(conn_id = %self.conn_id, "Send to closed connection");
                false
            }
        }
    }
}
