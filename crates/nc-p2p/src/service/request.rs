//! An RPC request received from a peer. It can be answered exactly once.

use crate::domain::{P2PError, Packet, PeerId};
use crate::ports::PeerSocket;
use parking_lot::Mutex;
use serde_json::Value;
use std::fmt;
use std::sync::Arc;

struct Responder {
    request_id: u64,
    socket: Arc<dyn PeerSocket>,
}

pub struct P2PRequest {
    procedure: String,
    data: Value,
    peer_id: PeerId,
    responder: Mutex<Option<Responder>>,
}

impl P2PRequest {
    pub(crate) fn new(
        procedure: String,
        data: Value,
        peer_id: PeerId,
        request_id: u64,
        socket: Arc<dyn PeerSocket>,
    ) -> Self {
        Self {
            procedure,
            data,
            peer_id,
            responder: Mutex::new(Some(Responder { request_id, socket })),
        }
    }

    pub fn procedure(&self) -> &str {
        &self.procedure
    }

    pub fn data(&self) -> &Value {
        &self.data
    }

    pub fn peer_id(&self) -> &str {
        &self.peer_id
    }

    pub fn was_response_sent(&self) -> bool {
        self.responder.lock().is_none()
    }

    pub fn respond(&self, data: Value) -> Result<(), P2PError> {
        self.reply(Some(data), None)
    }

    pub fn error(&self, message: impl Into<String>) -> Result<(), P2PError> {
        self.reply(None, Some(message.into()))
    }

    fn reply(&self, data: Option<Value>, error: Option<String>) -> Result<(), P2PError> {
        let responder = self
            .responder
            .lock()
            .take()
            .ok_or_else(|| P2PError::AlreadyResponded(self.procedure.clone()))?;
        responder.socket.send(Packet::Response {
            id: responder.request_id,
            data,
            error,
        })?;
        Ok(())
    }
}

impl fmt::Debug for P2PRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("P2PRequest")
            .field("procedure", &self.procedure)
            .field("peer_id", &self.peer_id)
            .field("responded", &self.was_response_sent())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::memory::connection_pair;
    use crate::ports::SocketEvent;
    use serde_json::json;

    #[tokio::test]
    async fn test_responds_once() {
        let (local, mut remote) = connection_pair();
        let request = P2PRequest::new("blocks".to_string(), json!({"from": 1}), "peer".to_string(), 9, local.socket);

        request.respond(json!([1, 2])).unwrap();
        assert!(request.was_response_sent());
        assert_eq!(
            request.respond(json!([])),
            Err(P2PError::AlreadyResponded("blocks".to_string()))
        );
        assert!(request.error("late").is_err());

        assert_eq!(
            remote.events.recv().await,
            Some(SocketEvent::Packet(Packet::Response {
                id: 9,
                data: Some(json!([1, 2])),
                error: None,
            }))
        );
    }
}
