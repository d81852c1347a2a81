//! WebSocket transport over `tokio-tungstenite`.
//!
//! Each socket gets a writer task fed by an unbounded channel and a reader
//! task that turns frames into [`SocketEvent`]s. Text frames carry JSON
//! [`Packet`]s; close frames carry the disconnect code and reason.

use crate::domain::{P2PError, Packet, PeerError, PeerInfo};
use crate::ports::{Connection, IncomingConnection, PeerSocket, SocketEvent, Transport};
use async_trait::async_trait;
use futures::{SinkExt, StreamExt};
use parking_lot::Mutex;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::net::TcpListener;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_tungstenite::tungstenite::handshake::server::{ErrorResponse, Request, Response};
use tokio_tungstenite::tungstenite::protocol::frame::coding::CloseCode;
use tokio_tungstenite::tungstenite::protocol::CloseFrame;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::WebSocketStream;
use tracing::{debug, info, warn};

/// Close code reported when the stream ends without a close frame.
const ABNORMAL_CLOSURE: u16 = 1006;

enum Outgoing {
    Text(String),
    Close { code: u16, reason: String },
}

pub struct WsSocket {
    outgoing: mpsc::UnboundedSender<Outgoing>,
    open: Arc<AtomicBool>,
}

impl PeerSocket for WsSocket {
    fn send(&self, packet: Packet) -> Result<(), PeerError> {
        if !self.is_open() {
            return Err(PeerError::Closed);
        }
        self.outgoing
            .send(Outgoing::Text(packet.to_json()))
            .map_err(|_| PeerError::Closed)
    }

    fn close(&self, code: u16, reason: &str) {
        if self.open.swap(false, Ordering::SeqCst) {
            let _ = self.outgoing.send(Outgoing::Close {
                code,
                reason: reason.to_string(),
            });
        }
    }

    fn is_open(&self) -> bool {
        self.open.load(Ordering::SeqCst)
    }
}

/// Splits a WebSocket stream into a socket and an event channel.
fn bridge<S>(stream: WebSocketStream<S>) -> Connection
where
    S: AsyncRead + AsyncWrite + Unpin + Send + 'static,
{
    let (mut sink, mut frames) = stream.split();
    let (outgoing_tx, mut outgoing_rx) = mpsc::unbounded_channel::<Outgoing>();
    let (events_tx, events_rx) = mpsc::unbounded_channel();
    let open = Arc::new(AtomicBool::new(true));

    tokio::spawn(async move {
        while let Some(outgoing) = outgoing_rx.recv().await {
            let result = match outgoing {
                Outgoing::Text(text) => sink.send(Message::text(text)).await,
                Outgoing::Close { code, reason } => {
                    let frame = CloseFrame {
                        code: CloseCode::from(code),
                        reason: reason.into(),
                    };
                    let _ = sink.send(Message::Close(Some(frame))).await;
                    break;
                }
            };
            if let Err(e) = result {
                debug!(error = %e, "WebSocket write failed");
                break;
            }
        }
    });

    let reader_open = open.clone();
    tokio::spawn(async move {
        let mut closed = None;
        while let Some(frame) = frames.next().await {
            match frame {
                Ok(Message::Text(text)) => {
                    let event = match Packet::from_json(text.as_str()) {
                        Ok(packet) => SocketEvent::Packet(packet),
                        Err(e) => SocketEvent::Malformed(e.to_string()),
                    };
                    if events_tx.send(event).is_err() {
                        break;
                    }
                }
                Ok(Message::Close(frame)) => {
                    closed = Some(match frame {
                        Some(frame) => (u16::from(frame.code), frame.reason.to_string()),
                        None => (ABNORMAL_CLOSURE, String::new()),
                    });
                    break;
                }
                Ok(Message::Binary(_)) => {
                    let _ = events_tx.send(SocketEvent::Malformed("binary frame".to_string()));
                }
                Ok(_) => {}
                Err(e) => {
                    closed = Some((ABNORMAL_CLOSURE, e.to_string()));
                    break;
                }
            }
        }
        reader_open.store(false, Ordering::SeqCst);
        let (code, reason) = closed.unwrap_or((ABNORMAL_CLOSURE, String::new()));
        let _ = events_tx.send(SocketEvent::Closed { code, reason });
    });

    Connection {
        socket: Arc::new(WsSocket {
            outgoing: outgoing_tx,
            open,
        }),
        events: events_rx,
    }
}

#[derive(Default)]
pub struct WsTransport {
    listener: Mutex<Option<JoinHandle<()>>>,
    local_addr: Mutex<Option<SocketAddr>>,
}

impl WsTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Bound address once listening; useful when listening on port 0.
    pub fn local_addr(&self) -> Option<SocketAddr> {
        *self.local_addr.lock()
    }
}

#[async_trait]
impl Transport for WsTransport {
    async fn connect(&self, peer: &PeerInfo, query: &str) -> Result<Connection, PeerError> {
        let url = format!("ws://{}:{}/?{}", peer.ip_address, peer.ws_port, query);
        let (stream, _response) = tokio_tungstenite::connect_async(url)
            .await
            .map_err(|e| PeerError::ConnectFailed {
                peer_id: peer.id(),
                reason: e.to_string(),
            })?;
        Ok(bridge(stream))
    }

    async fn listen(&self, host: &str, port: u16) -> Result<mpsc::UnboundedReceiver<IncomingConnection>, P2PError> {
        let listener = TcpListener::bind((host, port))
            .await
            .map_err(|e| P2PError::Listen(e.to_string()))?;
        let local_addr = listener.local_addr().map_err(|e| P2PError::Listen(e.to_string()))?;
        *self.local_addr.lock() = Some(local_addr);
        info!(address = %local_addr, "WebSocket server listening");

        let (tx, rx) = mpsc::unbounded_channel();
        let accept_loop = tokio::spawn(async move {
            loop {
                let (stream, remote) = match listener.accept().await {
                    Ok(accepted) => accepted,
                    Err(e) => {
                        warn!(error = %e, "Failed to accept connection");
                        continue;
                    }
                };
                let tx = tx.clone();
                tokio::spawn(async move {
                    let mut query = None;
                    let callback = |request: &Request, response: Response| -> Result<Response, ErrorResponse> {
                        query = request.uri().query().map(str::to_owned);
                        Ok(response)
                    };
                    match tokio_tungstenite::accept_hdr_async(stream, callback).await {
                        Ok(ws) => {
                            let _ = tx.send(IncomingConnection {
                                remote_ip: remote.ip().to_string(),
                                query,
                                connection: bridge(ws),
                            });
                        }
                        Err(e) => debug!(remote = %remote, error = %e, "WebSocket upgrade failed"),
                    }
                });
            }
        });
        if let Some(previous) = self.listener.lock().replace(accept_loop) {
            previous.abort();
        }
        Ok(rx)
    }

    async fn close(&self) {
        if let Some(listener) = self.listener.lock().take() {
            listener.abort();
        }
    }
}
