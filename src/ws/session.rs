use std::sync::Arc;
use futures::{SinkExt, StreamExt};
use log::{error, info, warn};
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite::handshake::server::{ErrorResponse, Request, Response};
use tokio_tungstenite::tungstenite::http::StatusCode;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{accept_hdr_async, WebSocketStream};
use uuid::Uuid;

use crate::broker::{DeliveryError, RateBroker, RateSubscriber};
use crate::config::SUBSCRIBER_QUEUE_SIZE;
use crate::feed::Snapshot;

/// Bridge between the broker and one WebSocket connection's write task.
///
/// `deliver` serializes the snapshot and hands it to the connection's bounded
/// outbound queue without blocking. A full queue means the client is not
/// draining fast enough and counts as a timeout for this delivery only; a
/// closed queue means the connection is already tearing down.
pub struct WsSubscriber {
    id: Uuid,
    peer_addr: String,
    tx: mpsc::Sender<String>,
}

impl WsSubscriber {
    pub fn new(peer_addr: String, tx: mpsc::Sender<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            peer_addr,
            tx,
        }
    }
}

impl RateSubscriber for WsSubscriber {
    fn id(&self) -> Uuid {
        self.id
    }

    fn deliver(&self, snapshot: &Snapshot) -> Result<(), DeliveryError> {
        let payload = serde_json::to_string(snapshot)
            .map_err(|e| DeliveryError::SendFailed(e.to_string()))?;

        self.tx.try_send(payload).map_err(|e| match e {
            mpsc::error::TrySendError::Full(_) => DeliveryError::Timeout,
            mpsc::error::TrySendError::Closed(_) => {
                DeliveryError::SendFailed(format!("connection {} closed", self.peer_addr))
            }
        })
    }
}

pub struct WsSessionHandler {
    broker: Arc<RateBroker>,
    peer_addr: String,
}

impl WsSessionHandler {
    pub fn new(broker: Arc<RateBroker>, peer_addr: String) -> Self {
        Self { broker, peer_addr }
    }

    /// Performs the WebSocket handshake (only `/ws` is served) and runs the
    /// session until either side closes the connection.
    pub async fn handle_connection(self, stream: TcpStream) {
        let ws_stream = match accept_hdr_async(stream, |req: &Request, response: Response| {
            let path = req.uri().path();
            if path == "/ws" {
                Ok(response)
            } else {
                warn!("Rejected WebSocket path '{}' from {}", path, self.peer_addr);
                let response: ErrorResponse = Response::builder()
                    .status(StatusCode::NOT_FOUND)
                    .body(Some("Invalid WebSocket path".to_string()))
                    .unwrap();
                Err(response)
            }
        })
        .await
        {
            Ok(ws) => ws,
            Err(e) => {
                error!("WebSocket handshake failed for {}: {:?}", self.peer_addr, e);
                return;
            }
        };

        self.run_session(ws_stream).await;
    }

    /// Attach on open, detach on close. The broker delivers into the outbound
    /// queue; the write task owns the socket's sink. Clients are not expected
    /// to send anything, so the read task only watches for close and errors.
    async fn run_session(&self, ws_stream: WebSocketStream<TcpStream>) {
        let (write, read) = ws_stream.split();
        let (outbound_tx, outbound_rx) = mpsc::channel::<String>(SUBSCRIBER_QUEUE_SIZE);
        let (close_tx, close_rx) = mpsc::channel::<()>(1);

        let subscriber = Arc::new(WsSubscriber::new(self.peer_addr.clone(), outbound_tx));
        let subscriber_id = subscriber.id();
        self.broker.attach(subscriber);
        info!("WebSocket session opened for {}", self.peer_addr);

        let write_task = Self::spawn_write_task(write, outbound_rx, close_rx, self.peer_addr.clone());
        let read_task = Self::spawn_read_task(read, close_tx, self.peer_addr.clone());

        tokio::select! {
            _ = write_task => {
                info!("Write task completed for {}", self.peer_addr);
            }
            _ = read_task => {
                info!("Read task completed for {}", self.peer_addr);
            }
        }

        self.broker.detach(subscriber_id);
        info!("WebSocket session closed for {}", self.peer_addr);
    }

    fn spawn_write_task(
        mut write: futures::stream::SplitSink<WebSocketStream<TcpStream>, Message>,
        mut outbound_rx: mpsc::Receiver<String>,
        mut close_rx: mpsc::Receiver<()>,
        peer_addr: String,
    ) -> tokio::task::JoinHandle<()> {
        tokio::spawn(async move {
            loop {
                tokio::select! {
                    message = outbound_rx.recv() => {
                        match message {
                            Some(payload) => {
                                if let Err(e) = write.send(Message::Text(payload)).await {
                                    error!("Error sending update to {}: {:?}", peer_addr, e);
                                    break;
                                }
                            }
                            None => break,
                        }
                    }
                    _ = close_rx.recv() => {
                        info!("Received close signal for {}", peer_addr);
                        break;
                    }
                }
            }
        })
    }

    fn spawn_read_task(
        mut read: futures::stream::SplitStream<WebSocketStream<TcpStream>>,
        close_tx: mpsc::Sender<()>,
        peer_addr: String,
    ) -> tokio::task::JoinHandle<()> {
        tokio::spawn(async move {
            while let Some(msg_result) = read.next().await {
                match msg_result {
                    Ok(Message::Close(frame)) => {
                        info!("Received close frame from {}: {:?}", peer_addr, frame);
                        break;
                    }
                    Ok(Message::Ping(_)) | Ok(Message::Pong(_)) => {}
                    Ok(other) => {
                        // This channel is server-push only.
                        warn!("Ignoring unexpected message from {}: {:?}", peer_addr, other);
                    }
                    Err(e) => {
                        error!("WebSocket error for {}: {:?}", peer_addr, e);
                        break;
                    }
                }
            }

            let _ = close_tx.send(()).await;
        })
    }
}
