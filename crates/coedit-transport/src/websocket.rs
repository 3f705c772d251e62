//! WebSocket transport for coedit

use std::net::SocketAddr;
use std::sync::atomic::{AtomicU64, Ordering};

use futures_util::{SinkExt, StreamExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::broadcast;
use tokio_tungstenite::{accept_async, tungstenite::Message};
use tracing::{error, info, warn};

use coedit_core::EngineHandle;
use coedit_protocol::decode_inbound;

use crate::broadcast::{Broadcaster, ConnectionId};
use crate::dispatch::dispatch;

/// WebSocket server for a single live document. The engine handle and
/// broadcaster are constructed by the caller and injected, so several servers
/// (or documents) can coexist in one process.
pub struct WebSocketServer {
    engine: EngineHandle,
    broadcaster: Broadcaster,
    addr: SocketAddr,
    connection_counter: AtomicU64,
}

impl WebSocketServer {
    pub fn new(engine: EngineHandle, broadcaster: Broadcaster, addr: SocketAddr) -> Self {
        Self {
            engine,
            broadcaster,
            addr,
            connection_counter: AtomicU64::new(0),
        }
    }

    /// Start the WebSocket server
    pub async fn run(&self) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        let listener = TcpListener::bind(self.addr).await?;
        info!(addr = %self.addr, "coedit WebSocket server listening");

        loop {
            match listener.accept().await {
                Ok((stream, peer_addr)) => {
                    let connection_id = self.connection_counter.fetch_add(1, Ordering::Relaxed);
                    let engine = self.engine.clone();
                    let broadcaster = self.broadcaster.clone();

                    tokio::spawn(async move {
                        if let Err(e) =
                            handle_connection(stream, connection_id, peer_addr, engine, broadcaster)
                                .await
                        {
                            error!(conn = connection_id, error = %e, "WebSocket connection error");
                        }
                    });
                }
                Err(e) => {
                    error!(error = %e, "Failed to accept connection");
                }
            }
        }
    }
}

async fn handle_connection(
    stream: TcpStream,
    connection_id: ConnectionId,
    peer_addr: SocketAddr,
    engine: EngineHandle,
    broadcaster: Broadcaster,
) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let ws_stream = accept_async(stream).await?;
    let (mut write, mut read) = ws_stream.split();
    let mut frames = broadcaster.subscribe();

    info!(conn = connection_id, peer = %peer_addr, "client connected");

    loop {
        tokio::select! {
            // Handle incoming WebSocket messages
            msg = read.next() => {
                match msg {
                    Some(Ok(Message::Text(text))) => {
                        let inbound = match decode_inbound(&text) {
                            Ok(inbound) => inbound,
                            Err(e) => {
                                // malformed messages are dropped, never fatal
                                warn!(conn = connection_id, error = %e, "dropping malformed message");
                                continue;
                            }
                        };

                        if let Err(e) = dispatch(connection_id, inbound, &engine, &broadcaster).await {
                            if e.is_fatal() {
                                error!(conn = connection_id, error = %e, "dispatch failed, closing connection");
                                break;
                            }
                            warn!(conn = connection_id, error = %e, "dropping message");
                        }
                    }
                    Some(Ok(Message::Ping(data))) => {
                        write.send(Message::Pong(data)).await?;
                    }
                    Some(Ok(Message::Close(_))) | None => {
                        info!(conn = connection_id, "client disconnected");
                        break;
                    }
                    Some(Ok(_)) => {
                        // Ignore other message types
                    }
                    Some(Err(e)) => {
                        error!(conn = connection_id, error = %e, "WebSocket read error");
                        break;
                    }
                }
            }

            // Fan broadcast frames out to this peer
            result = frames.recv() => {
                match result {
                    Ok(frame) => {
                        if frame.is_for(connection_id) {
                            if let Err(e) = write.send(Message::Text(frame.text.to_string().into())).await {
                                error!(conn = connection_id, error = %e, "WebSocket write error");
                                break;
                            }
                        }
                    }
                    Err(broadcast::error::RecvError::Lagged(n)) => {
                        warn!(conn = connection_id, missed = n, "client lagged behind broadcasts");
                    }
                    Err(broadcast::error::RecvError::Closed) => {
                        break;
                    }
                }
            }
        }
    }

    Ok(())
}
