//! Per-subscriber session
//!
//! Owns one WebSocket connection end to end: handshake, the `set_channel`
//! join, pumping fan-out updates to the socket, and the implicit leave when
//! the socket goes away.

use std::sync::Arc;

use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio::sync::broadcast;
use tokio::time::timeout;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{accept_async, WebSocketStream};

use super::config::ServerConfig;
use super::protocol::{parse_client_message, ClientMessage, ServerMessage};
use crate::channel::ChannelId;
use crate::error::{RelayError, Result};
use crate::event::{EventKind, NormalizedEvent};
use crate::registry::{ChannelRegistry, ChannelUpdate, JoinResult};

type WsSink = SplitSink<WebSocketStream<TcpStream>, Message>;
type WsStream = SplitStream<WebSocketStream<TcpStream>>;

/// One subscriber connection
pub(super) struct Session {
    id: u64,
    registry: Arc<ChannelRegistry>,
    config: ServerConfig,
    /// Current channel membership and its fan-out receiver
    current: Option<(ChannelId, broadcast::Receiver<ChannelUpdate>)>,
}

/// What the select loop observed in one turn
enum Step {
    Update(std::result::Result<ChannelUpdate, broadcast::error::RecvError>),
    Socket(Option<std::result::Result<Message, tokio_tungstenite::tungstenite::Error>>),
}

impl Session {
    pub(super) fn new(id: u64, registry: Arc<ChannelRegistry>, config: ServerConfig) -> Self {
        Self {
            id,
            registry,
            config,
            current: None,
        }
    }

    /// Run the session until the subscriber disconnects
    pub(super) async fn run(mut self, socket: TcpStream) -> Result<()> {
        let ws = timeout(self.config.handshake_timeout, accept_async(socket))
            .await
            .map_err(|_| RelayError::HandshakeTimeout)??;

        let (mut sink, mut stream) = ws.split();

        let outcome = self.pump(&mut sink, &mut stream).await;

        // Socket gone for any reason: implicit leave
        if let Some((channel, _)) = self.current.take() {
            self.registry.leave(self.id, &channel).await;
        }

        outcome
    }

    async fn pump(&mut self, sink: &mut WsSink, stream: &mut WsStream) -> Result<()> {
        loop {
            let step = match self.current.as_mut() {
                Some((_, updates)) => tokio::select! {
                    update = updates.recv() => Step::Update(update),
                    message = stream.next() => Step::Socket(message),
                },
                None => Step::Socket(stream.next().await),
            };

            match step {
                Step::Update(Ok(update)) => {
                    let terminal = matches!(
                        update,
                        ChannelUpdate::ConnectFailed(_)
                            | ChannelUpdate::Event(NormalizedEvent {
                                kind: EventKind::StreamEnd,
                                ..
                            })
                    );

                    let frame = ServerMessage::from_update(update);
                    sink.send(Message::Text(frame.to_json())).await?;

                    // The registry entry is gone after a terminal update;
                    // the client may set_channel again on this socket
                    if terminal {
                        self.current = None;
                    }
                }
                Step::Update(Err(broadcast::error::RecvError::Lagged(skipped))) => {
                    // Best-effort delivery: a slow consumer loses events
                    tracing::warn!(session_id = self.id, skipped, "Subscriber lagging");
                }
                Step::Update(Err(broadcast::error::RecvError::Closed)) => {
                    // The entry vanished before a terminal update reached
                    // this receiver (a join racing a teardown); synthesize
                    // the end marker so the client knows it is unjoined
                    tracing::debug!(session_id = self.id, "Channel closed without end marker");
                    let end = NormalizedEvent::new(0, String::new(), EventKind::StreamEnd);
                    let frame = ServerMessage::from_update(ChannelUpdate::Event(end));
                    sink.send(Message::Text(frame.to_json())).await?;
                    self.current = None;
                }
                Step::Socket(Some(Ok(Message::Text(text)))) => {
                    if !self.handle_text(sink, &text).await? {
                        return Ok(());
                    }
                }
                Step::Socket(Some(Ok(Message::Close(_)))) => return Ok(()),
                Step::Socket(Some(Ok(_))) => {
                    // Ping/pong handled by tungstenite; binary ignored
                }
                Step::Socket(Some(Err(err))) => return Err(err.into()),
                Step::Socket(None) => return Ok(()),
            }
        }
    }

    /// Handle one inbound text frame; returns false to end the session
    async fn handle_text(&mut self, sink: &mut WsSink, text: &str) -> Result<bool> {
        let message = match parse_client_message(text) {
            Ok(message) => message,
            Err(err) => {
                tracing::debug!(session_id = self.id, error = %err, "Unparseable frame");
                return Ok(true);
            }
        };

        let ClientMessage::SetChannel {
            channel_id,
            api_key,
        } = message;

        let channel = ChannelId::new(&channel_id);
        if !channel.is_valid() {
            self.send(sink, &ServerMessage::auth_error("channel id required"))
                .await?;
            return Ok(true);
        }

        // Switching channels drops the old membership first
        if let Some((joined, _)) = &self.current {
            if *joined == channel {
                return Ok(true);
            }
            let old = joined.clone();
            self.registry.leave(self.id, &old).await;
            self.current = None;
        }

        tracing::info!(session_id = self.id, channel = %channel, "Join requested");

        match self
            .registry
            .request_join(self.id, &channel, api_key.as_deref())
            .await
        {
            JoinResult::Admitted { updates, .. } => {
                self.current = Some((channel, updates));
                Ok(true)
            }
            JoinResult::AlreadyMember => Ok(true),
            JoinResult::Denied(reason) => {
                self.send(sink, &ServerMessage::auth_error(reason.to_string()))
                    .await?;

                // Give the client a moment to read the error, then close
                tokio::time::sleep(self.config.auth_error_close_delay).await;
                let _ = sink.send(Message::Close(None)).await;
                Ok(false)
            }
        }
    }

    async fn send(&self, sink: &mut WsSink, message: &ServerMessage) -> Result<()> {
        sink.send(Message::Text(message.to_json())).await?;
        Ok(())
    }
}
