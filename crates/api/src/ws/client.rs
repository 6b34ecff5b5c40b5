//! One live client connection: an outbound pump draining the client's queue
//! onto the transport, and an inbound pump reading control messages.
//!
//! The pumps are generic over any `Sink`/`Stream` of WebSocket messages so
//! they run the same against an axum socket and an in-memory channel.

use std::fmt;
use std::ops::ControlFlow;
use std::time::{Duration, Instant};

use axum::body::Bytes;
use axum::extract::ws::Message;
use futures::{Sink, SinkExt, Stream, StreamExt};
use serde_json::json;
use syncwatch_core::messages::{Envelope, InboundMessage, MessageType};
use syncwatch_core::types::ClientId;
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;

use super::hub::Hub;
use super::keepalive::ConnectionSettings;

/// Transport-level failure. Ends the affected connection only.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    #[error("write failed: {0}")]
    Write(String),

    #[error("write timed out after {0:?}")]
    WriteTimeout(Duration),

    #[error("read failed: {0}")]
    Read(String),

    #[error("no traffic from peer within {0:?}")]
    ReadDeadline(Duration),

    #[error("message of {size} bytes exceeds limit of {limit} bytes")]
    MessageTooLarge { size: usize, limit: usize },
}

/// Serve one client until either pump stops.
///
/// Registers the client with `hub`, greets it with a `connect` message,
/// then runs both pumps. Whichever pump ends first ends the connection, and
/// the client is unregistered before returning.
pub async fn serve<W, R, E>(hub: Hub, settings: ConnectionSettings, sink: W, mut stream: R)
where
    W: Sink<Message> + Unpin + Send + 'static,
    W::Error: fmt::Display + Send,
    R: Stream<Item = Result<Message, E>> + Unpin,
    E: fmt::Display,
{
    let client_id = uuid::Uuid::new_v4();
    let (handle, queue) = hub.client_queue(client_id);
    let mut inbound = InboundPump {
        client_id,
        replies: handle.downgrade(),
        settings,
        last_seen: Instant::now(),
    };

    let greeting = Envelope::new(MessageType::Connect, json!({ "client_id": client_id }))
        .for_client(client_id);
    if handle.try_send(greeting).is_err() {
        tracing::debug!(client_id = %client_id, "Could not queue connect message");
    }
    hub.register_client(handle);
    tracing::info!(client_id = %client_id, "WebSocket connected");

    let mut writer = tokio::spawn(write_pump(client_id, sink, queue, settings));

    let writer_finished = tokio::select! {
        joined = &mut writer => {
            log_exit(client_id, "outbound", joined.unwrap_or_else(|e| {
                Err(TransportError::Write(e.to_string()))
            }));
            true
        }
        result = inbound.run(&mut stream) => {
            log_exit(client_id, "inbound", result);
            false
        }
    };

    hub.unregister_client(client_id);

    // Unregistering closes the queue, which makes the writer send a close
    // frame and stop.
    if !writer_finished && tokio::time::timeout(settings.write_wait, &mut writer).await.is_err() {
        writer.abort();
    }

    tracing::info!(
        client_id = %client_id,
        idle_ms = inbound.last_seen.elapsed().as_millis() as u64,
        "WebSocket disconnected",
    );
}

fn log_exit(client_id: ClientId, pump: &'static str, result: Result<(), TransportError>) {
    match result {
        Ok(()) => tracing::debug!(client_id = %client_id, pump, "Pump finished"),
        Err(e) => tracing::debug!(client_id = %client_id, pump, error = %e, "Pump failed"),
    }
}

// ---------------------------------------------------------------------------
// Outbound
// ---------------------------------------------------------------------------

/// Drain `queue` onto `sink` and ping the peer every `ping_period`.
///
/// Returns `Ok` after sending a close frame once the queue is closed.
async fn write_pump<W>(
    client_id: ClientId,
    mut sink: W,
    mut queue: mpsc::Receiver<Envelope>,
    settings: ConnectionSettings,
) -> Result<(), TransportError>
where
    W: Sink<Message> + Unpin,
    W::Error: fmt::Display,
{
    let start = tokio::time::Instant::now() + settings.ping_period;
    let mut ping = tokio::time::interval_at(start, settings.ping_period);

    loop {
        tokio::select! {
            next = queue.recv() => {
                let Some(envelope) = next else {
                    let _ = send_frame(&mut sink, Message::Close(None), settings.write_wait).await;
                    return Ok(());
                };
                let text = match serde_json::to_string(&envelope) {
                    Ok(text) => text,
                    Err(e) => {
                        tracing::warn!(client_id = %client_id, error = %e, "Failed to encode envelope");
                        continue;
                    }
                };
                send_frame(&mut sink, Message::Text(text.into()), settings.write_wait).await?;
            }
            _ = ping.tick() => {
                tracing::trace!(client_id = %client_id, "Sending ping");
                send_frame(&mut sink, Message::Ping(Bytes::new()), settings.write_wait).await?;
            }
        }
    }
}

async fn send_frame<W>(sink: &mut W, frame: Message, wait: Duration) -> Result<(), TransportError>
where
    W: Sink<Message> + Unpin,
    W::Error: fmt::Display,
{
    match tokio::time::timeout(wait, sink.send(frame)).await {
        Ok(Ok(())) => Ok(()),
        Ok(Err(e)) => Err(TransportError::Write(e.to_string())),
        Err(_) => Err(TransportError::WriteTimeout(wait)),
    }
}

// ---------------------------------------------------------------------------
// Inbound
// ---------------------------------------------------------------------------

struct InboundPump {
    client_id: ClientId,
    /// Weak so the hub's unregister alone closes the queue.
    replies: mpsc::WeakSender<Envelope>,
    settings: ConnectionSettings,
    last_seen: Instant,
}

impl InboundPump {
    /// Read until the peer closes, asks to disconnect, goes quiet past the
    /// read deadline, or breaks a limit.
    async fn run<R, E>(&mut self, stream: &mut R) -> Result<(), TransportError>
    where
        R: Stream<Item = Result<Message, E>> + Unpin,
        E: fmt::Display,
    {
        loop {
            // Each read gets a fresh deadline, so any frame (pongs included)
            // extends it.
            let message = match tokio::time::timeout(self.settings.pong_wait, stream.next()).await
            {
                Err(_) => return Err(TransportError::ReadDeadline(self.settings.pong_wait)),
                Ok(None) => return Ok(()),
                Ok(Some(Err(e))) => return Err(TransportError::Read(e.to_string())),
                Ok(Some(Ok(message))) => message,
            };
            self.last_seen = Instant::now();

            match message {
                Message::Text(text) => {
                    self.check_size(text.len())?;
                    if self.handle_text(text.as_str()).is_break() {
                        return Ok(());
                    }
                }
                Message::Binary(bytes) => {
                    self.check_size(bytes.len())?;
                    tracing::debug!(client_id = %self.client_id, "Ignoring binary frame");
                }
                Message::Pong(_) => {
                    tracing::trace!(client_id = %self.client_id, "Pong received");
                }
                Message::Ping(_) => {}
                Message::Close(_) => return Ok(()),
            }
        }
    }

    fn check_size(&self, size: usize) -> Result<(), TransportError> {
        let limit = self.settings.max_message_size;
        if size > limit {
            return Err(TransportError::MessageTooLarge { size, limit });
        }
        Ok(())
    }

    fn handle_text(&self, text: &str) -> ControlFlow<()> {
        let inbound: InboundMessage = match serde_json::from_str(text) {
            Ok(inbound) => inbound,
            Err(e) => {
                tracing::debug!(client_id = %self.client_id, error = %e, "Discarding malformed message");
                return ControlFlow::Continue(());
            }
        };

        match inbound.kind() {
            Ok(MessageType::Ping) => {
                self.reply(Envelope::new(MessageType::Pong, json!({})).for_client(self.client_id));
                ControlFlow::Continue(())
            }
            Ok(MessageType::Disconnect) => {
                tracing::debug!(client_id = %self.client_id, "Client requested disconnect");
                ControlFlow::Break(())
            }
            Ok(other) => {
                tracing::debug!(client_id = %self.client_id, message_type = %other, "Ignoring client message");
                ControlFlow::Continue(())
            }
            Err(e) => {
                tracing::debug!(client_id = %self.client_id, error = %e, "Ignoring unknown message type");
                ControlFlow::Continue(())
            }
        }
    }

    /// Non-blocking enqueue onto this client's own queue.
    fn reply(&self, envelope: Envelope) {
        let Some(sender) = self.replies.upgrade() else {
            return;
        };
        match sender.try_send(envelope) {
            Ok(()) => {}
            Err(TrySendError::Full(_)) => {
                tracing::debug!(client_id = %self.client_id, "Client queue full, dropping reply");
            }
            Err(TrySendError::Closed(_)) => {}
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
