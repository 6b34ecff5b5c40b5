//! Notification envelope and message-type vocabulary shared by the hub,
//! client connections and the orchestrator.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::types::{ClientId, Timestamp};

/// Closed set of message types carried by an [`Envelope`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MessageType {
    /// Run lifecycle transition.
    StatusUpdate,
    /// Intermediate progress from a long-running subsystem.
    Progress,
    /// Sync issues detected after a run finished.
    Alert,
    /// An AI suggestion finished computing.
    SuggestionReady,
    /// Sent to a client right after it is registered.
    Connect,
    /// Client-initiated disconnect request.
    Disconnect,
    /// Keep-alive probe.
    Ping,
    /// Keep-alive reply.
    Pong,
}

impl MessageType {
    pub const ALL: [MessageType; 8] = [
        MessageType::StatusUpdate,
        MessageType::Progress,
        MessageType::Alert,
        MessageType::SuggestionReady,
        MessageType::Connect,
        MessageType::Disconnect,
        MessageType::Ping,
        MessageType::Pong,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::StatusUpdate => "status_update",
            Self::Progress => "progress",
            Self::Alert => "alert",
            Self::SuggestionReady => "suggestion_ready",
            Self::Connect => "connect",
            Self::Disconnect => "disconnect",
            Self::Ping => "ping",
            Self::Pong => "pong",
        }
    }
}

impl fmt::Display for MessageType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error returned when an inbound type tag is outside the closed set.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("Unknown message type: {0}")]
pub struct UnknownMessageType(pub String);

impl FromStr for MessageType {
    type Err = UnknownMessageType;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        MessageType::ALL
            .into_iter()
            .find(|t| t.as_str() == s)
            .ok_or_else(|| UnknownMessageType(s.to_string()))
    }
}

/// Typed notification delivered to clients.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Envelope {
    #[serde(rename = "type")]
    pub message_type: MessageType,
    pub data: serde_json::Value,
    pub timestamp: Timestamp,
    /// Set on messages addressed to a single client; absent on broadcasts.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub client_id: Option<ClientId>,
}

impl Envelope {
    pub fn new(message_type: MessageType, data: serde_json::Value) -> Self {
        Self {
            message_type,
            data,
            timestamp: chrono::Utc::now(),
            client_id: None,
        }
    }

    /// Address the envelope to a single client.
    pub fn for_client(mut self, client_id: ClientId) -> Self {
        self.client_id = Some(client_id);
        self
    }
}

/// Control message received from a client. The type tag stays a raw string
/// so unknown values can be logged and ignored instead of failing decode.
#[derive(Debug, Clone, Deserialize)]
pub struct InboundMessage {
    #[serde(rename = "type")]
    pub message_type: String,
    #[serde(default)]
    pub data: serde_json::Value,
}

impl InboundMessage {
    /// Resolve the type tag against the closed set.
    pub fn kind(&self) -> Result<MessageType, UnknownMessageType> {
        self.message_type.parse()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
