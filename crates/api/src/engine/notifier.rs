//! Outbound notification hook used by the orchestrator.

use syncwatch_core::messages::MessageType;

use crate::ws::Hub;

/// Sink for run lifecycle notifications.
///
/// Implementations must not block: the orchestrator calls `notify` from job
/// tasks and expects delivery to be fire-and-forget.
pub trait RunNotifier: Send + Sync {
    fn notify(&self, message_type: MessageType, payload: serde_json::Value);
}

impl RunNotifier for Hub {
    fn notify(&self, message_type: MessageType, payload: serde_json::Value) {
        self.broadcast_to_all(message_type, payload);
    }
}
