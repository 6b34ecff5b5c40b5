use std::collections::HashMap;

use syncwatch_core::messages::{Envelope, MessageType};
use syncwatch_core::types::ClientId;
use tokio::sync::mpsc::error::TrySendError;
use tokio::sync::{mpsc, oneshot};

/// Default bound of each client's outbound queue.
pub const DEFAULT_CLIENT_QUEUE_CAPACITY: usize = 256;

/// The hub's view of one client: its id and the sending half of its
/// outbound queue.
///
/// Once registered the hub holds the only strong sender, so unregistering
/// (or shutting the hub down) closes the client's queue.
#[derive(Debug)]
pub struct ClientHandle {
    pub id: ClientId,
    sender: mpsc::Sender<Envelope>,
}

impl ClientHandle {
    /// Create a handle plus the receiving half of a queue bounded at
    /// `capacity`.
    pub fn channel(id: ClientId, capacity: usize) -> (Self, mpsc::Receiver<Envelope>) {
        let (sender, receiver) = mpsc::channel(capacity.max(1));
        (Self { id, sender }, receiver)
    }

    /// Non-blocking enqueue.
    pub fn try_send(&self, envelope: Envelope) -> Result<(), TrySendError<Envelope>> {
        self.sender.try_send(envelope)
    }

    /// A sender that does not keep the queue open on its own.
    pub fn downgrade(&self) -> mpsc::WeakSender<Envelope> {
        self.sender.downgrade()
    }
}

enum Command {
    Register(ClientHandle),
    Unregister(ClientId),
    Broadcast(Envelope),
    Count(oneshot::Sender<usize>),
    Shutdown,
}

/// Cloneable handle to the notification hub.
///
/// Every method only enqueues a command for the [`HubLoop`]; the client
/// registry itself is never touched outside that loop.
#[derive(Clone)]
pub struct Hub {
    commands: mpsc::UnboundedSender<Command>,
    queue_capacity: usize,
}

/// The hub's coordinating loop. Owns the client registry.
///
/// Obtained from [`Hub::new`]; [`HubLoop::run`] consumes it, so the loop can
/// only ever be started once.
pub struct HubLoop {
    commands: mpsc::UnboundedReceiver<Command>,
    clients: HashMap<ClientId, ClientHandle>,
}

impl Hub {
    /// Create a hub handle and its loop. Spawn `HubLoop::run` exactly once.
    pub fn new(queue_capacity: usize) -> (Self, HubLoop) {
        let (commands, receiver) = mpsc::unbounded_channel();
        let hub = Self {
            commands,
            queue_capacity: queue_capacity.max(1),
        };
        let hub_loop = HubLoop {
            commands: receiver,
            clients: HashMap::new(),
        };
        (hub, hub_loop)
    }

    /// Convenience: create a hub and spawn its loop on the current runtime.
    pub fn spawn(queue_capacity: usize) -> (Self, tokio::task::JoinHandle<()>) {
        let (hub, hub_loop) = Self::new(queue_capacity);
        let handle = tokio::spawn(hub_loop.run());
        (hub, handle)
    }

    /// A new client handle whose queue uses this hub's capacity.
    pub fn client_queue(&self, id: ClientId) -> (ClientHandle, mpsc::Receiver<Envelope>) {
        ClientHandle::channel(id, self.queue_capacity)
    }

    pub fn register_client(&self, client: ClientHandle) {
        self.send(Command::Register(client));
    }

    /// Idempotent: unregistering an unknown client does nothing.
    pub fn unregister_client(&self, id: ClientId) {
        self.send(Command::Unregister(id));
    }

    /// Wrap `payload` in an [`Envelope`] and enqueue it for every client.
    /// Never blocks; clients with a full queue miss this message.
    pub fn broadcast_to_all(&self, message_type: MessageType, payload: serde_json::Value) {
        self.send(Command::Broadcast(Envelope::new(message_type, payload)));
    }

    /// Current registry size, or zero once the loop has stopped.
    pub async fn connected_clients(&self) -> usize {
        let (tx, rx) = oneshot::channel();
        self.send(Command::Count(tx));
        rx.await.unwrap_or(0)
    }

    /// Stop the loop and close every client queue.
    pub fn shutdown(&self) {
        self.send(Command::Shutdown);
    }

    fn send(&self, command: Command) {
        if self.commands.send(command).is_err() {
            tracing::debug!("Hub loop has stopped, dropping command");
        }
    }
}

impl HubLoop {
    /// Process commands until [`Hub::shutdown`] is called or every [`Hub`]
    /// handle is dropped.
    pub async fn run(mut self) {
        tracing::debug!("Hub loop started");

        while let Some(command) = self.commands.recv().await {
            match command {
                Command::Register(client) => self.register(client),
                Command::Unregister(id) => self.unregister(id),
                Command::Broadcast(envelope) => self.broadcast(envelope),
                Command::Count(reply) => {
                    let _ = reply.send(self.clients.len());
                }
                Command::Shutdown => break,
            }
        }

        let count = self.clients.len();
        self.clients.clear();
        tracing::info!(count, "Hub stopped, closed all client queues");
    }

    fn register(&mut self, client: ClientHandle) {
        let id = client.id;
        if self.clients.insert(id, client).is_some() {
            tracing::debug!(client_id = %id, "Replaced existing client registration");
        }
        tracing::info!(client_id = %id, total = self.clients.len(), "Client registered");
    }

    fn unregister(&mut self, id: ClientId) {
        if self.clients.remove(&id).is_some() {
            tracing::info!(client_id = %id, total = self.clients.len(), "Client unregistered");
        }
    }

    fn broadcast(&mut self, envelope: Envelope) {
        let mut closed = Vec::new();
        let mut dropped = 0usize;

        for (id, client) in &self.clients {
            match client.try_send(envelope.clone()) {
                Ok(()) => {}
                Err(TrySendError::Full(_)) => {
                    dropped += 1;
                    tracing::debug!(
                        client_id = %id,
                        message_type = %envelope.message_type,
                        "Client queue full, dropping message",
                    );
                }
                Err(TrySendError::Closed(_)) => closed.push(*id),
            }
        }

        for id in closed {
            self.clients.remove(&id);
            tracing::debug!(client_id = %id, "Removed client with closed queue");
        }

        tracing::trace!(
            message_type = %envelope.message_type,
            clients = self.clients.len(),
            dropped,
            "Broadcast delivered",
        );
    }
}
