//! The message-bus seam: the operations the queue workflow needs from a
//! managed queue service, and the types that cross it.

use async_trait::async_trait;

/// A message as it travels to and from the bus.
///
/// Outbound messages only carry a body. Messages handed back by
/// [`MessageBus::receive_message`] also carry the server-assigned id and,
/// when received in [`ReceiveMode::PeekLock`], the token that proves the lock.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BrokeredMessage {
    /// Identifier assigned by the service when the message was enqueued
    pub message_id: Option<String>,
    /// Handle needed to delete a peek-locked message (SQS receipt handle)
    pub lock_token: Option<String>,
    /// The message content
    pub body: String,
}

impl BrokeredMessage {
    /// Builds an outbound message with the given body.
    pub fn new(body: impl Into<String>) -> Self {
        Self {
            message_id: None,
            lock_token: None,
            body: body.into(),
        }
    }
}

/// A queue known to the bus.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct QueueInfo {
    pub name: String,
}

impl QueueInfo {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }
}

/// How a receive call treats the message it hands back.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum ReceiveMode {
    /// The message stays on the queue, invisible to other receivers, until it
    /// is deleted or its lock expires.
    #[default]
    PeekLock,
    /// The message is removed from the queue as part of the receive.
    ReceiveAndDelete,
}

/// The remote service error raised by any bus call.
#[derive(Debug, thiserror::Error)]
pub enum BusError {
    #[error("{operation} failed: {message}")]
    Service {
        operation: &'static str,
        message: String,
    },
    #[error("queue {0} does not exist")]
    QueueNotFound(String),
    #[error("message has no lock token and cannot be deleted")]
    MissingLockToken,
}

impl BusError {
    pub fn service(operation: &'static str, error: impl std::fmt::Display) -> Self {
        Self::Service {
            operation,
            message: error.to_string(),
        }
    }
}

/// Client for a managed message-queue service.
///
/// Implementations must be shareable across concurrent requests; the workflow
/// holds one behind an `Arc` and never adds locking of its own.
#[async_trait]
pub trait MessageBus: Send + Sync {
    /// Lists every queue in the namespace, following pagination.
    async fn list_queues(&self) -> Result<Vec<QueueInfo>, BusError>;

    /// Creates a queue and returns the queue as the service reports it.
    async fn create_queue(&self, name: &str) -> Result<QueueInfo, BusError>;

    async fn send_message(&self, queue: &str, message: BrokeredMessage) -> Result<(), BusError>;

    /// Receives at most one message. `Ok(None)` means nothing was visible.
    async fn receive_message(
        &self,
        queue: &str,
        mode: ReceiveMode,
    ) -> Result<Option<BrokeredMessage>, BusError>;

    /// Deletes a message previously received in [`ReceiveMode::PeekLock`].
    async fn delete_message(&self, queue: &str, message: &BrokeredMessage) -> Result<(), BusError>;
}
