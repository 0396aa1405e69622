//! Process-local message bus with peek-lock semantics.
//!
//! Used for running the service without AWS and as the substitute
//! collaborator in tests. Failures can be switched on per operation, and
//! every call is journaled so tests can count them.

use crate::bus::{BrokeredMessage, BusError, MessageBus, QueueInfo, ReceiveMode};
use async_trait::async_trait;
use std::collections::{BTreeMap, HashSet, VecDeque};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tokio::time::Instant;

/// Default time a peek-locked message stays hidden.
pub const DEFAULT_LOCK_DURATION: Duration = Duration::from_secs(30);

/// The bus operations, as recorded in the call journal.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Operation {
    ListQueues,
    CreateQueue,
    SendMessage,
    ReceiveMessage,
    DeleteMessage,
}

impl Operation {
    fn name(self) -> &'static str {
        match self {
            Operation::ListQueues => "list queues",
            Operation::CreateQueue => "create queue",
            Operation::SendMessage => "send message",
            Operation::ReceiveMessage => "receive message",
            Operation::DeleteMessage => "delete message",
        }
    }
}

#[derive(Debug)]
struct StoredMessage {
    id: String,
    body: String,
    lock: Option<Lock>,
}

#[derive(Debug)]
struct Lock {
    token: String,
    /// `None` holds the lock until the message is deleted
    expires: Option<Instant>,
}

impl Lock {
    fn is_held(&self, now: Instant) -> bool {
        self.expires.map_or(true, |expires| expires > now)
    }
}

impl StoredMessage {
    fn is_visible(&self, now: Instant) -> bool {
        self.lock.as_ref().map_or(true, |lock| !lock.is_held(now))
    }
}

#[derive(Debug, Default)]
struct State {
    queues: BTreeMap<String, VecDeque<StoredMessage>>,
    failing: HashSet<Operation>,
    orphan_ids: bool,
    calls: Vec<Operation>,
}

impl State {
    fn begin(&mut self, operation: Operation) -> Result<(), BusError> {
        self.calls.push(operation);
        if self.failing.contains(&operation) {
            return Err(BusError::service(operation.name(), "injected failure"));
        }
        Ok(())
    }

    fn queue(&mut self, name: &str) -> Result<&mut VecDeque<StoredMessage>, BusError> {
        self.queues
            .get_mut(name)
            .ok_or_else(|| BusError::QueueNotFound(name.to_string()))
    }
}

/// In-memory [`MessageBus`]. Clones share the same queues.
#[derive(Clone, Debug)]
pub struct InMemoryBus {
    state: Arc<Mutex<State>>,
    lock_duration: Duration,
}

impl Default for InMemoryBus {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryBus {
    pub fn new() -> Self {
        Self::with_lock_duration(DEFAULT_LOCK_DURATION)
    }

    /// A zero duration keeps received messages locked until they are deleted.
    pub fn with_lock_duration(lock_duration: Duration) -> Self {
        Self {
            state: Arc::new(Mutex::new(State::default())),
            lock_duration,
        }
    }

    fn state(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Creates `queue` if needed and enqueues one message per body.
    /// Seeding is not journaled.
    pub fn seed<S: AsRef<str>>(&self, queue: &str, bodies: &[S]) {
        let mut state = self.state();
        let messages = state.queues.entry(queue.to_string()).or_default();
        for body in bodies {
            messages.push_back(StoredMessage {
                id: uuid::Uuid::new_v4().to_string(),
                body: body.as_ref().to_string(),
                lock: None,
            });
        }
    }

    /// Makes every later call of `operation` fail with a service error.
    pub fn fail(&self, operation: Operation) {
        self.state().failing.insert(operation);
    }

    pub fn recover(&self, operation: Operation) {
        self.state().failing.remove(&operation);
    }

    /// Makes later receives hand back messages without an identifier.
    pub fn orphan_ids(&self) {
        self.state().orphan_ids = true;
    }

    /// Every call made so far, in order.
    pub fn calls(&self) -> Vec<Operation> {
        self.state().calls.clone()
    }

    pub fn count(&self, operation: Operation) -> usize {
        self.state().calls.iter().filter(|c| **c == operation).count()
    }

    /// Number of messages on the queue, locked or not.
    pub fn depth(&self, queue: &str) -> usize {
        self.state().queues.get(queue).map_or(0, VecDeque::len)
    }
}

#[async_trait]
impl MessageBus for InMemoryBus {
    async fn list_queues(&self) -> Result<Vec<QueueInfo>, BusError> {
        let mut state = self.state();
        state.begin(Operation::ListQueues)?;
        Ok(state.queues.keys().map(QueueInfo::new).collect())
    }

    async fn create_queue(&self, name: &str) -> Result<QueueInfo, BusError> {
        let mut state = self.state();
        state.begin(Operation::CreateQueue)?;
        if state.queues.contains_key(name) {
            return Err(BusError::service(
                Operation::CreateQueue.name(),
                format!("queue {name} already exists"),
            ));
        }
        state.queues.insert(name.to_string(), VecDeque::new());
        Ok(QueueInfo::new(name))
    }

    async fn send_message(&self, queue: &str, message: BrokeredMessage) -> Result<(), BusError> {
        let mut state = self.state();
        state.begin(Operation::SendMessage)?;
        state.queue(queue)?.push_back(StoredMessage {
            id: uuid::Uuid::new_v4().to_string(),
            body: message.body,
            lock: None,
        });
        Ok(())
    }

    async fn receive_message(
        &self,
        queue: &str,
        mode: ReceiveMode,
    ) -> Result<Option<BrokeredMessage>, BusError> {
        let now = Instant::now();
        let lock_duration = self.lock_duration;
        let mut state = self.state();
        state.begin(Operation::ReceiveMessage)?;
        let orphan_ids = state.orphan_ids;
        let messages = state.queue(queue)?;

        let Some(index) = messages.iter().position(|m| m.is_visible(now)) else {
            return Ok(None);
        };

        let (message_id, lock_token, body) = match mode {
            ReceiveMode::ReceiveAndDelete => match messages.remove(index) {
                Some(stored) => (stored.id, None, stored.body),
                None => return Ok(None),
            },
            ReceiveMode::PeekLock => {
                let stored = &mut messages[index];
                let token = uuid::Uuid::new_v4().to_string();
                stored.lock = Some(Lock {
                    token: token.clone(),
                    expires: (!lock_duration.is_zero()).then(|| now + lock_duration),
                });
                (stored.id.clone(), Some(token), stored.body.clone())
            }
        };

        Ok(Some(BrokeredMessage {
            message_id: (!orphan_ids).then_some(message_id),
            lock_token,
            body,
        }))
    }

    async fn delete_message(&self, queue: &str, message: &BrokeredMessage) -> Result<(), BusError> {
        let now = Instant::now();
        let mut state = self.state();
        state.begin(Operation::DeleteMessage)?;
        let token = message
            .lock_token
            .as_deref()
            .ok_or(BusError::MissingLockToken)?;
        let messages = state.queue(queue)?;

        let index = messages
            .iter()
            .position(|m| {
                m.lock
                    .as_ref()
                    .is_some_and(|lock| lock.token == token && lock.is_held(now))
            })
            .ok_or_else(|| BusError::service(Operation::DeleteMessage.name(), "message lock lost"))?;

        messages.remove(index);
        Ok(())
    }
}
