//! The queue workflow: ensure the queue exists, publish one message, drain
//! the queue, and report each step.
//!
//! Remote errors never escape [`QueueWorkflow::run`]. Each one is logged where
//! it happens and the run moves on to the next step, so a report is always
//! produced and always ends with the processed date.

use crate::bus::{BrokeredMessage, BusError, MessageBus, ReceiveMode};
use crate::report::Report;
use std::sync::Arc;

pub const DEFAULT_QUEUE_NAME: &str = "PRODUCT_QUEUE";
pub const DEFAULT_MESSAGE_BODY: &str = "PCF is a great product!";

/// `Tue Oct 14 08:19:00 UTC 2026`
const DATE_FORMAT: &str = "%a %b %d %H:%M:%S UTC %Y";

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct WorkflowSettings {
    /// Queue to ensure, publish to and drain
    pub queue_name: String,
    /// Body of the single message published per run
    pub message_body: String,
    /// Upper bound on messages drained per run; `None` drains until empty
    pub max_messages: Option<usize>,
}

impl Default for WorkflowSettings {
    fn default() -> Self {
        Self {
            queue_name: DEFAULT_QUEUE_NAME.to_string(),
            message_body: DEFAULT_MESSAGE_BODY.to_string(),
            max_messages: None,
        }
    }
}

pub struct QueueWorkflow {
    bus: Arc<dyn MessageBus>,
    settings: WorkflowSettings,
}

/// Queue names compare case-insensitively; some services lower-case them.
fn same_queue(a: &str, b: &str) -> bool {
    a.to_lowercase() == b.to_lowercase()
}

fn log_failure(step: &str, error: &BusError) {
    log::error!("error processing request while {step}: {error}");
}

impl QueueWorkflow {
    pub fn new(bus: Arc<dyn MessageBus>, settings: WorkflowSettings) -> Self {
        Self { bus, settings }
    }

    pub fn settings(&self) -> &WorkflowSettings {
        &self.settings
    }

    /// Runs the whole workflow once and returns what happened.
    pub async fn run(&self) -> Report {
        let mut report = Report::new();
        log::info!("process start...");

        report.push("Connecting to service bus...");
        self.ensure_queue(&mut report).await;
        self.publish(&mut report).await;
        let drained = self.drain(&mut report).await;

        report.push(format!(
            "Processed Date = {}",
            chrono::Utc::now().format(DATE_FORMAT)
        ));

        log::info!("process end, drained {drained} messages");
        report
    }

    async fn ensure_queue(&self, report: &mut Report) {
        let name = &self.settings.queue_name;

        let queues = match self.bus.list_queues().await {
            Ok(queues) => queues,
            Err(e) => {
                log_failure("listing queues", &e);
                return;
            }
        };

        let mut exists = false;
        for queue in queues {
            report.push(format!("Found queue {}", queue.name));
            if same_queue(&queue.name, name) {
                exists = true;
                break;
            }
        }

        if exists {
            report.push(format!("Queue {name} already exists..."));
            return;
        }

        report.push(format!("Creating queue {name}"));
        match self.bus.create_queue(name).await {
            Ok(created) => report.push(format!("Created queue {}", created.name)),
            Err(e) => log_failure("creating queue", &e),
        }
    }

    async fn publish(&self, report: &mut Report) {
        report.push("Writing message to queue...");
        let message = BrokeredMessage::new(self.settings.message_body.as_str());
        if let Err(e) = self
            .bus
            .send_message(&self.settings.queue_name, message)
            .await
        {
            log_failure("sending message", &e);
        }
    }

    /// Receives and deletes until nothing is visible. Returns how many
    /// messages were deleted.
    async fn drain(&self, report: &mut Report) -> usize {
        let name = &self.settings.queue_name;
        let mut drained = 0;

        loop {
            if let Some(max) = self.settings.max_messages {
                if drained >= max {
                    log::warn!("stopping drain of {name} after {drained} messages");
                    report.push(format!("Stopped reading after {drained} messages..."));
                    break;
                }
            }

            report.push("Reading message from queue...");
            let received = match self.bus.receive_message(name, ReceiveMode::PeekLock).await {
                Ok(received) => received,
                Err(e) => {
                    log_failure("receiving message", &e);
                    break;
                }
            };

            // a message without an id counts as no message
            let Some((id, message)) =
                received.and_then(|m| m.message_id.clone().map(|id| (id, m)))
            else {
                report.push("Finished reading messages from queue...");
                break;
            };

            report.push(format!("Read message from queue, id = {id}"));
            for line in message.body.lines() {
                report.push(format!("Read message from queue, contents = {line}"));
            }

            report.push("Deleting message from queue...");
            if let Err(e) = self.bus.delete_message(name, &message).await {
                log_failure("deleting message", &e);
                break;
            }
            drained += 1;
        }

        drained
    }
}
