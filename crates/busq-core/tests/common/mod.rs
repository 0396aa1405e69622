use busq::{
    BrokeredMessage, BusError, InMemoryBus, MessageBus, QueueInfo, QueueWorkflow, ReceiveMode,
    WorkflowSettings,
};
use std::sync::Arc;

pub fn workflow_on(bus: &InMemoryBus) -> QueueWorkflow {
    QueueWorkflow::new(Arc::new(bus.clone()), WorkflowSettings::default())
}

pub fn lines_starting_with<'a>(report: &'a busq::Report, prefix: &str) -> Vec<&'a str> {
    report
        .lines()
        .iter()
        .filter(|l| l.starts_with(prefix))
        .map(String::as_str)
        .collect()
}

/// Yields to the scheduler before every call so concurrent runs interleave.
#[derive(Clone)]
pub struct YieldingBus(pub InMemoryBus);

#[async_trait::async_trait]
impl MessageBus for YieldingBus {
    async fn list_queues(&self) -> Result<Vec<QueueInfo>, BusError> {
        tokio::task::yield_now().await;
        self.0.list_queues().await
    }

    async fn create_queue(&self, name: &str) -> Result<QueueInfo, BusError> {
        tokio::task::yield_now().await;
        self.0.create_queue(name).await
    }

    async fn send_message(&self, queue: &str, message: BrokeredMessage) -> Result<(), BusError> {
        tokio::task::yield_now().await;
        self.0.send_message(queue, message).await
    }

    async fn receive_message(
        &self,
        queue: &str,
        mode: ReceiveMode,
    ) -> Result<Option<BrokeredMessage>, BusError> {
        tokio::task::yield_now().await;
        self.0.receive_message(queue, mode).await
    }

    async fn delete_message(&self, queue: &str, message: &BrokeredMessage) -> Result<(), BusError> {
        tokio::task::yield_now().await;
        self.0.delete_message(queue, message).await
    }
}
