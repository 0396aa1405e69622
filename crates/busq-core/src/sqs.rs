//! AWS SQS implementation of the message bus.

use crate::bus::{BrokeredMessage, BusError, MessageBus, QueueInfo, ReceiveMode};
use async_trait::async_trait;
use aws_config::SdkConfig;
use aws_sdk_sqs as sqs;
use sqs::error::DisplayErrorContext;

/// Receives at most one message from an SQS queue.
///
/// While the visibility timeout runs the message is hidden from other
/// consumers, which is how SQS expresses a peek-lock. `None` leaves the
/// queue's configured timeout in place.
///
/// Without a wait time this is a short poll: SQS samples a subset of its
/// servers and may answer empty while messages remain. A wait time of 1 to
/// 20 seconds long-polls every server.
///
/// # Errors
///
/// Returns an error if the SQS API call fails.
pub async fn receive(
    client: &sqs::Client,
    queue_url: &str,
    visibility_timeout: Option<i32>,
    wait_time_seconds: Option<i32>,
) -> Result<sqs::operation::receive_message::ReceiveMessageOutput, BusError> {
    client
        .receive_message()
        .queue_url(queue_url)
        .max_number_of_messages(1)
        .set_visibility_timeout(visibility_timeout)
        .set_wait_time_seconds(wait_time_seconds)
        .send()
        .await
        .map_err(|e| BusError::service("receive message", DisplayErrorContext(&e)))
}

/// Returns the queue name, which SQS places as the last segment of a queue URL.
fn queue_name(queue_url: &str) -> &str {
    queue_url.rsplit('/').next().unwrap_or(queue_url)
}

/// [`MessageBus`] backed by Amazon SQS (or LocalStack).
///
/// # Example
///
/// ```no_run
/// use busq::SqsBus;
///
/// # async fn example() {
/// let config = aws_config::from_env().load().await;
/// let bus = SqsBus::from_config(config);
/// # }
/// ```
#[derive(Clone)]
pub struct SqsBus {
    /// The AWS SDK configuration used for SQS operations
    pub config: SdkConfig,
    /// The SQS client instance
    pub client: sqs::Client,
    /// Peek-lock duration in seconds applied to each receive
    pub visibility_timeout: Option<i32>,
    /// Long-poll wait in seconds applied to each receive
    pub wait_time_seconds: Option<i32>,
}

impl SqsBus {
    /// Creates an SqsBus from a pre-built AWS SDK config.
    ///
    /// The caller decides credentials and endpoint (e.g. the `--local` flag for LocalStack).
    pub fn from_config(config: SdkConfig) -> Self {
        let client = sqs::Client::new(&config);
        Self {
            config,
            client,
            visibility_timeout: None,
            wait_time_seconds: None,
        }
    }

    pub fn with_visibility_timeout(mut self, seconds: Option<i32>) -> Self {
        self.visibility_timeout = seconds;
        self
    }

    pub fn with_wait_time(mut self, seconds: Option<i32>) -> Self {
        self.wait_time_seconds = seconds;
        self
    }

    /// Resolves a queue name to its URL. Nothing is cached between calls.
    async fn queue_url(&self, name: &str) -> Result<String, BusError> {
        let output = self
            .client
            .get_queue_url()
            .queue_name(name)
            .send()
            .await
            .map_err(|e| {
                let missing = e
                    .as_service_error()
                    .map(|se| se.is_queue_does_not_exist())
                    .unwrap_or(false);
                if missing {
                    BusError::QueueNotFound(name.to_string())
                } else {
                    BusError::service("get queue url", DisplayErrorContext(&e))
                }
            })?;

        output
            .queue_url
            .ok_or_else(|| BusError::QueueNotFound(name.to_string()))
    }
}

#[async_trait]
impl MessageBus for SqsBus {
    async fn list_queues(&self) -> Result<Vec<QueueInfo>, BusError> {
        let mut urls = Vec::new();
        let mut token = None;

        loop {
            let output = self
                .client
                .list_queues()
                .set_next_token(token)
                .send()
                .await
                .map_err(|e| BusError::service("list queues", DisplayErrorContext(&e)))?;

            if let Some(mut list) = output.queue_urls {
                urls.append(&mut list);
            }

            let Some(next) = output.next_token else {
                break;
            };
            token = Some(next);
        }

        log::debug!("listed {} queues", urls.len());

        Ok(urls
            .iter()
            .map(|url| QueueInfo::new(queue_name(url)))
            .collect())
    }

    async fn create_queue(&self, name: &str) -> Result<QueueInfo, BusError> {
        let output = self
            .client
            .create_queue()
            .queue_name(name)
            .send()
            .await
            .map_err(|e| BusError::service("create queue", DisplayErrorContext(&e)))?;

        log::debug!("created queue {:?}", output.queue_url);

        let name = output
            .queue_url
            .as_deref()
            .map(queue_name)
            .unwrap_or(name);
        Ok(QueueInfo::new(name))
    }

    async fn send_message(&self, queue: &str, message: BrokeredMessage) -> Result<(), BusError> {
        let url = self.queue_url(queue).await?;

        let output = self
            .client
            .send_message()
            .queue_url(url)
            .message_body(message.body)
            .send()
            .await
            .map_err(|e| BusError::service("send message", DisplayErrorContext(&e)))?;

        log::debug!("sent message {:?} to {queue}", output.message_id);
        Ok(())
    }

    async fn receive_message(
        &self,
        queue: &str,
        mode: ReceiveMode,
    ) -> Result<Option<BrokeredMessage>, BusError> {
        let url = self.queue_url(queue).await?;
        let output = receive(
            &self.client,
            &url,
            self.visibility_timeout,
            self.wait_time_seconds,
        )
        .await?;

        let Some(message) = output.messages.and_then(|m| m.into_iter().next()) else {
            return Ok(None);
        };

        let message = BrokeredMessage {
            message_id: message.message_id,
            lock_token: message.receipt_handle,
            body: message.body.unwrap_or_default(),
        };

        if mode == ReceiveMode::ReceiveAndDelete {
            self.delete_message(queue, &message).await?;
            return Ok(Some(BrokeredMessage {
                lock_token: None,
                ..message
            }));
        }

        Ok(Some(message))
    }

    async fn delete_message(&self, queue: &str, message: &BrokeredMessage) -> Result<(), BusError> {
        let receipt_handle = message
            .lock_token
            .as_deref()
            .ok_or(BusError::MissingLockToken)?;
        let url = self.queue_url(queue).await?;

        self.client
            .delete_message()
            .queue_url(url)
            .receipt_handle(receipt_handle)
            .send()
            .await
            .map_err(|e| BusError::service("delete message", DisplayErrorContext(&e)))?;

        Ok(())
    }
}
