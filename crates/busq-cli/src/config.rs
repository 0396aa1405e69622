//! Command-line and environment configuration for the bus and the workflow.

use aws_config::{meta::region::RegionProviderChain, BehaviorVersion, Region, SdkConfig};
use busq::{
    InMemoryBus, MessageBus, SqsBus, WorkflowSettings, DEFAULT_MESSAGE_BODY, DEFAULT_QUEUE_NAME,
};
use std::sync::Arc;
use std::time::Duration;

/// Endpoint used by `--local` when `--endpoint` is not given.
pub const LOCALSTACK_ENDPOINT: &str = "http://localhost:4566";

#[derive(Clone, Copy, Debug, PartialEq, Eq, clap::ValueEnum)]
pub enum Backend {
    /// Amazon SQS, or LocalStack with `--local`
    Sqs,
    /// Process-local queues, lost on exit
    Memory,
}

#[derive(Debug, clap::Args)]
pub struct BusArgs {
    /// Message bus implementation
    #[arg(long, value_enum, default_value_t = Backend::Sqs, env = "BUSQ_BACKEND")]
    pub backend: Backend,

    /// Use LocalStack credentials and endpoint
    #[arg(long, action)]
    pub local: bool,

    /// Override the SQS endpoint URL
    #[arg(long)]
    pub endpoint: Option<String>,

    /// AWS region; falls back to the default provider chain, then us-east-1
    #[arg(long)]
    pub region: Option<String>,

    /// Queue to ensure, publish to and drain
    #[arg(long, default_value = DEFAULT_QUEUE_NAME, env = "BUSQ_QUEUE_NAME")]
    pub queue_name: String,

    /// Body of the message published on each run
    #[arg(long, default_value = DEFAULT_MESSAGE_BODY, env = "BUSQ_MESSAGE")]
    pub message: String,

    /// Stop draining after this many messages
    #[arg(long, env = "BUSQ_MAX_MESSAGES")]
    pub max_messages: Option<usize>,

    /// Seconds a received message stays locked; 0 on the memory backend
    /// holds the lock until the message is deleted
    #[arg(long, value_parser = clap::value_parser!(i32).range(0..=43200))]
    pub visibility_timeout: Option<i32>,

    /// Seconds each SQS receive long-polls before answering empty
    #[arg(long, value_parser = clap::value_parser!(i32).range(0..=20))]
    pub wait_time: Option<i32>,
}

impl BusArgs {
    pub fn settings(&self) -> WorkflowSettings {
        WorkflowSettings {
            queue_name: self.queue_name.clone(),
            message_body: self.message.clone(),
            max_messages: self.max_messages,
        }
    }

    pub async fn bus(&self) -> Arc<dyn MessageBus> {
        match self.backend {
            Backend::Sqs => {
                let bus = SqsBus::from_config(self.aws_config().await)
                    .with_visibility_timeout(self.visibility_timeout)
                    .with_wait_time(self.wait_time);
                Arc::new(bus)
            }
            Backend::Memory => {
                let bus = match self.visibility_timeout {
                    // the parser keeps seconds within 0..=43200
                    Some(seconds) => InMemoryBus::with_lock_duration(Duration::from_secs(
                        seconds.unsigned_abs().into(),
                    )),
                    None => InMemoryBus::new(),
                };
                Arc::new(bus)
            }
        }
    }

    async fn aws_config(&self) -> SdkConfig {
        // supports loading region from known env variables
        let region = RegionProviderChain::first_try(self.region.clone().map(Region::new))
            .or_default_provider()
            .or_else(Region::from_static("us-east-1"));

        let mut loader = aws_config::defaults(BehaviorVersion::latest()).region(region);

        if self.local {
            loader = loader
                .credentials_provider(aws_sdk_sqs::config::Credentials::new(
                    "test", "test", None, None, "static",
                ))
                .endpoint_url(self.endpoint.as_deref().unwrap_or(LOCALSTACK_ENDPOINT));
        } else if let Some(endpoint) = &self.endpoint {
            loader = loader.endpoint_url(endpoint);
        }

        loader.load().await
    }
}
