//! # busq-core
//!
//! Core library for the queue workflow service.
//!
//! This crate provides a [`MessageBus`] abstraction over a managed message
//! queue, an AWS SQS implementation of it, an in-memory implementation, and
//! the [`QueueWorkflow`] that ensures a queue exists, publishes a message and
//! drains the queue.
//!
//! ## Features
//!
//! - **Queue Operations**: list and create queues
//! - **Peek-lock Receive**: receive messages and delete them once read
//! - **Status Report**: every workflow step recorded as a report line
//!
//! ## Example
//!
//! ```no_run
//! use busq::{QueueWorkflow, SqsBus, WorkflowSettings};
//! use std::sync::Arc;
//!
//! # async fn example() {
//! let config = aws_config::from_env().load().await;
//! let bus = SqsBus::from_config(config);
//!
//! let workflow = QueueWorkflow::new(Arc::new(bus), WorkflowSettings::default());
//! println!("{}", workflow.run().await);
//! # }
//! ```

mod bus;
mod memory;
mod report;
mod sqs;
mod workflow;

#[cfg(test)]
mod test_utils;

pub use bus::*;
pub use memory::{InMemoryBus, Operation, DEFAULT_LOCK_DURATION};
pub use report::{Report, HTML_BREAK};
pub use sqs::*;
pub use workflow::*;
