//! Durable work queues over Redis Streams.
//!
//! This crate provides:
//! - Named queues (`download`, `analysis`, `extraction`, reserved `upload`)
//! - At-least-once delivery via consumer groups
//! - Per-task attempt counters with exponential backoff redelivery
//! - Bounded dead-letter and completion rings
//! - Stale-message claiming for crash recovery

pub mod error;
pub mod queue;
pub mod task;

pub use error::{QueueError, QueueResult};
pub use queue::{JobQueue, QueueConfig};
pub use task::{
    AnalysisTask, DownloadTask, ExtractionTask, QueueName, QueueTask, RetryPolicy,
};
