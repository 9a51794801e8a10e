//! S3-compatible object storage client.
//!
//! Path-style addressing against a configurable endpoint, multipart upload
//! for large media files, and the pipeline's bucket set.

pub mod client;
pub mod error;

pub use client::{Buckets, ObjectStore, StorageConfig};
pub use error::{StorageError, StorageResult};
