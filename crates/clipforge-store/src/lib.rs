//! Relational job store over Postgres.
//!
//! Typed CRUD on Jobs, Videos, Segments, and Clips, plus the aggregation
//! queries and the idempotent job-completion read-modify-write that the
//! extraction workers race on.

pub mod error;
pub mod rows;
pub mod store;

pub use error::{StoreError, StoreResult};
pub use store::JobStore;
