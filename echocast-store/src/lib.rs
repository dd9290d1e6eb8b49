//! EchoCast Store
//!
//! Disk-backed persistence for the job pipeline:
//! - Durable queue: one JSON file per pending request, strict FIFO
//! - Cross-process lock: exclusive-create marker with staleness reclaim
//! - Job record store: one atomic JSON document per job id
//! - Episode store and retention: bounded retained audio artifacts
//!
//! Everything here is plain-file based so that the worker (invoked
//! periodically) and the always-on HTTP server can share state without a
//! database. All multi-byte writes go through write-to-temp-then-rename so
//! a concurrent reader never observes a half-written document.

pub mod episodes;
pub mod error;
pub mod lock;
pub mod queue;
pub mod records;
pub mod retention;

mod atomic;

pub use error::StoreError;
