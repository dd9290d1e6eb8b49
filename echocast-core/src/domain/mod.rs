//! Core domain types
//!
//! This module contains the core domain structures used across EchoCast
//! services. These types represent the fundamental business entities and are
//! shared between the server (which creates and reads them) and the worker
//! (which drives them through the pipeline).

pub mod episode;
pub mod job;
