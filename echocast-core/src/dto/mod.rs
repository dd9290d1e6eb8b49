//! Data Transfer Objects for the HTTP surface
//!
//! Lightweight representations of domain entities optimized for the
//! submission/status API.

pub mod job;
