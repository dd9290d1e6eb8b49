//! EchoCast Core
//!
//! Core types and abstractions for the EchoCast podcast pipeline.
//!
//! This crate contains:
//! - Domain types: Core business entities (JobRequest, JobRecord, Episode)
//! - DTOs: Data transfer objects for the HTTP surface
//! - Errors: The stage error taxonomy shared by worker and server

pub mod domain;
pub mod dto;
pub mod error;
