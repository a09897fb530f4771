//! Domain layer for the Rescue Dispatch backend.
//!
//! This crate contains:
//! - Domain models (EmergencyRequest, Technician, SlaMetrics, pricing types)
//! - The request lifecycle state machine
//! - SLA, pricing and candidate scoring logic
//! - Collaborator traits for storage, location caching and notifications
//! - Domain error types

pub mod error;
pub mod models;
pub mod services;

pub use error::{DomainError, StoreError};
