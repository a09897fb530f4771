//! Domain error types.

use thiserror::Error;

use crate::models::RequestStatus;

/// Failures reported by storage and cache collaborators.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum StoreError {
    /// The record changed since it was read (optimistic concurrency).
    #[error("record was modified concurrently")]
    VersionConflict,

    #[error("record not found")]
    NotFound,

    /// Connection or pool failure; safe to retry.
    #[error("store unavailable: {0}")]
    Unavailable(String),

    #[error("database error: {0}")]
    Database(String),
}

impl StoreError {
    /// Whether a single synchronous retry is worthwhile.
    pub fn is_transient(&self) -> bool {
        matches!(self, StoreError::Unavailable(_))
    }
}

#[derive(Debug, Error)]
pub enum DomainError {
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Invalid transition from {from} to {to}")]
    InvalidTransition {
        from: RequestStatus,
        to: RequestStatus,
    },

    /// Another technician already holds the job.
    #[error("Assignment conflict: {0}")]
    AssignmentConflict(String),

    #[error("Technician unavailable: {0}")]
    TechnicianUnavailable(String),

    #[error(transparent)]
    Store(#[from] StoreError),
}

impl DomainError {
    pub fn emergency_not_found(id: uuid::Uuid) -> Self {
        DomainError::NotFound(format!("emergency {id}"))
    }

    pub fn technician_not_found(id: uuid::Uuid) -> Self {
        DomainError::NotFound(format!("technician {id}"))
    }
}

impl From<validator::ValidationErrors> for DomainError {
    fn from(errors: validator::ValidationErrors) -> Self {
        let mut messages: Vec<String> = errors
            .field_errors()
            .iter()
            .flat_map(|(field, errs)| {
                errs.iter().map(move |e| match &e.message {
                    Some(message) => format!("{field}: {message}"),
                    None => format!("{field}: {}", e.code),
                })
            })
            .collect();
        if messages.is_empty() {
            // Only nested structs failed; their Display carries the paths.
            return DomainError::InvalidRequest(errors.to_string());
        }
        messages.sort();
        DomainError::InvalidRequest(messages.join(", "))
    }
}
