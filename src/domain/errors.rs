//! Domain error types
//!
//! These errors are framework-agnostic and represent business-level failures.
//! Everything below the HTTP layer reports one of these kinds; the api layer maps
//! each kind to a status code and a stable error code.

use sea_orm::{DbErr, SqlErr};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum DomainError {
    /// Malformed input. Never retried.
    #[error("invalid {field}: {message}")]
    Validation {
        field: &'static str,
        message: String,
    },

    /// The requested transition is illegal from the current state, including the
    /// losing side of a concurrent transition. Re-fetch before retrying.
    #[error("{entity} {id} cannot {action} while {state}")]
    InvalidState {
        entity: &'static str,
        id: i32,
        state: String,
        action: &'static str,
    },

    /// Actor lacks the role or capability for the action
    #[error("user {actor_id} is not allowed to {action}")]
    Authorization { actor_id: i32, action: &'static str },

    /// Return targets a different store than the one the item was borrowed from
    #[error("item was borrowed from store {borrowed_from} and must be returned there, not to store {returned_to}")]
    StoreMismatch { borrowed_from: i32, returned_to: i32 },

    /// A return with no active borrow behind it
    #[error("user {requester_id} has no active borrow of item {item_id}")]
    NoOpenBorrow { item_id: i32, requester_id: i32 },

    /// Referenced transaction or delivery does not exist
    #[error("{resource} {id} not found")]
    NotFound { resource: &'static str, id: i32 },

    /// Storage failure during the primary write. Nothing was committed, safe to retry.
    #[error("persistence error: {0}")]
    Persistence(String),
}

impl DomainError {
    pub fn validation(field: &'static str, message: impl Into<String>) -> Self {
        DomainError::Validation {
            field,
            message: message.into(),
        }
    }

    /// Stable machine-readable code surfaced to API callers.
    pub fn code(&self) -> &'static str {
        match self {
            DomainError::Validation { .. } => "VALIDATION_ERROR",
            DomainError::InvalidState { .. } => "INVALID_STATE",
            DomainError::Authorization { .. } => "AUTHORIZATION_ERROR",
            DomainError::StoreMismatch { .. } => "STORE_MISMATCH",
            DomainError::NoOpenBorrow { .. } => "NO_OPEN_BORROW",
            DomainError::NotFound { .. } => "NOT_FOUND",
            DomainError::Persistence(_) => "PERSISTENCE_ERROR",
        }
    }
}

// Conversion from SeaORM errors (used in infrastructure layer)
impl From<DbErr> for DomainError {
    fn from(e: DbErr) -> Self {
        DomainError::Persistence(e.to_string())
    }
}

/// True when the database rejected a write on a unique index.
pub fn is_unique_violation(e: &DbErr) -> bool {
    matches!(e.sql_err(), Some(SqlErr::UniqueConstraintViolation(_)))
}
