//! # AppError
//!
//! Centralized error handling for Pet Adopter.
//! Plugins map their own failures into these kinds; the API maps them to status codes.

use thiserror::Error;

/// The primary error type for all pa-core operations.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum AppError {
    /// Resource not found (e.g., Ad, Breed, User)
    #[error("{0} not found with ID {1}")]
    NotFound(String, String),

    /// Mutation attempted by someone other than the ad's owner
    #[error("not owner")]
    NotOwner,

    /// A referenced row does not exist (foreign-key violation)
    #[error("invalid reference: {0}")]
    InvalidReference(String),

    /// Malformed input (e.g., bad query parameter, unsupported photo format)
    #[error("validation error: {0}")]
    ValidationError(String),

    /// Missing or bad credentials
    #[error("unauthorized: {0}")]
    Unauthorized(String),

    /// Authenticated but not allowed (e.g., admin-only endpoint)
    #[error("forbidden: {0}")]
    Forbidden(String),

    /// Resource already exists (e.g., duplicate username)
    #[error("conflict: {0}")]
    Conflict(String),

    /// Infrastructure failure (e.g., DB down, disk full)
    #[error("internal service error: {0}")]
    Internal(String),
}

impl AppError {
    pub fn not_found(entity: &str, id: impl ToString) -> Self {
        AppError::NotFound(entity.to_string(), id.to_string())
    }

    pub fn internal(err: impl std::fmt::Display) -> Self {
        AppError::Internal(err.to_string())
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, AppError::NotFound(..))
    }
}

/// A specialized Result type for Pet Adopter logic.
pub type Result<T> = std::result::Result<T, AppError>;
