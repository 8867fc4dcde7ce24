//! Domain error model.
//!
//! These are the typed outcomes every core operation reports at its boundary.
//! "Expected" results such as a badge that was already admitted or a sale that
//! would oversell are values here, not faults; each carries enough detail for
//! the caller to render an unambiguous message (who admitted the badge, how
//! much stock or credit remains). Infrastructure faults belong elsewhere.

use chrono::{DateTime, Utc};
use thiserror::Error;

use crate::id::StaffId;

/// Result type used across the domain layer.
pub type DomainResult<T> = Result<T, DomainError>;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DomainError {
    /// A value failed validation (e.g. malformed or empty input).
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// A requested attendee/product was not found (domain-level).
    #[error("not found")]
    NotFound,

    /// The attendee was already admitted; carries the winning admission so the
    /// caller can display who admitted them and when.
    #[error("already admitted by {admitted_by} at {admitted_at}")]
    AlreadyAdmitted {
        admitted_by: StaffId,
        admitted_at: DateTime<Utc>,
    },

    /// The attendee has not been admitted to the event yet.
    #[error("attendee has not been admitted")]
    NotAdmitted,

    /// A stock exit/sale would leave the product below zero.
    #[error("insufficient stock (available: {available})")]
    InsufficientStock { available: i64 },

    /// A credit-paid sale exceeds the attendee's remaining credits.
    #[error("insufficient credits (available: {available})")]
    InsufficientCredit { available: i64 },

    /// A conflict occurred (e.g. stale version / optimistic concurrency).
    #[error("conflict: {0}")]
    Conflict(String),

    /// A domain invariant was violated.
    #[error("invariant violated: {0}")]
    InvariantViolation(String),
}

impl DomainError {
    pub fn invalid_input(msg: impl Into<String>) -> Self {
        Self::InvalidInput(msg.into())
    }

    pub fn conflict(msg: impl Into<String>) -> Self {
        Self::Conflict(msg.into())
    }

    pub fn invariant(msg: impl Into<String>) -> Self {
        Self::InvariantViolation(msg.into())
    }

    pub fn not_found() -> Self {
        Self::NotFound
    }
}
