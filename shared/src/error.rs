//! Errors raised by pure domain logic

use chrono::NaiveDate;
use thiserror::Error;

/// Domain rule violations, independent of storage or transport
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum DomainError {
    #[error("no {grade} price configured for {crop} on or before {date}")]
    MissingPrice {
        crop: String,
        grade: String,
        date: NaiveDate,
    },

    #[error("cannot {action} a {entity} that is {from}")]
    InvalidTransition {
        entity: &'static str,
        from: String,
        action: &'static str,
    },

    #[error("{field}: {message}")]
    Invalid {
        field: &'static str,
        message: String,
    },
}

impl DomainError {
    pub fn invalid(field: &'static str, message: impl Into<String>) -> Self {
        DomainError::Invalid {
            field,
            message: message.into(),
        }
    }
}
