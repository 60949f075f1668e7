use http::StatusCode;
use std::fmt;
use thiserror::Error;

use crate::types::ItemId;

/// Which configured duration bound of a test definition failed to parse.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DurationBound {
    Min,
    Max,
}

impl fmt::Display for DurationBound {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DurationBound::Min => f.write_str("minimum"),
            DurationBound::Max => f.write_str("maximum"),
        }
    }
}

/// Failure reported by a lookup service (content store, search index,
/// estimator, performance service). "Not found" is never an error; it is an
/// `Ok(None)` from the collaborator.
#[derive(Error, Debug, Clone, PartialEq)]
#[error("{service} lookup failed: {message}")]
pub struct CollaboratorError {
    pub service: String,
    pub message: String,
}

impl CollaboratorError {
    pub fn new(service: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            service: service.into(),
            message: message.into(),
        }
    }
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum ListingError {
    #[error("Failed to add {description}: test {test_id} is already registered")]
    DuplicateTestId { test_id: ItemId, description: String },

    #[error("Malformed {bound} duration bound: {value:?} is not an integer")]
    MalformedDurationBound { bound: DurationBound, value: String },

    #[error(transparent)]
    Collaborator(#[from] CollaboratorError),

    #[error("Invalid item uri: {0}")]
    InvalidItemUri(String),

    #[error("Invalid request: {0}")]
    InvalidRequest(String),
}

pub type Result<T> = std::result::Result<T, ListingError>;

impl ListingError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            ListingError::DuplicateTestId { .. } => StatusCode::INTERNAL_SERVER_ERROR,
            ListingError::MalformedDurationBound { .. } => StatusCode::INTERNAL_SERVER_ERROR,
            ListingError::Collaborator(_) => StatusCode::SERVICE_UNAVAILABLE,
            ListingError::InvalidItemUri(_) => StatusCode::BAD_REQUEST,
            ListingError::InvalidRequest(_) => StatusCode::BAD_REQUEST,
        }
    }
}
