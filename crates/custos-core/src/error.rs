//! Error types for the CUSTOS system.

use thiserror::Error;

/// Classification of an error, usable for HTTP-style status mapping by a
/// transport layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    BadRequest,
    Forbidden,
    NotFound,
    Conflict,
    Internal,
}

impl ErrorKind {
    /// Suggested HTTP status code for this classification.
    pub fn status_hint(self) -> u16 {
        match self {
            ErrorKind::BadRequest => 400,
            ErrorKind::Forbidden => 403,
            ErrorKind::NotFound => 404,
            ErrorKind::Conflict => 409,
            ErrorKind::Internal => 500,
        }
    }
}

/// Workflow-facing error.
///
/// The `Display` form is the diagnostic (system) message; a message safe
/// to show to an end user is available via [`CustosError::user_message`].
#[derive(Debug, Error)]
pub enum CustosError {
    #[error("Bad request: {message}")]
    BadRequest { message: String },

    #[error("Permission denied: {message}")]
    Forbidden { message: String },

    #[error("Entity not found: {entity} with id {id}")]
    NotFound { entity: String, id: String },

    #[error("Conflict: {message}")]
    Conflict { message: String },

    #[error("Internal error: {message}")]
    Internal { message: String },

    #[error("Database error: {0}")]
    Database(String),
}

impl CustosError {
    pub fn bad_request(message: impl Into<String>) -> Self {
        CustosError::BadRequest {
            message: message.into(),
        }
    }

    pub fn forbidden(message: impl Into<String>) -> Self {
        CustosError::Forbidden {
            message: message.into(),
        }
    }

    pub fn not_found(entity: impl Into<String>, id: impl ToString) -> Self {
        CustosError::NotFound {
            entity: entity.into(),
            id: id.to_string(),
        }
    }

    pub fn conflict(message: impl Into<String>) -> Self {
        CustosError::Conflict {
            message: message.into(),
        }
    }

    pub fn internal(message: impl Into<String>) -> Self {
        CustosError::Internal {
            message: message.into(),
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            CustosError::BadRequest { .. } => ErrorKind::BadRequest,
            CustosError::Forbidden { .. } => ErrorKind::Forbidden,
            CustosError::NotFound { .. } => ErrorKind::NotFound,
            CustosError::Conflict { .. } => ErrorKind::Conflict,
            CustosError::Internal { .. } | CustosError::Database(_) => ErrorKind::Internal,
        }
    }

    /// Message safe to display to an end user. Collaborator and storage
    /// details stay out of it.
    pub fn user_message(&self) -> String {
        match self {
            CustosError::BadRequest { message } | CustosError::Conflict { message } => {
                message.clone()
            }
            CustosError::Forbidden { .. } => {
                "You do not have permission to perform this action".into()
            }
            CustosError::NotFound { entity, .. } => {
                format!("The requested {entity} was not found")
            }
            CustosError::Internal { .. } | CustosError::Database(_) => {
                "An unexpected error occurred".into()
            }
        }
    }
}

pub type CustosResult<T> = Result<T, CustosError>;
