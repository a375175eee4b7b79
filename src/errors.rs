//! Unified error type for the marketplace.
//!
//! Every core operation returns [`Result`]. The web layer turns an [`Error`]
//! into an HTTP status plus an `{ "error": string }` body, see
//! [`crate::web::response`].

use thiserror::Error;

/// All failures the marketplace can surface to a caller.
#[derive(Debug, Error)]
pub enum Error {
    /// Configuration could not be read or parsed
    #[error("Configuration error: {message}")]
    Config {
        /// What went wrong
        message: String,
    },

    /// Input failed validation (empty name, bad email, rating out of range, ...)
    #[error("{message}")]
    Validation {
        /// Human-readable reason shown to the user
        message: String,
    },

    /// A record does not exist or is soft-deleted
    #[error("{entity} not found: {key}")]
    NotFound {
        /// Entity kind, e.g. `"Product"`
        entity: &'static str,
        /// Identifier that was looked up
        key: String,
    },

    /// The caller is not signed in, or the credentials are wrong
    #[error("{message}")]
    Unauthorized {
        /// Reason
        message: String,
    },

    /// The caller is signed in but may not perform the action
    #[error("You do not have permission to do that")]
    Forbidden,

    /// A uniqueness rule would be broken
    #[error("{message}")]
    Conflict {
        /// Reason
        message: String,
    },

    /// An order cannot move between the given states
    #[error("Cannot change order status from {from} to {to}")]
    InvalidTransition {
        /// Current status
        from: String,
        /// Requested status
        to: String,
    },

    /// The payment provider rejected a request or the payment is incomplete
    #[error("Payment error: {message}")]
    Payment {
        /// Reason
        message: String,
    },

    /// The upload service rejected a file
    #[error("Upload error: {message}")]
    Upload {
        /// Reason
        message: String,
    },

    /// Invoice PDF could not be rendered
    #[error("Invoice rendering failed: {message}")]
    Pdf {
        /// Reason
        message: String,
    },

    /// Database error from `SeaORM`
    #[error("Database error: {0}")]
    Database(String),

    /// Outbound HTTP call failed
    #[error("HTTP client error: {0}")]
    Http(#[from] reqwest::Error),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Integer conversion failed
    #[error("Number conversion error: {0}")]
    TryFromInt(#[from] std::num::TryFromIntError),
}

impl Error {
    /// Shorthand for a [`Error::Validation`] error.
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation {
            message: message.into(),
        }
    }

    /// Shorthand for a [`Error::NotFound`] error.
    pub fn not_found(entity: &'static str, key: impl ToString) -> Self {
        Self::NotFound {
            entity,
            key: key.to_string(),
        }
    }

    /// Shorthand for a [`Error::Unauthorized`] error.
    pub fn unauthorized(message: impl Into<String>) -> Self {
        Self::Unauthorized {
            message: message.into(),
        }
    }
}

impl From<sea_orm::DbErr> for Error {
    fn from(err: sea_orm::DbErr) -> Self {
        Self::Database(err.to_string())
    }
}

/// Convenience `Result` type
pub type Result<T> = std::result::Result<T, Error>;
