//! Maps [`Error`] onto HTTP statuses and a `{"error": ...}` JSON body.

use crate::errors::Error;
use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::json;
use tracing::error;

const INTERNAL_MESSAGE: &str = "Something went wrong, please try again later";

impl Error {
    /// HTTP status reported for this error
    #[must_use]
    pub const fn status_code(&self) -> StatusCode {
        match self {
            Self::Validation { .. } => StatusCode::BAD_REQUEST,
            Self::NotFound { .. } => StatusCode::NOT_FOUND,
            Self::Unauthorized { .. } => StatusCode::UNAUTHORIZED,
            Self::Forbidden => StatusCode::FORBIDDEN,
            Self::Conflict { .. } | Self::InvalidTransition { .. } => StatusCode::CONFLICT,
            Self::Payment { .. } | Self::Upload { .. } | Self::Http(_) => StatusCode::BAD_GATEWAY,
            Self::Config { .. }
            | Self::Pdf { .. }
            | Self::Database(_)
            | Self::Io(_)
            | Self::TryFromInt(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Message safe to show to the client. Internal failures are replaced by
    /// a generic text.
    #[must_use]
    pub fn public_message(&self) -> String {
        match self {
            Self::Http(_)
            | Self::Config { .. }
            | Self::Pdf { .. }
            | Self::Database(_)
            | Self::Io(_)
            | Self::TryFromInt(_) => INTERNAL_MESSAGE.to_string(),
            other => other.to_string(),
        }
    }
}

impl IntoResponse for Error {
    fn into_response(self) -> Response {
        let status = self.status_code();
        if status.is_server_error() {
            error!(error = %self, %status, "Request failed");
        }
        (status, Json(json!({ "error": self.public_message() }))).into_response()
    }
}
