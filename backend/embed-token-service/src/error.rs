use actix_web::http::{header::ContentType, StatusCode};
use actix_web::{HttpResponse, ResponseError};
use std::time::Duration;
use thiserror::Error;

use crate::services::pipeline::UpstreamCall;

/// Body returned for every failure other than caller validation.
pub const GENERIC_FAILURE_MESSAGE: &str = "Failed to generate Power BI embed token.";

/// Body returned when a deployment requires `userId` and none was supplied.
pub const MISSING_USER_ID_MESSAGE: &str = "Please pass a userId on the query string.";

pub type Result<T> = std::result::Result<T, EmbedError>;

#[derive(Debug, Error)]
pub enum EmbedError {
    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Invalid configuration: {0}")]
    InvalidConfiguration(String),

    #[error("Authentication failed: {0}")]
    Auth(String),

    #[error("Report not found: {0}")]
    ReportNotFound(String),

    #[error("Upstream error: {0}")]
    Upstream(String),

    #[error("Token generation failed: {0}")]
    TokenGeneration(String),

    #[error("{call} timed out after {after:?}")]
    Timeout { call: UpstreamCall, after: Duration },

    #[error("Request cancelled during {0}")]
    Cancelled(UpstreamCall),
}

impl EmbedError {
    /// Stable label used for metrics and structured logs.
    pub fn kind(&self) -> &'static str {
        match self {
            EmbedError::Validation(_) => "validation_failure",
            EmbedError::InvalidConfiguration(_) => "invalid_configuration",
            EmbedError::Auth(_) => "auth_failure",
            EmbedError::ReportNotFound(_) => "report_not_found",
            EmbedError::Upstream(_) => "upstream_failure",
            EmbedError::TokenGeneration(_) => "token_generation_failure",
            EmbedError::Timeout { .. } => "timeout",
            EmbedError::Cancelled(_) => "cancelled",
        }
    }
}

impl ResponseError for EmbedError {
    fn status_code(&self) -> StatusCode {
        match self {
            EmbedError::Validation(_) => StatusCode::BAD_REQUEST,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    // Only validation messages are caller-facing.
    fn error_response(&self) -> HttpResponse {
        let body = match self {
            EmbedError::Validation(msg) => msg.clone(),
            _ => GENERIC_FAILURE_MESSAGE.to_string(),
        };

        HttpResponse::build(self.status_code())
            .content_type(ContentType::plaintext())
            .body(body)
    }
}
