//! Gateway error types and their HTTP responses.

use axum::{
    Json,
    http::{HeaderValue, StatusCode, header},
    response::{IntoResponse, Response},
};
use serde::Serialize;
use thiserror::Error;

/// Everything a request can fail with.
///
/// Upstream variants keep their detail for the server log; clients only
/// ever see [`GatewayError::public_message`].
#[derive(Debug, Error)]
pub enum GatewayError {
    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("inference output unreadable: {0}")]
    UpstreamFormat(String),

    #[error("{service} call failed: {detail}")]
    UpstreamCall { service: Upstream, detail: String },

    #[error("speech synthesis timed out")]
    Timeout,

    #[error("rate limit exceeded, retry in {retry_after} seconds")]
    RateLimited { retry_after: u64 },

    #[error("origin not allowed")]
    Forbidden,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Upstream {
    Inference,
    Speech,
}

impl std::fmt::Display for Upstream {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Upstream::Inference => f.write_str("inference"),
            Upstream::Speech => f.write_str("speech"),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
}

impl GatewayError {
    pub fn inference(detail: impl Into<String>) -> Self {
        GatewayError::UpstreamCall {
            service: Upstream::Inference,
            detail: detail.into(),
        }
    }

    pub fn speech(detail: impl Into<String>) -> Self {
        GatewayError::UpstreamCall {
            service: Upstream::Speech,
            detail: detail.into(),
        }
    }

    pub fn status_code(&self) -> StatusCode {
        match self {
            GatewayError::InvalidInput(_) => StatusCode::BAD_REQUEST,
            GatewayError::UpstreamFormat(_) => StatusCode::INTERNAL_SERVER_ERROR,
            GatewayError::UpstreamCall { .. } => StatusCode::INTERNAL_SERVER_ERROR,
            GatewayError::Timeout => StatusCode::GATEWAY_TIMEOUT,
            GatewayError::RateLimited { .. } => StatusCode::TOO_MANY_REQUESTS,
            GatewayError::Forbidden => StatusCode::FORBIDDEN,
        }
    }

    /// Message safe to hand back to the caller.
    pub fn public_message(&self) -> String {
        match self {
            GatewayError::InvalidInput(msg) => msg.clone(),
            GatewayError::UpstreamFormat(_) => "Failed to analyze name".to_string(),
            GatewayError::UpstreamCall {
                service: Upstream::Inference,
                ..
            } => "Failed to analyze name".to_string(),
            GatewayError::UpstreamCall {
                service: Upstream::Speech,
                ..
            } => "Failed to generate audio".to_string(),
            GatewayError::Timeout => "Audio generation timed out".to_string(),
            GatewayError::RateLimited { .. } => {
                "Too many requests, please try again later".to_string()
            }
            GatewayError::Forbidden => "Forbidden".to_string(),
        }
    }
}

impl IntoResponse for GatewayError {
    fn into_response(self) -> Response {
        match &self {
            GatewayError::UpstreamFormat(_) | GatewayError::UpstreamCall { .. } => {
                tracing::error!(error = %self, "upstream failure");
            }
            GatewayError::Timeout => tracing::warn!("speech synthesis exceeded its deadline"),
            _ => tracing::debug!(error = %self, "request rejected"),
        }

        let status = self.status_code();
        let body = ErrorResponse {
            error: self.public_message(),
        };
        let mut response = (status, Json(body)).into_response();

        if let GatewayError::RateLimited { retry_after } = &self {
            let headers = response.headers_mut();
            headers.insert(header::RETRY_AFTER, HeaderValue::from(*retry_after));
            headers.insert("x-ratelimit-remaining", HeaderValue::from_static("0"));
        }

        response
    }
}

/// Result type alias for gateway operations.
pub type GatewayResult<T> = Result<T, GatewayError>;
