// SPDX-FileCopyrightText: 2026 Aina Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Mapping from [`AinaError`] to HTTP responses.

use aina_core::AinaError;
use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Serialize;

/// JSON error body: `{"error": "...", "code": "..."}`.
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
    pub code: &'static str,
}

/// Handler error wrapping the domain error.
#[derive(Debug)]
pub struct ApiError(pub AinaError);

pub type ApiResult<T> = Result<T, ApiError>;

impl From<AinaError> for ApiError {
    fn from(err: AinaError) -> Self {
        Self(err)
    }
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match &self.0 {
            AinaError::InsufficientCredit { .. } => StatusCode::PAYMENT_REQUIRED,
            AinaError::TenantSuspended { .. }
            | AinaError::TenantMismatch { .. }
            | AinaError::Forbidden(_) => StatusCode::FORBIDDEN,
            AinaError::SessionWindowClosed { .. } => StatusCode::CONFLICT,
            AinaError::NotFound { .. } => StatusCode::NOT_FOUND,
            AinaError::Validation(_)
            | AinaError::InvalidAmount(_)
            | AinaError::InvalidAutomationRule(_) => StatusCode::UNPROCESSABLE_ENTITY,
            AinaError::ProviderDispatchFailed { .. } => StatusCode::BAD_GATEWAY,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let error = if status == StatusCode::INTERNAL_SERVER_ERROR {
            tracing::error!(error = %self.0, code = self.0.code(), "request failed");
            "internal error".to_string()
        } else {
            self.0.to_string()
        };
        let body = ErrorResponse {
            error,
            code: self.0.code(),
        };
        (status, Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use aina_core::Credits;

    #[test]
    fn domain_errors_map_to_statuses() {
        let cases = [
            (
                AinaError::InsufficientCredit {
                    balance: Credits::ZERO,
                    required: Credits::whole(1),
                },
                StatusCode::PAYMENT_REQUIRED,
            ),
            (
                AinaError::TenantSuspended {
                    tenant_id: "acme".into(),
                },
                StatusCode::FORBIDDEN,
            ),
            (
                AinaError::SessionWindowClosed {
                    conversation_id: "c-1".into(),
                },
                StatusCode::CONFLICT,
            ),
            (AinaError::not_found("conversation", "c-1"), StatusCode::NOT_FOUND),
            (
                AinaError::InvalidAutomationRule("no keywords".into()),
                StatusCode::UNPROCESSABLE_ENTITY,
            ),
            (
                AinaError::ProviderDispatchFailed {
                    message: "down".into(),
                    retryable: true,
                },
                StatusCode::BAD_GATEWAY,
            ),
            (AinaError::Internal("boom".into()), StatusCode::INTERNAL_SERVER_ERROR),
        ];
        for (err, status) in cases {
            assert_eq!(ApiError(err).status(), status);
        }
    }

    #[test]
    fn internal_errors_are_not_leaked() {
        let response = ApiError(AinaError::Internal("db path /secret".into())).into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }
}
