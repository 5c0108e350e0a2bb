//! Maps domain errors onto HTTP responses.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;
use utoipa::ToSchema;

use crate::domain::DomainError;

/// Error body returned by every endpoint: `{"error": {"code": .., "message": ..}}`.
#[derive(Debug, Serialize, ToSchema)]
pub struct ErrorBody {
    pub error: ErrorDetail,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct ErrorDetail {
    /// Stable machine-readable code, e.g. `STORE_MISMATCH`
    pub code: String,
    pub message: String,
    /// Offending input field for validation errors
    #[serde(skip_serializing_if = "Option::is_none")]
    pub field: Option<String>,
}

#[derive(Debug)]
pub struct ApiError(pub DomainError);

impl From<DomainError> for ApiError {
    fn from(e: DomainError) -> Self {
        ApiError(e)
    }
}

impl ApiError {
    pub fn status_code(&self) -> StatusCode {
        match &self.0 {
            DomainError::Validation { .. } => StatusCode::BAD_REQUEST,
            DomainError::InvalidState { .. } => StatusCode::CONFLICT,
            DomainError::Authorization { .. } => StatusCode::FORBIDDEN,
            DomainError::StoreMismatch { .. } | DomainError::NoOpenBorrow { .. } => {
                StatusCode::UNPROCESSABLE_ENTITY
            }
            DomainError::NotFound { .. } => StatusCode::NOT_FOUND,
            DomainError::Persistence(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        match &self.0 {
            DomainError::Persistence(_) => tracing::error!("Internal service error: {}", self.0),
            DomainError::Authorization { .. } => tracing::info!("Authorization error: {}", self.0),
            _ => tracing::debug!("Client error: {}", self.0),
        }

        let field = match &self.0 {
            DomainError::Validation { field, .. } => Some(field.to_string()),
            _ => None,
        };
        let body = ErrorBody {
            error: ErrorDetail {
                code: self.0.code().to_string(),
                message: self.0.to_string(),
                field,
            },
        };

        (self.status_code(), Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn store_consistency_errors_are_unprocessable() {
        let err = ApiError(DomainError::NoOpenBorrow {
            item_id: 1,
            requester_id: 2,
        });
        assert_eq!(err.status_code(), StatusCode::UNPROCESSABLE_ENTITY);
    }

    #[test]
    fn lost_races_are_conflicts() {
        let err = ApiError(DomainError::InvalidState {
            entity: "transaction",
            id: 1,
            state: "Approved".into(),
            action: "approve",
        });
        assert_eq!(err.status_code(), StatusCode::CONFLICT);
    }
}
