use axum::{
    Json,
    extract::rejection::{JsonRejection, PathRejection, QueryRejection},
    http::{HeaderValue, StatusCode, header},
    response::{IntoResponse, Response},
};
use serde_json::json;
use thiserror::Error;

use crate::geocoding::GeocodeError;
use crate::media::MediaError;
use crate::models::{InvalidBoundingBox, ModerationStatus};

/// RepositoryError
///
/// Failures surfaced by the persistence layer. Constraint violations are classified so
/// handlers can answer with a 409 instead of a generic 500.
#[derive(Debug, Error)]
pub enum RepositoryError {
    #[error("{0} not found")]
    NotFound(&'static str),

    #[error("unique constraint violated: {0}")]
    Conflict(String),

    #[error("record is still referenced: {0}")]
    ForeignKey(String),

    #[error("edit request is already {0}")]
    AlreadyReviewed(ModerationStatus),

    #[error("database error: {0}")]
    Database(#[source] sqlx::Error),
}

impl From<sqlx::Error> for RepositoryError {
    fn from(err: sqlx::Error) -> Self {
        if let sqlx::Error::Database(db_err) = &err {
            let constraint = db_err.constraint().unwrap_or_default().to_string();
            match db_err.code().as_deref() {
                // unique_violation
                Some("23505") => return RepositoryError::Conflict(constraint),
                // foreign_key_violation
                Some("23503") => return RepositoryError::ForeignKey(constraint),
                _ => {}
            }
        }
        RepositoryError::Database(err)
    }
}

/// ApiError
///
/// The single error type returned by handlers and extractors. Every variant renders as
/// `{ "error": "<message>" }` with the matching status code.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ApiError {
    #[error("{0}")]
    Validation(String),

    #[error("authentication required")]
    Unauthorized,

    #[error("{0}")]
    NotFound(String),

    #[error("{0}")]
    Conflict(String),

    #[error("too many requests, retry in {0}s")]
    TooManyRequests(u64),

    #[error("upstream service unavailable")]
    Upstream(String),

    #[error("internal server error")]
    Internal(String),
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::Validation(_) => StatusCode::BAD_REQUEST,
            ApiError::Unauthorized => StatusCode::UNAUTHORIZED,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::Conflict(_) => StatusCode::CONFLICT,
            ApiError::TooManyRequests(_) => StatusCode::TOO_MANY_REQUESTS,
            ApiError::Upstream(_) => StatusCode::BAD_GATEWAY,
            ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    pub fn not_found(what: &str) -> Self {
        ApiError::NotFound(format!("{what} not found"))
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        // Causes of 5xx errors go to the logs only; the client sees the generic message.
        match &self {
            ApiError::Internal(cause) => tracing::error!(%cause, "request failed"),
            ApiError::Upstream(cause) => tracing::warn!(%cause, "upstream call failed"),
            _ => {}
        }

        let status = self.status();
        let mut response = (status, Json(json!({ "error": self.to_string() }))).into_response();
        if let ApiError::TooManyRequests(seconds) = self {
            response
                .headers_mut()
                .insert(header::RETRY_AFTER, HeaderValue::from(seconds));
        }
        response
    }
}

impl From<RepositoryError> for ApiError {
    fn from(err: RepositoryError) -> Self {
        match err {
            RepositoryError::NotFound(what) => ApiError::not_found(what),
            RepositoryError::Conflict(constraint) => {
                ApiError::Conflict(format!("duplicate value ({constraint})"))
            }
            RepositoryError::ForeignKey(constraint) => {
                ApiError::Conflict(format!("record is still referenced ({constraint})"))
            }
            RepositoryError::AlreadyReviewed(status) => {
                ApiError::Conflict(format!("edit request is already {status}"))
            }
            RepositoryError::Database(e) => ApiError::Internal(e.to_string()),
        }
    }
}

impl From<validator::ValidationErrors> for ApiError {
    fn from(errors: validator::ValidationErrors) -> Self {
        ApiError::Validation(errors.to_string())
    }
}

impl From<InvalidBoundingBox> for ApiError {
    fn from(err: InvalidBoundingBox) -> Self {
        ApiError::Validation(err.to_string())
    }
}

// Extractor rejections. axum's own messages are precise enough to return as-is.

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        ApiError::Validation(rejection.body_text())
    }
}

impl From<PathRejection> for ApiError {
    fn from(rejection: PathRejection) -> Self {
        ApiError::Validation(rejection.body_text())
    }
}

impl From<QueryRejection> for ApiError {
    fn from(rejection: QueryRejection) -> Self {
        ApiError::Validation(rejection.body_text())
    }
}

impl From<MediaError> for ApiError {
    fn from(err: MediaError) -> Self {
        match err {
            MediaError::InvalidFolder(_) => ApiError::Validation(err.to_string()),
            MediaError::Unavailable(cause) => ApiError::Upstream(cause),
        }
    }
}

impl From<GeocodeError> for ApiError {
    fn from(err: GeocodeError) -> Self {
        ApiError::Upstream(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_mapping() {
        assert_eq!(
            ApiError::Validation("x".into()).status(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(ApiError::Unauthorized.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(ApiError::TooManyRequests(3).status(), StatusCode::TOO_MANY_REQUESTS);
        assert_eq!(ApiError::Upstream("x".into()).status(), StatusCode::BAD_GATEWAY);
    }

    #[test]
    fn internal_cause_is_not_exposed() {
        let err = ApiError::Internal("connection refused on 10.0.0.3".into());
        assert_eq!(err.to_string(), "internal server error");
    }

    #[test]
    fn too_many_requests_sets_retry_after() {
        let response = ApiError::TooManyRequests(42).into_response();
        assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
        assert_eq!(response.headers()[header::RETRY_AFTER], "42");
    }

    #[test]
    fn repository_errors_map_to_conflict() {
        let err: ApiError = RepositoryError::AlreadyReviewed(ModerationStatus::Approved).into();
        assert_eq!(
            err,
            ApiError::Conflict("edit request is already approved".into())
        );
        let err: ApiError = RepositoryError::NotFound("marker").into();
        assert_eq!(err, ApiError::NotFound("marker not found".into()));
    }
}
