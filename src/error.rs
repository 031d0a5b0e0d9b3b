use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};

use crate::content::Invalid;
use crate::db::RepositoryError;
use crate::scrape::FetchError;

#[derive(Debug, thiserror::Error)]
pub enum AppError {
    /// Missing entity, or one the caller does not own. The two are
    /// deliberately indistinguishable to the client.
    #[error("Not found")]
    NotFound,

    #[error("Unauthorized")]
    Unauthorized,

    #[error("Invalid input: {0}")]
    Validation(String),

    #[error("Could not fetch photo page: {0}")]
    ExternalFetch(String),

    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("Pool error: {0}")]
    Pool(#[from] r2d2::Error),

    #[error("Template error: {0}")]
    Template(#[from] askama::Error),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<RepositoryError> for AppError {
    fn from(err: RepositoryError) -> Self {
        match err {
            RepositoryError::NotFound(what) => {
                tracing::debug!("Not found: {}", what);
                AppError::NotFound
            }
            RepositoryError::Validation(msg) => AppError::Validation(msg),
            RepositoryError::Sql(e) => AppError::Database(e),
            RepositoryError::Pool(e) => AppError::Pool(e),
        }
    }
}

impl From<Invalid> for AppError {
    fn from(err: Invalid) -> Self {
        AppError::Validation(err.0)
    }
}

impl From<FetchError> for AppError {
    fn from(err: FetchError) -> Self {
        tracing::warn!("Photo page fetch failed: {}", err);
        AppError::ExternalFetch(err.to_string())
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, message) = match &self {
            AppError::NotFound => (StatusCode::NOT_FOUND, "Not found".to_string()),
            AppError::Unauthorized => (StatusCode::UNAUTHORIZED, "Sign in required".to_string()),
            AppError::Validation(msg) => (StatusCode::BAD_REQUEST, msg.clone()),
            AppError::ExternalFetch(msg) => (
                StatusCode::BAD_GATEWAY,
                format!("Could not read the photo page ({}). Please try again.", msg),
            ),
            AppError::Database(e) => {
                tracing::error!("Database error: {}", e);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Internal server error".to_string(),
                )
            }
            AppError::Pool(e) => {
                tracing::error!("Pool error: {}", e);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Internal server error".to_string(),
                )
            }
            AppError::Template(e) => {
                tracing::error!("Template render error: {}", e);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Internal server error".to_string(),
                )
            }
            AppError::Internal(msg) => {
                tracing::error!("Internal error: {}", msg);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Internal server error".to_string(),
                )
            }
        };

        (status, message).into_response()
    }
}

pub type AppResult<T> = Result<T, AppError>;

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::StatusCode;

    fn response_status(err: AppError) -> StatusCode {
        err.into_response().status()
    }

    #[test]
    fn not_found_returns_404() {
        assert_eq!(response_status(AppError::NotFound), StatusCode::NOT_FOUND);
    }

    #[test]
    fn unauthorized_returns_401() {
        assert_eq!(
            response_status(AppError::Unauthorized),
            StatusCode::UNAUTHORIZED
        );
    }

    #[test]
    fn validation_returns_400() {
        assert_eq!(
            response_status(AppError::Validation("oops".into())),
            StatusCode::BAD_REQUEST
        );
    }

    #[test]
    fn external_fetch_returns_502() {
        assert_eq!(
            response_status(AppError::ExternalFetch("timed out".into())),
            StatusCode::BAD_GATEWAY
        );
    }

    #[test]
    fn internal_returns_500() {
        assert_eq!(
            response_status(AppError::Internal("boom".into())),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn repository_not_found_maps_to_not_found() {
        let err: AppError = RepositoryError::NotFound("post abc".into()).into();
        assert!(matches!(err, AppError::NotFound));
    }

    #[test]
    fn repository_validation_keeps_message() {
        let err: AppError = RepositoryError::Validation("unknown tag: x".into()).into();
        match err {
            AppError::Validation(msg) => assert_eq!(msg, "unknown tag: x"),
            other => panic!("unexpected {:?}", other),
        }
    }
}
