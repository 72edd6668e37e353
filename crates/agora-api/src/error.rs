use axum::{
    Json,
    extract::rejection::{JsonRejection, PathRejection, QueryRejection},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::json;
use thiserror::Error;
use tracing::error;

use agora_db::StoreError;

#[derive(Error, Debug)]
pub enum ApiError {
    #[error("Authentication credentials were not provided or are invalid")]
    Unauthenticated,

    #[error("Invalid credentials")]
    InvalidCredentials,

    #[error("Not authorized")]
    Forbidden,

    #[error("{0}")]
    Validation(String),

    #[error("{0} not found")]
    NotFound(&'static str),

    #[error("Internal server error")]
    Internal,
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            Self::Unauthenticated | Self::InvalidCredentials => StatusCode::UNAUTHORIZED,
            Self::Forbidden => StatusCode::FORBIDDEN,
            Self::Validation(_) => StatusCode::BAD_REQUEST,
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::Internal => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<StoreError> for ApiError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::NotFound(what) => Self::NotFound(what),
            StoreError::Forbidden => Self::Forbidden,
            StoreError::Validation(msg) => Self::Validation(msg),
            StoreError::NotMember => Self::Validation(err.to_string()),
            StoreError::LockPoisoned(_) | StoreError::Sqlite(_) => {
                error!("Store error: {}", err);
                Self::Internal
            }
        }
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        Self::Validation(rejection.body_text())
    }
}

impl From<PathRejection> for ApiError {
    fn from(rejection: PathRejection) -> Self {
        Self::Validation(rejection.body_text())
    }
}

impl From<QueryRejection> for ApiError {
    fn from(rejection: QueryRejection) -> Self {
        Self::Validation(rejection.body_text())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status(), Json(json!({ "error": self.to_string() }))).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn store_errors_map_to_statuses() {
        assert_eq!(ApiError::from(StoreError::NotFound("post")).status(), StatusCode::NOT_FOUND);
        assert_eq!(ApiError::from(StoreError::Forbidden).status(), StatusCode::FORBIDDEN);
        assert_eq!(ApiError::from(StoreError::NotMember).status(), StatusCode::BAD_REQUEST);
        assert_eq!(ApiError::from(StoreError::NotMember).to_string(), "Not a member");
        assert_eq!(
            ApiError::from(StoreError::LockPoisoned("x".into())).status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }
}
