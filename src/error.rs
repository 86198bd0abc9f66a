//! Error taxonomy shared by every handler, plus its HTTP rendering.
use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use thiserror::Error;
use tracing::error;

/// Why a request could not be authenticated. Every variant maps to 401,
/// but they stay distinct for logging and tests.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthError {
    #[error("Token is missing")]
    MissingHeader,
    #[error("Bearer token malformed")]
    MalformedHeader,
    #[error("Token is malformed")]
    MalformedToken,
    #[error("Token has expired")]
    Expired,
    #[error("Token is invalid")]
    InvalidSignature,
    #[error("Token is invalid or user not found")]
    PrincipalNotFound,
    #[error("Could not verify")]
    MissingCredentials,
    #[error("Invalid username or password")]
    UnknownUser,
    #[error("Invalid username or password")]
    BadPassword,
}

#[derive(Error, Debug)]
pub enum AppError {
    #[error("{0}")]
    Validation(String),

    #[error(transparent)]
    Auth(#[from] AuthError),

    #[error("{0}")]
    Forbidden(String),

    #[error("{0}")]
    NotFound(String),

    #[error("{0}")]
    Conflict(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl AppError {
    pub fn validation(msg: impl Into<String>) -> Self {
        AppError::Validation(msg.into())
    }

    pub fn internal(context: &str, err: impl std::fmt::Display) -> Self {
        AppError::Internal(format!("{context}: {err}"))
    }

    pub fn status_code(&self) -> StatusCode {
        match self {
            AppError::Validation(_) => StatusCode::BAD_REQUEST,
            AppError::Auth(_) => StatusCode::UNAUTHORIZED,
            AppError::Forbidden(_) => StatusCode::FORBIDDEN,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::Conflict(_) => StatusCode::CONFLICT,
            AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Message safe to show a client. Internal details never leave the server.
    pub fn public_message(&self) -> String {
        match self {
            AppError::Internal(_) => "An internal error occurred. Please try again.".to_string(),
            other => other.to_string(),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        if let AppError::Internal(detail) = &self {
            error!(%status, detail = %detail, "request failed");
        }
        let body = serde_json::json!({ "message": self.public_message() });
        (status, Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_codes_follow_taxonomy() {
        assert_eq!(AppError::validation("x").status_code(), StatusCode::BAD_REQUEST);
        assert_eq!(
            AppError::Auth(AuthError::Expired).status_code(),
            StatusCode::UNAUTHORIZED
        );
        assert_eq!(
            AppError::Forbidden("no".into()).status_code(),
            StatusCode::FORBIDDEN
        );
        assert_eq!(
            AppError::NotFound("gone".into()).status_code(),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            AppError::Conflict("dup".into()).status_code(),
            StatusCode::CONFLICT
        );
        assert_eq!(
            AppError::internal("db", "boom").status_code(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn internal_detail_is_not_exposed() {
        let err = AppError::internal("select ratings", "relation \"ratings\" does not exist");
        let msg = err.public_message();
        assert!(!msg.contains("ratings"));
        assert!(err.to_string().contains("does not exist"));
    }

    #[test]
    fn auth_variants_are_distinct_but_share_status() {
        let kinds = [
            AuthError::MissingHeader,
            AuthError::MalformedHeader,
            AuthError::MalformedToken,
            AuthError::Expired,
            AuthError::InvalidSignature,
            AuthError::PrincipalNotFound,
        ];
        for kind in kinds {
            assert_eq!(AppError::from(kind).status_code(), StatusCode::UNAUTHORIZED);
        }
        assert_ne!(AuthError::MissingHeader, AuthError::MalformedHeader);
    }

    #[test]
    fn response_is_json_with_message() {
        let response = AppError::NotFound("Recipe not found".into()).into_response();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        assert!(response
            .headers()
            .get("content-type")
            .unwrap()
            .to_str()
            .unwrap()
            .contains("application/json"));
    }
}
