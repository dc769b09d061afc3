//! Error taxonomy for the auth flows and its HTTP mapping.
use axum::{
    extract::rejection::JsonRejection,
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum AuthError {
    #[error("{0}")]
    Validation(String),

    #[error("User already exists")]
    DuplicateIdentity,

    #[error("Invalid credentials")]
    InvalidCredentials,

    #[error("Account is deactivated")]
    AccountDeactivated,

    #[error("OTP not found. Request a new one.")]
    CodeNotIssued,

    #[error("Invalid OTP")]
    CodeMismatch,

    #[error("OTP expired")]
    CodeExpired,

    #[error("Invalid identity token")]
    InvalidAssertion,

    #[error("Authentication required")]
    Unauthenticated,

    #[error("Insufficient permissions")]
    Forbidden,

    /// Verification against an email with no record. A client error, unlike `NotFound`.
    #[error("User not found")]
    UnknownAccount,

    #[error("User not found")]
    NotFound,

    #[error("Failed to send OTP")]
    Dispatch(#[source] anyhow::Error),

    #[error("Server error")]
    Internal(#[from] anyhow::Error),
}

#[derive(Debug, Serialize)]
struct ErrorBody {
    message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

impl AuthError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            AuthError::Validation(_)
            | AuthError::DuplicateIdentity
            | AuthError::UnknownAccount
            | AuthError::CodeNotIssued
            | AuthError::CodeMismatch
            | AuthError::CodeExpired => StatusCode::BAD_REQUEST,
            AuthError::InvalidCredentials
            | AuthError::InvalidAssertion
            | AuthError::Unauthenticated => StatusCode::UNAUTHORIZED,
            AuthError::AccountDeactivated | AuthError::Forbidden => StatusCode::FORBIDDEN,
            AuthError::NotFound => StatusCode::NOT_FOUND,
            AuthError::Dispatch(_) | AuthError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    pub fn validation(msg: impl Into<String>) -> Self {
        AuthError::Validation(msg.into())
    }
}

impl From<JsonRejection> for AuthError {
    fn from(rejection: JsonRejection) -> Self {
        tracing::warn!(detail = %rejection.body_text(), "request body rejected");
        match rejection {
            JsonRejection::JsonDataError(_) => AuthError::validation("Invalid request data format"),
            JsonRejection::JsonSyntaxError(_) => {
                AuthError::validation("Invalid JSON syntax in request body")
            }
            JsonRejection::MissingJsonContentType(_) => {
                AuthError::validation("Content-Type must be application/json")
            }
            JsonRejection::BytesRejection(_) => AuthError::validation("Failed to read request body"),
            other => AuthError::Internal(anyhow::anyhow!(other.body_text())),
        }
    }
}

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        // Only server faults carry the underlying cause.
        let error = match &self {
            AuthError::Dispatch(e) | AuthError::Internal(e) => {
                tracing::error!(error = %format!("{e:#}"), %status, "request failed");
                Some(e.to_string())
            }
            _ => None,
        };
        let body = ErrorBody {
            message: self.to_string(),
            error,
        };
        (status, Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_codes_follow_taxonomy() {
        assert_eq!(AuthError::validation("x").status_code(), StatusCode::BAD_REQUEST);
        assert_eq!(AuthError::DuplicateIdentity.status_code(), StatusCode::BAD_REQUEST);
        assert_eq!(AuthError::InvalidCredentials.status_code(), StatusCode::UNAUTHORIZED);
        assert_eq!(AuthError::AccountDeactivated.status_code(), StatusCode::FORBIDDEN);
        assert_eq!(AuthError::CodeExpired.status_code(), StatusCode::BAD_REQUEST);
        assert_eq!(AuthError::InvalidAssertion.status_code(), StatusCode::UNAUTHORIZED);
        assert_eq!(AuthError::Forbidden.status_code(), StatusCode::FORBIDDEN);
        assert_eq!(AuthError::NotFound.status_code(), StatusCode::NOT_FOUND);
        assert_eq!(AuthError::UnknownAccount.status_code(), StatusCode::BAD_REQUEST);
        assert_eq!(
            AuthError::Dispatch(anyhow::anyhow!("smtp down")).status_code(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[tokio::test]
    async fn client_errors_omit_cause_server_errors_include_it() {
        let res = AuthError::CodeMismatch.into_response();
        assert_eq!(res.status(), StatusCode::BAD_REQUEST);
        let bytes = axum::body::to_bytes(res.into_body(), usize::MAX).await.unwrap();
        let v: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(v["message"], "Invalid OTP");
        assert!(v.get("error").is_none());

        let res = AuthError::Internal(anyhow::anyhow!("pool timed out")).into_response();
        let bytes = axum::body::to_bytes(res.into_body(), usize::MAX).await.unwrap();
        let v: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(v["message"], "Server error");
        assert_eq!(v["error"], "pool timed out");
    }
}
