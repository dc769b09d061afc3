//! JSON body extractor whose rejections render through [`AuthError`].
//!
//! Drop-in for [`axum::Json`]: malformed bodies, missing content types and
//! mistyped fields all come back as `400 {"message": ...}` instead of axum's
//! plain-text rejections.
use axum::{
    async_trait,
    extract::{FromRequest, Request},
    response::{IntoResponse, Response},
};
use serde::{de::DeserializeOwned, Serialize};

use crate::error::AuthError;

#[derive(Debug, Clone, Copy, Default)]
pub struct Json<T>(pub T);

#[async_trait]
impl<T, S> FromRequest<S> for Json<T>
where
    T: DeserializeOwned,
    S: Send + Sync,
{
    type Rejection = AuthError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let axum::Json(value) = axum::Json::<T>::from_request(req, state).await?;
        Ok(Json(value))
    }
}

impl<T> IntoResponse for Json<T>
where
    T: Serialize,
{
    fn into_response(self) -> Response {
        axum::Json(self.0).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{
        body::Body,
        http::{header, Request, StatusCode},
        routing::post,
        Router,
    };
    use serde::Deserialize;
    use serde_json::Value;
    use tower::ServiceExt;

    #[derive(Deserialize, Serialize)]
    struct Named {
        name: Option<String>,
    }

    async fn echo(Json(body): Json<Named>) -> Json<Named> {
        Json(body)
    }

    async fn send(content_type: Option<&str>, body: &'static str) -> (StatusCode, String, Value) {
        let app = Router::new().route("/", post(echo));
        let mut req = Request::builder().method("POST").uri("/");
        if let Some(ct) = content_type {
            req = req.header(header::CONTENT_TYPE, ct);
        }
        let res = app.oneshot(req.body(Body::from(body)).unwrap()).await.unwrap();
        let status = res.status();
        let ct = res
            .headers()
            .get(header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .unwrap_or_default()
            .to_string();
        let bytes = axum::body::to_bytes(res.into_body(), usize::MAX).await.unwrap();
        (status, ct, serde_json::from_slice(&bytes).unwrap_or(Value::Null))
    }

    #[tokio::test]
    async fn well_formed_body_passes_through() {
        let (status, _, body) = send(Some("application/json"), r#"{"name":"Ann"}"#).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["name"], "Ann");
    }

    #[tokio::test]
    async fn syntax_error_is_json_bad_request() {
        let (status, ct, body) = send(Some("application/json"), "{not json").await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(ct.starts_with("application/json"));
        assert_eq!(body["message"], "Invalid JSON syntax in request body");
    }

    #[tokio::test]
    async fn missing_content_type_is_json_bad_request() {
        let (status, ct, body) = send(None, r#"{"name":"Ann"}"#).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(ct.starts_with("application/json"));
        assert_eq!(body["message"], "Content-Type must be application/json");
    }

    #[tokio::test]
    async fn mistyped_field_is_json_bad_request() {
        let (status, ct, body) = send(Some("application/json"), r#"{"name":1}"#).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(ct.starts_with("application/json"));
        assert_eq!(body["message"], "Invalid request data format");
    }
}
