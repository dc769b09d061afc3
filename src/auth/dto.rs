use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use uuid::Uuid;

use crate::auth::repo_types::{AuthType, Role, User};

/// Request body for signup. Fields are optional so that missing ones surface as
/// validation errors rather than extractor rejections.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct SignupRequest {
    pub name: Option<String>,
    pub email: Option<String>,
    pub password: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct SendOtpRequest {
    pub email: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct VerifyOtpRequest {
    pub email: Option<String>,
    pub otp: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct GoogleLoginRequest {
    #[serde(alias = "credential", alias = "idToken")]
    pub token: String,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct UpdateUserRequest {
    pub name: Option<String>,
    pub email: Option<String>,
}

/// Public part of the user returned to the client. Never carries the secret or code.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PublicUser {
    pub id: Uuid,
    pub name: String,
    pub email: String,
    pub role: Role,
    pub auth_type: AuthType,
    pub is_active: bool,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
}

impl From<User> for PublicUser {
    fn from(u: User) -> Self {
        Self {
            id: u.id,
            name: u.name,
            email: u.email,
            role: u.role,
            auth_type: u.auth_type,
            is_active: u.is_active,
            created_at: u.created_at,
        }
    }
}

/// Session issued by login, signup completion and google login.
#[derive(Debug, Serialize)]
pub struct AuthResponse {
    pub token: String,
    pub user: PublicUser,
}

#[derive(Debug, Serialize)]
pub struct MessageResponse {
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
}

impl MessageResponse {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            email: None,
        }
    }
}
