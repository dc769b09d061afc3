use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use time::OffsetDateTime;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "text", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Admin,
}

impl Role {
    /// Admin satisfies every requirement; user only satisfies `User`.
    pub fn satisfies(self, required: Role) -> bool {
        match required {
            Role::User => true,
            Role::Admin => self == Role::Admin,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "text", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum AuthType {
    Manual,
    Google,
}

/// User record in the database.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct User {
    pub id: Uuid,
    pub name: String,
    pub email: String, // always lowercase
    #[serde(skip_serializing)]
    pub password_hash: Option<String>, // None for google accounts and otp placeholders
    pub role: Role,
    pub auth_type: AuthType,
    pub is_active: bool,
    #[serde(skip_serializing)]
    pub otp: Option<String>,
    #[serde(skip_serializing)]
    pub otp_expires_at: Option<OffsetDateTime>,
    /// First activation; stays set after a later deactivation.
    #[serde(skip_serializing)]
    pub activated_at: Option<OffsetDateTime>,
    pub created_at: OffsetDateTime,
}

impl User {
    /// Activated once and switched off since, as opposed to still pending verification.
    pub fn is_deactivated(&self) -> bool {
        !self.is_active && self.activated_at.is_some()
    }
}

/// Fields for a fresh user row. `otp` carries the code and its expiry together.
#[derive(Debug, Clone)]
pub struct NewUser {
    pub name: String,
    pub email: String,
    pub password_hash: Option<String>,
    pub role: Role,
    pub auth_type: AuthType,
    pub is_active: bool,
    pub otp: Option<(String, OffsetDateTime)>,
}

/// Partial profile update; `None` leaves the column untouched.
#[derive(Debug, Clone, Default)]
pub struct ProfileUpdate {
    pub name: Option<String>,
    pub email: Option<String>,
}

/// Normalize an email the way every read and write compares it.
pub fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}
