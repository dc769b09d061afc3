//! In-memory `UserStore` used by unit tests.
use async_trait::async_trait;
use time::OffsetDateTime;
use tokio::sync::Mutex;
use uuid::Uuid;

use crate::auth::repo::{ProfileUpdateResult, UserStore};
use crate::auth::repo_types::{AuthType, NewUser, ProfileUpdate, Role, User};

fn holds_live_code(user: &User, code: &str, now: OffsetDateTime) -> bool {
    user.otp.as_deref() == Some(code) && user.otp_expires_at.is_some_and(|exp| exp >= now)
}

#[derive(Default)]
pub struct MemoryUserStore {
    users: Mutex<Vec<User>>,
}

impl MemoryUserStore {
    pub async fn len(&self) -> usize {
        self.users.lock().await.len()
    }

    /// Mutate a stored record directly, bypassing the store contract.
    pub async fn modify(&self, id: Uuid, f: impl FnOnce(&mut User)) {
        let mut users = self.users.lock().await;
        if let Some(u) = users.iter_mut().find(|u| u.id == id) {
            f(u);
        }
    }
}

#[async_trait]
impl UserStore for MemoryUserStore {
    async fn find_by_email(&self, email: &str) -> anyhow::Result<Option<User>> {
        let users = self.users.lock().await;
        Ok(users.iter().find(|u| u.email == email).cloned())
    }

    async fn find_by_id(&self, id: Uuid) -> anyhow::Result<Option<User>> {
        let users = self.users.lock().await;
        Ok(users.iter().find(|u| u.id == id).cloned())
    }

    async fn list(&self) -> anyhow::Result<Vec<User>> {
        Ok(self.users.lock().await.clone())
    }

    async fn create_user(&self, new: NewUser) -> anyhow::Result<Option<User>> {
        let mut users = self.users.lock().await;
        if users.iter().any(|u| u.email == new.email) {
            return Ok(None);
        }
        let (otp, otp_expires_at) = new.otp.map_or((None, None), |(c, e)| (Some(c), Some(e)));
        let user = User {
            id: Uuid::new_v4(),
            name: new.name,
            email: new.email,
            password_hash: new.password_hash,
            role: new.role,
            auth_type: new.auth_type,
            is_active: new.is_active,
            otp,
            otp_expires_at,
            activated_at: new.is_active.then(OffsetDateTime::now_utc),
            created_at: OffsetDateTime::now_utc(),
        };
        users.push(user.clone());
        Ok(Some(user))
    }

    async fn upsert_otp(
        &self,
        email: &str,
        code: &str,
        expires_at: OffsetDateTime,
    ) -> anyhow::Result<User> {
        let mut users = self.users.lock().await;
        if let Some(u) = users.iter_mut().find(|u| u.email == email) {
            u.otp = Some(code.to_string());
            u.otp_expires_at = Some(expires_at);
            return Ok(u.clone());
        }
        let user = User {
            id: Uuid::new_v4(),
            name: String::new(),
            email: email.to_string(),
            password_hash: None,
            role: Role::User,
            auth_type: AuthType::Manual,
            is_active: false,
            otp: Some(code.to_string()),
            otp_expires_at: Some(expires_at),
            activated_at: None,
            created_at: OffsetDateTime::now_utc(),
        };
        users.push(user.clone());
        Ok(user)
    }

    async fn clear_otp(&self, id: Uuid, code: &str, now: OffsetDateTime) -> anyhow::Result<bool> {
        let mut users = self.users.lock().await;
        match users.iter_mut().find(|u| u.id == id && holds_live_code(u, code, now)) {
            Some(u) => {
                u.otp = None;
                u.otp_expires_at = None;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn activate(
        &self,
        id: Uuid,
        code: &str,
        now: OffsetDateTime,
    ) -> anyhow::Result<Option<User>> {
        let mut users = self.users.lock().await;
        Ok(users
            .iter_mut()
            .find(|u| u.id == id && holds_live_code(u, code, now) && !u.is_deactivated())
            .map(|u| {
                u.otp = None;
                u.otp_expires_at = None;
                u.is_active = true;
                u.activated_at.get_or_insert(now);
                u.clone()
            }))
    }

    async fn update_profile(
        &self,
        id: Uuid,
        update: ProfileUpdate,
    ) -> anyhow::Result<ProfileUpdateResult> {
        let mut users = self.users.lock().await;
        if let Some(email) = &update.email {
            if users.iter().any(|u| u.id != id && &u.email == email) {
                return Ok(ProfileUpdateResult::EmailTaken);
            }
        }
        let Some(u) = users.iter_mut().find(|u| u.id == id) else {
            return Ok(ProfileUpdateResult::NotFound);
        };
        if let Some(name) = update.name {
            u.name = name;
        }
        if let Some(email) = update.email {
            u.email = email;
        }
        Ok(ProfileUpdateResult::Updated(u.clone()))
    }

    async fn set_active(&self, id: Uuid, active: bool) -> anyhow::Result<bool> {
        let mut users = self.users.lock().await;
        match users.iter_mut().find(|u| u.id == id) {
            Some(u) => {
                u.is_active = active;
                Ok(true)
            }
            None => Ok(false),
        }
    }
}
