use anyhow::Context;
use async_trait::async_trait;
use sqlx::PgPool;
use time::OffsetDateTime;
use uuid::Uuid;

use crate::auth::repo_types::{NewUser, ProfileUpdate, User};

const USER_COLUMNS: &str = "id, name, email, password_hash, role, auth_type, is_active, otp, \
                            otp_expires_at, activated_at, created_at";

#[derive(Debug)]
pub enum ProfileUpdateResult {
    Updated(User),
    NotFound,
    EmailTaken,
}

/// Persistence for user records. Emails passed in must already be normalized.
#[async_trait]
pub trait UserStore: Send + Sync {
    async fn find_by_email(&self, email: &str) -> anyhow::Result<Option<User>>;
    async fn find_by_id(&self, id: Uuid) -> anyhow::Result<Option<User>>;
    async fn list(&self) -> anyhow::Result<Vec<User>>;
    /// Single conditional insert; `None` when the email is already taken.
    async fn create_user(&self, new: NewUser) -> anyhow::Result<Option<User>>;
    /// Attach a code to the record for `email`, creating an inactive placeholder if absent.
    async fn upsert_otp(
        &self,
        email: &str,
        code: &str,
        expires_at: OffsetDateTime,
    ) -> anyhow::Result<User>;
    /// Clear the code if it is still `code` and live at `now`. Returns `false` when nothing matched.
    async fn clear_otp(&self, id: Uuid, code: &str, now: OffsetDateTime) -> anyhow::Result<bool>;
    /// Consume `code` and mark the account active in one conditional write.
    ///
    /// `None` when the code is no longer the live one on record, or the account was
    /// activated before and has since been deactivated.
    async fn activate(
        &self,
        id: Uuid,
        code: &str,
        now: OffsetDateTime,
    ) -> anyhow::Result<Option<User>>;
    async fn update_profile(
        &self,
        id: Uuid,
        update: ProfileUpdate,
    ) -> anyhow::Result<ProfileUpdateResult>;
    /// Returns `false` when no user has this id.
    async fn set_active(&self, id: Uuid, active: bool) -> anyhow::Result<bool>;
}

#[derive(Clone)]
pub struct PgUserStore {
    db: PgPool,
}

impl PgUserStore {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }
}

#[async_trait]
impl UserStore for PgUserStore {
    async fn find_by_email(&self, email: &str) -> anyhow::Result<Option<User>> {
        let user = sqlx::query_as::<_, User>(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE email = $1"
        ))
        .bind(email)
        .fetch_optional(&self.db)
        .await
        .context("find user by email")?;
        Ok(user)
    }

    async fn find_by_id(&self, id: Uuid) -> anyhow::Result<Option<User>> {
        let user = sqlx::query_as::<_, User>(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(&self.db)
        .await
        .context("find user by id")?;
        Ok(user)
    }

    async fn list(&self) -> anyhow::Result<Vec<User>> {
        let users = sqlx::query_as::<_, User>(&format!(
            "SELECT {USER_COLUMNS} FROM users ORDER BY created_at ASC"
        ))
        .fetch_all(&self.db)
        .await
        .context("list users")?;
        Ok(users)
    }

    async fn create_user(&self, new: NewUser) -> anyhow::Result<Option<User>> {
        let (otp, otp_expires_at) = new.otp.map_or((None, None), |(c, e)| (Some(c), Some(e)));
        let user = sqlx::query_as::<_, User>(&format!(
            r#"
            INSERT INTO users
                (id, name, email, password_hash, role, auth_type, is_active, otp, otp_expires_at, activated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
            ON CONFLICT (email) DO NOTHING
            RETURNING {USER_COLUMNS}
            "#
        ))
        .bind(Uuid::new_v4())
        .bind(&new.name)
        .bind(&new.email)
        .bind(&new.password_hash)
        .bind(new.role)
        .bind(new.auth_type)
        .bind(new.is_active)
        .bind(otp)
        .bind(otp_expires_at)
        .bind(new.is_active.then(OffsetDateTime::now_utc))
        .fetch_optional(&self.db)
        .await
        .context("insert user")?;
        Ok(user)
    }

    async fn upsert_otp(
        &self,
        email: &str,
        code: &str,
        expires_at: OffsetDateTime,
    ) -> anyhow::Result<User> {
        let user = sqlx::query_as::<_, User>(&format!(
            r#"
            INSERT INTO users (id, email, is_active, otp, otp_expires_at)
            VALUES ($1, $2, FALSE, $3, $4)
            ON CONFLICT (email) DO UPDATE
               SET otp = EXCLUDED.otp,
                   otp_expires_at = EXCLUDED.otp_expires_at
            RETURNING {USER_COLUMNS}
            "#
        ))
        .bind(Uuid::new_v4())
        .bind(email)
        .bind(code)
        .bind(expires_at)
        .fetch_one(&self.db)
        .await
        .context("upsert otp")?;
        Ok(user)
    }

    async fn clear_otp(&self, id: Uuid, code: &str, now: OffsetDateTime) -> anyhow::Result<bool> {
        let res = sqlx::query(
            r#"
            UPDATE users
               SET otp = NULL, otp_expires_at = NULL
             WHERE id = $1 AND otp = $2 AND otp_expires_at >= $3
            "#,
        )
        .bind(id)
        .bind(code)
        .bind(now)
        .execute(&self.db)
        .await
        .context("clear otp")?;
        Ok(res.rows_affected() > 0)
    }

    async fn activate(
        &self,
        id: Uuid,
        code: &str,
        now: OffsetDateTime,
    ) -> anyhow::Result<Option<User>> {
        let user = sqlx::query_as::<_, User>(&format!(
            r#"
            UPDATE users
               SET otp = NULL,
                   otp_expires_at = NULL,
                   is_active = TRUE,
                   activated_at = COALESCE(activated_at, $3)
             WHERE id = $1
               AND otp = $2
               AND otp_expires_at >= $3
               AND (is_active OR activated_at IS NULL)
            RETURNING {USER_COLUMNS}
            "#
        ))
        .bind(id)
        .bind(code)
        .bind(now)
        .fetch_optional(&self.db)
        .await
        .context("activate user")?;
        Ok(user)
    }

    async fn update_profile(
        &self,
        id: Uuid,
        update: ProfileUpdate,
    ) -> anyhow::Result<ProfileUpdateResult> {
        let res = sqlx::query_as::<_, User>(&format!(
            r#"
            UPDATE users
               SET name = COALESCE($2, name),
                   email = COALESCE($3, email)
             WHERE id = $1
            RETURNING {USER_COLUMNS}
            "#
        ))
        .bind(id)
        .bind(update.name)
        .bind(update.email)
        .fetch_optional(&self.db)
        .await;

        match res {
            Ok(Some(user)) => Ok(ProfileUpdateResult::Updated(user)),
            Ok(None) => Ok(ProfileUpdateResult::NotFound),
            Err(sqlx::Error::Database(e)) if e.is_unique_violation() => {
                Ok(ProfileUpdateResult::EmailTaken)
            }
            Err(e) => Err(anyhow::Error::new(e).context("update user profile")),
        }
    }

    async fn set_active(&self, id: Uuid, active: bool) -> anyhow::Result<bool> {
        let res = sqlx::query("UPDATE users SET is_active = $2 WHERE id = $1")
            .bind(id)
            .bind(active)
            .execute(&self.db)
            .await
            .context("set user active flag")?;
        Ok(res.rows_affected() > 0)
    }
}
