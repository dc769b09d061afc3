use tracing::info;
use uuid::Uuid;

use crate::{
    auth::{
        dto::UpdateUserRequest,
        repo::ProfileUpdateResult,
        repo_types::{normalize_email, ProfileUpdate, User},
        services::is_valid_email,
    },
    error::AuthError,
    state::AppState,
};

pub async fn get_user(state: &AppState, id: Uuid) -> Result<User, AuthError> {
    state.store.find_by_id(id).await?.ok_or(AuthError::NotFound)
}

pub async fn update_user(
    state: &AppState,
    id: Uuid,
    req: UpdateUserRequest,
) -> Result<User, AuthError> {
    let name = match req.name.map(|n| n.trim().to_string()) {
        Some(n) if n.is_empty() => return Err(AuthError::validation("Name is required")),
        other => other,
    };
    let email = match req.email.map(|e| normalize_email(&e)) {
        Some(e) if !is_valid_email(&e) => {
            return Err(AuthError::validation("Invalid email format"))
        }
        other => other,
    };

    match state
        .store
        .update_profile(id, ProfileUpdate { name, email })
        .await?
    {
        ProfileUpdateResult::Updated(user) => {
            info!(user_id = %user.id, "user updated");
            Ok(user)
        }
        ProfileUpdateResult::NotFound => Err(AuthError::NotFound),
        ProfileUpdateResult::EmailTaken => Err(AuthError::DuplicateIdentity),
    }
}

/// Soft delete: the record stays, flagged inactive.
pub async fn deactivate_user(state: &AppState, id: Uuid) -> Result<(), AuthError> {
    if !state.store.set_active(id, false).await? {
        return Err(AuthError::NotFound);
    }
    info!(user_id = %id, "user deactivated");
    Ok(())
}
