use axum::{
    extract::{Path, State},
    routing::get,
    Router,
};
use tracing::instrument;
use uuid::Uuid;

use super::services;
use crate::{
    auth::{
        dto::{MessageResponse, PublicUser, UpdateUserRequest},
        extractors::{authorize_owner_or_admin, AdminUser, CurrentUser},
    },
    error::AuthError,
    extract::Json,
    state::AppState,
};

pub fn read_routes() -> Router<AppState> {
    Router::new()
        .route("/user", get(list_users))
        .route("/user/", get(list_users))
}

pub fn write_routes() -> Router<AppState> {
    Router::new().route(
        "/user/:id",
        get(get_user).put(update_user).delete(delete_user),
    )
}

#[instrument(skip_all)]
pub async fn list_users(
    State(state): State<AppState>,
    AdminUser(_admin): AdminUser,
) -> Result<Json<Vec<PublicUser>>, AuthError> {
    let users = state.store.list().await?;
    Ok(Json(users.into_iter().map(PublicUser::from).collect()))
}

#[instrument(skip(state, me))]
pub async fn get_user(
    State(state): State<AppState>,
    CurrentUser(me): CurrentUser,
    Path(id): Path<Uuid>,
) -> Result<Json<PublicUser>, AuthError> {
    authorize_owner_or_admin(&me, id)?;
    let user = services::get_user(&state, id).await?;
    Ok(Json(PublicUser::from(user)))
}

#[instrument(skip(state, me, payload))]
pub async fn update_user(
    State(state): State<AppState>,
    CurrentUser(me): CurrentUser,
    Path(id): Path<Uuid>,
    Json(payload): Json<UpdateUserRequest>,
) -> Result<Json<PublicUser>, AuthError> {
    authorize_owner_or_admin(&me, id)?;
    let user = services::update_user(&state, id, payload).await?;
    Ok(Json(PublicUser::from(user)))
}

#[instrument(skip(state, me))]
pub async fn delete_user(
    State(state): State<AppState>,
    CurrentUser(me): CurrentUser,
    Path(id): Path<Uuid>,
) -> Result<Json<MessageResponse>, AuthError> {
    authorize_owner_or_admin(&me, id)?;
    services::deactivate_user(&state, id).await?;
    Ok(Json(MessageResponse::new("User deactivated successfully")))
}
