use crate::state::AppState;
use axum::Router;

mod claims;
pub mod dto;
pub(crate) mod extractors;
pub mod google;
pub mod handlers;
pub mod jwt;
#[cfg(test)]
pub mod memory;
pub mod otp;
pub mod password;
pub mod repo;
pub mod repo_types;
pub mod services;

pub fn router() -> Router<AppState> {
    Router::new()
        .merge(handlers::auth_routes())
        .merge(handlers::me_routes())
}
