use crate::state::AppState;
use axum::Router;

pub mod claims;
pub mod clock;
pub mod cookies;
pub mod dto;
pub(crate) mod extractors;
pub mod handlers;
pub mod jwt;
pub mod memory;
pub mod password;
pub mod repo;
pub mod repo_types;
pub mod rotation;
pub mod services;

pub fn router(upload_limit: usize) -> Router<AppState> {
    Router::new().merge(handlers::user_routes(upload_limit))
}
