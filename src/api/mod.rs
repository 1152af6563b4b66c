pub mod admin;
pub mod public;
pub mod user;

use axum::{middleware::from_fn, routing::get, Router};
use sea_orm::DatabaseConnection;
use serde::Deserialize;
use std::sync::Arc;
use tower_http::trace::TraceLayer;

use crate::auth::jwt::JwtManager;
use crate::error::ApiError;
use crate::middleware::logging::logging_middleware;

use admin::admin_api_router;
use public::public_api_router;
use user::user_api_router;

pub fn create_api_router(shared_db: Arc<DatabaseConnection>, jwt: Arc<JwtManager>) -> Router {
    Router::new()
        .route("/health", get(health))
        .nest("/api", public_api_router(shared_db.clone(), jwt.clone()))
        .nest("/api", user_api_router(shared_db.clone(), jwt.clone()))
        .nest("/api/admin", admin_api_router(shared_db, jwt))
        .layer(from_fn(logging_middleware))
        .layer(TraceLayer::new_for_http())
}

async fn health() -> &'static str {
    "OK"
}

//pagination
pub const MAX_PER_PAGE: u64 = 20;

#[derive(Debug, Deserialize)]
pub struct PageQuery {
    pub page: Option<u64>,
    pub per_page: Option<u64>,
}

impl PageQuery {
    pub fn resolve(&self, default_per_page: u64) -> Result<(u64, u64), ApiError> {
        let page = self.page.unwrap_or(1);
        let per_page = self.per_page.unwrap_or(default_per_page);

        if page < 1 {
            return Err(ApiError::Validation(
                "page must be greater than 0".to_string(),
            ));
        }
        if !(1..=MAX_PER_PAGE).contains(&per_page) {
            return Err(ApiError::Validation(format!(
                "per_page must be between 1 and {MAX_PER_PAGE}"
            )));
        }

        Ok((page, per_page))
    }
}

pub fn page_link(path: &str, page: u64, per_page: u64) -> String {
    format!("{path}?page={page}&per_page={per_page}")
}
