pub mod account;

use axum::Router;
use sea_orm::DatabaseConnection;
use std::sync::Arc;

use crate::auth::jwt::JwtManager;

use account::account_router;

pub fn public_api_router(db: Arc<DatabaseConnection>, jwt: Arc<JwtManager>) -> Router {
    Router::new().merge(account_router(db, jwt))
}
