pub mod category;
pub mod product;

use axum::{middleware::from_fn_with_state, Router};
use sea_orm::DatabaseConnection;
use std::sync::Arc;

use category::admin_category_router;
use product::admin_product_router;

use crate::auth::jwt::JwtManager;
use crate::middleware::auth::{auth_middleware, AuthState, Scope};

pub fn admin_api_router(db: Arc<DatabaseConnection>, jwt: Arc<JwtManager>) -> Router {
    let admin_category_router = admin_category_router(db.clone());
    let admin_product_router = admin_product_router(db.clone());

    Router::new()
        .merge(admin_category_router)
        .merge(admin_product_router)
        .layer(from_fn_with_state(
            AuthState {
                db,
                jwt,
                scope: Scope::Admin,
            },
            auth_middleware,
        ))
}
