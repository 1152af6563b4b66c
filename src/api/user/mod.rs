pub mod cart;
pub mod category;
pub mod order;
pub mod product;

use axum::{middleware::from_fn_with_state, Router};
use sea_orm::DatabaseConnection;
use std::sync::Arc;

use crate::auth::jwt::JwtManager;
use crate::middleware::auth::{auth_middleware, AuthState, Scope};

use cart::cart_router;
use category::category_router;
use order::order_router;
use product::product_router;

pub fn user_api_router(db: Arc<DatabaseConnection>, jwt: Arc<JwtManager>) -> Router {
    Router::new()
        .merge(product_router(db.clone()))
        .merge(category_router(db.clone()))
        .merge(cart_router(db.clone()))
        .merge(order_router(db.clone()))
        .layer(from_fn_with_state(
            AuthState {
                db,
                jwt,
                scope: Scope::User,
            },
            auth_middleware,
        ))
}
