use sea_orm::{ConnectOptions, Database};
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

use storefront_api::api::create_api_router;
use storefront_api::auth::jwt::JwtManager;
use storefront_api::config::AppConfig;
use storefront_api::entities::{seed_user_groups, setup_schema};

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let config = AppConfig::from_env().expect("Failed to load configuration");

    let mut options = ConnectOptions::new(config.database_url.clone());
    options
        .max_connections(config.database_max_connections)
        .sqlx_logging(false);
    let db = Database::connect(options)
        .await
        .expect("Failed to connect to the database");

    setup_schema(&db).await.expect("Failed to set up schema");
    seed_user_groups(&db).await.expect("Failed to seed user groups");

    let shared_db = Arc::new(db);
    let jwt = Arc::new(JwtManager::new(&config.jwt));

    let app = create_api_router(shared_db, jwt);

    let listener = tokio::net::TcpListener::bind(config.bind_addr.as_str())
        .await
        .expect("Failed to bind address");
    tracing::info!("Listening on {}", config.bind_addr);
    axum::serve(listener, app)
        .await
        .expect("Server terminated unexpectedly");
}
