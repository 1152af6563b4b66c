#![allow(dead_code)]

use chrono::Utc;
use reqwest::{header, Client, StatusCode};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectOptions, Database, DatabaseConnection, EntityTrait,
    QueryFilter, Set,
};
use serde_json::json;
use std::sync::Arc;

use storefront_api::api::create_api_router;
use storefront_api::auth::jwt::JwtManager;
use storefront_api::auth::password::hash_password;
use storefront_api::config::JwtConfig;
use storefront_api::entities::user_group::{self, Entity as UserGroupEntity, GroupName};
use storefront_api::entities::{category, product, seed_user_groups, setup_schema, user};

pub const ACCESS_SECRET: &str = "test-access-secret";
pub const REFRESH_SECRET: &str = "test-refresh-secret";

pub struct TestApp {
    pub address: String,
    pub client: Client,
    pub db: DatabaseConnection,
    pub jwt: Arc<JwtManager>,
}

pub fn test_jwt_config() -> JwtConfig {
    JwtConfig {
        access_secret: ACCESS_SECRET.to_string(),
        refresh_secret: REFRESH_SECRET.to_string(),
        algorithm: jsonwebtoken::Algorithm::HS256,
        access_ttl_minutes: 15,
        refresh_ttl_days: 7,
    }
}

pub async fn spawn_app() -> TestApp {
    let mut options = ConnectOptions::new("sqlite::memory:".to_string());
    // A single connection keeps the in-memory database alive across requests.
    options.max_connections(1).min_connections(1);
    let db = Database::connect(options)
        .await
        .expect("Failed to connect to the test database");

    setup_schema(&db).await.expect("Failed to set up schema");
    seed_user_groups(&db)
        .await
        .expect("Failed to seed user groups");

    let jwt = Arc::new(JwtManager::new(&test_jwt_config()));
    let app = create_api_router(Arc::new(db.clone()), jwt.clone());

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("Failed to bind test listener");
    let address = format!(
        "http://{}",
        listener
            .local_addr()
            .expect("Failed to read listener address")
    );
    tokio::spawn(async move {
        axum::serve(listener, app)
            .await
            .expect("Test server terminated");
    });

    TestApp {
        address,
        client: Client::new(),
        db,
        jwt,
    }
}

impl TestApp {
    pub fn url(&self, path: &str) -> String {
        format!("{}{}", self.address, path)
    }

    pub fn bearer(&self, token: &str) -> header::HeaderMap {
        let mut headers = header::HeaderMap::new();
        headers.insert(
            header::AUTHORIZATION,
            header::HeaderValue::from_str(&format!("Bearer {}", token))
                .expect("Failed to create Authorization header"),
        );
        headers
    }

    pub async fn register_user(&self, email: &str, password: &str) -> i32 {
        let response = self
            .client
            .post(self.url("/api/accounts/register"))
            .json(&json!({ "email": email, "password": password }))
            .send()
            .await
            .expect("Failed to send register request");
        assert_eq!(response.status(), StatusCode::CREATED);

        let body = response
            .json::<serde_json::Value>()
            .await
            .expect("Failed to parse register response JSON");
        body["id"].as_i64().expect("id not found in register response") as i32
    }

    pub async fn login(&self, email: &str, password: &str) -> (String, String) {
        let response = self
            .client
            .post(self.url("/api/accounts/login"))
            .json(&json!({ "email": email, "password": password }))
            .send()
            .await
            .expect("Failed to send login request");
        assert_eq!(response.status(), StatusCode::OK);

        let body = response
            .json::<serde_json::Value>()
            .await
            .expect("Failed to parse login response JSON");
        let access = body["access_token"]
            .as_str()
            .expect("access_token not found in login response")
            .to_string();
        let refresh = body["refresh_token"]
            .as_str()
            .expect("refresh_token not found in login response")
            .to_string();
        (access, refresh)
    }

    pub async fn register_and_login(&self, email: &str, password: &str) -> String {
        self.register_user(email, password).await;
        let (access, _) = self.login(email, password).await;
        access
    }

    //Admins are provisioned outside the HTTP surface, so the test inserts one directly.
    pub async fn create_admin(&self, email: &str, password: &str) -> String {
        let group = UserGroupEntity::find()
            .filter(user_group::Column::Name.eq(GroupName::Admin))
            .one(&self.db)
            .await
            .expect("Failed to query user groups")
            .expect("Admin group is missing");

        let now = Utc::now();
        user::ActiveModel {
            email: Set(email.to_string()),
            hashed_password: Set(hash_password(password).expect("Failed to hash password")),
            group_id: Set(group.id),
            is_active: Set(true),
            created_at: Set(now),
            updated_at: Set(now),
            ..Default::default()
        }
        .insert(&self.db)
        .await
        .expect("Failed to insert admin user");

        let (access, _) = self.login(email, password).await;
        access
    }

    pub async fn seed_category(&self, name: &str) -> i32 {
        category::ActiveModel {
            name: Set(name.to_string()),
            description: Set(None),
            ..Default::default()
        }
        .insert(&self.db)
        .await
        .expect("Failed to insert category")
        .id
    }

    pub async fn seed_product(&self, name: &str, price: f64, category_id: i32) -> i32 {
        product::ActiveModel {
            name: Set(name.to_string()),
            description: Set(None),
            price: Set(price),
            stock: Set(100),
            category_id: Set(category_id),
            image_url: Set(None),
            ..Default::default()
        }
        .insert(&self.db)
        .await
        .expect("Failed to insert product")
        .id
    }

    pub async fn add_cart_item(&self, token: &str, product_id: i32, quantity: i32) -> i32 {
        let response = self
            .client
            .post(self.url("/api/cart/items"))
            .headers(self.bearer(token))
            .json(&json!({ "product_id": product_id, "quantity": quantity }))
            .send()
            .await
            .expect("Failed to send add cart item request");
        assert!(
            response.status() == StatusCode::CREATED || response.status() == StatusCode::OK,
            "unexpected status {} adding a cart item",
            response.status()
        );

        let body = response
            .json::<serde_json::Value>()
            .await
            .expect("Failed to parse add cart item response JSON");
        body["id"].as_i64().expect("id not found in cart item response") as i32
    }
}
