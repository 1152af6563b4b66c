use chrono::{Duration, Utc};
use jsonwebtoken::{encode, Algorithm, EncodingKey, Header};
use reqwest::StatusCode;
use sea_orm::{ActiveModelTrait, ColumnTrait, EntityTrait, QueryFilter, Set};
use serde_json::json;

use storefront_api::auth::jwt::{AccessClaims, RefreshClaims};
use storefront_api::entities::password_reset_token::{self, Entity as ResetTokenEntity};
use storefront_api::entities::refresh_token::{self, Entity as RefreshTokenEntity};
use storefront_api::entities::user::{self, Entity as UserEntity};

mod common;
use common::{spawn_app, ACCESS_SECRET, REFRESH_SECRET};

#[tokio::test]
async fn health_endpoint_works() {
    let app = spawn_app().await;

    let response = app
        .client
        .get(app.url("/health"))
        .send()
        .await
        .expect("Failed to send health request");

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        response.text().await.expect("Failed to read health body"),
        "OK"
    );
}

#[tokio::test]
async fn register_returns_created_user() {
    let app = spawn_app().await;

    let response = app
        .client
        .post(app.url("/api/accounts/register"))
        .json(&json!({
            "email": "NewUser@Example.COM",
            "password": "Muzion15!"
        }))
        .send()
        .await
        .expect("Failed to send register request");

    assert_eq!(response.status(), StatusCode::CREATED);

    let body = response
        .json::<serde_json::Value>()
        .await
        .expect("Failed to parse register response JSON");
    assert!(body["id"].as_i64().expect("id missing") > 0);
    // Emails are stored lowercase.
    assert_eq!(body["email"].as_str(), Some("newuser@example.com"));
}

#[tokio::test]
async fn register_rejects_duplicate_email() {
    let app = spawn_app().await;
    app.register_user("dup@example.com", "Muzion15!").await;

    // Step 1: Same email again
    let response = app
        .client
        .post(app.url("/api/accounts/register"))
        .json(&json!({ "email": "dup@example.com", "password": "Muzion15!" }))
        .send()
        .await
        .expect("Failed to send register request");

    assert_eq!(response.status(), StatusCode::CONFLICT);

    let body = response
        .json::<serde_json::Value>()
        .await
        .expect("Failed to parse register response JSON");
    assert_eq!(
        body["error"].as_str(),
        Some("User with email dup@example.com already exists")
    );

    // Step 2: A case variant collides too
    let response = app
        .client
        .post(app.url("/api/accounts/register"))
        .json(&json!({ "email": "DUP@EXAMPLE.COM", "password": "Muzion15!" }))
        .send()
        .await
        .expect("Failed to send register request");

    assert_eq!(response.status(), StatusCode::CONFLICT);
}

#[tokio::test]
async fn register_rejects_weak_passwords() {
    let app = spawn_app().await;

    // Each candidate breaks exactly one rule.
    let weak = [
        "weakpass",  // no uppercase, digit or special
        "muzion15!", // no uppercase
        "MUZION15!", // no lowercase
        "Muzion15",  // no special character
        "Mz1!",      // too short
    ];

    for password in weak {
        let response = app
            .client
            .post(app.url("/api/accounts/register"))
            .json(&json!({ "email": "weak@example.com", "password": password }))
            .send()
            .await
            .expect("Failed to send register request");

        assert_eq!(
            response.status(),
            StatusCode::BAD_REQUEST,
            "password {password:?} should have been rejected"
        );
    }
}

#[tokio::test]
async fn register_rejects_invalid_email() {
    let app = spawn_app().await;

    let response = app
        .client
        .post(app.url("/api/accounts/register"))
        .json(&json!({ "email": "not-an-email", "password": "Muzion15!" }))
        .send()
        .await
        .expect("Failed to send register request");

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn login_returns_token_pair() {
    let app = spawn_app().await;
    app.register_user("login@example.com", "Muzion15!").await;

    let response = app
        .client
        .post(app.url("/api/accounts/login"))
        .json(&json!({ "email": "login@example.com", "password": "Muzion15!" }))
        .send()
        .await
        .expect("Failed to send login request");

    assert_eq!(response.status(), StatusCode::OK);

    let body = response
        .json::<serde_json::Value>()
        .await
        .expect("Failed to parse login response JSON");
    assert!(!body["access_token"]
        .as_str()
        .expect("access_token missing")
        .is_empty());
    assert!(!body["refresh_token"]
        .as_str()
        .expect("refresh_token missing")
        .is_empty());
    assert_eq!(body["token_type"].as_str(), Some("bearer"));
}

#[tokio::test]
async fn login_rejects_bad_credentials() {
    let app = spawn_app().await;
    app.register_user("creds@example.com", "Muzion15!").await;

    // Step 1: Wrong password
    let response = app
        .client
        .post(app.url("/api/accounts/login"))
        .json(&json!({ "email": "creds@example.com", "password": "Wrong15!x" }))
        .send()
        .await
        .expect("Failed to send login request");

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    let body = response
        .json::<serde_json::Value>()
        .await
        .expect("Failed to parse login response JSON");
    assert_eq!(body["error"].as_str(), Some("Invalid email or password"));

    // Step 2: Unknown email gets the same answer
    let response = app
        .client
        .post(app.url("/api/accounts/login"))
        .json(&json!({ "email": "ghost@example.com", "password": "Muzion15!" }))
        .send()
        .await
        .expect("Failed to send login request");

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    let body = response
        .json::<serde_json::Value>()
        .await
        .expect("Failed to parse login response JSON");
    assert_eq!(body["error"].as_str(), Some("Invalid email or password"));
}

#[tokio::test]
async fn login_rejects_inactive_user() {
    let app = spawn_app().await;
    let user_id = app.register_user("inactive@example.com", "Muzion15!").await;

    let record = UserEntity::find_by_id(user_id)
        .one(&app.db)
        .await
        .expect("Failed to query user")
        .expect("User is missing");
    let mut record: user::ActiveModel = record.into();
    record.is_active = Set(false);
    record
        .update(&app.db)
        .await
        .expect("Failed to deactivate user");

    let response = app
        .client
        .post(app.url("/api/accounts/login"))
        .json(&json!({ "email": "inactive@example.com", "password": "Muzion15!" }))
        .send()
        .await
        .expect("Failed to send login request");

    assert_eq!(response.status(), StatusCode::FORBIDDEN);
    let body = response
        .json::<serde_json::Value>()
        .await
        .expect("Failed to parse login response JSON");
    assert_eq!(body["error"].as_str(), Some("User account is inactive"));
}

#[tokio::test]
async fn protected_routes_require_a_valid_token() {
    let app = spawn_app().await;

    // Step 1: No Authorization header
    let response = app
        .client
        .get(app.url("/api/products"))
        .send()
        .await
        .expect("Failed to send products request");
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    // Step 2: Malformed header
    let response = app
        .client
        .get(app.url("/api/products"))
        .header("Authorization", "Token abc")
        .send()
        .await
        .expect("Failed to send products request");
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    // Step 3: Token signed with the wrong secret
    let now = Utc::now().timestamp() as usize;
    let claims = AccessClaims {
        sub: 1,
        email: "forged@example.com".to_string(),
        group: "user".to_string(),
        iat: now,
        exp: now + 900,
    };
    let forged = encode(
        &Header::new(Algorithm::HS256),
        &claims,
        &EncodingKey::from_secret(b"some-other-secret"),
    )
    .expect("Failed to encode token");

    let response = app
        .client
        .get(app.url("/api/products"))
        .headers(app.bearer(&forged))
        .send()
        .await
        .expect("Failed to send products request");
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn expired_access_token_is_rejected() {
    let app = spawn_app().await;
    let user_id = app.register_user("expired@example.com", "Muzion15!").await;

    // Well past the decoder's leeway.
    let now = Utc::now().timestamp() as usize;
    let claims = AccessClaims {
        sub: user_id,
        email: "expired@example.com".to_string(),
        group: "user".to_string(),
        iat: now - 7200,
        exp: now - 3600,
    };
    let expired = encode(
        &Header::new(Algorithm::HS256),
        &claims,
        &EncodingKey::from_secret(ACCESS_SECRET.as_bytes()),
    )
    .expect("Failed to encode token");

    let response = app
        .client
        .get(app.url("/api/products"))
        .headers(app.bearer(&expired))
        .send()
        .await
        .expect("Failed to send products request");

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    let body = response
        .json::<serde_json::Value>()
        .await
        .expect("Failed to parse products response JSON");
    assert_eq!(body["error"].as_str(), Some("Token has expired"));
}

#[tokio::test]
async fn token_of_deactivated_user_is_rejected() {
    let app = spawn_app().await;
    let user_id = app.register_user("locked@example.com", "Muzion15!").await;
    let (access, _) = app.login("locked@example.com", "Muzion15!").await;

    let record = UserEntity::find_by_id(user_id)
        .one(&app.db)
        .await
        .expect("Failed to query user")
        .expect("User is missing");
    let mut record: user::ActiveModel = record.into();
    record.is_active = Set(false);
    record
        .update(&app.db)
        .await
        .expect("Failed to deactivate user");

    // The token is still valid but the account no longer is.
    let response = app
        .client
        .get(app.url("/api/products"))
        .headers(app.bearer(&access))
        .send()
        .await
        .expect("Failed to send products request");

    assert_eq!(response.status(), StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn refresh_returns_a_working_access_token() {
    let app = spawn_app().await;
    app.register_user("refresh@example.com", "Muzion15!").await;
    let (_, refresh) = app.login("refresh@example.com", "Muzion15!").await;

    let categ = app.seed_category("Bakery").await;
    app.seed_product("BAGEL", 2.5, categ).await;

    // Step 1: Exchange the refresh token
    let response = app
        .client
        .post(app.url("/api/accounts/refresh"))
        .json(&json!({ "refresh_token": refresh }))
        .send()
        .await
        .expect("Failed to send refresh request");

    assert_eq!(response.status(), StatusCode::OK);
    let body = response
        .json::<serde_json::Value>()
        .await
        .expect("Failed to parse refresh response JSON");
    let access = body["access_token"]
        .as_str()
        .expect("access_token not found in refresh response");
    assert_eq!(body["token_type"].as_str(), Some("bearer"));

    // Step 2: The new token opens protected routes
    let response = app
        .client
        .get(app.url("/api/products"))
        .headers(app.bearer(access))
        .send()
        .await
        .expect("Failed to send products request");
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn refresh_rejects_unpersisted_token() {
    let app = spawn_app().await;
    let user_id = app.register_user("unpersisted@example.com", "Muzion15!").await;

    // Validly signed, but never stored.
    let (token, _) = app
        .jwt
        .generate_refresh_token(user_id)
        .expect("Failed to generate refresh token");

    let response = app
        .client
        .post(app.url("/api/accounts/refresh"))
        .json(&json!({ "refresh_token": token }))
        .send()
        .await
        .expect("Failed to send refresh request");

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    let body = response
        .json::<serde_json::Value>()
        .await
        .expect("Failed to parse refresh response JSON");
    assert_eq!(
        body["error"].as_str(),
        Some("Refresh token is not recognized")
    );
}

#[tokio::test]
async fn refresh_rejects_expired_signature() {
    let app = spawn_app().await;
    let user_id = app.register_user("stale@example.com", "Muzion15!").await;

    let now = Utc::now().timestamp() as usize;
    let claims = RefreshClaims {
        sub: user_id,
        jti: uuid::Uuid::new_v4().to_string(),
        iat: now - 7200,
        exp: now - 3600,
    };
    let expired = encode(
        &Header::new(Algorithm::HS256),
        &claims,
        &EncodingKey::from_secret(REFRESH_SECRET.as_bytes()),
    )
    .expect("Failed to encode token");

    let response = app
        .client
        .post(app.url("/api/accounts/refresh"))
        .json(&json!({ "refresh_token": expired }))
        .send()
        .await
        .expect("Failed to send refresh request");

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn refresh_rejects_stale_stored_token() {
    let app = spawn_app().await;
    app.register_user("rotated@example.com", "Muzion15!").await;
    let (_, refresh) = app.login("rotated@example.com", "Muzion15!").await;

    // Age the stored row; the JWT itself is still within its window.
    let row = RefreshTokenEntity::find()
        .filter(refresh_token::Column::Token.eq(&refresh))
        .one(&app.db)
        .await
        .expect("Failed to query refresh tokens")
        .expect("Refresh token row is missing");
    let mut row: refresh_token::ActiveModel = row.into();
    row.expires_at = Set(Utc::now() - Duration::hours(1));
    row.update(&app.db)
        .await
        .expect("Failed to age refresh token");

    let response = app
        .client
        .post(app.url("/api/accounts/refresh"))
        .json(&json!({ "refresh_token": refresh }))
        .send()
        .await
        .expect("Failed to send refresh request");

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    let body = response
        .json::<serde_json::Value>()
        .await
        .expect("Failed to parse refresh response JSON");
    assert_eq!(body["error"].as_str(), Some("Refresh token has expired"));
}

#[tokio::test]
async fn access_token_cannot_be_used_as_refresh_token() {
    let app = spawn_app().await;
    app.register_user("crossed@example.com", "Muzion15!").await;
    let (access, _) = app.login("crossed@example.com", "Muzion15!").await;

    // Signed with the access secret, so the refresh decoder refuses it.
    let response = app
        .client
        .post(app.url("/api/accounts/refresh"))
        .json(&json!({ "refresh_token": access }))
        .send()
        .await
        .expect("Failed to send refresh request");

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn password_reset_flow_updates_password() {
    let app = spawn_app().await;
    let user_id = app.register_user("reset@example.com", "Muzion15!").await;
    let (_, refresh) = app.login("reset@example.com", "Muzion15!").await;

    // Step 1: Request a reset token
    let response = app
        .client
        .post(app.url("/api/accounts/password-reset/request"))
        .json(&json!({ "email": "reset@example.com" }))
        .send()
        .await
        .expect("Failed to send password reset request");
    assert_eq!(response.status(), StatusCode::OK);

    // Step 2: Pull the issued token from storage
    let row = ResetTokenEntity::find()
        .filter(password_reset_token::Column::UserId.eq(user_id))
        .one(&app.db)
        .await
        .expect("Failed to query password reset tokens")
        .expect("Password reset token is missing");

    // Step 3: Complete the reset
    let response = app
        .client
        .post(app.url("/api/accounts/password-reset/complete"))
        .json(&json!({
            "email": "reset@example.com",
            "token": row.token,
            "password": "Muzion16!"
        }))
        .send()
        .await
        .expect("Failed to send password reset completion");
    assert_eq!(response.status(), StatusCode::OK);

    // Step 4: Only the new password logs in
    let response = app
        .client
        .post(app.url("/api/accounts/login"))
        .json(&json!({ "email": "reset@example.com", "password": "Muzion15!" }))
        .send()
        .await
        .expect("Failed to send login request");
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    app.login("reset@example.com", "Muzion16!").await;

    // Step 5: Sessions from before the reset are revoked
    let response = app
        .client
        .post(app.url("/api/accounts/refresh"))
        .json(&json!({ "refresh_token": refresh }))
        .send()
        .await
        .expect("Failed to send refresh request");
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn password_reset_request_does_not_reveal_accounts() {
    let app = spawn_app().await;
    app.register_user("present@example.com", "Muzion15!").await;

    let mut bodies = Vec::new();
    for email in ["present@example.com", "absent@example.com"] {
        let response = app
            .client
            .post(app.url("/api/accounts/password-reset/request"))
            .json(&json!({ "email": email }))
            .send()
            .await
            .expect("Failed to send password reset request");

        assert_eq!(response.status(), StatusCode::OK);
        bodies.push(
            response
                .json::<serde_json::Value>()
                .await
                .expect("Failed to parse password reset response JSON"),
        );
    }

    // Identical answers for known and unknown addresses.
    assert_eq!(bodies[0], bodies[1]);
    assert_eq!(
        bodies[0]["message"].as_str(),
        Some("If the account exists, a password reset token has been issued")
    );
}

#[tokio::test]
async fn password_reset_rejects_wrong_token() {
    let app = spawn_app().await;
    app.register_user("wrongtoken@example.com", "Muzion15!").await;

    let response = app
        .client
        .post(app.url("/api/accounts/password-reset/request"))
        .json(&json!({ "email": "wrongtoken@example.com" }))
        .send()
        .await
        .expect("Failed to send password reset request");
    assert_eq!(response.status(), StatusCode::OK);

    let response = app
        .client
        .post(app.url("/api/accounts/password-reset/complete"))
        .json(&json!({
            "email": "wrongtoken@example.com",
            "token": "not-the-issued-token",
            "password": "Muzion16!"
        }))
        .send()
        .await
        .expect("Failed to send password reset completion");

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body = response
        .json::<serde_json::Value>()
        .await
        .expect("Failed to parse password reset response JSON");
    assert_eq!(
        body["error"].as_str(),
        Some("Invalid or expired password reset token")
    );
}

#[tokio::test]
async fn password_reset_rejects_expired_token() {
    let app = spawn_app().await;
    let user_id = app
        .register_user("expiredreset@example.com", "Muzion15!")
        .await;

    let response = app
        .client
        .post(app.url("/api/accounts/password-reset/request"))
        .json(&json!({ "email": "expiredreset@example.com" }))
        .send()
        .await
        .expect("Failed to send password reset request");
    assert_eq!(response.status(), StatusCode::OK);

    let row = ResetTokenEntity::find()
        .filter(password_reset_token::Column::UserId.eq(user_id))
        .one(&app.db)
        .await
        .expect("Failed to query password reset tokens")
        .expect("Password reset token is missing");
    let token = row.token.clone();
    let mut row: password_reset_token::ActiveModel = row.into();
    row.expires_at = Set(Utc::now() - Duration::hours(1));
    row.update(&app.db)
        .await
        .expect("Failed to age password reset token");

    let response = app
        .client
        .post(app.url("/api/accounts/password-reset/complete"))
        .json(&json!({
            "email": "expiredreset@example.com",
            "token": token,
            "password": "Muzion16!"
        }))
        .send()
        .await
        .expect("Failed to send password reset completion");

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}
