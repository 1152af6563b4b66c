use axum::{
    extract::Extension,
    http::StatusCode,
    response::IntoResponse,
    routing::post,
    Json, Router,
};
use chrono::{Duration, Utc};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, Set,
    TransactionTrait,
};
use sea_orm::ActiveEnum;
use serde::Deserialize;
use serde_json::json;
use std::sync::Arc;
use uuid::Uuid;
use validator::Validate;

use crate::auth::jwt::JwtManager;
use crate::auth::password::{hash_password, validate_password_strength, verify_password};
use crate::entities::user::{self, Entity as UserEntity};
use crate::entities::user_group::{self, GroupName};
use crate::entities::{password_reset_token, refresh_token};
use crate::error::ApiError;

const RESET_TOKEN_TTL_MINUTES: i64 = 60;

//ROUTERS
pub fn account_router(db: Arc<DatabaseConnection>, jwt: Arc<JwtManager>) -> Router {
    Router::new()
        .route("/accounts/register", post(register))
        .route("/accounts/login", post(login))
        .route("/accounts/refresh", post(refresh))
        .route("/accounts/password-reset/request", post(request_password_reset))
        .route("/accounts/password-reset/complete", post(complete_password_reset))
        .layer(Extension(db))
        .layer(Extension(jwt))
}

//ROUTES
async fn register(
    Extension(db): Extension<Arc<DatabaseConnection>>,
    Json(payload): Json<RegisterPayload>,
) -> Result<impl IntoResponse, ApiError> {
    payload.validate()?;
    let email = payload.email.to_lowercase();

    let txn = db.begin().await?;

    let existing = UserEntity::find()
        .filter(user::Column::Email.eq(&email))
        .one(&txn)
        .await?;
    if existing.is_some() {
        return Err(ApiError::Conflict(format!(
            "User with email {email} already exists"
        )));
    }

    let group = user_group::Entity::find()
        .filter(user_group::Column::Name.eq(GroupName::User))
        .one(&txn)
        .await?
        .ok_or_else(|| ApiError::Internal("default user group is missing".to_string()))?;

    let now = Utc::now();
    let new_user = user::ActiveModel {
        email: Set(email),
        hashed_password: Set(hash_password(&payload.password)?),
        group_id: Set(group.id),
        is_active: Set(true),
        created_at: Set(now),
        updated_at: Set(now),
        ..Default::default()
    };
    let created = new_user.insert(&txn).await?;

    txn.commit().await?;

    Ok((
        StatusCode::CREATED,
        Json(json!({
            "id": created.id,
            "email": created.email
        })),
    ))
}

async fn login(
    Extension(db): Extension<Arc<DatabaseConnection>>,
    Extension(jwt): Extension<Arc<JwtManager>>,
    Json(payload): Json<LoginPayload>,
) -> Result<impl IntoResponse, ApiError> {
    let email = payload.email.to_lowercase();

    let result = UserEntity::find()
        .filter(user::Column::Email.eq(&email))
        .find_also_related(user_group::Entity)
        .one(&*db)
        .await?;

    let (user, group) = match result {
        Some((user, Some(group))) => (user, group),
        Some((user, None)) => {
            return Err(ApiError::Internal(format!(
                "user {} is not assigned to a group",
                user.id
            )));
        }
        None => return Err(ApiError::InvalidCredentials),
    };

    if !verify_password(&payload.password, &user.hashed_password)? {
        return Err(ApiError::InvalidCredentials);
    }
    if !user.is_active {
        return Err(ApiError::Forbidden("User account is inactive".to_string()));
    }

    let access_token = jwt.generate_access_token(user.id, &user.email, &group.name.to_value())?;
    let (refresh_token_value, expires_at) = jwt.generate_refresh_token(user.id)?;

    let stored_token = refresh_token::ActiveModel {
        user_id: Set(user.id),
        token: Set(refresh_token_value.clone()),
        expires_at: Set(expires_at),
        ..Default::default()
    };
    stored_token.insert(&*db).await?;

    Ok((
        StatusCode::OK,
        Json(json!({
            "access_token": access_token,
            "refresh_token": refresh_token_value,
            "token_type": "bearer"
        })),
    ))
}

async fn refresh(
    Extension(db): Extension<Arc<DatabaseConnection>>,
    Extension(jwt): Extension<Arc<JwtManager>>,
    Json(payload): Json<RefreshPayload>,
) -> Result<impl IntoResponse, ApiError> {
    let claims = jwt.decode_refresh_token(&payload.refresh_token)?;

    //A verified signature is not enough, the token must still be on record.
    let stored = refresh_token::Entity::find()
        .filter(refresh_token::Column::Token.eq(&payload.refresh_token))
        .one(&*db)
        .await?
        .ok_or_else(|| ApiError::Unauthorized("Refresh token is not recognized".to_string()))?;

    if stored.expires_at < Utc::now() {
        return Err(ApiError::Unauthorized(
            "Refresh token has expired".to_string(),
        ));
    }

    let result = UserEntity::find_by_id(claims.sub)
        .find_also_related(user_group::Entity)
        .one(&*db)
        .await?;

    let (user, group) = match result {
        Some((user, Some(group))) => (user, group),
        Some((user, None)) => {
            return Err(ApiError::Internal(format!(
                "user {} is not assigned to a group",
                user.id
            )));
        }
        None => {
            return Err(ApiError::NotFound("User no longer exists".to_string()));
        }
    };

    let access_token = jwt.generate_access_token(user.id, &user.email, &group.name.to_value())?;

    Ok((
        StatusCode::OK,
        Json(json!({
            "access_token": access_token,
            "token_type": "bearer"
        })),
    ))
}

async fn request_password_reset(
    Extension(db): Extension<Arc<DatabaseConnection>>,
    Json(payload): Json<PasswordResetRequestPayload>,
) -> Result<impl IntoResponse, ApiError> {
    payload.validate()?;
    let email = payload.email.to_lowercase();

    let user = UserEntity::find()
        .filter(user::Column::Email.eq(&email))
        .one(&*db)
        .await?;

    //The response never reveals whether the account exists.
    if let Some(user) = user.filter(|user| user.is_active) {
        let txn = db.begin().await?;

        password_reset_token::Entity::delete_many()
            .filter(password_reset_token::Column::UserId.eq(user.id))
            .exec(&txn)
            .await?;

        let token = password_reset_token::ActiveModel {
            user_id: Set(user.id),
            token: Set(Uuid::new_v4().to_string()),
            expires_at: Set(Utc::now() + Duration::minutes(RESET_TOKEN_TTL_MINUTES)),
            ..Default::default()
        };
        token.insert(&txn).await?;

        txn.commit().await?;
    }

    Ok((
        StatusCode::OK,
        Json(json!({
            "message": "If the account exists, a password reset token has been issued"
        })),
    ))
}

async fn complete_password_reset(
    Extension(db): Extension<Arc<DatabaseConnection>>,
    Json(payload): Json<PasswordResetCompletePayload>,
) -> Result<impl IntoResponse, ApiError> {
    payload.validate()?;
    let email = payload.email.to_lowercase();

    let invalid = || ApiError::Validation("Invalid or expired password reset token".to_string());

    let user = UserEntity::find()
        .filter(user::Column::Email.eq(&email))
        .one(&*db)
        .await?
        .ok_or_else(invalid)?;
    if !user.is_active {
        return Err(invalid());
    }

    let stored = password_reset_token::Entity::find()
        .filter(password_reset_token::Column::UserId.eq(user.id))
        .filter(password_reset_token::Column::Token.eq(&payload.token))
        .one(&*db)
        .await?
        .ok_or_else(invalid)?;
    if stored.expires_at < Utc::now() {
        return Err(invalid());
    }

    let txn = db.begin().await?;

    let user_id = user.id;
    let mut user: user::ActiveModel = user.into();
    user.hashed_password = Set(hash_password(&payload.password)?);
    user.updated_at = Set(Utc::now());
    user.update(&txn).await?;

    password_reset_token::Entity::delete_many()
        .filter(password_reset_token::Column::UserId.eq(user_id))
        .exec(&txn)
        .await?;

    //A changed password revokes every session issued before it.
    refresh_token::Entity::delete_many()
        .filter(refresh_token::Column::UserId.eq(user_id))
        .exec(&txn)
        .await?;

    txn.commit().await?;

    Ok((
        StatusCode::OK,
        Json(json!({
            "message": "Password updated successfully"
        })),
    ))
}

//Structs
#[derive(Deserialize, Debug, Validate)]
struct RegisterPayload {
    #[validate(email)]
    email: String,
    #[validate(custom(function = validate_password_strength))]
    password: String,
}

#[derive(Deserialize, Debug)]
struct LoginPayload {
    email: String,
    password: String,
}

#[derive(Deserialize, Debug)]
struct RefreshPayload {
    refresh_token: String,
}

#[derive(Deserialize, Debug, Validate)]
struct PasswordResetRequestPayload {
    #[validate(email)]
    email: String,
}

#[derive(Deserialize, Debug, Validate)]
struct PasswordResetCompletePayload {
    #[validate(email)]
    email: String,
    token: String,
    #[validate(custom(function = validate_password_strength))]
    password: String,
}
