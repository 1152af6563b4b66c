use axum::{extract::{Request, State}, middleware::Next, response::Response};
use sea_orm::{DatabaseConnection, EntityTrait};
use std::sync::Arc;

use crate::auth::jwt::JwtManager;
use crate::entities::user::Entity as UserEntity;
use crate::entities::user_group::{self, GroupName};
use crate::error::ApiError;

//Admins pass user-scoped routes; the reverse is rejected.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Scope {
    User,
    Admin,
}

#[derive(Clone)]
pub struct AuthState {
    pub db: Arc<DatabaseConnection>,
    pub jwt: Arc<JwtManager>,
    pub scope: Scope,
}

//The identity handlers receive after the middleware has re-checked the database.
#[derive(Clone, Debug)]
pub struct CurrentUser {
    pub id: i32,
    pub email: String,
    pub group: GroupName,
}

pub async fn auth_middleware(
    State(state): State<AuthState>,
    mut req: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let auth_header = req
        .headers()
        .get("Authorization")
        .and_then(|h| h.to_str().ok());

    let token = match auth_header {
        Some(header) => header.strip_prefix("Bearer ").ok_or_else(|| {
            ApiError::Unauthorized("Invalid authorization header".to_string())
        })?,
        None => {
            return Err(ApiError::Unauthorized(
                "Missing authorization header".to_string(),
            ));
        }
    };

    let claims = state.jwt.decode_access_token(token)?;

    //The token only names the user; activity and group come from the database.
    let result = UserEntity::find_by_id(claims.sub)
        .find_also_related(user_group::Entity)
        .one(&*state.db)
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
            return Err(ApiError::Unauthorized(
                "User no longer exists".to_string(),
            ));
        }
    };

    if !user.is_active {
        return Err(ApiError::Forbidden("User account is inactive".to_string()));
    }

    if state.scope == Scope::Admin && group.name != GroupName::Admin {
        return Err(ApiError::Forbidden("Admin privileges required".to_string()));
    }

    req.extensions_mut().insert(CurrentUser {
        id: user.id,
        email: user.email,
        group: group.name,
    });

    Ok(next.run(req).await)
}
