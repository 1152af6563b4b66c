use chrono::{DateTime, Duration, Utc};
use jsonwebtoken::{
    decode, encode, errors::ErrorKind, Algorithm, DecodingKey, EncodingKey, Header, Validation,
};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use crate::config::JwtConfig;

//Access and refresh tokens are signed with separate secrets, so one cannot
//stand in for the other.
pub struct JwtManager {
    algorithm: Algorithm,
    access_encoding: EncodingKey,
    access_decoding: DecodingKey,
    refresh_encoding: EncodingKey,
    refresh_decoding: DecodingKey,
    access_ttl: Duration,
    refresh_ttl: Duration,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct AccessClaims {
    pub sub: i32,
    pub email: String,
    pub group: String,
    pub iat: usize,
    pub exp: usize,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RefreshClaims {
    pub sub: i32,
    pub jti: String,
    pub iat: usize,
    pub exp: usize,
}

#[derive(Error, Debug)]
pub enum TokenError {
    #[error("Token has expired")]
    Expired,
    #[error("Invalid token")]
    Invalid,
    #[error("Failed to generate token")]
    Generation,
}

impl JwtManager {
    pub fn new(config: &JwtConfig) -> Self {
        JwtManager {
            algorithm: config.algorithm,
            access_encoding: EncodingKey::from_secret(config.access_secret.as_bytes()),
            access_decoding: DecodingKey::from_secret(config.access_secret.as_bytes()),
            refresh_encoding: EncodingKey::from_secret(config.refresh_secret.as_bytes()),
            refresh_decoding: DecodingKey::from_secret(config.refresh_secret.as_bytes()),
            access_ttl: Duration::minutes(config.access_ttl_minutes),
            refresh_ttl: Duration::days(config.refresh_ttl_days),
        }
    }

    pub fn generate_access_token(
        &self,
        user_id: i32,
        email: &str,
        group: &str,
    ) -> Result<String, TokenError> {
        let (iat, exp) = self.window(self.access_ttl)?;
        let claims = AccessClaims {
            sub: user_id,
            email: email.to_string(),
            group: group.to_string(),
            iat,
            exp,
        };

        encode(&Header::new(self.algorithm), &claims, &self.access_encoding)
            .map_err(|_| TokenError::Generation)
    }

    //Returns the token together with its expiry, which is persisted alongside it.
    pub fn generate_refresh_token(
        &self,
        user_id: i32,
    ) -> Result<(String, DateTime<Utc>), TokenError> {
        let now = Utc::now();
        let expires_at = now
            .checked_add_signed(self.refresh_ttl)
            .ok_or(TokenError::Generation)?;
        let claims = RefreshClaims {
            sub: user_id,
            jti: Uuid::new_v4().to_string(),
            iat: now.timestamp() as usize,
            exp: expires_at.timestamp() as usize,
        };

        let token = encode(&Header::new(self.algorithm), &claims, &self.refresh_encoding)
            .map_err(|_| TokenError::Generation)?;

        Ok((token, expires_at))
    }

    pub fn decode_access_token(&self, token: &str) -> Result<AccessClaims, TokenError> {
        let validation = Validation::new(self.algorithm);

        decode::<AccessClaims>(token, &self.access_decoding, &validation)
            .map(|data| data.claims)
            .map_err(map_decode_error)
    }

    pub fn decode_refresh_token(&self, token: &str) -> Result<RefreshClaims, TokenError> {
        let validation = Validation::new(self.algorithm);

        decode::<RefreshClaims>(token, &self.refresh_decoding, &validation)
            .map(|data| data.claims)
            .map_err(map_decode_error)
    }

    fn window(&self, ttl: Duration) -> Result<(usize, usize), TokenError> {
        let now = Utc::now();
        let exp = now.checked_add_signed(ttl).ok_or(TokenError::Generation)?;
        Ok((now.timestamp() as usize, exp.timestamp() as usize))
    }
}

fn map_decode_error(err: jsonwebtoken::errors::Error) -> TokenError {
    match err.kind() {
        ErrorKind::ExpiredSignature => TokenError::Expired,
        _ => TokenError::Invalid,
    }
}
