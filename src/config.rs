use jsonwebtoken::Algorithm;
use rand::{distributions::Alphanumeric, Rng};
use std::str::FromStr;
use thiserror::Error;

const DEFAULT_BIND_ADDR: &str = "0.0.0.0:3000";
const DEFAULT_MAX_CONNECTIONS: u32 = 10;
const DEFAULT_ACCESS_TTL_MINUTES: i64 = 15;
const DEFAULT_REFRESH_TTL_DAYS: i64 = 7;

#[derive(Clone, Debug)]
pub struct AppConfig {
    pub database_url: String,
    pub database_max_connections: u32,
    pub bind_addr: String,
    pub jwt: JwtConfig,
}

#[derive(Clone, Debug)]
pub struct JwtConfig {
    pub access_secret: String,
    pub refresh_secret: String,
    pub algorithm: Algorithm,
    pub access_ttl_minutes: i64,
    pub refresh_ttl_days: i64,
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("{0} must be set")]
    MissingVar(&'static str),
    #[error("{name} is invalid: {reason}")]
    InvalidVar { name: &'static str, reason: String },
}

impl AppConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        let database_url =
            std::env::var("DATABASE_URL").map_err(|_| ConfigError::MissingVar("DATABASE_URL"))?;
        let database_max_connections =
            parse_var("DATABASE_MAX_CONNECTIONS", DEFAULT_MAX_CONNECTIONS)?;
        let bind_addr =
            std::env::var("BIND_ADDR").unwrap_or_else(|_| DEFAULT_BIND_ADDR.to_string());

        let jwt = JwtConfig {
            access_secret: secret_var("SECRET_KEY_ACCESS"),
            refresh_secret: secret_var("SECRET_KEY_REFRESH"),
            algorithm: signing_algorithm()?,
            access_ttl_minutes: parse_var("ACCESS_TOKEN_EXPIRE_MINUTES", DEFAULT_ACCESS_TTL_MINUTES)?,
            refresh_ttl_days: parse_var("REFRESH_TOKEN_EXPIRE_DAYS", DEFAULT_REFRESH_TTL_DAYS)?,
        };

        Ok(AppConfig {
            database_url,
            database_max_connections,
            bind_addr,
            jwt,
        })
    }
}

fn parse_var<T: FromStr>(name: &'static str, default: T) -> Result<T, ConfigError>
where
    T::Err: std::fmt::Display,
{
    match std::env::var(name) {
        Ok(value) => value.parse().map_err(|err: T::Err| ConfigError::InvalidVar {
            name,
            reason: err.to_string(),
        }),
        Err(_) => Ok(default),
    }
}

//Tokens signed with a generated secret die with the process.
fn secret_var(name: &'static str) -> String {
    match std::env::var(name) {
        Ok(value) => value,
        Err(_) => {
            tracing::warn!("{} is not set, using a generated secret", name);
            random_secret()
        }
    }
}

fn random_secret() -> String {
    rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(64)
        .map(char::from)
        .collect()
}

fn signing_algorithm() -> Result<Algorithm, ConfigError> {
    let name = match std::env::var("JWT_SIGNING_ALGORITHM") {
        Ok(value) => value,
        Err(_) => return Ok(Algorithm::HS256),
    };

    let algorithm = Algorithm::from_str(&name).map_err(|_| ConfigError::InvalidVar {
        name: "JWT_SIGNING_ALGORITHM",
        reason: format!("unknown algorithm {name}"),
    })?;

    match algorithm {
        Algorithm::HS256 | Algorithm::HS384 | Algorithm::HS512 => Ok(algorithm),
        _ => Err(ConfigError::InvalidVar {
            name: "JWT_SIGNING_ALGORITHM",
            reason: format!("{name} is not an HMAC algorithm"),
        }),
    }
}
