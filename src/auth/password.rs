use argon2::{
    password_hash::{rand_core::OsRng, PasswordHasher, PasswordVerifier, SaltString},
    Argon2, PasswordHash,
};
use once_cell::sync::Lazy;
use regex::Regex;
use validator::ValidationError;

static UPPERCASE_PATTERN: Lazy<Regex> = Lazy::new(|| Regex::new(r"[A-Z]").unwrap());
static LOWERCASE_PATTERN: Lazy<Regex> = Lazy::new(|| Regex::new(r"[a-z]").unwrap());
static DIGIT_PATTERN: Lazy<Regex> = Lazy::new(|| Regex::new(r"\d").unwrap());
static SPECIAL_PATTERN: Lazy<Regex> = Lazy::new(|| Regex::new(r"[@$!%*?&#]").unwrap());

pub fn hash_password(password: &str) -> Result<String, argon2::password_hash::Error> {
    let salt = SaltString::generate(&mut OsRng);
    let argon2 = Argon2::default();

    let password_hash = argon2
        .hash_password(password.as_bytes(), &salt)?
        .to_string();

    Ok(password_hash)
}

//A mismatch is an Ok(false), not an error; Err means the stored hash is unreadable.
pub fn verify_password(
    password: &str,
    hashed_password: &str,
) -> Result<bool, argon2::password_hash::Error> {
    let parsed_hash = PasswordHash::new(hashed_password)?;

    let argon2 = Argon2::default();
    Ok(argon2
        .verify_password(password.as_bytes(), &parsed_hash)
        .is_ok())
}

pub fn validate_password_strength(password: &str) -> Result<(), ValidationError> {
    if password.len() < 8 {
        return Err(strength_error("Password must be at least 8 characters long"));
    }
    if !UPPERCASE_PATTERN.is_match(password) {
        return Err(strength_error(
            "Password must contain at least one uppercase letter",
        ));
    }
    if !LOWERCASE_PATTERN.is_match(password) {
        return Err(strength_error(
            "Password must contain at least one lowercase letter",
        ));
    }
    if !DIGIT_PATTERN.is_match(password) {
        return Err(strength_error("Password must contain at least one digit"));
    }
    if !SPECIAL_PATTERN.is_match(password) {
        return Err(strength_error(
            "Password must contain at least one special character (@$!%*?&#)",
        ));
    }

    Ok(())
}

fn strength_error(message: &'static str) -> ValidationError {
    let mut error = ValidationError::new("password_strength");
    error.message = Some(message.into());
    error
}
