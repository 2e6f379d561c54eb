use crate::error::{AppError, ErrorCode};
use bcrypt::{hash, verify};
use rand::RngCore;
use sha2::{Digest, Sha256};

pub const PASSWORD_MIN_LEN: usize = 8;

/// Characters accepted as the required symbol in a password.
pub const PASSWORD_SYMBOLS: &str = "!@#$%^&*(),.?\":{}|<>";

pub fn hash_password(password: &str, cost: u32) -> Result<String, AppError> {
    hash(password, cost)
        .map_err(|e| AppError::InternalServerError(format!("Failed to hash password: {}", e)))
}

pub fn verify_password(password: &str, hashed_password: &str) -> Result<bool, AppError> {
    verify(password, hashed_password)
        .map_err(|e| AppError::InternalServerError(format!("Failed to verify password: {}", e)))
}

/// Checks the password rules in order and reports the first one that fails.
pub fn validate_password_strength(password: &str) -> Result<(), AppError> {
    if password.chars().count() < PASSWORD_MIN_LEN {
        return Err(AppError::invalid(
            ErrorCode::PasswordTooShort,
            format!("Password must be at least {} characters", PASSWORD_MIN_LEN),
        ));
    }
    if !password.chars().any(|c| c.is_uppercase()) {
        return Err(AppError::invalid(
            ErrorCode::PasswordNeedsUppercase,
            "Password must contain an uppercase letter",
        ));
    }
    if !password.chars().any(|c| c.is_lowercase()) {
        return Err(AppError::invalid(
            ErrorCode::PasswordNeedsLowercase,
            "Password must contain a lowercase letter",
        ));
    }
    if !password.chars().any(|c| c.is_ascii_digit()) {
        return Err(AppError::invalid(
            ErrorCode::PasswordNeedsNumber,
            "Password must contain a number",
        ));
    }
    if !password.chars().any(|c| PASSWORD_SYMBOLS.contains(c)) {
        return Err(AppError::invalid(
            ErrorCode::PasswordNeedsSpecial,
            format!("Password must contain one of {}", PASSWORD_SYMBOLS),
        ));
    }
    Ok(())
}

/// Generates a password reset token: 32 random bytes, hex-encoded.
pub fn generate_reset_token() -> String {
    let mut bytes = [0u8; 32];
    rand::thread_rng().fill_bytes(&mut bytes);
    hex::encode(bytes)
}

/// SHA-256 digest of a reset token, hex-encoded. Only this digest is ever stored.
pub fn hash_reset_token(token: &str) -> String {
    hex::encode(Sha256::digest(token.as_bytes()))
}
