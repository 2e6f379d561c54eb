pub mod extractors;
pub mod middleware;
pub mod password;
pub mod token;

use lazy_static::lazy_static;
use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::models::{PublicUser, Role};

// Re-export necessary items
pub use extractors::Caller;
pub use middleware::AuthMiddleware;
pub use password::{hash_password, validate_password_strength, verify_password};
pub use token::{Claims, JwtIssuer, TokenIssuer, TokenKind, TokenPair, TokenSubject};

lazy_static! {
    // Regex for username validation: alphanumeric, underscores, hyphens
    static ref USERNAME_REGEX: regex::Regex = regex::Regex::new(r"^[a-zA-Z0-9_-]+$").unwrap();
}

/// Represents the payload for a user login request.
#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

/// Represents the payload for a new user registration request.
///
/// Fields are optional so that a missing one is reported as `MISSING_REQUIRED_FIELDS`
/// rather than as a deserialization failure.
#[derive(Debug, Default, Clone, Deserialize, Validate)]
pub struct RegisterRequest {
    /// Between 3 and 30 characters, alphanumeric, underscores or hyphens.
    #[validate(
        length(min = 3, max = 30),
        regex(
            path = "USERNAME_REGEX",
            message = "Username must be alphanumeric, underscores, or hyphens"
        )
    )]
    pub username: Option<String>,
    #[validate(email)]
    pub email: Option<String>,
    /// Strength is checked by the account service.
    pub password: Option<String>,
}

/// Partial account update. `role` is only honoured when an admin makes the change.
#[derive(Debug, Default, Clone, Deserialize, Validate)]
pub struct UpdateUserRequest {
    #[validate(
        length(min = 3, max = 30),
        regex(
            path = "USERNAME_REGEX",
            message = "Username must be alphanumeric, underscores, or hyphens"
        )
    )]
    pub username: Option<String>,
    #[validate(email)]
    pub email: Option<String>,
    pub role: Option<Role>,
}

#[derive(Debug, Deserialize)]
pub struct ChangePasswordRequest {
    pub current_password: String,
    pub new_password: String,
}

#[derive(Debug, Deserialize)]
pub struct RefreshRequest {
    pub refresh_token: String,
}

#[derive(Debug, Deserialize)]
pub struct ForgotPasswordRequest {
    pub email: String,
}

#[derive(Debug, Deserialize)]
pub struct ResetPasswordRequest {
    pub token: String,
    pub new_password: String,
}

/// Response structure after successful authentication (login or registration).
#[derive(Debug, Serialize, Deserialize)]
pub struct AuthResponse {
    pub user: PublicUser,
    pub access_token: String,
    pub refresh_token: String,
}
