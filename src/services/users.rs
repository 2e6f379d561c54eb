//! Account lifecycle: registration, login, self-or-admin updates, password changes and resets,
//! and access token refresh.

use chrono::{Duration, Utc};
use log::{debug, info, warn};
use serde::Serialize;
use std::sync::Arc;
use validator::Validate;

use crate::auth::password::{
    generate_reset_token, hash_reset_token, validate_password_strength, verify_password,
};
use crate::auth::{
    AuthResponse, RegisterRequest, TokenIssuer, TokenKind, TokenSubject, UpdateUserRequest,
};
use crate::error::{AppError, ErrorCode};
use crate::models::{NewUser, PublicUser, Role, UserFilter, UserPatch};
use crate::repositories::{ResetTokenRepository, UserRepository};

const DEFAULT_RESET_TOKEN_TTL_MINUTES: i64 = 60;

/// Outcome of a password reset request. `success` is always true so the response does not
/// reveal whether the email is registered; `reset_token` is only set when it is.
#[derive(Debug, Serialize)]
pub struct PasswordResetTicket {
    pub success: bool,
    #[serde(skip_serializing)]
    pub reset_token: Option<String>,
}

fn invalid_credentials() -> AppError {
    AppError::Unauthorized(ErrorCode::InvalidCredentials, "Invalid credentials".into())
}

fn present(field: &Option<String>) -> Option<&str> {
    field.as_deref().filter(|value| !value.trim().is_empty())
}

pub struct UserService {
    users: Arc<dyn UserRepository>,
    tokens: Arc<dyn TokenIssuer>,
    reset_tokens: Arc<dyn ResetTokenRepository>,
    reset_token_ttl: Duration,
}

impl UserService {
    pub fn new(
        users: Arc<dyn UserRepository>,
        tokens: Arc<dyn TokenIssuer>,
        reset_tokens: Arc<dyn ResetTokenRepository>,
    ) -> Self {
        Self {
            users,
            tokens,
            reset_tokens,
            reset_token_ttl: Duration::minutes(DEFAULT_RESET_TOKEN_TTL_MINUTES),
        }
    }

    pub fn with_reset_token_ttl(mut self, ttl: Duration) -> Self {
        self.reset_token_ttl = ttl;
        self
    }

    fn session(&self, user: PublicUser) -> Result<AuthResponse, AppError> {
        let pair = self.tokens.issue_pair(&TokenSubject::from(&user))?;
        Ok(AuthResponse {
            user,
            access_token: pair.access_token,
            refresh_token: pair.refresh_token,
        })
    }

    /// Creates an account and signs it in.
    ///
    /// Checks run in order: required fields, field formats, email uniqueness, username
    /// uniqueness, password strength.
    pub async fn register(&self, request: &RegisterRequest) -> Result<AuthResponse, AppError> {
        let (Some(username), Some(email), Some(password)) = (
            present(&request.username),
            present(&request.email),
            request.password.as_deref().filter(|p| !p.is_empty()),
        ) else {
            return Err(AppError::invalid(
                ErrorCode::MissingRequiredFields,
                "Email, username and password are required",
            ));
        };
        request.validate()?;

        if self.users.email_exists(email).await? {
            return Err(AppError::conflict(
                ErrorCode::EmailExists,
                "Email already registered",
            ));
        }
        if self.users.username_exists(username).await? {
            return Err(AppError::conflict(
                ErrorCode::UsernameExists,
                "Username already taken",
            ));
        }
        validate_password_strength(password)?;

        let user = self
            .users
            .create(NewUser {
                username: username.to_string(),
                email: email.to_string(),
                password: password.to_string(),
                role: Role::User,
            })
            .await?;
        info!("User {} registered", user.id);

        self.session(user)
    }

    /// Signs a user in. Unknown email and wrong password fail identically.
    pub async fn login(&self, email: &str, password: &str) -> Result<AuthResponse, AppError> {
        let Some(user) = self.users.find_by_email(email).await? else {
            debug!("Login attempt for unknown email");
            return Err(invalid_credentials());
        };
        if !verify_password(password, &user.password_hash)? {
            debug!("Login attempt with wrong password for user {}", user.id);
            return Err(invalid_credentials());
        }

        info!("User {} logged in", user.id);
        self.session(user.into())
    }

    pub async fn get_by_id(&self, id: i32) -> Result<Option<PublicUser>, AppError> {
        self.users.find_by_id_safe(id).await
    }

    /// Lists accounts. Restricting this to admins is the caller's job.
    pub async fn list_all(&self, filter: &UserFilter) -> Result<Vec<PublicUser>, AppError> {
        self.users.find_all(filter).await
    }

    /// Updates an account. `Ok(None)` means it does not exist.
    ///
    /// A `role` in the request is dropped unless `is_admin` is set.
    pub async fn update(
        &self,
        user_id: i32,
        request: &UpdateUserRequest,
        caller_id: i32,
        is_admin: bool,
    ) -> Result<Option<PublicUser>, AppError> {
        let Some(current) = self.users.find_by_id_safe(user_id).await? else {
            return Ok(None);
        };
        if caller_id != user_id && !is_admin {
            warn!("User {} denied update of user {}", caller_id, user_id);
            return Err(AppError::forbidden(
                "You do not have permission to modify this user",
            ));
        }
        request.validate()?;

        if request.role.is_some() && !is_admin {
            debug!("Ignoring role change requested by non-admin user {}", caller_id);
        }
        let mut patch = UserPatch {
            username: request.username.clone().filter(|u| *u != current.username),
            email: request.email.clone().filter(|e| *e != current.email),
            role: request.role.filter(|_| is_admin),
        };

        if let Some(email) = &patch.email {
            if self.users.email_exists(email).await? {
                return Err(AppError::conflict(
                    ErrorCode::EmailExists,
                    "Email already registered",
                ));
            }
        }
        if let Some(username) = &patch.username {
            if self.users.username_exists(username).await? {
                return Err(AppError::conflict(
                    ErrorCode::UsernameExists,
                    "Username already taken",
                ));
            }
        }
        if patch.role == Some(current.role) {
            patch.role = None;
        }
        if patch.is_empty() {
            return Ok(Some(current));
        }

        let updated = self.users.update(user_id, &patch).await?;
        if updated.is_some() {
            info!("User {} updated by user {}", user_id, caller_id);
        }
        Ok(updated)
    }

    /// Deletes an account and, through storage, everything it owns.
    /// `Ok(false)` means it does not exist.
    pub async fn delete(
        &self,
        user_id: i32,
        caller_id: i32,
        is_admin: bool,
    ) -> Result<bool, AppError> {
        if self.users.find_by_id_safe(user_id).await?.is_none() {
            return Ok(false);
        }
        if caller_id != user_id && !is_admin {
            warn!("User {} denied deletion of user {}", caller_id, user_id);
            return Err(AppError::forbidden(
                "You do not have permission to delete this user",
            ));
        }

        let deleted = self.users.delete(user_id).await?;
        if deleted {
            info!("User {} deleted by user {}", user_id, caller_id);
        }
        Ok(deleted)
    }

    pub async fn change_password(
        &self,
        user_id: i32,
        current_password: &str,
        new_password: &str,
    ) -> Result<bool, AppError> {
        let not_found = || AppError::NotFound(ErrorCode::UserNotFound, "User not found".into());

        let user = self.users.find_by_id(user_id).await?.ok_or_else(not_found)?;
        if !verify_password(current_password, &user.password_hash)? {
            return Err(AppError::invalid(
                ErrorCode::InvalidCurrentPassword,
                "Current password is incorrect",
            ));
        }
        if current_password == new_password {
            return Err(AppError::invalid(
                ErrorCode::PasswordSame,
                "New password must differ from the current one",
            ));
        }
        validate_password_strength(new_password)?;

        if !self.users.change_password(user_id, new_password).await? {
            return Err(not_found());
        }
        info!("User {} changed their password", user_id);
        Ok(true)
    }

    /// Starts a password reset. The token is stored only as a digest with an expiry;
    /// delivering the raw token to the user is up to the caller.
    pub async fn initiate_password_reset(
        &self,
        email: &str,
    ) -> Result<PasswordResetTicket, AppError> {
        let Some(user) = self.users.find_by_email(email).await? else {
            debug!("Password reset requested for unknown email");
            return Ok(PasswordResetTicket {
                success: true,
                reset_token: None,
            });
        };

        let token = generate_reset_token();
        let expires_at = Utc::now() + self.reset_token_ttl;
        self.reset_tokens
            .store(user.id, &hash_reset_token(&token), expires_at)
            .await?;
        info!("Password reset token issued for user {}", user.id);

        Ok(PasswordResetTicket {
            success: true,
            reset_token: Some(token),
        })
    }

    /// Completes a password reset. Tokens are single use and expire.
    pub async fn reset_password(&self, token: &str, new_password: &str) -> Result<bool, AppError> {
        validate_password_strength(new_password)?;
        let invalid_token =
            || AppError::invalid(ErrorCode::InvalidResetToken, "Invalid or expired reset token");

        let user_id = self
            .reset_tokens
            .consume(&hash_reset_token(token), Utc::now())
            .await?
            .ok_or_else(invalid_token)?;
        if !self.users.change_password(user_id, new_password).await? {
            return Err(invalid_token());
        }

        info!("User {} reset their password", user_id);
        Ok(true)
    }

    /// Mints a new access token from a refresh token.
    ///
    /// Claims are re-read from storage, so role or email changes apply immediately and a
    /// deleted account can no longer refresh. `Ok(None)` means the refresh is refused.
    pub async fn refresh_access_token(
        &self,
        refresh_token: &str,
    ) -> Result<Option<String>, AppError> {
        let claims = match self.tokens.verify(refresh_token, TokenKind::Refresh) {
            Ok(claims) => claims,
            Err(err) => {
                debug!("Refresh refused: {}", err);
                return Ok(None);
            }
        };
        let Some(user) = self.users.find_by_id_safe(claims.sub).await? else {
            debug!("Refresh refused: user {} no longer exists", claims.sub);
            return Ok(None);
        };

        self.tokens
            .issue_access(&TokenSubject::from(&user))
            .map(Some)
    }
}
