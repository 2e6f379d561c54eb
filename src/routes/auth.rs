use crate::{
    auth::{
        ForgotPasswordRequest, LoginRequest, RefreshRequest, RegisterRequest,
        ResetPasswordRequest,
    },
    error::{AppError, ErrorCode},
    services::UserService,
};
use actix_web::{post, web, HttpResponse, Responder};
use serde_json::json;

/// Register a new user
///
/// Creates a new user account and returns it with an access/refresh token pair.
#[post("/register")]
pub async fn register(
    service: web::Data<UserService>,
    register_data: web::Json<RegisterRequest>,
) -> Result<impl Responder, AppError> {
    let session = service.register(&register_data).await?;
    Ok(HttpResponse::Created().json(session))
}

/// Login user
///
/// Authenticates a user and returns a fresh token pair.
#[post("/login")]
pub async fn login(
    service: web::Data<UserService>,
    login_data: web::Json<LoginRequest>,
) -> Result<impl Responder, AppError> {
    let session = service
        .login(&login_data.email, &login_data.password)
        .await?;
    Ok(HttpResponse::Ok().json(session))
}

/// Exchange a refresh token for a new access token.
#[post("/refresh")]
pub async fn refresh(
    service: web::Data<UserService>,
    body: web::Json<RefreshRequest>,
) -> Result<impl Responder, AppError> {
    match service.refresh_access_token(&body.refresh_token).await? {
        Some(access_token) => {
            Ok(HttpResponse::Ok().json(json!({ "access_token": access_token })))
        }
        None => Err(AppError::Unauthorized(
            ErrorCode::InvalidToken,
            "Invalid or expired refresh token".into(),
        )),
    }
}

/// Start a password reset.
///
/// Always answers `{"success": true}`. The reset token itself is never part of the
/// response; it has to reach the account owner out of band.
#[post("/forgot-password")]
pub async fn forgot_password(
    service: web::Data<UserService>,
    body: web::Json<ForgotPasswordRequest>,
) -> Result<impl Responder, AppError> {
    let ticket = service.initiate_password_reset(&body.email).await?;
    Ok(HttpResponse::Ok().json(ticket))
}

#[post("/reset-password")]
pub async fn reset_password(
    service: web::Data<UserService>,
    body: web::Json<ResetPasswordRequest>,
) -> Result<impl Responder, AppError> {
    service.reset_password(&body.token, &body.new_password).await?;
    Ok(HttpResponse::Ok().json(json!({ "success": true })))
}
