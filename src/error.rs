//!
//! # Custom Error Handling
//!
//! This module defines the custom error type `AppError` used throughout the application.
//! Every failure raised by the services carries a stable, machine-readable `ErrorCode`
//! together with a human-readable message, and belongs to one `ErrorKind`.
//!
//! `AppError` implements `actix_web::error::ResponseError`, which is the single place where
//! error kinds are translated into HTTP status codes and JSON bodies.
//! It also provides `From` trait implementations for `sqlx::Error`,
//! `validator::ValidationErrors`, `jsonwebtoken::errors::Error`, `bcrypt::BcryptError` and
//! the actix extractor errors, allowing for easy conversion using the `?` operator.

use actix_web::{
    error::{JsonPayloadError, PathError, QueryPayloadError, ResponseError},
    http::StatusCode,
    HttpResponse,
};
use serde_json::json;
use std::fmt;
use validator::ValidationErrors;

/// Stable error codes surfaced to clients.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCode {
    UserIdRequired,
    InvalidTitle,
    InvalidTitleLength,
    InvalidDueDate,
    InvalidStatus,
    NoUpdateData,
    EmailExists,
    UsernameExists,
    InvalidCredentials,
    InvalidCurrentPassword,
    Forbidden,
    PasswordTooShort,
    PasswordNeedsUppercase,
    PasswordNeedsLowercase,
    PasswordNeedsNumber,
    PasswordNeedsSpecial,
    PasswordSame,
    MissingRequiredFields,
    InvalidEmail,
    InvalidUsername,
    InvalidResetToken,
    InvalidToken,
    MissingToken,
    InvalidRequestBody,
    InvalidQuery,
    InvalidPath,
    UserNotFound,
    TaskNotFound,
    ConcurrentModification,
    DatabaseError,
    InternalError,
}

impl ErrorCode {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorCode::UserIdRequired => "USER_ID_REQUIRED",
            ErrorCode::InvalidTitle => "INVALID_TITLE",
            ErrorCode::InvalidTitleLength => "INVALID_TITLE_LENGTH",
            ErrorCode::InvalidDueDate => "INVALID_DUE_DATE",
            ErrorCode::InvalidStatus => "INVALID_STATUS",
            ErrorCode::NoUpdateData => "NO_UPDATE_DATA",
            ErrorCode::EmailExists => "EMAIL_EXISTS",
            ErrorCode::UsernameExists => "USERNAME_EXISTS",
            ErrorCode::InvalidCredentials => "INVALID_CREDENTIALS",
            ErrorCode::InvalidCurrentPassword => "INVALID_CURRENT_PASSWORD",
            ErrorCode::Forbidden => "FORBIDDEN",
            ErrorCode::PasswordTooShort => "PASSWORD_TOO_SHORT",
            ErrorCode::PasswordNeedsUppercase => "PASSWORD_NEEDS_UPPERCASE",
            ErrorCode::PasswordNeedsLowercase => "PASSWORD_NEEDS_LOWERCASE",
            ErrorCode::PasswordNeedsNumber => "PASSWORD_NEEDS_NUMBER",
            ErrorCode::PasswordNeedsSpecial => "PASSWORD_NEEDS_SPECIAL",
            ErrorCode::PasswordSame => "PASSWORD_SAME",
            ErrorCode::MissingRequiredFields => "MISSING_REQUIRED_FIELDS",
            ErrorCode::InvalidEmail => "INVALID_EMAIL",
            ErrorCode::InvalidUsername => "INVALID_USERNAME",
            ErrorCode::InvalidResetToken => "INVALID_RESET_TOKEN",
            ErrorCode::InvalidToken => "INVALID_TOKEN",
            ErrorCode::MissingToken => "MISSING_TOKEN",
            ErrorCode::InvalidRequestBody => "INVALID_REQUEST_BODY",
            ErrorCode::InvalidQuery => "INVALID_QUERY",
            ErrorCode::InvalidPath => "INVALID_PATH",
            ErrorCode::UserNotFound => "USER_NOT_FOUND",
            ErrorCode::TaskNotFound => "TASK_NOT_FOUND",
            ErrorCode::ConcurrentModification => "CONCURRENT_MODIFICATION",
            ErrorCode::DatabaseError => "DATABASE_ERROR",
            ErrorCode::InternalError => "INTERNAL_ERROR",
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Transport-agnostic classification of an error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    BadInput,
    Unauthorized,
    Forbidden,
    NotFound,
    Conflict,
    Internal,
}

/// Represents all possible errors that can occur within the application.
///
/// Each variant corresponds to one error kind. Variants that can arise for more than one
/// reason carry an `ErrorCode` alongside the message.
#[derive(Debug)]
pub enum AppError {
    /// Malformed or missing input (HTTP 400). The caller can correct and retry.
    InvalidInput(ErrorCode, String),
    /// A uniqueness or concurrency conflict (HTTP 409).
    Conflict(ErrorCode, String),
    /// The caller is authenticated but not permitted to act on the resource (HTTP 403).
    Forbidden(String),
    /// Credentials are missing or invalid (HTTP 401).
    Unauthorized(ErrorCode, String),
    /// A resource that must exist does not (HTTP 404).
    NotFound(ErrorCode, String),
    /// Represents an error originating from database operations (HTTP 500).
    /// Wraps errors from the `sqlx` crate.
    DatabaseError(String),
    /// Represents an unexpected server-side error (HTTP 500).
    InternalServerError(String),
}

impl AppError {
    pub fn invalid(code: ErrorCode, message: impl Into<String>) -> Self {
        AppError::InvalidInput(code, message.into())
    }

    pub fn conflict(code: ErrorCode, message: impl Into<String>) -> Self {
        AppError::Conflict(code, message.into())
    }

    pub fn forbidden(message: impl Into<String>) -> Self {
        AppError::Forbidden(message.into())
    }

    /// The stable machine-readable code of this error.
    pub fn code(&self) -> ErrorCode {
        match self {
            AppError::InvalidInput(code, _)
            | AppError::Conflict(code, _)
            | AppError::Unauthorized(code, _)
            | AppError::NotFound(code, _) => *code,
            AppError::Forbidden(_) => ErrorCode::Forbidden,
            AppError::DatabaseError(_) => ErrorCode::DatabaseError,
            AppError::InternalServerError(_) => ErrorCode::InternalError,
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            AppError::InvalidInput(..) => ErrorKind::BadInput,
            AppError::Conflict(..) => ErrorKind::Conflict,
            AppError::Forbidden(_) => ErrorKind::Forbidden,
            AppError::Unauthorized(..) => ErrorKind::Unauthorized,
            AppError::NotFound(..) => ErrorKind::NotFound,
            AppError::DatabaseError(_) | AppError::InternalServerError(_) => ErrorKind::Internal,
        }
    }

    pub fn message(&self) -> &str {
        match self {
            AppError::InvalidInput(_, msg)
            | AppError::Conflict(_, msg)
            | AppError::Unauthorized(_, msg)
            | AppError::NotFound(_, msg) => msg,
            AppError::Forbidden(msg)
            | AppError::DatabaseError(msg)
            | AppError::InternalServerError(msg) => msg,
        }
    }
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            AppError::InvalidInput(code, msg) => write!(f, "Invalid Input [{}]: {}", code, msg),
            AppError::Conflict(code, msg) => write!(f, "Conflict [{}]: {}", code, msg),
            AppError::Forbidden(msg) => write!(f, "Forbidden: {}", msg),
            AppError::Unauthorized(code, msg) => write!(f, "Unauthorized [{}]: {}", code, msg),
            AppError::NotFound(code, msg) => write!(f, "Not Found [{}]: {}", code, msg),
            AppError::DatabaseError(msg) => write!(f, "Database Error: {}", msg),
            AppError::InternalServerError(msg) => write!(f, "Internal Server Error: {}", msg),
        }
    }
}

impl std::error::Error for AppError {}

/// Converts `AppError` variants into `HttpResponse` objects.
///
/// This is the only place error kinds become HTTP status codes.
impl ResponseError for AppError {
    fn status_code(&self) -> StatusCode {
        match self.kind() {
            ErrorKind::BadInput => StatusCode::BAD_REQUEST,
            ErrorKind::Unauthorized => StatusCode::UNAUTHORIZED,
            ErrorKind::Forbidden => StatusCode::FORBIDDEN,
            ErrorKind::NotFound => StatusCode::NOT_FOUND,
            ErrorKind::Conflict => StatusCode::CONFLICT,
            ErrorKind::Internal => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn error_response(&self) -> HttpResponse {
        // Storage details stay in the logs.
        let message = match self.kind() {
            ErrorKind::Internal => {
                log::error!("{}", self);
                "Internal server error"
            }
            _ => self.message(),
        };
        HttpResponse::build(self.status_code()).json(json!({
            "error": message,
            "code": self.code().as_str(),
        }))
    }
}

/// Converts `sqlx::Error` into `AppError`.
///
/// Unique violations on the user email/username constraints become `Conflict`,
/// everything else becomes `AppError::DatabaseError`.
impl From<sqlx::Error> for AppError {
    fn from(error: sqlx::Error) -> AppError {
        if let sqlx::Error::Database(db_err) = &error {
            if db_err.is_unique_violation() {
                match db_err.constraint() {
                    Some("users_email_key") => {
                        return AppError::conflict(
                            ErrorCode::EmailExists,
                            "Email already registered",
                        )
                    }
                    Some("users_username_key") => {
                        return AppError::conflict(
                            ErrorCode::UsernameExists,
                            "Username already taken",
                        )
                    }
                    _ => {}
                }
            }
        }
        AppError::DatabaseError(error.to_string())
    }
}

/// Converts `validator::ValidationErrors` into `AppError::InvalidInput`.
///
/// The first offending field picks the code; the detailed messages are preserved.
impl From<ValidationErrors> for AppError {
    fn from(error: ValidationErrors) -> AppError {
        let fields = error.field_errors();
        let code = if fields.contains_key("email") {
            ErrorCode::InvalidEmail
        } else if fields.contains_key("username") {
            ErrorCode::InvalidUsername
        } else {
            ErrorCode::MissingRequiredFields
        };
        AppError::InvalidInput(code, error.to_string())
    }
}

/// Converts `jsonwebtoken::errors::Error` into `AppError::Unauthorized`.
impl From<jsonwebtoken::errors::Error> for AppError {
    fn from(error: jsonwebtoken::errors::Error) -> AppError {
        AppError::Unauthorized(ErrorCode::InvalidToken, format!("Invalid token: {}", error))
    }
}

/// Converts `bcrypt::BcryptError` into `AppError::InternalServerError`.
impl From<bcrypt::BcryptError> for AppError {
    fn from(error: bcrypt::BcryptError) -> AppError {
        AppError::InternalServerError(error.to_string())
    }
}

/// Request bodies that are not valid JSON or do not match the expected shape.
impl From<JsonPayloadError> for AppError {
    fn from(error: JsonPayloadError) -> AppError {
        AppError::InvalidInput(
            ErrorCode::InvalidRequestBody,
            format!("Invalid request body: {}", error),
        )
    }
}

impl From<QueryPayloadError> for AppError {
    fn from(error: QueryPayloadError) -> AppError {
        AppError::InvalidInput(
            ErrorCode::InvalidQuery,
            format!("Invalid query parameters: {}", error),
        )
    }
}

impl From<PathError> for AppError {
    fn from(error: PathError) -> AppError {
        AppError::InvalidInput(ErrorCode::InvalidPath, format!("Invalid path: {}", error))
    }
}
