use std::env;
use std::str::FromStr;

use crate::error::AppError;

pub struct Config {
    pub database_url: String,
    pub server_port: u16,
    pub server_host: String,
    pub jwt_secret: String,
    pub jwt_refresh_secret: String,
    pub access_token_ttl_minutes: i64,
    pub refresh_token_ttl_days: i64,
    pub bcrypt_cost: u32,
    pub reset_token_ttl_minutes: i64,
}

fn required(name: &str) -> Result<String, AppError> {
    env::var(name).map_err(|_| AppError::InternalServerError(format!("{} must be set", name)))
}

fn parsed_or<T: FromStr>(name: &str, default: T) -> Result<T, AppError> {
    match env::var(name) {
        Ok(raw) => raw
            .parse()
            .map_err(|_| AppError::InternalServerError(format!("{} must be a number", name))),
        Err(_) => Ok(default),
    }
}

impl Config {
    pub fn from_env() -> Result<Self, AppError> {
        let config = Self {
            database_url: required("DATABASE_URL")?,
            server_port: parsed_or("SERVER_PORT", 8080)?,
            server_host: env::var("SERVER_HOST").unwrap_or_else(|_| "127.0.0.1".to_string()),
            jwt_secret: required("JWT_SECRET")?,
            jwt_refresh_secret: required("JWT_REFRESH_SECRET")?,
            access_token_ttl_minutes: parsed_or("ACCESS_TOKEN_TTL_MINUTES", 15)?,
            refresh_token_ttl_days: parsed_or("REFRESH_TOKEN_TTL_DAYS", 7)?,
            bcrypt_cost: parsed_or("BCRYPT_COST", 12)?,
            reset_token_ttl_minutes: parsed_or("RESET_TOKEN_TTL_MINUTES", 60)?,
        };

        if config.jwt_secret == config.jwt_refresh_secret {
            return Err(AppError::InternalServerError(
                "JWT_REFRESH_SECRET must differ from JWT_SECRET".into(),
            ));
        }

        Ok(config)
    }

    pub fn server_url(&self) -> String {
        format!("http://{}:{}", self.server_host, self.server_port)
    }
}
