use actix_web::dev::Payload;
use actix_web::{Error as ActixError, FromRequest, HttpMessage, HttpRequest};
use std::future::{ready, Ready};

use crate::auth::token::Claims;
use crate::error::{AppError, ErrorCode};
use crate::models::Role;

/// The identity of an authenticated caller, resolved from its access token.
///
/// Routes protected by `AuthMiddleware` extract it directly; the middleware inserts it into
/// request extensions after verifying the bearer token.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Caller {
    pub id: i32,
    pub role: Role,
}

impl Caller {
    pub fn new(id: i32, role: Role) -> Self {
        Self { id, role }
    }

    pub fn is_admin(&self) -> bool {
        self.role == Role::Admin
    }

    /// True when the caller may act on a resource owned by `owner_id`.
    pub fn can_act_on(&self, owner_id: i32) -> bool {
        self.id == owner_id || self.is_admin()
    }
}

impl From<&Claims> for Caller {
    fn from(claims: &Claims) -> Self {
        Self {
            id: claims.sub,
            role: claims.role,
        }
    }
}

impl FromRequest for Caller {
    type Error = ActixError;
    type Future = Ready<Result<Self, Self::Error>>;

    fn from_request(req: &HttpRequest, _payload: &mut Payload) -> Self::Future {
        match req.extensions().get::<Caller>().copied() {
            Some(caller) => ready(Ok(caller)),
            None => {
                // Only reachable when a route is mounted outside AuthMiddleware.
                let err = AppError::Unauthorized(
                    ErrorCode::MissingToken,
                    "Caller identity not found in request. Ensure AuthMiddleware is active."
                        .to_string(),
                );
                ready(Err(err.into()))
            }
        }
    }
}
