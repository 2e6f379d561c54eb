use crate::error::{AppError, ErrorCode};
use crate::models::{PublicUser, Role};
use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};

/// Which signing domain a token belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TokenKind {
    Access,
    Refresh,
}

/// Represents the claims encoded within a JWT (JSON Web Token).
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Claims {
    /// Subject of the token, the user's unique identifier.
    pub sub: i32,
    pub username: String,
    pub email: String,
    pub role: Role,
    pub token_type: TokenKind,
    /// Issued-at timestamp (seconds since epoch).
    pub iat: i64,
    /// Expiration timestamp (seconds since epoch) for the token.
    pub exp: i64,
}

/// The identity a token is minted for.
#[derive(Debug, Clone, PartialEq)]
pub struct TokenSubject {
    pub id: i32,
    pub username: String,
    pub email: String,
    pub role: Role,
}

impl From<&PublicUser> for TokenSubject {
    fn from(user: &PublicUser) -> Self {
        Self {
            id: user.id,
            username: user.username.clone(),
            email: user.email.clone(),
            role: user.role,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TokenPair {
    pub access_token: String,
    pub refresh_token: String,
}

/// Mints and verifies bearer credentials.
///
/// Access and refresh tokens live in independent signing domains: a token from one
/// domain never verifies in the other.
pub trait TokenIssuer: Send + Sync {
    fn issue_access(&self, subject: &TokenSubject) -> Result<String, AppError>;

    fn issue_refresh(&self, subject: &TokenSubject) -> Result<String, AppError>;

    fn issue_pair(&self, subject: &TokenSubject) -> Result<TokenPair, AppError> {
        Ok(TokenPair {
            access_token: self.issue_access(subject)?,
            refresh_token: self.issue_refresh(subject)?,
        })
    }

    /// Returns the embedded claims, or `AppError::Unauthorized` if the token is malformed,
    /// expired, or signed for the other domain.
    fn verify(&self, token: &str, kind: TokenKind) -> Result<Claims, AppError>;
}

struct SigningDomain {
    encoding: EncodingKey,
    decoding: DecodingKey,
    ttl: Duration,
}

impl SigningDomain {
    fn new(secret: &str, ttl: Duration) -> Self {
        Self {
            encoding: EncodingKey::from_secret(secret.as_bytes()),
            decoding: DecodingKey::from_secret(secret.as_bytes()),
            ttl,
        }
    }
}

/// HS256 JWT implementation of `TokenIssuer`.
pub struct JwtIssuer {
    access: SigningDomain,
    refresh: SigningDomain,
}

impl JwtIssuer {
    pub fn new(
        access_secret: &str,
        refresh_secret: &str,
        access_ttl: Duration,
        refresh_ttl: Duration,
    ) -> Self {
        Self {
            access: SigningDomain::new(access_secret, access_ttl),
            refresh: SigningDomain::new(refresh_secret, refresh_ttl),
        }
    }

    fn domain(&self, kind: TokenKind) -> &SigningDomain {
        match kind {
            TokenKind::Access => &self.access,
            TokenKind::Refresh => &self.refresh,
        }
    }

    fn issue(&self, subject: &TokenSubject, kind: TokenKind) -> Result<String, AppError> {
        let domain = self.domain(kind);
        let now = Utc::now();
        let claims = Claims {
            sub: subject.id,
            username: subject.username.clone(),
            email: subject.email.clone(),
            role: subject.role,
            token_type: kind,
            iat: now.timestamp(),
            exp: (now + domain.ttl).timestamp(),
        };

        encode(&Header::default(), &claims, &domain.encoding)
            .map_err(|e| AppError::InternalServerError(format!("Failed to generate token: {}", e)))
    }
}

impl TokenIssuer for JwtIssuer {
    fn issue_access(&self, subject: &TokenSubject) -> Result<String, AppError> {
        self.issue(subject, TokenKind::Access)
    }

    fn issue_refresh(&self, subject: &TokenSubject) -> Result<String, AppError> {
        self.issue(subject, TokenKind::Refresh)
    }

    fn verify(&self, token: &str, kind: TokenKind) -> Result<Claims, AppError> {
        let claims = decode::<Claims>(token, &self.domain(kind).decoding, &Validation::default())
            .map(|data| data.claims)?;

        if claims.token_type != kind {
            return Err(AppError::Unauthorized(
                ErrorCode::InvalidToken,
                "Invalid token: wrong token type".into(),
            ));
        }
        Ok(claims)
    }
}
