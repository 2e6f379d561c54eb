#![allow(dead_code)]

use chrono::{Duration, NaiveDate, Utc};
use std::sync::Arc;

use taskforge::auth::{AuthResponse, JwtIssuer, RegisterRequest, TokenIssuer};
use taskforge::repositories::MemoryStore;
use taskforge::{TaskService, UserService};

pub const PASSWORD: &str = "Password123!";

pub fn issuer() -> Arc<dyn TokenIssuer> {
    Arc::new(JwtIssuer::new(
        "integration_access_secret",
        "integration_refresh_secret",
        Duration::minutes(15),
        Duration::days(7),
    ))
}

/// Services wired against one shared in-memory store.
pub struct Harness {
    pub store: MemoryStore,
    pub issuer: Arc<dyn TokenIssuer>,
    pub tasks: TaskService,
    pub users: UserService,
}

impl Harness {
    pub fn new() -> Self {
        let store = MemoryStore::new();
        let issuer = issuer();
        Self {
            tasks: TaskService::new(store.tasks()),
            users: UserService::new(store.users(), issuer.clone(), store.reset_tokens()),
            store,
            issuer,
        }
    }

    pub async fn register(&self, username: &str) -> AuthResponse {
        self.users
            .register(&register_request(username))
            .await
            .expect("registration should succeed")
    }
}

pub fn register_request(username: &str) -> RegisterRequest {
    RegisterRequest {
        username: Some(username.to_string()),
        email: Some(format!("{}@example.com", username)),
        password: Some(PASSWORD.to_string()),
    }
}

pub fn date_in(days: i64) -> NaiveDate {
    Utc::now().date_naive() + Duration::days(days)
}

/// `YYYY-MM-DD` for today plus `days`.
pub fn due_in(days: i64) -> String {
    date_in(days).format("%Y-%m-%d").to_string()
}
