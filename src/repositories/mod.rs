//! Persistence gateway.
//!
//! The services only see the traits in this module. `Pg*` types back them with Postgres,
//! `memory` backs them with process-local maps that follow the same rules (ordering,
//! uniqueness, cascades, conditional writes).

pub mod memory;
pub mod reset_tokens;
pub mod tasks;
pub mod users;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::cmp::Ordering;
use uuid::Uuid;

use crate::error::AppError;
use crate::models::{
    NewTask, NewUser, PublicUser, Task, TaskPatch, TaskQuery, TaskStatus, User, UserFilter,
    UserPatch,
};

pub use memory::MemoryStore;
pub use reset_tokens::PgResetTokenRepository;
pub use tasks::PgTaskRepository;
pub use users::PgUserRepository;

#[async_trait]
pub trait TaskRepository: Send + Sync {
    async fn find_by_id(&self, id: Uuid) -> Result<Option<Task>, AppError>;

    async fn create(&self, task: NewTask) -> Result<Task, AppError>;

    /// Applies `patch` only if the stored row is still at `expected_version`.
    /// Returns `None` when no row matched (deleted, or modified in between).
    async fn update(
        &self,
        id: Uuid,
        expected_version: i32,
        patch: &TaskPatch,
    ) -> Result<Option<Task>, AppError>;

    /// Same contract as `update`, touching only the status.
    async fn change_status(
        &self,
        id: Uuid,
        expected_version: i32,
        status: TaskStatus,
    ) -> Result<Option<Task>, AppError>;

    /// Deletes the row if it is still at `expected_version`.
    async fn delete(&self, id: Uuid, expected_version: i32) -> Result<bool, AppError>;

    /// Tasks owned by `user_id`, narrowed by every filter except `search`.
    /// Ordered by due date ascending (undated last), then newest first.
    async fn find_by_user_id(&self, user_id: i32, filter: &TaskQuery)
        -> Result<Vec<Task>, AppError>;

    /// Tasks in a category across all owners.
    async fn find_by_category_id(&self, category_id: i32) -> Result<Vec<Task>, AppError>;

    /// Tasks with a priority across all owners.
    async fn find_by_priority_id(&self, priority_id: i32) -> Result<Vec<Task>, AppError>;

    /// Case-insensitive substring match on title or description within one owner's tasks.
    async fn search(&self, user_id: i32, term: &str) -> Result<Vec<Task>, AppError>;
}

#[async_trait]
pub trait UserRepository: Send + Sync {
    async fn find_by_id(&self, id: i32) -> Result<Option<User>, AppError>;

    /// Like `find_by_id`, without the password hash.
    async fn find_by_id_safe(&self, id: i32) -> Result<Option<PublicUser>, AppError>;

    async fn find_by_email(&self, email: &str) -> Result<Option<User>, AppError>;

    async fn email_exists(&self, email: &str) -> Result<bool, AppError>;

    async fn username_exists(&self, username: &str) -> Result<bool, AppError>;

    /// Hashes the plaintext password and inserts the account. Uniqueness of email and
    /// username is enforced here and reported as `Conflict`.
    async fn create(&self, user: NewUser) -> Result<PublicUser, AppError>;

    async fn update(&self, id: i32, patch: &UserPatch) -> Result<Option<PublicUser>, AppError>;

    /// Deletes the account together with its tasks, their assignments and reset tokens.
    async fn delete(&self, id: i32) -> Result<bool, AppError>;

    async fn find_all(&self, filter: &UserFilter) -> Result<Vec<PublicUser>, AppError>;

    /// Hashes `new_password` and stores it. Returns false if the account is gone.
    async fn change_password(&self, id: i32, new_password: &str) -> Result<bool, AppError>;
}

/// Stores password reset tokens by digest; the raw token is never persisted.
#[async_trait]
pub trait ResetTokenRepository: Send + Sync {
    /// Records a token for `user_id`, replacing any token it had before.
    async fn store(
        &self,
        user_id: i32,
        token_hash: &str,
        expires_at: DateTime<Utc>,
    ) -> Result<(), AppError>;

    /// Removes the token and returns its user if it existed and had not expired at `now`.
    async fn consume(&self, token_hash: &str, now: DateTime<Utc>)
        -> Result<Option<i32>, AppError>;
}

/// Due date ascending with undated tasks last, ties broken by newest first.
pub(crate) fn task_order(a: &Task, b: &Task) -> Ordering {
    let by_due = match (a.due_date, b.due_date) {
        (Some(x), Some(y)) => x.cmp(&y),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    };
    by_due.then_with(|| b.created_at.cmp(&a.created_at))
}

/// Escapes `%`, `_` and `\` so a search term matches literally inside ILIKE.
pub(crate) fn like_pattern(term: &str) -> String {
    let mut escaped = String::with_capacity(term.len() + 2);
    escaped.push('%');
    for c in term.chars() {
        if matches!(c, '%' | '_' | '\\') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped.push('%');
    escaped
}
