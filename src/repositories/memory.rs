use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use tokio::sync::RwLock;
use uuid::Uuid;

use super::{task_order, ResetTokenRepository, TaskRepository, UserRepository};
use crate::auth::password::hash_password;
use crate::error::{AppError, ErrorCode};
use crate::models::{
    NewTask, NewUser, PublicUser, Task, TaskPatch, TaskQuery, TaskStatus, User, UserFilter,
    UserPatch,
};

#[derive(Default)]
struct State {
    users: BTreeMap<i32, User>,
    next_user_id: i32,
    tasks: HashMap<Uuid, Task>,
    // token digest -> (user id, expiry)
    reset_tokens: HashMap<String, (i32, DateTime<Utc>)>,
}

impl State {
    fn sorted(&self, keep: impl Fn(&Task) -> bool) -> Vec<Task> {
        let mut tasks: Vec<Task> = self.tasks.values().filter(|&t| keep(t)).cloned().collect();
        tasks.sort_by(task_order);
        tasks
    }

    fn write_task(
        &mut self,
        id: Uuid,
        expected_version: i32,
        apply: impl FnOnce(&mut Task),
    ) -> Option<Task> {
        let task = self.tasks.get_mut(&id)?;
        if task.version != expected_version {
            return None;
        }
        apply(task);
        task.version += 1;
        task.updated_at = Utc::now();
        Some(task.clone())
    }

    /// Email is checked against every other user before username is.
    fn check_unique(
        &self,
        id: Option<i32>,
        username: &str,
        email: &str,
    ) -> Result<(), AppError> {
        let mut others = self.users.values().filter(|u| Some(u.id) != id);
        if others.clone().any(|u| u.email == email) {
            return Err(AppError::conflict(
                ErrorCode::EmailExists,
                "Email already registered",
            ));
        }
        if others.any(|u| u.username == username) {
            return Err(AppError::conflict(
                ErrorCode::UsernameExists,
                "Username already taken",
            ));
        }
        Ok(())
    }
}

/// Shared process-local storage. Hand out one repository per concern; they all see the
/// same data, so deleting a user through the user repository also removes its tasks.
#[derive(Clone)]
pub struct MemoryStore {
    state: Arc<RwLock<State>>,
    bcrypt_cost: u32,
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryStore {
    /// Uses the cheapest bcrypt cost; hashes are still real bcrypt hashes.
    pub fn new() -> Self {
        Self::with_bcrypt_cost(4)
    }

    pub fn with_bcrypt_cost(bcrypt_cost: u32) -> Self {
        Self {
            state: Arc::new(RwLock::new(State::default())),
            bcrypt_cost,
        }
    }

    pub fn tasks(&self) -> Arc<MemoryTaskRepository> {
        Arc::new(MemoryTaskRepository {
            state: self.state.clone(),
        })
    }

    pub fn users(&self) -> Arc<MemoryUserRepository> {
        Arc::new(MemoryUserRepository {
            state: self.state.clone(),
            bcrypt_cost: self.bcrypt_cost,
        })
    }

    pub fn reset_tokens(&self) -> Arc<MemoryResetTokenRepository> {
        Arc::new(MemoryResetTokenRepository {
            state: self.state.clone(),
        })
    }
}

pub struct MemoryTaskRepository {
    state: Arc<RwLock<State>>,
}

#[async_trait]
impl TaskRepository for MemoryTaskRepository {
    async fn find_by_id(&self, id: Uuid) -> Result<Option<Task>, AppError> {
        Ok(self.state.read().await.tasks.get(&id).cloned())
    }

    async fn create(&self, data: NewTask) -> Result<Task, AppError> {
        let task = Task::new(data);
        self.state.write().await.tasks.insert(task.id, task.clone());
        Ok(task)
    }

    async fn update(
        &self,
        id: Uuid,
        expected_version: i32,
        patch: &TaskPatch,
    ) -> Result<Option<Task>, AppError> {
        let mut state = self.state.write().await;
        Ok(state.write_task(id, expected_version, |task| patch.apply_to(task)))
    }

    async fn change_status(
        &self,
        id: Uuid,
        expected_version: i32,
        status: TaskStatus,
    ) -> Result<Option<Task>, AppError> {
        let mut state = self.state.write().await;
        Ok(state.write_task(id, expected_version, |task| task.status = status))
    }

    async fn delete(&self, id: Uuid, expected_version: i32) -> Result<bool, AppError> {
        let mut state = self.state.write().await;
        let current = state
            .tasks
            .get(&id)
            .map_or(false, |task| task.version == expected_version);
        if current {
            state.tasks.remove(&id);
        }
        Ok(current)
    }

    async fn find_by_user_id(
        &self,
        user_id: i32,
        filter: &TaskQuery,
    ) -> Result<Vec<Task>, AppError> {
        let state = self.state.read().await;
        Ok(state.sorted(|t| {
            t.user_id == user_id
                && filter.category_id.map_or(true, |c| t.category_id == Some(c))
                && filter.priority_id.map_or(true, |p| t.priority_id == Some(p))
                && filter.status.map_or(true, |s| t.status == s)
                && filter.due_date.map_or(true, |d| t.due_date == Some(d))
        }))
    }

    async fn find_by_category_id(&self, category_id: i32) -> Result<Vec<Task>, AppError> {
        let state = self.state.read().await;
        Ok(state.sorted(|t| t.category_id == Some(category_id)))
    }

    async fn find_by_priority_id(&self, priority_id: i32) -> Result<Vec<Task>, AppError> {
        let state = self.state.read().await;
        Ok(state.sorted(|t| t.priority_id == Some(priority_id)))
    }

    async fn search(&self, user_id: i32, term: &str) -> Result<Vec<Task>, AppError> {
        let needle = term.to_lowercase();
        let state = self.state.read().await;
        Ok(state.sorted(|t| {
            t.user_id == user_id
                && (t.title.to_lowercase().contains(&needle)
                    || t
                        .description
                        .as_deref()
                        .map_or(false, |d| d.to_lowercase().contains(&needle)))
        }))
    }
}

pub struct MemoryUserRepository {
    state: Arc<RwLock<State>>,
    bcrypt_cost: u32,
}

#[async_trait]
impl UserRepository for MemoryUserRepository {
    async fn find_by_id(&self, id: i32) -> Result<Option<User>, AppError> {
        Ok(self.state.read().await.users.get(&id).cloned())
    }

    async fn find_by_id_safe(&self, id: i32) -> Result<Option<PublicUser>, AppError> {
        Ok(self.find_by_id(id).await?.map(PublicUser::from))
    }

    async fn find_by_email(&self, email: &str) -> Result<Option<User>, AppError> {
        let state = self.state.read().await;
        Ok(state.users.values().find(|u| u.email == email).cloned())
    }

    async fn email_exists(&self, email: &str) -> Result<bool, AppError> {
        Ok(self.find_by_email(email).await?.is_some())
    }

    async fn username_exists(&self, username: &str) -> Result<bool, AppError> {
        let state = self.state.read().await;
        Ok(state.users.values().any(|u| u.username == username))
    }

    async fn create(&self, user: NewUser) -> Result<PublicUser, AppError> {
        let password_hash = hash_password(&user.password, self.bcrypt_cost)?;
        let mut state = self.state.write().await;
        state.check_unique(None, &user.username, &user.email)?;

        state.next_user_id += 1;
        let now = Utc::now();
        let stored = User {
            id: state.next_user_id,
            username: user.username,
            email: user.email,
            password_hash,
            role: user.role,
            created_at: now,
            updated_at: now,
        };
        state.users.insert(stored.id, stored.clone());
        Ok(stored.into())
    }

    async fn update(&self, id: i32, patch: &UserPatch) -> Result<Option<PublicUser>, AppError> {
        let mut state = self.state.write().await;
        let Some(current) = state.users.get(&id) else {
            return Ok(None);
        };
        let username = patch.username.clone().unwrap_or_else(|| current.username.clone());
        let email = patch.email.clone().unwrap_or_else(|| current.email.clone());
        state.check_unique(Some(id), &username, &email)?;

        let Some(user) = state.users.get_mut(&id) else {
            return Ok(None);
        };
        user.username = username;
        user.email = email;
        if let Some(role) = patch.role {
            user.role = role;
        }
        user.updated_at = Utc::now();
        Ok(Some(user.clone().into()))
    }

    async fn delete(&self, id: i32) -> Result<bool, AppError> {
        let mut state = self.state.write().await;
        if state.users.remove(&id).is_none() {
            return Ok(false);
        }
        state.tasks.retain(|_, task| task.user_id != id);
        state.reset_tokens.retain(|_, (user_id, _)| *user_id != id);
        Ok(true)
    }

    async fn find_all(&self, filter: &UserFilter) -> Result<Vec<PublicUser>, AppError> {
        let contains = |value: &str, needle: &Option<String>| {
            needle
                .as_ref()
                .map_or(true, |n| value.to_lowercase().contains(&n.to_lowercase()))
        };
        let state = self.state.read().await;
        Ok(state
            .users
            .values()
            .filter(|u| contains(&u.username, &filter.username))
            .filter(|u| contains(&u.email, &filter.email))
            .filter(|u| filter.role.map_or(true, |r| u.role == r))
            .cloned()
            .map(PublicUser::from)
            .collect())
    }

    async fn change_password(&self, id: i32, new_password: &str) -> Result<bool, AppError> {
        let password_hash = hash_password(new_password, self.bcrypt_cost)?;
        let mut state = self.state.write().await;
        match state.users.get_mut(&id) {
            Some(user) => {
                user.password_hash = password_hash;
                user.updated_at = Utc::now();
                Ok(true)
            }
            None => Ok(false),
        }
    }
}

pub struct MemoryResetTokenRepository {
    state: Arc<RwLock<State>>,
}

#[async_trait]
impl ResetTokenRepository for MemoryResetTokenRepository {
    async fn store(
        &self,
        user_id: i32,
        token_hash: &str,
        expires_at: DateTime<Utc>,
    ) -> Result<(), AppError> {
        let mut state = self.state.write().await;
        state.reset_tokens.retain(|_, (owner, _)| *owner != user_id);
        state
            .reset_tokens
            .insert(token_hash.to_string(), (user_id, expires_at));
        Ok(())
    }

    async fn consume(
        &self,
        token_hash: &str,
        now: DateTime<Utc>,
    ) -> Result<Option<i32>, AppError> {
        let mut state = self.state.write().await;
        Ok(state
            .reset_tokens
            .remove(token_hash)
            .and_then(|(user_id, expires_at)| (expires_at > now).then_some(user_id)))
    }
}
