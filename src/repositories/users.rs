use async_trait::async_trait;
use sqlx::PgPool;

use super::{like_pattern, UserRepository};
use crate::auth::password::hash_password;
use crate::error::AppError;
use crate::models::{NewUser, PublicUser, User, UserFilter, UserPatch};

const USER_COLUMNS: &str = "id, username, email, password_hash, role, created_at, updated_at";
const PUBLIC_USER_COLUMNS: &str = "id, username, email, role, created_at, updated_at";

/// Postgres-backed account storage.
///
/// The `users_email_key` and `users_username_key` unique constraints are the authoritative
/// uniqueness guard; violations surface as `AppError::Conflict`.
#[derive(Clone)]
pub struct PgUserRepository {
    pool: PgPool,
    bcrypt_cost: u32,
}

impl PgUserRepository {
    pub fn new(pool: PgPool, bcrypt_cost: u32) -> Self {
        Self { pool, bcrypt_cost }
    }
}

#[async_trait]
impl UserRepository for PgUserRepository {
    async fn find_by_id(&self, id: i32) -> Result<Option<User>, AppError> {
        let sql = format!("SELECT {} FROM users WHERE id = $1", USER_COLUMNS);
        let user = sqlx::query_as::<_, User>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(user)
    }

    async fn find_by_id_safe(&self, id: i32) -> Result<Option<PublicUser>, AppError> {
        let sql = format!("SELECT {} FROM users WHERE id = $1", PUBLIC_USER_COLUMNS);
        let user = sqlx::query_as::<_, PublicUser>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(user)
    }

    async fn find_by_email(&self, email: &str) -> Result<Option<User>, AppError> {
        let sql = format!("SELECT {} FROM users WHERE email = $1", USER_COLUMNS);
        let user = sqlx::query_as::<_, User>(&sql)
            .bind(email)
            .fetch_optional(&self.pool)
            .await?;
        Ok(user)
    }

    async fn email_exists(&self, email: &str) -> Result<bool, AppError> {
        let exists: bool =
            sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM users WHERE email = $1)")
                .bind(email)
                .fetch_one(&self.pool)
                .await?;
        Ok(exists)
    }

    async fn username_exists(&self, username: &str) -> Result<bool, AppError> {
        let exists: bool =
            sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM users WHERE username = $1)")
                .bind(username)
                .fetch_one(&self.pool)
                .await?;
        Ok(exists)
    }

    async fn create(&self, user: NewUser) -> Result<PublicUser, AppError> {
        let password_hash = hash_password(&user.password, self.bcrypt_cost)?;
        let sql = format!(
            "INSERT INTO users (username, email, password_hash, role) VALUES ($1, $2, $3, $4)
             RETURNING {}",
            PUBLIC_USER_COLUMNS
        );
        let created = sqlx::query_as::<_, PublicUser>(&sql)
            .bind(&user.username)
            .bind(&user.email)
            .bind(password_hash)
            .bind(user.role)
            .fetch_one(&self.pool)
            .await?;
        Ok(created)
    }

    async fn update(&self, id: i32, patch: &UserPatch) -> Result<Option<PublicUser>, AppError> {
        let sql = format!(
            "UPDATE users
             SET username = COALESCE($2, username),
                 email = COALESCE($3, email),
                 role = COALESCE($4, role),
                 updated_at = NOW()
             WHERE id = $1
             RETURNING {}",
            PUBLIC_USER_COLUMNS
        );
        let user = sqlx::query_as::<_, PublicUser>(&sql)
            .bind(id)
            .bind(&patch.username)
            .bind(&patch.email)
            .bind(patch.role)
            .fetch_optional(&self.pool)
            .await?;
        Ok(user)
    }

    async fn delete(&self, id: i32) -> Result<bool, AppError> {
        // Tasks, assignments and reset tokens go with the user through ON DELETE CASCADE.
        let result = sqlx::query("DELETE FROM users WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn find_all(&self, filter: &UserFilter) -> Result<Vec<PublicUser>, AppError> {
        let mut sql = format!("SELECT {} FROM users WHERE TRUE", PUBLIC_USER_COLUMNS);
        let mut param_count = 1;

        if filter.username.is_some() {
            sql.push_str(&format!(" AND username ILIKE ${}", param_count));
            param_count += 1;
        }
        if filter.email.is_some() {
            sql.push_str(&format!(" AND email ILIKE ${}", param_count));
            param_count += 1;
        }
        if filter.role.is_some() {
            sql.push_str(&format!(" AND role = ${}", param_count));
        }
        sql.push_str(" ORDER BY id");

        let mut query = sqlx::query_as::<_, PublicUser>(&sql);
        if let Some(username) = &filter.username {
            query = query.bind(like_pattern(username));
        }
        if let Some(email) = &filter.email {
            query = query.bind(like_pattern(email));
        }
        if let Some(role) = filter.role {
            query = query.bind(role);
        }

        Ok(query.fetch_all(&self.pool).await?)
    }

    async fn change_password(&self, id: i32, new_password: &str) -> Result<bool, AppError> {
        let password_hash = hash_password(new_password, self.bcrypt_cost)?;
        let result =
            sqlx::query("UPDATE users SET password_hash = $2, updated_at = NOW() WHERE id = $1")
                .bind(id)
                .bind(password_hash)
                .execute(&self.pool)
                .await?;
        Ok(result.rows_affected() > 0)
    }
}
