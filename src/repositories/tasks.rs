use async_trait::async_trait;
use sqlx::PgPool;
use uuid::Uuid;

use super::{like_pattern, TaskRepository};
use crate::error::AppError;
use crate::models::{NewTask, Task, TaskPatch, TaskQuery, TaskStatus};

const TASK_COLUMNS: &str = "id, user_id, category_id, priority_id, title, description, due_date, \
                            status, version, created_at, updated_at";

const TASK_ORDER: &str = " ORDER BY due_date ASC NULLS LAST, created_at DESC";

/// Postgres-backed task storage.
#[derive(Clone)]
pub struct PgTaskRepository {
    pool: PgPool,
}

impl PgTaskRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    async fn find_where(&self, column: &str, value: i32) -> Result<Vec<Task>, AppError> {
        let sql = format!(
            "SELECT {} FROM tasks WHERE {} = $1{}",
            TASK_COLUMNS, column, TASK_ORDER
        );
        let tasks = sqlx::query_as::<_, Task>(&sql)
            .bind(value)
            .fetch_all(&self.pool)
            .await?;
        Ok(tasks)
    }
}

#[async_trait]
impl TaskRepository for PgTaskRepository {
    async fn find_by_id(&self, id: Uuid) -> Result<Option<Task>, AppError> {
        let sql = format!("SELECT {} FROM tasks WHERE id = $1", TASK_COLUMNS);
        let task = sqlx::query_as::<_, Task>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(task)
    }

    async fn create(&self, data: NewTask) -> Result<Task, AppError> {
        let task = Task::new(data);
        let sql = format!(
            "INSERT INTO tasks (id, user_id, category_id, priority_id, title, description, due_date,
                                status, version)
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
             RETURNING {}",
            TASK_COLUMNS
        );
        let created = sqlx::query_as::<_, Task>(&sql)
            .bind(task.id)
            .bind(task.user_id)
            .bind(task.category_id)
            .bind(task.priority_id)
            .bind(task.title)
            .bind(task.description)
            .bind(task.due_date)
            .bind(task.status)
            .bind(task.version)
            .fetch_one(&self.pool)
            .await?;
        Ok(created)
    }

    async fn update(
        &self,
        id: Uuid,
        expected_version: i32,
        patch: &TaskPatch,
    ) -> Result<Option<Task>, AppError> {
        let sql = format!(
            "UPDATE tasks
             SET title = COALESCE($3, title),
                 description = COALESCE($4, description),
                 due_date = COALESCE($5, due_date),
                 status = COALESCE($6, status),
                 category_id = COALESCE($7, category_id),
                 priority_id = COALESCE($8, priority_id),
                 version = version + 1,
                 updated_at = NOW()
             WHERE id = $1 AND version = $2
             RETURNING {}",
            TASK_COLUMNS
        );
        let task = sqlx::query_as::<_, Task>(&sql)
            .bind(id)
            .bind(expected_version)
            .bind(&patch.title)
            .bind(&patch.description)
            .bind(patch.due_date)
            .bind(patch.status)
            .bind(patch.category_id)
            .bind(patch.priority_id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(task)
    }

    async fn change_status(
        &self,
        id: Uuid,
        expected_version: i32,
        status: TaskStatus,
    ) -> Result<Option<Task>, AppError> {
        let sql = format!(
            "UPDATE tasks
             SET status = $3, version = version + 1, updated_at = NOW()
             WHERE id = $1 AND version = $2
             RETURNING {}",
            TASK_COLUMNS
        );
        let task = sqlx::query_as::<_, Task>(&sql)
            .bind(id)
            .bind(expected_version)
            .bind(status)
            .fetch_optional(&self.pool)
            .await?;
        Ok(task)
    }

    async fn delete(&self, id: Uuid, expected_version: i32) -> Result<bool, AppError> {
        let result = sqlx::query("DELETE FROM tasks WHERE id = $1 AND version = $2")
            .bind(id)
            .bind(expected_version)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn find_by_user_id(
        &self,
        user_id: i32,
        filter: &TaskQuery,
    ) -> Result<Vec<Task>, AppError> {
        // Conditions for the optional filters are appended in bind order.
        let mut sql = format!("SELECT {} FROM tasks WHERE user_id = $1", TASK_COLUMNS);
        let mut param_count = 2;

        if filter.category_id.is_some() {
            sql.push_str(&format!(" AND category_id = ${}", param_count));
            param_count += 1;
        }
        if filter.priority_id.is_some() {
            sql.push_str(&format!(" AND priority_id = ${}", param_count));
            param_count += 1;
        }
        if filter.status.is_some() {
            sql.push_str(&format!(" AND status = ${}", param_count));
            param_count += 1;
        }
        if filter.due_date.is_some() {
            sql.push_str(&format!(" AND due_date = ${}", param_count));
        }
        sql.push_str(TASK_ORDER);

        let mut query = sqlx::query_as::<_, Task>(&sql).bind(user_id);
        if let Some(category_id) = filter.category_id {
            query = query.bind(category_id);
        }
        if let Some(priority_id) = filter.priority_id {
            query = query.bind(priority_id);
        }
        if let Some(status) = filter.status {
            query = query.bind(status);
        }
        if let Some(due_date) = filter.due_date {
            query = query.bind(due_date);
        }

        Ok(query.fetch_all(&self.pool).await?)
    }

    async fn find_by_category_id(&self, category_id: i32) -> Result<Vec<Task>, AppError> {
        self.find_where("category_id", category_id).await
    }

    async fn find_by_priority_id(&self, priority_id: i32) -> Result<Vec<Task>, AppError> {
        self.find_where("priority_id", priority_id).await
    }

    async fn search(&self, user_id: i32, term: &str) -> Result<Vec<Task>, AppError> {
        let sql = format!(
            "SELECT {} FROM tasks
             WHERE user_id = $1 AND (title ILIKE $2 OR description ILIKE $2){}",
            TASK_COLUMNS, TASK_ORDER
        );
        let tasks = sqlx::query_as::<_, Task>(&sql)
            .bind(user_id)
            .bind(like_pattern(term))
            .fetch_all(&self.pool)
            .await?;
        Ok(tasks)
    }
}
