//! Task lifecycle: creation, ownership-checked mutation, and the due-soon/overdue views.

use chrono::{Duration, NaiveDate, Utc};
use log::{debug, info, warn};
use std::sync::Arc;
use uuid::Uuid;

use crate::auth::Caller;
use crate::error::{AppError, ErrorCode};
use crate::models::task::{validate_create, validate_update};
use crate::models::{Task, TaskInput, TaskQuery, TaskStatus, TaskUpdate};
use crate::repositories::TaskRepository;

pub const DEFAULT_DUE_SOON_DAYS: u32 = 3;

/// The current UTC calendar date. Due dates are compared against it at day granularity.
fn today() -> NaiveDate {
    Utc::now().date_naive()
}

/// Whether a write moved a task into `completed`, as opposed to rewriting it there.
fn just_completed(before: TaskStatus, after: TaskStatus) -> bool {
    before != TaskStatus::Completed && after == TaskStatus::Completed
}

fn ensure_not_past(due_date: NaiveDate) -> Result<(), AppError> {
    if due_date < today() {
        return Err(AppError::invalid(
            ErrorCode::InvalidDueDate,
            "Due date cannot be in the past",
        ));
    }
    Ok(())
}

pub struct TaskService {
    tasks: Arc<dyn TaskRepository>,
}

impl TaskService {
    pub fn new(tasks: Arc<dyn TaskRepository>) -> Self {
        Self { tasks }
    }

    /// Plain lookup; visibility is decided by the caller.
    pub async fn get_by_id(&self, id: Uuid) -> Result<Option<Task>, AppError> {
        self.tasks.find_by_id(id).await
    }

    /// Lists a user's tasks. A non-blank `search` is applied alone; the other
    /// filters in the same query are then ignored.
    pub async fn list_for_user(
        &self,
        owner_id: i32,
        filter: &TaskQuery,
    ) -> Result<Vec<Task>, AppError> {
        match filter.search.as_deref().map(str::trim) {
            Some(term) if !term.is_empty() => self.tasks.search(owner_id, term).await,
            _ => self.tasks.find_by_user_id(owner_id, filter).await,
        }
    }

    /// Creates a task. The new task is always `pending`, whatever status the input carries.
    pub async fn create(&self, input: &TaskInput) -> Result<Task, AppError> {
        let new_task = validate_create(input)?;
        if let Some(due_date) = new_task.due_date {
            ensure_not_past(due_date)?;
        }

        let task = self.tasks.create(new_task).await?;
        info!("Task {} created for user {}", task.id, task.user_id);
        Ok(task)
    }

    /// Partially updates a task. `Ok(None)` means the task does not exist.
    pub async fn update(
        &self,
        id: Uuid,
        update: &TaskUpdate,
        caller: &Caller,
    ) -> Result<Option<Task>, AppError> {
        let Some(task) = self.load_for_write(id, caller).await? else {
            return Ok(None);
        };

        let patch = validate_update(update)?;
        if let Some(due_date) = patch.due_date {
            ensure_not_past(due_date)?;
        }

        match self.tasks.update(id, task.version, &patch).await? {
            Some(updated) => {
                debug!("Task {} updated by user {}", id, caller.id);
                if just_completed(task.status, updated.status) {
                    self.on_completed(&updated);
                }
                Ok(Some(updated))
            }
            None => self.lost_write(id).await,
        }
    }

    /// Deletes a task. `Ok(false)` means the task does not exist.
    pub async fn delete(&self, id: Uuid, caller: &Caller) -> Result<bool, AppError> {
        let Some(task) = self.load_for_write(id, caller).await? else {
            return Ok(false);
        };

        if self.tasks.delete(id, task.version).await? {
            info!("Task {} deleted by user {}", id, caller.id);
            return Ok(true);
        }
        Ok(self.lost_write(id).await?.unwrap_or(false))
    }

    /// Moves a task to `status`. Every transition between the four statuses is allowed.
    pub async fn change_status(
        &self,
        id: Uuid,
        status: &str,
        caller: &Caller,
    ) -> Result<Option<Task>, AppError> {
        let Some(task) = self.load_for_write(id, caller).await? else {
            return Ok(None);
        };
        let status: TaskStatus = status.parse()?;

        match self.tasks.change_status(id, task.version, status).await? {
            Some(updated) => {
                debug!("Task {} moved {} -> {}", id, task.status, status);
                if just_completed(task.status, updated.status) {
                    self.on_completed(&updated);
                }
                Ok(Some(updated))
            }
            None => self.lost_write(id).await,
        }
    }

    /// Tasks due between today and `days` days from now, inclusive, that are not completed.
    /// Cancelled tasks are still reported.
    pub async fn get_due_soon(&self, owner_id: i32, days: u32) -> Result<Vec<Task>, AppError> {
        let start = today();
        let end = start
            .checked_add_signed(Duration::days(i64::from(days)))
            .unwrap_or(NaiveDate::MAX);
        let tasks = self.tasks.find_by_user_id(owner_id, &TaskQuery::default()).await?;

        Ok(tasks
            .into_iter()
            .filter(|t| t.status != TaskStatus::Completed)
            .filter(|t| t.due_date.map_or(false, |due| due >= start && due <= end))
            .collect())
    }

    /// Tasks whose due date is before today and that are not completed.
    pub async fn get_overdue(&self, owner_id: i32) -> Result<Vec<Task>, AppError> {
        let start = today();
        let tasks = self.tasks.find_by_user_id(owner_id, &TaskQuery::default()).await?;

        Ok(tasks
            .into_iter()
            .filter(|t| t.status != TaskStatus::Completed)
            .filter(|t| t.due_date.map_or(false, |due| due < start))
            .collect())
    }

    /// The caller's own tasks in a category. Admins get no wider view here.
    pub async fn get_by_category(
        &self,
        category_id: i32,
        caller_id: i32,
    ) -> Result<Vec<Task>, AppError> {
        let tasks = self.tasks.find_by_category_id(category_id).await?;
        Ok(tasks.into_iter().filter(|t| t.user_id == caller_id).collect())
    }

    /// The caller's own tasks with a priority. Admins get no wider view here.
    pub async fn get_by_priority(
        &self,
        priority_id: i32,
        caller_id: i32,
    ) -> Result<Vec<Task>, AppError> {
        let tasks = self.tasks.find_by_priority_id(priority_id).await?;
        Ok(tasks.into_iter().filter(|t| t.user_id == caller_id).collect())
    }

    async fn load_for_write(&self, id: Uuid, caller: &Caller) -> Result<Option<Task>, AppError> {
        let Some(task) = self.tasks.find_by_id(id).await? else {
            return Ok(None);
        };
        if !caller.can_act_on(task.user_id) {
            warn!(
                "User {} denied write access to task {} owned by {}",
                caller.id, id, task.user_id
            );
            return Err(AppError::forbidden(
                "You do not have permission to modify this task",
            ));
        }
        Ok(Some(task))
    }

    /// A conditional write matched nothing: the task vanished or changed underneath us.
    async fn lost_write<T>(&self, id: Uuid) -> Result<Option<T>, AppError> {
        if self.tasks.find_by_id(id).await?.is_some() {
            warn!("Task {} was modified concurrently", id);
            return Err(AppError::conflict(
                ErrorCode::ConcurrentModification,
                "Task was modified by another request; reload and retry",
            ));
        }
        Ok(None)
    }

    // Hook point for completion side effects; currently only logged.
    fn on_completed(&self, task: &Task) {
        debug!("Task {} completed", task.id);
    }
}
