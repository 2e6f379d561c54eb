use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

use crate::error::{AppError, ErrorCode};

/// Maximum length of a task title, counted in characters after trimming.
pub const TITLE_MAX_LEN: usize = 100;

/// Represents the status of a task.
/// Corresponds to the `task_status` SQL enum.
///
/// Any status may move to any other; only membership in this set is enforced.
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq, sqlx::Type)]
#[sqlx(type_name = "task_status", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    /// Task is yet to be started. Every task starts here.
    Pending,
    /// Task is currently being worked on.
    InProgress,
    /// Task is completed.
    Completed,
    /// Task was abandoned.
    Cancelled,
}

impl TaskStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            TaskStatus::Pending => "pending",
            TaskStatus::InProgress => "in_progress",
            TaskStatus::Completed => "completed",
            TaskStatus::Cancelled => "cancelled",
        }
    }
}

impl fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TaskStatus {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(TaskStatus::Pending),
            "in_progress" => Ok(TaskStatus::InProgress),
            "completed" => Ok(TaskStatus::Completed),
            "cancelled" => Ok(TaskStatus::Cancelled),
            other => Err(AppError::invalid(
                ErrorCode::InvalidStatus,
                format!(
                    "Invalid status '{}'. Expected pending, in_progress, completed or cancelled",
                    other
                ),
            )),
        }
    }
}

/// Represents a task entity as stored in the database and returned by the API.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct Task {
    /// Unique identifier for the task (UUID v4).
    pub id: Uuid,
    /// Identifier of the user who owns the task. Never changes after creation.
    pub user_id: i32,
    pub category_id: Option<i32>,
    pub priority_id: Option<i32>,
    pub title: String,
    pub description: Option<String>,
    /// Calendar due date, no time-of-day component.
    pub due_date: Option<NaiveDate>,
    pub status: TaskStatus,
    /// Incremented on every write; conditional writes compare against it.
    pub version: i32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Task {
    /// Builds a freshly created task from validated data.
    /// The task always starts out `Pending` at version 1.
    pub fn new(data: NewTask) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            user_id: data.user_id,
            category_id: data.category_id,
            priority_id: data.priority_id,
            title: data.title,
            description: data.description,
            due_date: data.due_date,
            status: TaskStatus::Pending,
            version: 1,
            created_at: now,
            updated_at: now,
        }
    }
}

/// Raw payload for creating a task.
///
/// `user_id` is never read from the request body; the route fills it with the caller's id.
/// A `status` may be sent but is ignored: new tasks are always pending.
#[derive(Debug, Default, Clone, Serialize, Deserialize)]
pub struct TaskInput {
    #[serde(skip_deserializing)]
    pub user_id: Option<i32>,
    pub title: Option<String>,
    pub description: Option<String>,
    pub due_date: Option<String>,
    pub status: Option<String>,
    pub category_id: Option<i32>,
    pub priority_id: Option<i32>,
}

/// Raw payload for a partial task update. Absent fields are left untouched.
#[derive(Debug, Default, Clone, Serialize, Deserialize)]
pub struct TaskUpdate {
    pub title: Option<String>,
    pub description: Option<String>,
    pub due_date: Option<String>,
    pub status: Option<String>,
    pub category_id: Option<i32>,
    pub priority_id: Option<i32>,
}

impl TaskUpdate {
    pub fn is_empty(&self) -> bool {
        self.title.is_none()
            && self.description.is_none()
            && self.due_date.is_none()
            && self.status.is_none()
            && self.category_id.is_none()
            && self.priority_id.is_none()
    }
}

/// A create payload that passed validation.
#[derive(Debug, Clone, PartialEq)]
pub struct NewTask {
    pub user_id: i32,
    pub title: String,
    pub description: Option<String>,
    pub due_date: Option<NaiveDate>,
    pub category_id: Option<i32>,
    pub priority_id: Option<i32>,
}

/// An update payload that passed validation.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct TaskPatch {
    pub title: Option<String>,
    pub description: Option<String>,
    pub due_date: Option<NaiveDate>,
    pub status: Option<TaskStatus>,
    pub category_id: Option<i32>,
    pub priority_id: Option<i32>,
}

impl TaskPatch {
    pub fn status(status: TaskStatus) -> Self {
        Self {
            status: Some(status),
            ..Self::default()
        }
    }

    /// Applies the supplied fields to `task`, leaving the others untouched.
    pub fn apply_to(&self, task: &mut Task) {
        if let Some(title) = &self.title {
            task.title = title.clone();
        }
        if let Some(description) = &self.description {
            task.description = Some(description.clone());
        }
        if let Some(due_date) = self.due_date {
            task.due_date = Some(due_date);
        }
        if let Some(status) = self.status {
            task.status = status;
        }
        if let Some(category_id) = self.category_id {
            task.category_id = Some(category_id);
        }
        if let Some(priority_id) = self.priority_id {
            task.priority_id = Some(priority_id);
        }
    }
}

/// Represents query parameters for filtering tasks when listing them.
///
/// When `search` is present it is applied on its own and the other filters are ignored.
#[derive(Debug, Default, Clone, Serialize, Deserialize)]
pub struct TaskQuery {
    pub category_id: Option<i32>,
    pub priority_id: Option<i32>,
    pub status: Option<TaskStatus>,
    pub due_date: Option<NaiveDate>,
    /// Case-insensitive substring match on title or description.
    pub search: Option<String>,
}

/// Parses a due date given either as `YYYY-MM-DD` or as an RFC 3339 timestamp.
/// For timestamps the calendar date is taken as written, without timezone conversion.
pub fn parse_due_date(raw: &str) -> Option<NaiveDate> {
    let raw = raw.trim();
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .ok()
        .or_else(|| DateTime::parse_from_rfc3339(raw).ok().map(|dt| dt.date_naive()))
}

fn validate_title(title: &str) -> Result<String, AppError> {
    let trimmed = title.trim();
    if trimmed.is_empty() {
        return Err(AppError::invalid(ErrorCode::InvalidTitle, "Title is required"));
    }
    if trimmed.chars().count() > TITLE_MAX_LEN {
        return Err(AppError::invalid(
            ErrorCode::InvalidTitleLength,
            format!("Title must be at most {} characters", TITLE_MAX_LEN),
        ));
    }
    Ok(trimmed.to_string())
}

fn validate_due_date(raw: &str) -> Result<NaiveDate, AppError> {
    parse_due_date(raw)
        .ok_or_else(|| AppError::invalid(ErrorCode::InvalidDueDate, "Invalid due date format"))
}

/// Checks a create payload and returns its typed form.
pub fn validate_create(input: &TaskInput) -> Result<NewTask, AppError> {
    let user_id = input
        .user_id
        .ok_or_else(|| AppError::invalid(ErrorCode::UserIdRequired, "User ID is required"))?;

    let title = match &input.title {
        Some(title) => validate_title(title)?,
        None => return Err(AppError::invalid(ErrorCode::InvalidTitle, "Title is required")),
    };

    let due_date = input.due_date.as_deref().map(validate_due_date).transpose()?;

    Ok(NewTask {
        user_id,
        title,
        description: input.description.clone(),
        due_date,
        category_id: input.category_id,
        priority_id: input.priority_id,
    })
}

/// Checks an update payload and returns its typed form.
pub fn validate_update(update: &TaskUpdate) -> Result<TaskPatch, AppError> {
    if update.is_empty() {
        return Err(AppError::invalid(
            ErrorCode::NoUpdateData,
            "No update data provided",
        ));
    }

    Ok(TaskPatch {
        title: update.title.as_deref().map(validate_title).transpose()?,
        description: update.description.clone(),
        due_date: update.due_date.as_deref().map(validate_due_date).transpose()?,
        status: update.status.as_deref().map(str::parse).transpose()?,
        category_id: update.category_id,
        priority_id: update.priority_id,
    })
}
