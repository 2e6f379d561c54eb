use crate::{
    auth::Caller,
    error::{AppError, ErrorCode},
    models::{TaskInput, TaskQuery, TaskUpdate},
    services::{TaskService, DEFAULT_DUE_SOON_DAYS},
};
use actix_web::{delete, get, patch, post, put, web, HttpResponse, Responder};
use serde::Deserialize;
use uuid::Uuid;

fn task_not_found() -> AppError {
    AppError::NotFound(ErrorCode::TaskNotFound, "Task not found".into())
}

#[derive(Debug, Deserialize)]
pub struct StatusChange {
    pub status: String,
}

#[derive(Debug, Deserialize)]
pub struct DueSoonQuery {
    pub days: Option<u32>,
}

/// Retrieves the authenticated user's tasks.
///
/// ## Query Parameters:
/// - `category_id`, `priority_id`, `status`, `due_date` (optional): exact-match filters.
/// - `search` (optional): case-insensitive match on title or description. When present,
///   the other filters are ignored.
///
/// Tasks are ordered by due date (undated last), then newest first.
#[get("")]
pub async fn get_tasks(
    service: web::Data<TaskService>,
    query: web::Query<TaskQuery>,
    caller: Caller,
) -> Result<impl Responder, AppError> {
    let tasks = service.list_for_user(caller.id, &query).await?;
    Ok(HttpResponse::Ok().json(tasks))
}

/// Creates a new task owned by the authenticated user.
///
/// ## Responses:
/// - `201 Created`: the new task, always with status `pending`.
/// - `400 Bad Request`: invalid title or due date (including dates in the past).
#[post("")]
pub async fn create_task(
    service: web::Data<TaskService>,
    task_data: web::Json<TaskInput>,
    caller: Caller,
) -> Result<impl Responder, AppError> {
    let mut input = task_data.into_inner();
    input.user_id = Some(caller.id);

    let task = service.create(&input).await?;
    Ok(HttpResponse::Created().json(task))
}

#[get("/due-soon")]
pub async fn get_due_soon(
    service: web::Data<TaskService>,
    query: web::Query<DueSoonQuery>,
    caller: Caller,
) -> Result<impl Responder, AppError> {
    let days = query.days.unwrap_or(DEFAULT_DUE_SOON_DAYS);
    let tasks = service.get_due_soon(caller.id, days).await?;
    Ok(HttpResponse::Ok().json(tasks))
}

#[get("/overdue")]
pub async fn get_overdue(
    service: web::Data<TaskService>,
    caller: Caller,
) -> Result<impl Responder, AppError> {
    let tasks = service.get_overdue(caller.id).await?;
    Ok(HttpResponse::Ok().json(tasks))
}

#[get("/category/{category_id}")]
pub async fn get_by_category(
    service: web::Data<TaskService>,
    category_id: web::Path<i32>,
    caller: Caller,
) -> Result<impl Responder, AppError> {
    let tasks = service.get_by_category(category_id.into_inner(), caller.id).await?;
    Ok(HttpResponse::Ok().json(tasks))
}

#[get("/priority/{priority_id}")]
pub async fn get_by_priority(
    service: web::Data<TaskService>,
    priority_id: web::Path<i32>,
    caller: Caller,
) -> Result<impl Responder, AppError> {
    let tasks = service.get_by_priority(priority_id.into_inner(), caller.id).await?;
    Ok(HttpResponse::Ok().json(tasks))
}

/// Retrieves a task by id.
///
/// Only the owner or an admin sees it; anyone else gets `404 Not Found`, the same as for
/// a task that does not exist.
#[get("/{id}")]
pub async fn get_task(
    service: web::Data<TaskService>,
    task_id: web::Path<Uuid>,
    caller: Caller,
) -> Result<impl Responder, AppError> {
    match service.get_by_id(task_id.into_inner()).await? {
        Some(task) if caller.can_act_on(task.user_id) => Ok(HttpResponse::Ok().json(task)),
        _ => Err(task_not_found()),
    }
}

/// Partially updates a task. Only supplied fields change.
///
/// ## Responses:
/// - `200 OK`: the updated task.
/// - `400 Bad Request`: empty payload or invalid field.
/// - `403 Forbidden`: the caller neither owns the task nor is an admin.
/// - `404 Not Found`: no such task.
/// - `409 Conflict`: the task changed concurrently.
#[put("/{id}")]
pub async fn update_task(
    service: web::Data<TaskService>,
    task_id: web::Path<Uuid>,
    task_data: web::Json<TaskUpdate>,
    caller: Caller,
) -> Result<impl Responder, AppError> {
    match service.update(task_id.into_inner(), &task_data, &caller).await? {
        Some(task) => Ok(HttpResponse::Ok().json(task)),
        None => Err(task_not_found()),
    }
}

#[patch("/{id}/status")]
pub async fn change_status(
    service: web::Data<TaskService>,
    task_id: web::Path<Uuid>,
    body: web::Json<StatusChange>,
    caller: Caller,
) -> Result<impl Responder, AppError> {
    match service
        .change_status(task_id.into_inner(), &body.status, &caller)
        .await?
    {
        Some(task) => Ok(HttpResponse::Ok().json(task)),
        None => Err(task_not_found()),
    }
}

#[delete("/{id}")]
pub async fn delete_task(
    service: web::Data<TaskService>,
    task_id: web::Path<Uuid>,
    caller: Caller,
) -> Result<impl Responder, AppError> {
    if !service.delete(task_id.into_inner(), &caller).await? {
        return Err(task_not_found());
    }
    Ok(HttpResponse::NoContent().finish())
}
