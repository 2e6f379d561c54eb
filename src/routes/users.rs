use crate::{
    auth::{Caller, ChangePasswordRequest, UpdateUserRequest},
    error::{AppError, ErrorCode},
    models::UserFilter,
    services::UserService,
};
use actix_web::{delete, get, put, web, HttpResponse, Responder};
use serde_json::json;

fn user_not_found() -> AppError {
    AppError::NotFound(ErrorCode::UserNotFound, "User not found".into())
}

/// Lists accounts, optionally filtered by `username`, `email` (partial) and `role` (exact).
/// Admins only.
#[get("")]
pub async fn list_users(
    service: web::Data<UserService>,
    query: web::Query<UserFilter>,
    caller: Caller,
) -> Result<impl Responder, AppError> {
    if !caller.is_admin() {
        return Err(AppError::forbidden("Admin access required"));
    }
    let users = service.list_all(&query).await?;
    Ok(HttpResponse::Ok().json(users))
}

#[get("/me")]
pub async fn get_me(
    service: web::Data<UserService>,
    caller: Caller,
) -> Result<impl Responder, AppError> {
    let user = service.get_by_id(caller.id).await?.ok_or_else(user_not_found)?;
    Ok(HttpResponse::Ok().json(user))
}

#[put("/me/password")]
pub async fn change_password(
    service: web::Data<UserService>,
    body: web::Json<ChangePasswordRequest>,
    caller: Caller,
) -> Result<impl Responder, AppError> {
    service
        .change_password(caller.id, &body.current_password, &body.new_password)
        .await?;
    Ok(HttpResponse::Ok().json(json!({ "success": true })))
}

/// Fetches an account. Users may only see themselves; admins see anyone.
#[get("/{id}")]
pub async fn get_user(
    service: web::Data<UserService>,
    user_id: web::Path<i32>,
    caller: Caller,
) -> Result<impl Responder, AppError> {
    let user_id = user_id.into_inner();
    if !caller.can_act_on(user_id) {
        return Err(AppError::forbidden("You may only view your own account"));
    }
    let user = service.get_by_id(user_id).await?.ok_or_else(user_not_found)?;
    Ok(HttpResponse::Ok().json(user))
}

#[put("/{id}")]
pub async fn update_user(
    service: web::Data<UserService>,
    user_id: web::Path<i32>,
    body: web::Json<UpdateUserRequest>,
    caller: Caller,
) -> Result<impl Responder, AppError> {
    let user = service
        .update(user_id.into_inner(), &body, caller.id, caller.is_admin())
        .await?
        .ok_or_else(user_not_found)?;
    Ok(HttpResponse::Ok().json(user))
}

#[delete("/{id}")]
pub async fn delete_user(
    service: web::Data<UserService>,
    user_id: web::Path<i32>,
    caller: Caller,
) -> Result<impl Responder, AppError> {
    if !service
        .delete(user_id.into_inner(), caller.id, caller.is_admin())
        .await?
    {
        return Err(user_not_found());
    }
    Ok(HttpResponse::NoContent().finish())
}
