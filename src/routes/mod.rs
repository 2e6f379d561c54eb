pub mod auth;
pub mod health;
pub mod tasks;
pub mod users;

use actix_web::web;

use crate::error::AppError;

/// Mounts the API routes. Expects `web::Data<TaskService>` and `web::Data<UserService>`
/// to be registered on the app, and `AuthMiddleware` to wrap the enclosing scope.
///
/// Body, query and path extraction failures are answered through `AppError` like every
/// other error.
pub fn config(cfg: &mut web::ServiceConfig) {
    cfg.app_data(
        web::JsonConfig::default().error_handler(|err, _req| AppError::from(err).into()),
    )
    .app_data(
        web::QueryConfig::default().error_handler(|err, _req| AppError::from(err).into()),
    )
    .app_data(
        web::PathConfig::default().error_handler(|err, _req| AppError::from(err).into()),
    );

    cfg.service(
        web::scope("/auth")
            .service(auth::login)
            .service(auth::register)
            .service(auth::refresh)
            .service(auth::forgot_password)
            .service(auth::reset_password),
    )
    .service(
        // Literal paths are registered before `/{id}` so they are not parsed as ids.
        web::scope("/users")
            .service(users::list_users)
            .service(users::get_me)
            .service(users::change_password)
            .service(users::get_user)
            .service(users::update_user)
            .service(users::delete_user),
    )
    .service(
        web::scope("/tasks")
            .service(tasks::get_tasks)
            .service(tasks::create_task)
            .service(tasks::get_due_soon)
            .service(tasks::get_overdue)
            .service(tasks::get_by_category)
            .service(tasks::get_by_priority)
            .service(tasks::get_task)
            .service(tasks::update_task)
            .service(tasks::change_status)
            .service(tasks::delete_task),
    );
}
