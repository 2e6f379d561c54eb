use actix_cors::Cors;
use actix_web::middleware::Logger;
use actix_web::{web, App, HttpServer};
use chrono::Duration;
use sqlx::postgres::PgPoolOptions;
use std::io;
use std::sync::Arc;

use taskforge::auth::{AuthMiddleware, JwtIssuer, TokenIssuer};
use taskforge::config::Config;
use taskforge::repositories::{PgResetTokenRepository, PgTaskRepository, PgUserRepository};
use taskforge::routes::{self, health};
use taskforge::{TaskService, UserService};

fn startup_error(err: impl std::fmt::Display) -> io::Error {
    io::Error::new(io::ErrorKind::Other, err.to_string())
}

#[actix_web::main]
async fn main() -> io::Result<()> {
    dotenv::dotenv().ok();
    env_logger::init_from_env(env_logger::Env::default().default_filter_or("info"));

    let config = Config::from_env().map_err(startup_error)?;

    let pool = PgPoolOptions::new()
        .max_connections(10)
        .connect(&config.database_url)
        .await
        .map_err(startup_error)?;
    sqlx::migrate!("./migrations")
        .run(&pool)
        .await
        .map_err(startup_error)?;

    let issuer: Arc<dyn TokenIssuer> = Arc::new(JwtIssuer::new(
        &config.jwt_secret,
        &config.jwt_refresh_secret,
        Duration::minutes(config.access_token_ttl_minutes),
        Duration::days(config.refresh_token_ttl_days),
    ));
    let task_service = web::Data::new(TaskService::new(Arc::new(PgTaskRepository::new(
        pool.clone(),
    ))));
    let user_service = web::Data::new(
        UserService::new(
            Arc::new(PgUserRepository::new(pool.clone(), config.bcrypt_cost)),
            issuer.clone(),
            Arc::new(PgResetTokenRepository::new(pool.clone())),
        )
        .with_reset_token_ttl(Duration::minutes(config.reset_token_ttl_minutes)),
    );

    log::info!("Starting TaskForge server at {}", config.server_url());
    HttpServer::new(move || {
        App::new()
            .app_data(task_service.clone())
            .app_data(user_service.clone())
            .wrap(
                Cors::default()
                    .allow_any_origin()
                    .allow_any_method()
                    .allow_any_header()
                    .max_age(3600),
            )
            .wrap(Logger::default())
            .service(health::health)
            .service(
                web::scope("/api")
                    .wrap(AuthMiddleware::new(issuer.clone()))
                    .configure(routes::config),
            )
    })
    .bind((config.server_host.as_str(), config.server_port))?
    .run()
    .await
}
