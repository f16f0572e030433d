#[macro_use]
extern crate rocket;

mod api;
mod auth;
mod db;
mod env;
mod error;
mod models;
mod telemetry;
#[cfg(test)]
mod test;
mod validation;

use std::sync::Mutex;
use std::time::Duration;

use api::{
    api_complete_task, api_create_academy, api_create_task, api_delete_academy, api_delete_task,
    api_get_academy, api_get_profile, api_get_task, api_get_user, api_list_academies,
    api_list_profiles, api_list_tasks, api_list_users, api_login, api_logout, api_me,
    api_my_tasks, api_parent_dashboard, api_register, api_register_parent, api_start_task,
    api_update_academy, api_update_profile, api_update_task, api_update_user, bad_request_api,
    forbidden_api, health, internal_error_api, not_found_api, unprocessable_api,
};
use auth::unauthorized_api;
use db::clean_expired_sessions;
use env::{Settings, load_environment};
use error::AppError;
use once_cell::sync::Lazy;
use rocket::fairing::AdHoc;
use rocket::{Build, Rocket, tokio};
use sqlx::SqlitePool;
use telemetry::{OtelGuard, TelemetryFairing, init_tracing, shutdown_telemetry};
use thiserror::Error;
use tracing::{error, info};

pub static TELEMETRY_GUARD: Lazy<Mutex<Option<OtelGuard>>> = Lazy::new(|| Mutex::new(None));

#[derive(Debug, Error)]
pub enum Error {
    #[error("{0}")]
    Anyhow(anyhow::Error),
    #[error("{0}")]
    Rocket(Box<rocket::Error>),
    #[error("{0}")]
    Sqlx(#[from] sqlx::Error),
    #[error("Application error: {0}")]
    App(#[from] AppError),
}

impl From<anyhow::Error> for Error {
    fn from(value: anyhow::Error) -> Self {
        Error::Anyhow(value)
    }
}

impl From<rocket::Error> for Error {
    fn from(value: rocket::Error) -> Self {
        Error::Rocket(Box::new(value))
    }
}

#[rocket::main]
async fn main() -> Result<(), Error> {
    load_environment().map_err(|e| anyhow::anyhow!("Failed to load environment: {}", e))?;

    let guard = init_tracing();
    if let Ok(mut slot) = TELEMETRY_GUARD.lock() {
        *slot = guard;
    }

    let settings = Settings::from_env()?;

    info!(database_url = %settings.database_url, "Connecting to database");
    let pool = SqlitePool::connect(&settings.database_url).await?;

    info!("Running database migrations...");
    sqlx::migrate!("./migrations")
        .run(&pool)
        .await
        .map_err(AppError::from)?;
    info!("Migrations completed successfully");

    spawn_session_cleanup(
        pool.clone(),
        Duration::from_secs(settings.session_cleanup_interval_secs),
    );

    let _ = init_rocket(pool, settings).launch().await?;

    Ok(())
}

fn spawn_session_cleanup(pool: SqlitePool, interval: Duration) {
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_secs(5)).await;

        loop {
            match clean_expired_sessions(&pool).await {
                Ok(count) => {
                    if count > 0 {
                        info!("Cleaned up {} expired sessions", count);
                    }
                }
                Err(e) => {
                    error!("Failed to clean expired sessions: {}", e);
                }
            }

            tokio::time::sleep(interval).await;
        }
    });
}

pub fn init_rocket(pool: SqlitePool, settings: Settings) -> Rocket<Build> {
    info!("Starting sports academy backend");

    rocket::build()
        .manage(pool)
        .manage(settings)
        .mount(
            "/api",
            routes![
                api_login,
                api_logout,
                api_me,
                api_register,
                api_register_parent,
                api_list_users,
                api_get_user,
                api_update_user,
                api_list_profiles,
                api_get_profile,
                api_update_profile,
                api_list_academies,
                api_get_academy,
                api_create_academy,
                api_update_academy,
                api_delete_academy,
                api_list_tasks,
                api_my_tasks,
                api_get_task,
                api_create_task,
                api_update_task,
                api_delete_task,
                api_start_task,
                api_complete_task,
                api_parent_dashboard,
                health,
            ],
        )
        .register(
            "/api",
            catchers![
                bad_request_api,
                unauthorized_api,
                forbidden_api,
                not_found_api,
                unprocessable_api,
                internal_error_api,
            ],
        )
        .attach(TelemetryFairing)
        .attach(AdHoc::on_shutdown("Telemetry shutdown", |_| {
            Box::pin(async { shutdown_telemetry() })
        }))
}
