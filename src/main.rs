use std::sync::Arc;

use actix_web::middleware::{Logger, NormalizePath};
use actix_web::web::{Data, JsonConfig};
use actix_web::{App, HttpServer};
use anyhow::Context;

mod api;
mod auth;
mod config;
mod db;
mod docs;
mod engine;
mod error;
mod model;
mod models;
mod routes;
mod service;
mod store;
mod utils;

use config::Config;
use db::init_db;
use error::AttendanceError;
use routes::RateLimits;
use service::{AccountService, AttendanceService, CourseService, ReportService, StudentService};
use store::mysql::MySqlStore;

use crate::docs::ApiDoc;
use tracing::info;
use tracing_appender::rolling;
use utoipa_swagger_ui::SwaggerUi;

#[actix_web::main]
async fn main() -> anyhow::Result<()> {
    let config = Config::from_env()?;

    // Rolling daily log
    let file_appender = rolling::daily(&config.log_dir, "attendance.log");
    let (non_blocking, _guard) = tracing_appender::non_blocking(file_appender);

    tracing_subscriber::fmt()
        .with_writer(non_blocking)
        .with_max_level(tracing::Level::DEBUG)
        .with_ansi(false)
        .with_target(false)
        .with_level(true)
        .with_thread_ids(false)
        .with_thread_names(false)
        .pretty()
        .init();

    info!("Server starting...");

    let pool = init_db(&config.database_url, config.db_max_connections).await?;
    let store = Arc::new(MySqlStore::new(pool));

    let attendance = Data::new(AttendanceService::new(store.clone()));
    let courses = Data::new(CourseService::new(store.clone(), store.clone()));
    let students = Data::new(StudentService::new(
        store.clone(),
        store.clone(),
        store.clone(),
    ));
    let accounts = Data::new(AccountService::new(
        store.clone(),
        store.clone(),
        store.clone(),
    ));
    let reports = Data::new(ReportService::new(
        store.clone(),
        store.clone(),
        store.clone(),
        store.clone(),
    ));

    let limits = RateLimits::from_config(&config)?;
    let openapi = ApiDoc::with_api_prefix(&config.api_prefix);
    let server_addr = config.server_addr.clone();
    let config_data = Data::new(config.clone());

    info!(addr = %server_addr, "Listening");

    HttpServer::new(move || {
        App::new()
            .wrap(Logger::default())
            .wrap(NormalizePath::trim())
            .service(
                // wildcard {_:.*} matches the UI's JS/CSS files
                SwaggerUi::new("/swagger-ui/{_:.*}")
                    .url("/api-doc/openapi.json", openapi.clone()),
            )
            .app_data(JsonConfig::default().error_handler(|err, _req| {
                AttendanceError::validation(err.to_string()).into()
            }))
            .app_data(config_data.clone())
            .app_data(attendance.clone())
            .app_data(courses.clone())
            .app_data(students.clone())
            .app_data(accounts.clone())
            .app_data(reports.clone())
            .configure(|cfg| routes::configure(cfg, &config, &limits))
    })
    .bind(&server_addr)
    .with_context(|| format!("Failed to bind {server_addr}"))?
    .run()
    .await?;

    Ok(())
}
