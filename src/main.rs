use axum::{ServiceExt, extract::Request};
use dotenv::dotenv;
use ratings_api::{
    AppState, config::Config, db::DBClient, mail::Mailer, routes, tracing_config::init_tracing,
};
use sqlx::postgres::PgPoolOptions;
use std::sync::Arc;

#[tokio::main]
async fn main() {
    dotenv().ok();

    // Keep the guard alive until main returns so buffered file logs get flushed
    let _guard = init_tracing();

    let config = match Config::init() {
        Ok(config) => config,
        Err(err) => {
            tracing::error!("Invalid configuration: {}", err);
            std::process::exit(1);
        }
    };

    let pool = match PgPoolOptions::new()
        .max_connections(10)
        .connect(&config.database_url)
        .await
    {
        Ok(pool) => {
            tracing::info!("Connection to the database is successful!");
            pool
        }
        Err(err) => {
            tracing::error!("Failed to connect to the database: {:?}", err);
            std::process::exit(1);
        }
    };

    let db_client = DBClient::new(pool);

    if let Err(err) = db_client.migrate().await {
        tracing::error!("Failed to run migrations: {:?}", err);
        std::process::exit(1);
    }

    //scheduler
    let _scheduler = match db_client.start_cleanup_task(&config.cleanup_cron).await {
        Ok(scheduler) => scheduler,
        Err(err) => {
            tracing::error!("Failed to start cleanup job: {:?}", err);
            std::process::exit(1);
        }
    };

    let mailer = match Mailer::from_config(&config) {
        Ok(mailer) => mailer,
        Err(err) => {
            tracing::error!("Failed to set up mail delivery: {}", err);
            std::process::exit(1);
        }
    };

    let app_state = AppState {
        env: Arc::new(config.clone()),
        db_client,
        mailer,
    };

    let app = routes::create_app(app_state);

    tracing::info!("Server is running on http://localhost:{}", config.port);

    let listener = match tokio::net::TcpListener::bind(format!("0.0.0.0:{}", &config.port)).await {
        Ok(listener) => listener,
        Err(err) => {
            tracing::error!("Failed to bind port {}: {}", config.port, err);
            std::process::exit(1);
        }
    };

    if let Err(err) = axum::serve(listener, ServiceExt::<Request>::into_make_service(app)).await {
        tracing::error!("Server error: {}", err);
    }
}
