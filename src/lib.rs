pub mod config;
pub mod db;
pub mod dtos;
pub mod error;
pub mod extract;
pub mod handler;
pub mod mail;
pub mod middleware;
pub mod models;
pub mod permissions;
pub mod routes;
pub mod tracing_config;
pub mod utils;

use std::sync::Arc;

use config::Config;
use db::DBClient;
use mail::Mailer;

#[derive(Clone)]
pub struct AppState {
    pub env: Arc<Config>,
    pub db_client: DBClient,
    pub mailer: Mailer,
}
