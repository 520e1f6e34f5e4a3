pub mod climate;
pub mod config;
pub mod db;
pub mod error;
pub mod files;
pub mod http_server;
pub mod ledger;
pub mod lines;
pub mod metrics;
pub mod models;
pub mod pages;
pub mod pagination;
pub mod plot;

use config::ConfigManager;
use std::path::PathBuf;
use std::sync::Arc;

#[derive(Clone)]
pub struct AppState {
    pub db_path: PathBuf,
    pub config: Arc<ConfigManager>,
}
