pub mod api;
pub mod config;
pub mod crypto;
pub mod db;
pub mod storage;

pub use db::DbPool;

use config::Config;
use std::sync::Arc;

use crate::storage::ObjectStore;

pub struct AppState {
    pub config: Config,
    pub db: DbPool,
    pub storage: Arc<dyn ObjectStore>,
}

impl AppState {
    pub fn new(config: Config, db: DbPool, storage: Arc<dyn ObjectStore>) -> Self {
        Self {
            config,
            db,
            storage,
        }
    }
}
