use std::path::PathBuf;

use crate::core::Config;
use crate::db::DbService;
use crate::notify::Notifier;

/// Shared application state, cloned into every handler
#[derive(Clone)]
pub struct ServerState {
    pub config: Config,
    pub db: DbService,
    pub notifier: Notifier,
}

impl ServerState {
    pub fn new(config: Config, db: DbService, notifier: Notifier) -> Self {
        Self {
            config,
            db,
            notifier,
        }
    }

    pub async fn initialize(config: &Config) -> Self {
        // 1. Initialize DB under work_dir
        let db_path = PathBuf::from(&config.work_dir).join("store.db");
        let db = DbService::new(&db_path.to_string_lossy())
            .await
            .expect("Failed to initialize database");

        // 2. Domain event fan-out
        let notifier = Notifier::new();

        Self::new(config.clone(), db, notifier)
    }
}
