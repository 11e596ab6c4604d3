use std::sync::Arc;

use anyhow::Context;
use lum_config::LumConfig;
use lum_db::service::LumService;
use lum_migrate::{MigrationEngine, SessionLogger};

use crate::cli::GlobalFlags;

/// Shared application resources initialized once at startup.
pub struct AppContext {
    pub config: LumConfig,
    pub service: Arc<LumService>,
    pub engine: MigrationEngine<LumService, LumService>,
}

impl AppContext {
    /// Open the store and build the migration engine from `config`.
    pub async fn init(config: LumConfig) -> anyhow::Result<Self> {
        let service = LumService::new_local(&config.store.db_path)
            .await
            .with_context(|| format!("failed to open store at {}", config.store.db_path))?;
        let service = Arc::new(service);

        let logger = SessionLogger::from_config(&config.logging)
            .context("failed to initialize migration session logger")?;

        let engine = MigrationEngine::new(
            Arc::clone(&service),
            Arc::clone(&service),
            Arc::new(logger),
            &config.migration,
        );

        tracing::debug!(db = %config.store.db_path, "application context ready");
        Ok(Self {
            config,
            service,
            engine,
        })
    }
}

/// Load layered config, with `.env` support and the optional `--config` file.
pub fn load_config(flags: &GlobalFlags) -> anyhow::Result<LumConfig> {
    match &flags.config {
        Some(path) => {
            let _ = dotenvy::dotenv();
            LumConfig::load_from(Some(path.as_path()))
                .with_context(|| format!("failed to load config from {}", path.display()))
        }
        None => LumConfig::load_with_dotenv().context("failed to load lumen config"),
    }
}
