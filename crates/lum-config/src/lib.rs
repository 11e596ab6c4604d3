//! # lum-config
//!
//! Layered configuration loading for Lumen using figment.
//!
//! Configuration sources (in priority order, highest wins):
//! 1. Environment variables (`LUMEN_*` prefix, `__` as separator)
//! 2. An explicit file passed with `--config`
//! 3. Project-level `.lumen/config.toml`
//! 4. User-level `~/.config/lumen/config.toml`
//! 5. Built-in defaults
//!
//! # Environment Variable Mapping
//!
//! Figment maps `LUMEN_STORE__DB_PATH` -> `store.db_path`,
//! `LUMEN_MIGRATION__DEFAULT_STRATEGY` -> `migration.default_strategy`, etc.
//!
//! # Usage
//!
//! ```no_run
//! use lum_config::LumConfig;
//!
//! let config = LumConfig::load_with_dotenv().expect("config");
//! println!("database: {}", config.store.db_path);
//! ```

mod error;
mod logging;
mod migration;
mod server;
mod store;

pub use error::ConfigError;
pub use logging::LoggingConfig;
pub use migration::MigrationConfig;
pub use server::ServerConfig;
pub use store::StoreConfig;

use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct LumConfig {
    #[serde(default)]
    pub store: StoreConfig,
    #[serde(default)]
    pub migration: MigrationConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
    #[serde(default)]
    pub server: ServerConfig,
}

impl LumConfig {
    /// Load configuration from all sources (TOML files + environment variables)
    /// and validate it.
    ///
    /// Does NOT call `dotenvy` -- use [`Self::load_with_dotenv`] for `.env` support.
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_from(None)
    }

    /// Like [`Self::load`], with an extra TOML file layered above the project config.
    pub fn load_from(extra: Option<&Path>) -> Result<Self, ConfigError> {
        let config: Self = Self::figment_with(extra).extract()?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration with `.env` file support.
    pub fn load_with_dotenv() -> Result<Self, ConfigError> {
        let _ = dotenvy::dotenv();
        Self::load()
    }

    /// Build the figment provider chain without an explicit file.
    pub fn figment() -> Figment {
        Self::figment_with(None)
    }

    /// Build the figment provider chain.
    pub fn figment_with(extra: Option<&Path>) -> Figment {
        let mut figment = Figment::from(Serialized::defaults(Self::default()));

        if let Some(global_path) = Self::global_config_path()
            && global_path.exists()
        {
            figment = figment.merge(Toml::file(global_path));
        }

        let local_path = PathBuf::from(".lumen/config.toml");
        if local_path.exists() {
            figment = figment.merge(Toml::file(local_path));
        }

        // Missing explicit files surface as an extraction error instead of being skipped.
        if let Some(path) = extra {
            figment = figment.merge(Toml::file_exact(path));
        }

        figment.merge(Env::prefixed("LUMEN_").split("__"))
    }

    /// Reject values the engine cannot run with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let m = &self.migration;
        for (field, value) in [
            ("migration.max_curricula", m.max_curricula),
            ("migration.max_flashcards", m.max_flashcards),
            ("migration.max_modules_per_curriculum", m.max_modules_per_curriculum),
            ("migration.max_lessons_per_module", m.max_lessons_per_module),
        ] {
            if value == 0 {
                return Err(ConfigError::invalid(field, "must be greater than zero"));
            }
        }
        if m.min_integrity_score > 100 {
            return Err(ConfigError::invalid(
                "migration.min_integrity_score",
                format!("{} is above 100", m.min_integrity_score),
            ));
        }
        if self.store.db_path.trim().is_empty() {
            return Err(ConfigError::invalid("store.db_path", "must not be empty"));
        }
        if self.server.bind.parse::<SocketAddr>().is_err() {
            return Err(ConfigError::invalid(
                "server.bind",
                format!("'{}' is not a socket address", self.server.bind),
            ));
        }
        if self.server.max_body_bytes == 0 {
            return Err(ConfigError::invalid(
                "server.max_body_bytes",
                "must be greater than zero",
            ));
        }
        Ok(())
    }

    /// Path to the user-global config file.
    fn global_config_path() -> Option<PathBuf> {
        dirs::config_dir().map(|p| p.join("lumen").join("config.toml"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_valid() {
        let config = LumConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.server.bind, "127.0.0.1:8787");
    }

    #[test]
    fn zero_bound_is_rejected() {
        let mut config = LumConfig::default();
        config.migration.max_flashcards = 0;
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("migration.max_flashcards"));
    }

    #[test]
    fn score_above_hundred_is_rejected() {
        let mut config = LumConfig::default();
        config.migration.min_integrity_score = 101;
        assert!(matches!(
            config.validate(),
            Err(ConfigError::InvalidValue { ref field, .. }) if field == "migration.min_integrity_score"
        ));
    }

    #[test]
    fn bad_bind_is_rejected() {
        let mut config = LumConfig::default();
        config.server.bind = "localhost".into();
        assert!(config.validate().is_err());
    }
}
