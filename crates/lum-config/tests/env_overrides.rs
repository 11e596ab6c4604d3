use figment::Jail;
use lum_config::LumConfig;
use lum_core::enums::ConflictStrategy;
use pretty_assertions::assert_eq;

#[test]
fn nested_env_vars_reach_every_section() {
    Jail::expect_with(|jail| {
        jail.set_env("LUMEN_STORE__DB_PATH", ":memory:");
        jail.set_env("LUMEN_MIGRATION__DEFAULT_STRATEGY", "create_duplicate");
        jail.set_env("LUMEN_MIGRATION__MAX_LESSONS_PER_MODULE", "12");
        jail.set_env("LUMEN_LOGGING__RETENTION_HOURS", "6");
        jail.set_env("LUMEN_SERVER__BIND", "127.0.0.1:1");

        let config = LumConfig::load().map_err(|e| e.to_string())?;
        assert!(config.store.is_in_memory());
        assert_eq!(
            config.migration.default_strategy,
            ConflictStrategy::CreateDuplicate
        );
        assert_eq!(config.migration.max_lessons_per_module, 12);
        assert_eq!(config.logging.retention_hours, 6);
        assert_eq!(config.server.bind, "127.0.0.1:1");
        Ok(())
    });
}

/// Typo'd keys are silently ignored by figment; the default survives.
#[test]
fn typo_env_var_silently_ignored() {
    Jail::expect_with(|jail| {
        jail.set_env("LUMEN_STORE__DB_PATHH", "typo.db");

        let config = LumConfig::load().map_err(|e| e.to_string())?;
        assert_eq!(config.store.db_path, ".lumen/lumen.db");
        Ok(())
    });
}

#[test]
fn unknown_strategy_fails_extraction() {
    Jail::expect_with(|jail| {
        jail.set_env("LUMEN_MIGRATION__DEFAULT_STRATEGY", "coin_flip");
        assert!(LumConfig::load().is_err());
        Ok(())
    });
}
