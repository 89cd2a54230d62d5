use anyhow::{Context, Result};
use figment::providers::{Env, Format, Serialized, Yaml};
use figment::Figment;
use std::path::Path;
use thiserror::Error;

use crate::domain::models::config::{Config, MAX_COOLDOWN_SECS};

const MAX_CONCURRENT_FIXES: usize = 50;

/// Configuration error types
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Invalid max_concurrent_fixes: {0}. Must be between 1 and {MAX_CONCURRENT_FIXES}")]
    InvalidMaxConcurrentFixes(usize),

    #[error("Invalid monitor_concurrency: {0}. Must be at least 1")]
    InvalidMonitorConcurrency(usize),

    #[error("Invalid cooldown_secs: {0}. Must be between 1 and {MAX_COOLDOWN_SECS}")]
    InvalidCooldown(u64),

    #[error("Invalid failure_threshold: {0}. Must be at least 1")]
    InvalidFailureThreshold(u32),

    #[error("Invalid stale_reset_factor: {0}. Must be at least 1")]
    InvalidStaleResetFactor(u32),

    #[error("Invalid min_priority: {0}. Must be between 0 and 10")]
    InvalidMinPriority(f64),

    #[error("Invalid memory_multiplier: {0}. Must be at least 2")]
    InvalidMemoryMultiplier(u32),

    #[error("Invalid log level: {0}. Must be one of: trace, debug, info, warn, error")]
    InvalidLogLevel(String),

    #[error("Invalid log format: {0}. Must be one of: json, pretty")]
    InvalidLogFormat(String),

    #[error("Database path cannot be empty")]
    EmptyDatabasePath,

    #[error("Invalid max_connections: {0}. Must be at least 1")]
    InvalidMaxConnections(u32),

    #[error("Configuration validation failed: {0}")]
    ValidationFailed(String),
}

/// Configuration loader with hierarchical merging
pub struct ConfigLoader;

impl ConfigLoader {
    /// Load configuration relative to the working directory
    ///
    /// Precedence (lowest to highest):
    /// 1. Programmatic defaults (Serialized)
    /// 2. .mender/config.yaml
    /// 3. .mender/local.yaml (optional local overrides)
    /// 4. Environment variables (MENDER_* prefix, `__` separates nesting)
    pub fn load() -> Result<Config> {
        Self::load_from(Path::new("."))
    }

    /// Same as [`ConfigLoader::load`] with `.mender/` resolved under `root`
    pub fn load_from(root: &Path) -> Result<Config> {
        let dir = root.join(".mender");
        let config: Config = Figment::new()
            .merge(Serialized::defaults(Config::default()))
            .merge(Yaml::file(dir.join("config.yaml")))
            .merge(Yaml::file(dir.join("local.yaml")))
            .merge(Env::prefixed("MENDER_").split("__"))
            .extract()
            .context("Failed to extract configuration from figment")?;

        Self::validate(&config)?;
        Ok(config)
    }

    /// Load configuration from a specific file
    pub fn load_from_file(path: impl AsRef<Path>) -> Result<Config> {
        let config: Config = Figment::new()
            .merge(Serialized::defaults(Config::default()))
            .merge(Yaml::file(path.as_ref()))
            .extract()
            .with_context(|| format!("Failed to load config from {}", path.as_ref().display()))?;

        Self::validate(&config)?;
        Ok(config)
    }

    /// Validate configuration after loading
    pub fn validate(config: &Config) -> Result<(), ConfigError> {
        let cycle = &config.cycle;

        if cycle.max_concurrent_fixes == 0 || cycle.max_concurrent_fixes > MAX_CONCURRENT_FIXES {
            return Err(ConfigError::InvalidMaxConcurrentFixes(
                cycle.max_concurrent_fixes,
            ));
        }

        if cycle.monitor_concurrency == 0 {
            return Err(ConfigError::InvalidMonitorConcurrency(
                cycle.monitor_concurrency,
            ));
        }

        if cycle.cooldown_secs == 0 || cycle.cooldown_secs > MAX_COOLDOWN_SECS {
            return Err(ConfigError::InvalidCooldown(cycle.cooldown_secs));
        }

        if cycle.failure_threshold == 0 {
            return Err(ConfigError::InvalidFailureThreshold(cycle.failure_threshold));
        }

        if cycle.stale_reset_factor == 0 {
            return Err(ConfigError::InvalidStaleResetFactor(
                cycle.stale_reset_factor,
            ));
        }

        if !(0.0..=10.0).contains(&cycle.min_priority) {
            return Err(ConfigError::InvalidMinPriority(cycle.min_priority));
        }

        if cycle.alias.is_empty() {
            return Err(ConfigError::ValidationFailed(
                "alias cannot be empty".to_string(),
            ));
        }

        if let Some(empty) = cycle.resources.iter().position(String::is_empty) {
            return Err(ConfigError::ValidationFailed(format!(
                "resource at index {empty} has an empty name"
            )));
        }

        if config.catalog.memory_multiplier < 2 {
            return Err(ConfigError::InvalidMemoryMultiplier(
                config.catalog.memory_multiplier,
            ));
        }

        if config.database.path.is_empty() {
            return Err(ConfigError::EmptyDatabasePath);
        }

        if config.database.max_connections == 0 {
            return Err(ConfigError::InvalidMaxConnections(
                config.database.max_connections,
            ));
        }

        let valid_log_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_log_levels.contains(&config.logging.level.as_str()) {
            return Err(ConfigError::InvalidLogLevel(config.logging.level.clone()));
        }

        let valid_log_formats = ["json", "pretty"];
        if !valid_log_formats.contains(&config.logging.format.as_str()) {
            return Err(ConfigError::InvalidLogFormat(config.logging.format.clone()));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.cycle.max_concurrent_fixes, 3);
        assert_eq!(config.cycle.cooldown_secs, 300);
        assert_eq!(config.database.path, ".mender/mender.db");
        assert_eq!(config.logging.level, "info");
        ConfigLoader::validate(&config).expect("Default config should be valid");
    }

    #[test]
    fn test_yaml_parsing() {
        let yaml = r"
cycle:
  resources: [orders-api, billing-worker]
  max_concurrent_fixes: 2
  cooldown_secs: 600
  min_confidence: high
catalog:
  timeout_ceiling_secs: 300
database:
  path: /custom/path.db
logging:
  level: debug
  format: pretty
";

        let config: Config = serde_yaml::from_str(yaml).expect("YAML should parse");

        assert_eq!(config.cycle.resources, vec!["orders-api", "billing-worker"]);
        assert_eq!(config.cycle.max_concurrent_fixes, 2);
        assert_eq!(config.cycle.cooldown_secs, 600);
        assert_eq!(config.catalog.timeout_ceiling_secs, 300);
        assert_eq!(config.catalog.memory_ceiling_mb, 3008);
        assert_eq!(config.database.path, "/custom/path.db");
        assert_eq!(config.logging.format, "pretty");

        ConfigLoader::validate(&config).expect("Parsed config should be valid");
    }

    #[test]
    fn test_validate_concurrency_bounds() {
        let mut config = Config::default();
        config.cycle.max_concurrent_fixes = 0;
        assert!(matches!(
            ConfigLoader::validate(&config).unwrap_err(),
            ConfigError::InvalidMaxConcurrentFixes(0)
        ));

        config.cycle.max_concurrent_fixes = 51;
        assert!(matches!(
            ConfigLoader::validate(&config).unwrap_err(),
            ConfigError::InvalidMaxConcurrentFixes(51)
        ));
    }

    #[test]
    fn test_validate_gate_settings() {
        let mut config = Config::default();
        config.cycle.cooldown_secs = 0;
        assert!(matches!(
            ConfigLoader::validate(&config).unwrap_err(),
            ConfigError::InvalidCooldown(0)
        ));

        let mut config = Config::default();
        config.cycle.cooldown_secs = u64::MAX;
        assert!(matches!(
            ConfigLoader::validate(&config).unwrap_err(),
            ConfigError::InvalidCooldown(u64::MAX)
        ));

        let mut config = Config::default();
        config.cycle.cooldown_secs = MAX_COOLDOWN_SECS;
        ConfigLoader::validate(&config).expect("longest cooldown is valid");

        let mut config = Config::default();
        config.cycle.failure_threshold = 0;
        assert!(matches!(
            ConfigLoader::validate(&config).unwrap_err(),
            ConfigError::InvalidFailureThreshold(0)
        ));

        let mut config = Config::default();
        config.cycle.stale_reset_factor = 0;
        assert!(matches!(
            ConfigLoader::validate(&config).unwrap_err(),
            ConfigError::InvalidStaleResetFactor(0)
        ));

        let mut config = Config::default();
        config.cycle.min_priority = 10.5;
        assert!(matches!(
            ConfigLoader::validate(&config).unwrap_err(),
            ConfigError::InvalidMinPriority(_)
        ));
    }

    #[test]
    fn test_validate_invalid_log_level() {
        let mut config = Config::default();
        config.logging.level = "invalid".to_string();

        match ConfigLoader::validate(&config).unwrap_err() {
            ConfigError::InvalidLogLevel(level) => assert_eq!(level, "invalid"),
            other => panic!("Expected InvalidLogLevel error, got {other:?}"),
        }
    }

    #[test]
    fn test_validate_invalid_log_format() {
        let mut config = Config::default();
        config.logging.format = "xml".to_string();

        match ConfigLoader::validate(&config).unwrap_err() {
            ConfigError::InvalidLogFormat(format) => assert_eq!(format, "xml"),
            other => panic!("Expected InvalidLogFormat error, got {other:?}"),
        }
    }

    #[test]
    fn test_validate_database() {
        let mut config = Config::default();
        config.database.path = String::new();
        assert!(matches!(
            ConfigLoader::validate(&config).unwrap_err(),
            ConfigError::EmptyDatabasePath
        ));

        let mut config = Config::default();
        config.database.max_connections = 0;
        assert!(matches!(
            ConfigLoader::validate(&config).unwrap_err(),
            ConfigError::InvalidMaxConnections(0)
        ));
    }

    #[test]
    fn test_env_override() {
        let dir = tempfile::tempdir().unwrap();
        temp_env::with_vars(
            [
                ("MENDER_CYCLE__MAX_CONCURRENT_FIXES", Some("7")),
                ("MENDER_LOGGING__LEVEL", Some("debug")),
            ],
            || {
                let config = ConfigLoader::load_from(dir.path()).unwrap();
                assert_eq!(config.cycle.max_concurrent_fixes, 7);
                assert_eq!(config.logging.level, "debug");
            },
        );
    }

    #[test]
    fn test_project_files_layer() {
        let dir = tempfile::tempdir().unwrap();
        let mender_dir = dir.path().join(".mender");
        std::fs::create_dir_all(&mender_dir).unwrap();
        std::fs::write(
            mender_dir.join("config.yaml"),
            "cycle:\n  resources: [a, b]\n  cooldown_secs: 120\n",
        )
        .unwrap();
        std::fs::write(mender_dir.join("local.yaml"), "cycle:\n  cooldown_secs: 60\n").unwrap();

        let config = ConfigLoader::load_from(dir.path()).unwrap();
        assert_eq!(config.cycle.resources, vec!["a", "b"]);
        assert_eq!(config.cycle.cooldown_secs, 60);
    }

    #[test]
    fn test_hierarchical_merging() {
        let mut base_file = NamedTempFile::new().unwrap();
        writeln!(
            base_file,
            "cycle:\n  max_concurrent_fixes: 5\nlogging:\n  level: info\n  format: json"
        )
        .unwrap();
        base_file.flush().unwrap();

        let mut override_file = NamedTempFile::new().unwrap();
        writeln!(
            override_file,
            "cycle:\n  max_concurrent_fixes: 15\nlogging:\n  level: debug"
        )
        .unwrap();
        override_file.flush().unwrap();

        let config: Config = Figment::new()
            .merge(Serialized::defaults(Config::default()))
            .merge(Yaml::file(base_file.path()))
            .merge(Yaml::file(override_file.path()))
            .extract()
            .unwrap();

        assert_eq!(config.cycle.max_concurrent_fixes, 15, "Override should win");
        assert_eq!(
            config.logging.level, "debug",
            "Override should win for nested fields"
        );
        assert_eq!(
            config.logging.format, "json",
            "Base value should persist when not overridden"
        );
    }

    #[test]
    fn test_invalid_file_is_rejected() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "cycle:\n  max_concurrent_fixes: 0").unwrap();
        file.flush().unwrap();

        assert!(ConfigLoader::load_from_file(file.path()).is_err());
    }
}
