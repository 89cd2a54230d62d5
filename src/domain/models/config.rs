use serde::{Deserialize, Serialize};
use std::time::Duration;

use super::classification::Confidence;
use super::cooldown::GatePolicy;
use super::resource::ResourceId;

/// Longest accepted cooldown (30 days)
pub const MAX_COOLDOWN_SECS: u64 = 30 * 24 * 60 * 60;

/// Main configuration structure for Mender
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct Config {
    /// Monitoring cycle configuration
    #[serde(default)]
    pub cycle: CycleConfig,

    /// Remediation catalog parameters
    #[serde(default)]
    pub catalog: CatalogConfig,

    /// Cooldown persistence configuration
    #[serde(default)]
    pub database: DatabaseConfig,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Parameters of one monitoring cycle
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct CycleConfig {
    /// Resources to monitor, in report order
    #[serde(default)]
    pub resources: Vec<String>,

    /// Apply remediations (false = analyse and report only)
    #[serde(default = "default_true")]
    pub auto_fix_enabled: bool,

    /// Point the alias back at the prior revision when verification fails
    #[serde(default = "default_true")]
    pub rollback_enabled: bool,

    /// Attempts per batch
    #[serde(default = "default_max_concurrent_fixes")]
    pub max_concurrent_fixes: usize,

    /// Minimum seconds between attempts on one resource
    #[serde(default = "default_cooldown_secs")]
    pub cooldown_secs: u64,

    /// Error count at or above which diagnostics are analysed
    #[serde(default = "default_error_threshold")]
    pub error_threshold: u64,

    /// Trailing signal window in seconds
    #[serde(default = "default_error_window_secs")]
    pub error_window_secs: u64,

    /// Filter pattern passed to the diagnostics query
    #[serde(default = "default_diagnostics_filter")]
    pub diagnostics_filter: String,

    /// Maximum diagnostic lines fetched per resource
    #[serde(default = "default_diagnostics_limit")]
    pub diagnostics_limit: usize,

    /// Alias carrying live traffic
    #[serde(default = "default_alias")]
    pub alias: String,

    /// Minimum classification confidence for auto-fix
    #[serde(default = "default_min_confidence")]
    pub min_confidence: Confidence,

    /// Minimum scaled priority for auto-fix (0-10)
    #[serde(default = "default_min_priority")]
    pub min_priority: f64,

    /// Consecutive failures that open the circuit
    #[serde(default = "default_failure_threshold")]
    pub failure_threshold: u32,

    /// Cooldown multiples after which an entry is discarded
    #[serde(default = "default_stale_reset_factor")]
    pub stale_reset_factor: u32,

    /// Wait before verification, in milliseconds
    #[serde(default = "default_settle_delay_ms")]
    pub settle_delay_ms: u64,

    /// Pause between batches, in milliseconds
    #[serde(default = "default_batch_delay_ms")]
    pub batch_delay_ms: u64,

    /// Wall-clock budget after which no new batch starts, in seconds
    #[serde(default = "default_cycle_deadline_secs")]
    pub cycle_deadline_secs: u64,

    /// Concurrent signal queries while monitoring
    #[serde(default = "default_monitor_concurrency")]
    pub monitor_concurrency: usize,
}

const fn default_true() -> bool {
    true
}

const fn default_max_concurrent_fixes() -> usize {
    3
}

const fn default_cooldown_secs() -> u64 {
    300
}

const fn default_error_threshold() -> u64 {
    5
}

const fn default_error_window_secs() -> u64 {
    3600
}

fn default_diagnostics_filter() -> String {
    "ERROR".to_string()
}

const fn default_diagnostics_limit() -> usize {
    50
}

fn default_alias() -> String {
    "live".to_string()
}

const fn default_min_confidence() -> Confidence {
    Confidence::Medium
}

const fn default_min_priority() -> f64 {
    5.0
}

const fn default_failure_threshold() -> u32 {
    3
}

const fn default_stale_reset_factor() -> u32 {
    2
}

const fn default_settle_delay_ms() -> u64 {
    5_000
}

const fn default_batch_delay_ms() -> u64 {
    2_000
}

const fn default_cycle_deadline_secs() -> u64 {
    600
}

const fn default_monitor_concurrency() -> usize {
    10
}

impl Default for CycleConfig {
    fn default() -> Self {
        Self {
            resources: vec![],
            auto_fix_enabled: default_true(),
            rollback_enabled: default_true(),
            max_concurrent_fixes: default_max_concurrent_fixes(),
            cooldown_secs: default_cooldown_secs(),
            error_threshold: default_error_threshold(),
            error_window_secs: default_error_window_secs(),
            diagnostics_filter: default_diagnostics_filter(),
            diagnostics_limit: default_diagnostics_limit(),
            alias: default_alias(),
            min_confidence: default_min_confidence(),
            min_priority: default_min_priority(),
            failure_threshold: default_failure_threshold(),
            stale_reset_factor: default_stale_reset_factor(),
            settle_delay_ms: default_settle_delay_ms(),
            batch_delay_ms: default_batch_delay_ms(),
            cycle_deadline_secs: default_cycle_deadline_secs(),
            monitor_concurrency: default_monitor_concurrency(),
        }
    }
}

impl CycleConfig {
    pub fn resource_ids(&self) -> Vec<ResourceId> {
        self.resources
            .iter()
            .map(|r| ResourceId::from(r.as_str()))
            .collect()
    }

    pub fn error_window(&self) -> Duration {
        Duration::from_secs(self.error_window_secs)
    }

    pub fn settle_delay(&self) -> Duration {
        Duration::from_millis(self.settle_delay_ms)
    }

    pub fn batch_delay(&self) -> Duration {
        Duration::from_millis(self.batch_delay_ms)
    }

    pub fn cycle_deadline(&self) -> Duration {
        Duration::from_secs(self.cycle_deadline_secs)
    }

    pub fn gate_policy(&self) -> GatePolicy {
        GatePolicy {
            cooldown: chrono::Duration::seconds(
                i64::try_from(self.cooldown_secs.min(MAX_COOLDOWN_SECS)).unwrap_or(0),
            ),
            failure_threshold: self.failure_threshold,
            stale_reset_factor: self.stale_reset_factor,
        }
    }
}

/// Remediation catalog parameters
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct CatalogConfig {
    /// Timeout the timeout remediation raises to, in seconds
    #[serde(default = "default_timeout_ceiling_secs")]
    pub timeout_ceiling_secs: u32,

    /// Upper bound for the memory remediation, in megabytes
    #[serde(default = "default_memory_ceiling_mb")]
    pub memory_ceiling_mb: u32,

    /// Factor the memory remediation multiplies by
    #[serde(default = "default_memory_multiplier")]
    pub memory_multiplier: u32,
}

const fn default_timeout_ceiling_secs() -> u32 {
    900
}

const fn default_memory_ceiling_mb() -> u32 {
    3008
}

const fn default_memory_multiplier() -> u32 {
    2
}

impl Default for CatalogConfig {
    fn default() -> Self {
        Self {
            timeout_ceiling_secs: default_timeout_ceiling_secs(),
            memory_ceiling_mb: default_memory_ceiling_mb(),
            memory_multiplier: default_memory_multiplier(),
        }
    }
}

/// Database configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct DatabaseConfig {
    /// Path to `SQLite` database file holding cooldown entries
    #[serde(default = "default_database_path")]
    pub path: String,

    /// Maximum number of database connections in pool
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
}

fn default_database_path() -> String {
    ".mender/mender.db".to_string()
}

const fn default_max_connections() -> u32 {
    5
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: default_database_path(),
            max_connections: default_max_connections(),
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct LoggingConfig {
    /// Log level: trace, debug, info, warn, error
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Log format: json or pretty
    #[serde(default = "default_log_format")]
    pub format: String,

    /// Directory for rolling log files (stdout only when unset)
    #[serde(default)]
    pub log_dir: Option<String>,

    /// JSON-lines file receiving every attempt record
    #[serde(default)]
    pub journal_path: Option<String>,
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_format() -> String {
    "json".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
            log_dir: None,
            journal_path: None,
        }
    }
}
