// crates/querygate-config/src/config.rs
// ============================================================================
// Module: QueryGate Configuration
// Description: Configuration loading and validation for the query gateway.
// Purpose: Provide strict, fail-closed config parsing with hard limits.
// Dependencies: querygate-core, serde, toml
// ============================================================================

//! ## Overview
//! Configuration is loaded from a TOML file with strict size and path limits.
//! Every section has defaults, so an empty file yields a working gateway with
//! buffered cursors, the classic table type mapping and no audit sink.
//! Unknown keys and out-of-range values are rejected rather than ignored.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::env;
use std::fs;
use std::path::Path;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use querygate_core::CursorMode;
use querygate_core::FileAuditSink;
use querygate_core::GatewayConfig;
use querygate_core::LifecycleAuditSink;
use querygate_core::NoopAuditSink;
use querygate_core::PoolConfig;
use querygate_core::RetentionConfig;
use querygate_core::StderrAuditSink;
use querygate_core::TableTypeMapping;
use querygate_core::runtime::pool::DEFAULT_POOL_QUEUE_CAPACITY;
use querygate_core::runtime::pool::DEFAULT_POOL_WORKERS;
use querygate_core::runtime::telemetry::DEFAULT_MAX_RETAINED_EXECUTIONS;
use querygate_core::runtime::telemetry::DEFAULT_MAX_RETAINED_SESSIONS;
use serde::Deserialize;
use serde::Serialize;
use thiserror::Error;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Default configuration filename when no path is specified.
const DEFAULT_CONFIG_NAME: &str = "querygate.toml";
/// Environment variable used to override the config path.
pub(crate) const CONFIG_ENV_VAR: &str = "QUERYGATE_CONFIG";
/// Maximum configuration file size in bytes.
pub(crate) const MAX_CONFIG_FILE_SIZE: usize = 1024 * 1024;
/// Maximum length of a single path component.
pub(crate) const MAX_PATH_COMPONENT_LENGTH: usize = 255;
/// Maximum total path length.
pub(crate) const MAX_TOTAL_PATH_LENGTH: usize = 4096;
/// Maximum background pool workers.
pub(crate) const MAX_POOL_WORKERS: usize = 4096;
/// Maximum background pool queue capacity.
pub(crate) const MAX_POOL_QUEUE_CAPACITY: usize = 65_536;
/// Maximum admission wait in milliseconds.
pub(crate) const MAX_SUBMIT_WAIT_MS: u64 = 60_000;
/// Default admission wait in milliseconds.
pub(crate) const DEFAULT_SUBMIT_WAIT_MS: u64 = 50;
/// Maximum retained telemetry records per registry.
pub(crate) const MAX_RETAINED_RECORDS: usize = 1_000_000;

// ============================================================================
// SECTION: Config Model
// ============================================================================

/// Top-level gateway configuration.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct QueryGateConfig {
    /// Statement execution and metadata behavior.
    #[serde(default)]
    pub gateway: GatewaySection,
    /// Background pool sizing.
    #[serde(default)]
    pub pool: PoolSection,
    /// Telemetry retention limits.
    #[serde(default)]
    pub telemetry: TelemetrySection,
    /// Lifecycle audit sink selection.
    #[serde(default)]
    pub audit: AuditSection,
}

impl QueryGateConfig {
    /// Loads configuration from disk using the default resolution rules.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] when loading or validation fails.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let resolved = resolve_path(path)?;
        validate_path(&resolved)?;
        let bytes = fs::read(&resolved).map_err(|err| ConfigError::Io(err.to_string()))?;
        if bytes.len() > MAX_CONFIG_FILE_SIZE {
            return Err(ConfigError::Invalid("config file exceeds size limit".to_string()));
        }
        let content = std::str::from_utf8(&bytes)
            .map_err(|_| ConfigError::Invalid("config file must be utf-8".to_string()))?;
        Self::from_toml(content)
    }

    /// Parses and validates configuration from TOML text.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] when parsing or validation fails.
    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        let config: Self =
            toml::from_str(content).map_err(|err| ConfigError::Parse(err.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Validates the configuration for internal consistency.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] when configuration is invalid.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.gateway.validate()?;
        self.pool.validate()?;
        self.telemetry.validate()?;
        self.audit.validate()?;
        Ok(())
    }

    /// Converts the configuration into the core gateway settings.
    #[must_use]
    pub fn gateway_config(&self) -> GatewayConfig {
        GatewayConfig {
            single_session: self.gateway.single_session,
            cursor_mode: self.gateway.cursor_mode(),
            table_type_mapping: self.gateway.table_type_mapping(),
            pool: self.pool.pool_config(),
            retention: self.telemetry.retention_config(),
        }
    }

    /// Builds the configured lifecycle audit sink.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] when the audit file cannot be opened.
    pub fn audit_sink(&self) -> Result<Arc<dyn LifecycleAuditSink>, ConfigError> {
        self.audit.build_sink()
    }
}

/// `[gateway]` section.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct GatewaySection {
    /// Share one engine context across all sessions.
    #[serde(default)]
    pub single_session: bool,
    /// Stream rows lazily instead of buffering full results.
    #[serde(default)]
    pub incremental_collect: bool,
    /// Table type naming: `classic` (any case) or anything else for hive.
    #[serde(default = "default_table_type_mapping")]
    pub table_type_mapping: String,
}

impl Default for GatewaySection {
    fn default() -> Self {
        Self {
            single_session: false,
            incremental_collect: false,
            table_type_mapping: default_table_type_mapping(),
        }
    }
}

impl GatewaySection {
    /// Validates gateway settings.
    fn validate(&self) -> Result<(), ConfigError> {
        if self.table_type_mapping.trim().is_empty() {
            return Err(ConfigError::Invalid(
                "gateway.table_type_mapping must be non-empty".to_string(),
            ));
        }
        Ok(())
    }

    /// Returns the cursor mode selected by `incremental_collect`.
    #[must_use]
    pub const fn cursor_mode(&self) -> CursorMode {
        if self.incremental_collect { CursorMode::Streaming } else { CursorMode::Buffered }
    }

    /// Returns the configured table type mapping.
    #[must_use]
    pub fn table_type_mapping(&self) -> TableTypeMapping {
        TableTypeMapping::from_name(self.table_type_mapping.trim())
    }
}

/// `[pool]` section.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PoolSection {
    /// Concurrently running background statements.
    #[serde(default = "default_pool_workers")]
    pub workers: usize,
    /// Admitted statements allowed to wait for a worker.
    #[serde(default = "default_pool_queue_capacity")]
    pub queue_capacity: usize,
    /// Admission wait before a submission is rejected.
    #[serde(default = "default_submit_wait_ms")]
    pub submit_wait_ms: u64,
}

impl Default for PoolSection {
    fn default() -> Self {
        Self {
            workers: default_pool_workers(),
            queue_capacity: default_pool_queue_capacity(),
            submit_wait_ms: default_submit_wait_ms(),
        }
    }
}

impl PoolSection {
    /// Validates pool sizing.
    fn validate(&self) -> Result<(), ConfigError> {
        if self.workers == 0 || self.workers > MAX_POOL_WORKERS {
            return Err(ConfigError::Invalid(format!(
                "pool.workers must be between 1 and {MAX_POOL_WORKERS}"
            )));
        }
        if self.queue_capacity > MAX_POOL_QUEUE_CAPACITY {
            return Err(ConfigError::Invalid(format!(
                "pool.queue_capacity must be at most {MAX_POOL_QUEUE_CAPACITY}"
            )));
        }
        if self.submit_wait_ms > MAX_SUBMIT_WAIT_MS {
            return Err(ConfigError::Invalid(format!(
                "pool.submit_wait_ms must be at most {MAX_SUBMIT_WAIT_MS}"
            )));
        }
        Ok(())
    }

    /// Converts to the core pool settings.
    #[must_use]
    pub const fn pool_config(&self) -> PoolConfig {
        PoolConfig {
            workers: self.workers,
            queue_capacity: self.queue_capacity,
            submit_wait: Duration::from_millis(self.submit_wait_ms),
        }
    }
}

/// `[telemetry]` section.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TelemetrySection {
    /// Session records kept before trimming.
    #[serde(default = "default_max_retained_sessions")]
    pub max_retained_sessions: usize,
    /// Execution records kept before trimming.
    #[serde(default = "default_max_retained_executions")]
    pub max_retained_executions: usize,
}

impl Default for TelemetrySection {
    fn default() -> Self {
        Self {
            max_retained_sessions: default_max_retained_sessions(),
            max_retained_executions: default_max_retained_executions(),
        }
    }
}

impl TelemetrySection {
    /// Validates retention limits.
    fn validate(&self) -> Result<(), ConfigError> {
        validate_retention("telemetry.max_retained_sessions", self.max_retained_sessions)?;
        validate_retention("telemetry.max_retained_executions", self.max_retained_executions)
    }

    /// Converts to the core retention settings.
    #[must_use]
    pub const fn retention_config(&self) -> RetentionConfig {
        RetentionConfig {
            max_retained_sessions: self.max_retained_sessions,
            max_retained_executions: self.max_retained_executions,
        }
    }
}

/// Lifecycle audit sink kinds.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AuditSinkKind {
    /// Events are discarded.
    #[default]
    None,
    /// JSON lines on stderr.
    Stderr,
    /// JSON lines appended to `audit.path`.
    File,
}

/// `[audit]` section.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AuditSection {
    /// Sink selection.
    #[serde(default)]
    pub sink: AuditSinkKind,
    /// Audit log path (JSON lines), required for the file sink.
    #[serde(default)]
    pub path: Option<String>,
}

impl AuditSection {
    /// Validates audit configuration.
    fn validate(&self) -> Result<(), ConfigError> {
        if let Some(path) = &self.path {
            validate_path_string("audit.path", path)?;
        }
        if self.sink == AuditSinkKind::File && self.path.is_none() {
            return Err(ConfigError::Invalid("audit.path is required for the file sink".to_string()));
        }
        Ok(())
    }

    /// Opens the configured sink.
    fn build_sink(&self) -> Result<Arc<dyn LifecycleAuditSink>, ConfigError> {
        match (self.sink, self.path.as_deref()) {
            (AuditSinkKind::None, _) => Ok(Arc::new(NoopAuditSink)),
            (AuditSinkKind::Stderr, _) => Ok(Arc::new(StderrAuditSink)),
            (AuditSinkKind::File, Some(path)) => {
                let sink = FileAuditSink::new(Path::new(path.trim()))
                    .map_err(|err| ConfigError::Io(err.to_string()))?;
                Ok(Arc::new(sink))
            }
            (AuditSinkKind::File, None) => {
                Err(ConfigError::Invalid("audit.path is required for the file sink".to_string()))
            }
        }
    }
}

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Configuration loading or validation errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// I/O failure while reading configuration.
    #[error("config io error: {0}")]
    Io(String),
    /// TOML parsing error.
    #[error("config parse error: {0}")]
    Parse(String),
    /// Invalid configuration data.
    #[error("invalid config: {0}")]
    Invalid(String),
}

// ============================================================================
// SECTION: Helpers
// ============================================================================

/// Resolves the config path from the caller or environment defaults.
fn resolve_path(path: Option<&Path>) -> Result<PathBuf, ConfigError> {
    if let Some(path) = path {
        return Ok(path.to_path_buf());
    }
    if let Ok(env_path) = env::var(CONFIG_ENV_VAR) {
        if env_path.len() > MAX_TOTAL_PATH_LENGTH {
            return Err(ConfigError::Invalid("config path exceeds max length".to_string()));
        }
        return Ok(PathBuf::from(env_path));
    }
    Ok(PathBuf::from(DEFAULT_CONFIG_NAME))
}

/// Validates the resolved path against length limits.
fn validate_path(path: &Path) -> Result<(), ConfigError> {
    let text = path.to_string_lossy();
    if text.len() > MAX_TOTAL_PATH_LENGTH {
        return Err(ConfigError::Invalid("config path exceeds max length".to_string()));
    }
    for component in path.components() {
        let value = component.as_os_str().to_string_lossy();
        if value.len() > MAX_PATH_COMPONENT_LENGTH {
            return Err(ConfigError::Invalid("config path component too long".to_string()));
        }
    }
    Ok(())
}

/// Validates a path string against length constraints.
fn validate_path_string(field: &str, value: &str) -> Result<(), ConfigError> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(ConfigError::Invalid(format!("{field} must be non-empty")));
    }
    if trimmed.len() > MAX_TOTAL_PATH_LENGTH {
        return Err(ConfigError::Invalid(format!("{field} exceeds max length")));
    }
    for component in Path::new(trimmed).components() {
        let component_value = component.as_os_str().to_string_lossy();
        if component_value.len() > MAX_PATH_COMPONENT_LENGTH {
            return Err(ConfigError::Invalid(format!("{field} path component too long")));
        }
    }
    Ok(())
}

/// Validates a retention limit.
fn validate_retention(field: &str, value: usize) -> Result<(), ConfigError> {
    if value == 0 || value > MAX_RETAINED_RECORDS {
        return Err(ConfigError::Invalid(format!(
            "{field} must be between 1 and {MAX_RETAINED_RECORDS}"
        )));
    }
    Ok(())
}

// ============================================================================
// SECTION: Defaults
// ============================================================================

/// Default table type mapping name.
pub(crate) fn default_table_type_mapping() -> String {
    TableTypeMapping::Classic.as_str().to_string()
}

/// Default background pool workers.
pub(crate) const fn default_pool_workers() -> usize {
    DEFAULT_POOL_WORKERS
}

/// Default background pool queue capacity.
pub(crate) const fn default_pool_queue_capacity() -> usize {
    DEFAULT_POOL_QUEUE_CAPACITY
}

/// Default admission wait in milliseconds.
pub(crate) const fn default_submit_wait_ms() -> u64 {
    DEFAULT_SUBMIT_WAIT_MS
}

/// Default retained session records.
pub(crate) const fn default_max_retained_sessions() -> usize {
    DEFAULT_MAX_RETAINED_SESSIONS
}

/// Default retained execution records.
pub(crate) const fn default_max_retained_executions() -> usize {
    DEFAULT_MAX_RETAINED_EXECUTIONS
}

// ============================================================================
// SECTION: Tests
// ============================================================================
