//! Engine configuration.
//!
//! All knobs are environment-driven with conservative defaults so the engine
//! can be embedded without any setup. Limits are validated at load time;
//! invalid values fail fast with a [`ConfigError`] rather than being clamped
//! silently.

use std::path::PathBuf;
use std::time::Duration;

use crate::error::ConfigError;

/// Default bound on retained version snapshots per draft.
pub const DEFAULT_HISTORY_LIMIT: usize = 10;
/// Default bound on retained tracked-change entries per draft.
pub const DEFAULT_CHANGELOG_LIMIT: usize = 20;
/// Default autosave cadence.
pub const DEFAULT_AUTOSAVE_INTERVAL: Duration = Duration::from_secs(300);

/// Which durable backend `connect_from_config` should produce.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreBackend {
    #[cfg(feature = "libsql")]
    LibSql,
    Memory,
}

impl StoreBackend {
    fn from_str(value: &str) -> Result<Self, ConfigError> {
        match value.to_ascii_lowercase().as_str() {
            #[cfg(feature = "libsql")]
            "libsql" => Ok(Self::LibSql),
            "memory" => Ok(Self::Memory),
            other => Err(ConfigError::InvalidValue {
                key: "DRAFT_STORE_BACKEND".to_string(),
                message: format!("unsupported backend '{other}'"),
            }),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            #[cfg(feature = "libsql")]
            Self::LibSql => "libsql",
            Self::Memory => "memory",
        }
    }
}

/// Draft engine configuration.
#[derive(Debug, Clone)]
pub struct DraftConfig {
    /// Bound on retained version snapshots (oldest evicted first).
    pub history_limit: usize,
    /// Bound on retained tracked-change entries (oldest evicted first).
    pub changelog_limit: usize,
    /// How often the session driver checks for unsaved edits.
    pub autosave_interval: Duration,
    /// Durable backend selection.
    pub backend: StoreBackend,
    /// Database file for the libSQL backend.
    pub libsql_path: PathBuf,
}

impl Default for DraftConfig {
    fn default() -> Self {
        Self {
            history_limit: DEFAULT_HISTORY_LIMIT,
            changelog_limit: DEFAULT_CHANGELOG_LIMIT,
            autosave_interval: DEFAULT_AUTOSAVE_INTERVAL,
            #[cfg(feature = "libsql")]
            backend: StoreBackend::LibSql,
            #[cfg(not(feature = "libsql"))]
            backend: StoreBackend::Memory,
            libsql_path: default_libsql_path(),
        }
    }
}

impl DraftConfig {
    /// Load configuration from the process environment, falling back to
    /// defaults for unset keys.
    pub fn from_env() -> Result<Self, ConfigError> {
        let defaults = Self::default();

        let history_limit = match optional_env("DRAFT_HISTORY_LIMIT") {
            Some(raw) => parse_limit("DRAFT_HISTORY_LIMIT", &raw)?,
            None => defaults.history_limit,
        };
        let changelog_limit = match optional_env("DRAFT_CHANGELOG_LIMIT") {
            Some(raw) => parse_limit("DRAFT_CHANGELOG_LIMIT", &raw)?,
            None => defaults.changelog_limit,
        };
        let autosave_interval = match optional_env("DRAFT_AUTOSAVE_INTERVAL_SECS") {
            Some(raw) => parse_interval_secs("DRAFT_AUTOSAVE_INTERVAL_SECS", &raw)?,
            None => defaults.autosave_interval,
        };
        let backend = match optional_env("DRAFT_STORE_BACKEND") {
            Some(raw) => StoreBackend::from_str(&raw)?,
            None => defaults.backend,
        };
        let libsql_path = optional_env("DRAFT_LIBSQL_PATH")
            .map(PathBuf::from)
            .unwrap_or(defaults.libsql_path);

        Ok(Self {
            history_limit,
            changelog_limit,
            autosave_interval,
            backend,
            libsql_path,
        })
    }
}

/// Default on-disk location for the embedded draft database.
pub fn default_libsql_path() -> PathBuf {
    dirs::data_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("casedraft")
        .join("drafts.db")
}

fn optional_env(key: &str) -> Option<String> {
    std::env::var(key)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn parse_limit(key: &str, raw: &str) -> Result<usize, ConfigError> {
    let value: usize = raw.parse().map_err(|_| ConfigError::InvalidValue {
        key: key.to_string(),
        message: format!("expected a positive integer, got '{raw}'"),
    })?;
    if value == 0 {
        return Err(ConfigError::InvalidValue {
            key: key.to_string(),
            message: "limit must be at least 1".to_string(),
        });
    }
    Ok(value)
}

fn parse_interval_secs(key: &str, raw: &str) -> Result<Duration, ConfigError> {
    let secs: u64 = raw.parse().map_err(|_| ConfigError::InvalidValue {
        key: key.to_string(),
        message: format!("expected a positive integer, got '{raw}'"),
    })?;
    if secs == 0 {
        return Err(ConfigError::InvalidValue {
            key: key.to_string(),
            message: "interval must be at least 1 second".to_string(),
        });
    }
    Ok(Duration::from_secs(secs))
}
