#![forbid(unsafe_code)]

//! Engine configuration.
//!
//! # Loading
//!
//! ```toml
//! # vizbind.toml
//! [updater]
//! mode = "background"
//! thread_name = "vizbind-updater"
//! coalesce_window_ms = 5
//! ```
//!
//! ```rust,ignore
//! let config = EngineConfig::from_toml_file("vizbind.toml")?;
//! let config = EngineConfig::from_json_str(json)?;
//! ```
//!
//! # Defaults
//!
//! `EngineConfig::default()` runs a background updater with no coalescing
//! window, so a pass starts as soon as the worker is woken.

#[cfg(feature = "config")]
use std::path::Path;
use std::time::Duration;

#[cfg(feature = "config")]
use serde::{Deserialize, Serialize};

/// Longest accepted coalescing window.
pub const MAX_COALESCE_WINDOW_MS: u64 = 10_000;

/// How rebuild passes are scheduled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "config", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "config", serde(rename_all = "snake_case"))]
pub enum UpdateMode {
    /// A dedicated worker thread runs passes when woken.
    #[default]
    Background,
    /// No thread; the owner runs pending passes with `DisplayAdapter::flush`.
    Manual,
}

/// Updater settings.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "config", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "config", serde(default))]
pub struct UpdaterConfig {
    pub mode: UpdateMode,

    /// Name of the worker thread.
    pub thread_name: String,

    /// Time the worker waits after a wake before snapshotting the tables,
    /// so bursts of mutations land in one pass.
    pub coalesce_window_ms: u64,

    /// Upper bound on how long a background `flush` waits for the worker.
    pub flush_timeout_ms: u64,
}

impl Default for UpdaterConfig {
    fn default() -> Self {
        Self {
            mode: UpdateMode::Background,
            thread_name: "vizbind-updater".into(),
            coalesce_window_ms: 0,
            flush_timeout_ms: 5_000,
        }
    }
}

impl UpdaterConfig {
    #[must_use]
    pub fn manual() -> Self {
        Self {
            mode: UpdateMode::Manual,
            ..Self::default()
        }
    }

    #[must_use]
    pub fn coalesce_window(&self) -> Duration {
        Duration::from_millis(self.coalesce_window_ms)
    }

    #[must_use]
    pub fn flush_timeout(&self) -> Duration {
        Duration::from_millis(self.flush_timeout_ms)
    }
}

/// Top-level configuration for a display adapter.
#[derive(Debug, Clone, Default, PartialEq)]
#[cfg_attr(feature = "config", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "config", serde(default))]
pub struct EngineConfig {
    pub updater: UpdaterConfig,
}

impl EngineConfig {
    /// Configuration for deterministic, thread-free operation.
    #[must_use]
    pub fn manual() -> Self {
        Self {
            updater: UpdaterConfig::manual(),
        }
    }

    /// Load from a TOML string.
    #[cfg(feature = "config")]
    pub fn from_toml_str(s: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(s).map_err(ConfigError::Toml)?;
        config.validate()?;
        Ok(config)
    }

    /// Load from a TOML file on disk.
    #[cfg(feature = "config")]
    pub fn from_toml_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path.as_ref()).map_err(ConfigError::Io)?;
        Self::from_toml_str(&content)
    }

    /// Load from a JSON string.
    #[cfg(feature = "config")]
    pub fn from_json_str(s: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(s).map_err(ConfigError::Json)?;
        config.validate()?;
        Ok(config)
    }

    /// Serialize to TOML.
    #[cfg(feature = "config")]
    pub fn to_toml_string(&self) -> Result<String, ConfigError> {
        toml::to_string_pretty(self).map_err(|e| ConfigError::Validation(vec![e.to_string()]))
    }

    /// Check every field; all problems are reported together.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let mut errors = Vec::new();
        if self.updater.thread_name.trim().is_empty() {
            errors.push("updater.thread_name must not be empty".to_string());
        }
        if self.updater.coalesce_window_ms > MAX_COALESCE_WINDOW_MS {
            errors.push(format!(
                "updater.coalesce_window_ms must be <= {MAX_COALESCE_WINDOW_MS}, got {}",
                self.updater.coalesce_window_ms
            ));
        }
        if self.updater.flush_timeout_ms == 0 {
            errors.push("updater.flush_timeout_ms must be > 0".to_string());
        }
        if errors.is_empty() {
            Ok(())
        } else {
            Err(ConfigError::Validation(errors))
        }
    }
}

// ---------------------------------------------------------------------------
// Error type
// ---------------------------------------------------------------------------

/// Errors that can occur when loading a configuration.
#[derive(Debug)]
pub enum ConfigError {
    /// I/O error reading a file.
    Io(std::io::Error),
    /// TOML parse error.
    #[cfg(feature = "config")]
    Toml(toml::de::Error),
    /// JSON parse error.
    #[cfg(feature = "config")]
    Json(serde_json::Error),
    /// Validation errors.
    Validation(Vec<String>),
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Io(e) => write!(f, "I/O error: {e}"),
            #[cfg(feature = "config")]
            Self::Toml(e) => write!(f, "TOML parse error: {e}"),
            #[cfg(feature = "config")]
            Self::Json(e) => write!(f, "JSON parse error: {e}"),
            Self::Validation(errors) => {
                write!(f, "validation errors: {}", errors.join("; "))
            }
        }
    }
}

impl std::error::Error for ConfigError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Io(e) => Some(e),
            #[cfg(feature = "config")]
            Self::Toml(e) => Some(e),
            #[cfg(feature = "config")]
            Self::Json(e) => Some(e),
            Self::Validation(_) => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_validate() {
        assert!(EngineConfig::default().validate().is_ok());
        assert!(EngineConfig::manual().validate().is_ok());
    }

    #[test]
    fn default_mode_is_background() {
        let config = EngineConfig::default();
        assert_eq!(config.updater.mode, UpdateMode::Background);
        assert_eq!(config.updater.coalesce_window(), Duration::ZERO);
    }

    #[test]
    fn validation_collects_all_errors() {
        let config = EngineConfig {
            updater: UpdaterConfig {
                thread_name: "  ".into(),
                coalesce_window_ms: MAX_COALESCE_WINDOW_MS + 1,
                flush_timeout_ms: 0,
                ..UpdaterConfig::default()
            },
        };
        match config.validate() {
            Err(ConfigError::Validation(errors)) => assert_eq!(errors.len(), 3),
            other => panic!("expected validation errors, got {other:?}"),
        }
    }

    #[cfg(feature = "config")]
    #[test]
    fn toml_partial_uses_defaults() {
        let config = EngineConfig::from_toml_str(
            r#"
            [updater]
            mode = "manual"
            coalesce_window_ms = 20
            "#,
        )
        .unwrap();
        assert_eq!(config.updater.mode, UpdateMode::Manual);
        assert_eq!(config.updater.coalesce_window_ms, 20);
        assert_eq!(config.updater.thread_name, "vizbind-updater");
    }

    #[cfg(feature = "config")]
    #[test]
    fn json_roundtrip_through_file() {
        use std::io::Write;

        let config = EngineConfig::from_json_str(r#"{"updater":{"coalesce_window_ms":3}}"#).unwrap();
        assert_eq!(config.updater.coalesce_window_ms, 3);

        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(config.to_toml_string().unwrap().as_bytes())
            .unwrap();
        let loaded = EngineConfig::from_toml_file(file.path()).unwrap();
        assert_eq!(loaded, config);
    }

    #[cfg(feature = "config")]
    #[test]
    fn invalid_toml_is_reported() {
        let err = EngineConfig::from_toml_str("[updater\nmode=").unwrap_err();
        assert!(err.to_string().starts_with("TOML parse error"));
    }
}
