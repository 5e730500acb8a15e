use std::fs;
use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::export::{ExportConfig, Pacing, RetryPolicy};
use crate::{AppError, Result};

const SETTINGS_FILE: &str = "settings.toml";

#[derive(Debug, Default, Serialize, Deserialize)]
pub struct Settings {
    #[serde(default)]
    pub export: ExportSettings,
}

/// Tunables for the export run, read from the `[export]` table of
/// settings.toml. Every key is optional.
#[derive(Debug, Serialize, Deserialize)]
pub struct ExportSettings {
    #[serde(default = "default_output_dir", rename = "output-dir")]
    pub output_dir: String,
    #[serde(default = "default_page_limit", rename = "page-limit")]
    pub page_limit: u32,
    #[serde(default = "default_page_delay_ms", rename = "page-delay-ms")]
    pub page_delay_ms: u64,
    #[serde(default = "default_thread_delay_ms", rename = "thread-delay-ms")]
    pub thread_delay_ms: u64,
    #[serde(default = "default_max_attempts", rename = "max-attempts")]
    pub max_attempts: u32,
}

impl Default for ExportSettings {
    fn default() -> Self {
        Self {
            output_dir: default_output_dir(),
            page_limit: default_page_limit(),
            page_delay_ms: default_page_delay_ms(),
            thread_delay_ms: default_thread_delay_ms(),
            max_attempts: default_max_attempts(),
        }
    }
}

fn default_output_dir() -> String {
    "slack_export".to_string()
}

fn default_page_limit() -> u32 {
    200
}

fn default_page_delay_ms() -> u64 {
    500
}

fn default_thread_delay_ms() -> u64 {
    300
}

fn default_max_attempts() -> u32 {
    5
}

impl Settings {
    pub fn load() -> Result<Self> {
        Self::load_from(Path::new(SETTINGS_FILE))
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let content = fs::read_to_string(path).map_err(|e| AppError::ReadFile {
            path: path.display().to_string(),
            source: e,
        })?;

        toml::from_str(&content).map_err(|e| AppError::TomlParse(e.to_string()))
    }
}

impl ExportSettings {
    pub fn export_config(&self) -> ExportConfig {
        ExportConfig {
            page_limit: self.page_limit,
            pacing: Pacing {
                page_delay: Duration::from_millis(self.page_delay_ms),
                thread_delay: Duration::from_millis(self.thread_delay_ms),
            },
            retry: RetryPolicy {
                max_attempts: self.max_attempts,
                ..RetryPolicy::default()
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_settings_file_constant() {
        assert_eq!(SETTINGS_FILE, "settings.toml");
    }

    #[test]
    fn test_settings_default() {
        let settings = Settings::default();

        assert_eq!(settings.export.output_dir, "slack_export");
        assert_eq!(settings.export.page_limit, 200);
        assert_eq!(settings.export.page_delay_ms, 500);
        assert_eq!(settings.export.thread_delay_ms, 300);
        assert_eq!(settings.export.max_attempts, 5);
    }

    #[test]
    fn test_settings_partial_toml() {
        let settings: Settings = toml::from_str(
            r#"
            [export]
            page-delay-ms = 50
            "#,
        )
        .unwrap();

        assert_eq!(settings.export.page_delay_ms, 50);
        assert_eq!(settings.export.page_limit, 200);
        assert_eq!(settings.export.output_dir, "slack_export");
    }

    #[test]
    fn test_settings_empty_toml() {
        let settings: Settings = toml::from_str("").unwrap();
        assert_eq!(settings.export.max_attempts, 5);
    }

    #[test]
    fn test_settings_full_toml() {
        let settings: Settings = toml::from_str(
            r#"
            [export]
            output-dir = "archive"
            page-limit = 100
            page-delay-ms = 1000
            thread-delay-ms = 0
            max-attempts = 3
            "#,
        )
        .unwrap();

        assert_eq!(settings.export.output_dir, "archive");
        assert_eq!(settings.export.page_limit, 100);
        assert_eq!(settings.export.page_delay_ms, 1000);
        assert_eq!(settings.export.thread_delay_ms, 0);
        assert_eq!(settings.export.max_attempts, 3);
    }

    #[test]
    fn test_export_config_mapping() {
        let settings = ExportSettings {
            page_delay_ms: 100,
            max_attempts: 2,
            ..ExportSettings::default()
        };

        let config = settings.export_config();

        assert_eq!(config.page_limit, 200);
        assert_eq!(config.pacing.page_delay, Duration::from_millis(100));
        assert_eq!(config.pacing.thread_delay, Duration::from_millis(300));
        assert_eq!(config.retry.max_attempts, 2);
        assert_eq!(config.retry.max_backoff, Duration::from_secs(20));
    }

    #[test]
    fn test_load_from_missing_file_uses_defaults() {
        let settings = Settings::load_from(Path::new("no-such-settings.toml")).unwrap();
        assert_eq!(settings.export.page_limit, 200);
    }

    #[test]
    fn test_load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.toml");
        fs::write(&path, "[export]\noutput-dir = \"dumps\"\n").unwrap();

        let settings = Settings::load_from(&path).unwrap();
        assert_eq!(settings.export.output_dir, "dumps");
    }

    #[test]
    fn test_load_from_invalid_toml() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.toml");
        fs::write(&path, "not valid [ toml").unwrap();

        let err = Settings::load_from(&path).unwrap_err();
        assert!(matches!(err, AppError::TomlParse(_)));
    }
}
