//! Layered run settings
//!
//! Precedence, lowest first: built-in defaults, the JSON settings file,
//! `FOLLOWING_SCRAPER_*` environment variables, command-line overrides.
//! Keys are accepted in camelCase (`maxItems`) or snake_case (`max_items`).

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use config::{Config, ConfigError, Environment, File, FileFormat};
use serde::Deserialize;
use tracing::{debug, info, warn};

use crate::extractors::DEFAULT_BASE_URL;

pub const DEFAULT_SETTINGS_PATH: &str = "config/settings.json";
pub const ENV_PREFIX: &str = "FOLLOWING_SCRAPER";

/// Effective configuration for one run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Settings {
    pub input_file: PathBuf,
    pub output_file: PathBuf,
    /// Explicit export format; inferred from `output_file` when absent
    pub output_format: Option<String>,
    /// Global item cap; `None` means unlimited
    pub max_items: Option<usize>,
    pub log_level: String,
    /// When set, each input target is exported to its own file here
    pub output_dir: Option<PathBuf>,
    pub base_url: String,
    pub timeout_secs: u64,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            input_file: PathBuf::from("data/inputs.sample.txt"),
            output_file: PathBuf::from("data/output.json"),
            output_format: None,
            max_items: None,
            log_level: "info".to_string(),
            output_dir: None,
            base_url: DEFAULT_BASE_URL.to_string(),
            timeout_secs: 30,
        }
    }
}

/// Values set explicitly on the command line
#[derive(Debug, Clone, Default)]
pub struct SettingsOverrides {
    pub input_file: Option<PathBuf>,
    pub output_file: Option<PathBuf>,
    pub output_format: Option<String>,
    pub max_items: Option<usize>,
    pub log_level: Option<String>,
    pub output_dir: Option<PathBuf>,
    pub base_url: Option<String>,
}

/// Partial settings as read from file and environment
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SettingsLayer {
    #[serde(default, alias = "input_file", alias = "inputfile")]
    input_file: Option<PathBuf>,
    #[serde(default, alias = "output_file", alias = "outputfile")]
    output_file: Option<PathBuf>,
    #[serde(default, alias = "output_format", alias = "outputformat")]
    output_format: Option<String>,
    #[serde(default, alias = "max_items", alias = "maxitems")]
    max_items: Option<usize>,
    #[serde(default, alias = "log_level", alias = "loglevel")]
    log_level: Option<String>,
    #[serde(default, alias = "output_dir", alias = "outputdir")]
    output_dir: Option<PathBuf>,
    #[serde(default, alias = "base_url", alias = "baseurl")]
    base_url: Option<String>,
    #[serde(default, alias = "timeout_secs", alias = "timeoutsecs")]
    timeout_secs: Option<u64>,
}

impl Settings {
    /// Defaults overlaid with the settings file and environment
    ///
    /// A missing file is not an error. A file that cannot be read or parsed
    /// is logged and skipped; environment values still apply.
    pub fn load(settings_path: Option<&Path>) -> Self {
        Self::load_from(settings_path, None)
    }

    /// Same as [`Settings::load`], reading `FOLLOWING_SCRAPER_*` values from
    /// `env` instead of the process environment when given
    pub fn load_from(settings_path: Option<&Path>, env: Option<HashMap<String, String>>) -> Self {
        let path = settings_path.unwrap_or_else(|| Path::new(DEFAULT_SETTINGS_PATH));
        let mut settings = Settings::default();

        if path.is_file() {
            match read_file_layer(path) {
                Ok(layer) => settings.merge(layer),
                Err(err) => {
                    warn!(path = %path.display(), error = %err, "failed to load settings file, ignoring it");
                }
            }
        } else {
            info!(path = %path.display(), "settings file not found, using defaults");
        }

        match read_env_layer(env) {
            Ok(layer) => settings.merge(layer),
            Err(err) => warn!(prefix = ENV_PREFIX, error = %err, "ignoring invalid environment settings"),
        }

        debug!(?settings, "loaded settings");
        settings
    }

    /// Apply command-line values on top of everything else
    pub fn with_overrides(mut self, overrides: SettingsOverrides) -> Self {
        if let Some(v) = overrides.input_file {
            self.input_file = v;
        }
        if let Some(v) = overrides.output_file {
            self.output_file = v;
        }
        if let Some(v) = overrides.output_format {
            self.output_format = Some(v);
        }
        if let Some(v) = overrides.max_items {
            self.max_items = Some(v);
        }
        if let Some(v) = overrides.log_level {
            self.log_level = v;
        }
        if let Some(v) = overrides.output_dir {
            self.output_dir = Some(v);
        }
        if let Some(v) = overrides.base_url {
            self.base_url = v;
        }
        self
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    fn merge(&mut self, layer: SettingsLayer) {
        if let Some(v) = layer.input_file {
            self.input_file = v;
        }
        if let Some(v) = layer.output_file {
            self.output_file = v;
        }
        if let Some(v) = layer.output_format {
            self.output_format = Some(v);
        }
        if let Some(v) = layer.max_items {
            self.max_items = Some(v);
        }
        if let Some(v) = layer.log_level {
            self.log_level = v;
        }
        if let Some(v) = layer.output_dir {
            self.output_dir = Some(v);
        }
        if let Some(v) = layer.base_url {
            self.base_url = v;
        }
        if let Some(v) = layer.timeout_secs {
            self.timeout_secs = v;
        }
    }
}

// File and environment are deserialized separately: the file keeps keys as
// written (`maxItems`) while the environment yields `max_items`, and both
// aliases in one source would collide on the same field.
fn read_file_layer(path: &Path) -> Result<SettingsLayer, ConfigError> {
    Config::builder()
        .add_source(File::from(path).format(FileFormat::Json))
        .build()?
        .try_deserialize()
}

fn read_env_layer(env: Option<HashMap<String, String>>) -> Result<SettingsLayer, ConfigError> {
    Config::builder()
        .add_source(
            Environment::with_prefix(ENV_PREFIX)
                .try_parsing(true)
                .source(env),
        )
        .build()?
        .try_deserialize()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn test_missing_file_uses_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let settings = Settings::load(Some(&dir.path().join("absent.json")));
        assert_eq!(settings, Settings::default());
        assert_eq!(settings.max_items, None);
        assert_eq!(settings.timeout(), Duration::from_secs(30));
    }

    #[test]
    fn test_camel_case_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");
        fs::write(
            &path,
            r#"{
                "inputFile": "in/urls.txt",
                "outputFile": "out/result.csv",
                "outputFormat": "csv",
                "maxItems": 25,
                "logLevel": "DEBUG",
                "timeoutSecs": 5
            }"#,
        )
        .unwrap();

        let settings = Settings::load(Some(&path));
        assert_eq!(settings.input_file, PathBuf::from("in/urls.txt"));
        assert_eq!(settings.output_file, PathBuf::from("out/result.csv"));
        assert_eq!(settings.output_format.as_deref(), Some("csv"));
        assert_eq!(settings.max_items, Some(25));
        assert_eq!(settings.log_level, "DEBUG");
        assert_eq!(settings.timeout_secs, 5);
        assert_eq!(settings.base_url, DEFAULT_BASE_URL);
    }

    #[test]
    fn test_snake_case_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");
        fs::write(
            &path,
            r#"{"input_file": "urls.txt", "max_items": 250, "output_dir": "exports"}"#,
        )
        .unwrap();

        let settings = Settings::load(Some(&path));
        assert_eq!(settings.input_file, PathBuf::from("urls.txt"));
        assert_eq!(settings.max_items, Some(250));
        assert_eq!(settings.output_dir, Some(PathBuf::from("exports")));
    }

    #[test]
    fn test_malformed_file_uses_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");
        fs::write(&path, "{ not json").unwrap();

        assert_eq!(Settings::load(Some(&path)), Settings::default());
    }

    fn env(vars: &[(&str, &str)]) -> Option<HashMap<String, String>> {
        Some(
            vars.iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
        )
    }

    #[test]
    fn test_env_overrides_camel_case_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");
        fs::write(
            &path,
            r#"{"maxItems": 10, "logLevel": "debug", "outputFile": "out/file.csv"}"#,
        )
        .unwrap();

        let settings = Settings::load_from(
            Some(&path),
            env(&[
                ("FOLLOWING_SCRAPER_MAX_ITEMS", "7"),
                ("FOLLOWING_SCRAPER_BASE_URL", "https://m.facebook.com"),
                ("UNRELATED_MAX_ITEMS", "99"),
            ]),
        );

        assert_eq!(settings.max_items, Some(7));
        assert_eq!(settings.base_url, "https://m.facebook.com");
        // Keys the environment does not touch come from the file
        assert_eq!(settings.log_level, "debug");
        assert_eq!(settings.output_file, PathBuf::from("out/file.csv"));
    }

    #[test]
    fn test_env_applies_without_file() {
        let dir = tempfile::tempdir().unwrap();
        let settings = Settings::load_from(
            Some(&dir.path().join("absent.json")),
            env(&[("FOLLOWING_SCRAPER_OUTPUT_FORMAT", "jsonl")]),
        );

        assert_eq!(settings.output_format.as_deref(), Some("jsonl"));
        assert_eq!(settings.input_file, Settings::default().input_file);
    }

    #[test]
    fn test_malformed_file_keeps_env() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");
        fs::write(&path, "{ not json").unwrap();

        let settings = Settings::load_from(
            Some(&path),
            env(&[("FOLLOWING_SCRAPER_TIMEOUT_SECS", "5")]),
        );
        assert_eq!(settings.timeout_secs, 5);
        assert_eq!(settings.max_items, None);
    }

    #[test]
    fn test_overrides_win() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");
        fs::write(&path, r#"{"maxItems": 10, "outputFormat": "csv"}"#).unwrap();

        let settings = Settings::load(Some(&path)).with_overrides(SettingsOverrides {
            max_items: Some(3),
            output_file: Some(PathBuf::from("elsewhere.jsonl")),
            ..Default::default()
        });

        assert_eq!(settings.max_items, Some(3));
        assert_eq!(settings.output_format.as_deref(), Some("csv"));
        assert_eq!(settings.output_file, PathBuf::from("elsewhere.jsonl"));
    }
}
