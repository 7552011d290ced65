use anyhow::{Context, Result, anyhow};
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::{
    fmt, fs,
    path::{Path, PathBuf},
};

use crate::{
    error::ConfigError, fetch::DEFAULT_FETCH_CONCURRENCY, provider::DEFAULT_API_URL,
    store::DatabaseTarget,
};

pub const ENV_LOG_FILE: &str = "LOGS_FILE_PATH";
pub const ENV_CONNECTION_STRING: &str = "CONNECTION_STRING";
pub const ENV_CONNECTION_STRING_ASYNC: &str = "CONNECTION_STRING_ASYNC";
pub const ENV_API_KEY: &str = "API_KEY";
pub const ENV_CITIES_FILE: &str = "CITIES_FILE_PATH";
pub const ENV_API_URL: &str = "WEATHER_API_URL";
pub const ENV_FETCH_CONCURRENCY: &str = "FETCH_CONCURRENCY";

/// Settings stored on disk, used for whatever the environment leaves unset.
///
/// Example TOML:
/// ```toml
/// api_key = "..."
/// connection_string = "sqlite://weather.db"
/// cities_file = "/etc/weather/cities.txt"
/// ```
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FileConfig {
    pub log_file: Option<PathBuf>,
    pub connection_string: Option<String>,
    pub connection_string_async: Option<String>,
    pub api_key: Option<String>,
    pub cities_file: Option<PathBuf>,
    pub api_url: Option<String>,
    pub fetch_concurrency: Option<usize>,
}

impl FileConfig {
    /// Load the config file, or return an empty default if it doesn't exist yet.
    pub fn load() -> Result<Self> {
        Self::load_from(&Self::config_file_path()?)
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let contents = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let cfg: FileConfig = toml::from_str(&contents)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;

        Ok(cfg)
    }

    /// Save to the platform config directory, returning the path written.
    pub fn save(&self) -> Result<PathBuf> {
        let path = Self::config_file_path()?;
        self.save_to(&path)?;
        Ok(path)
    }

    /// Save config to disk, creating parent directories as needed.
    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).with_context(|| {
                format!("Failed to create config directory: {}", parent.display())
            })?;
        }

        let toml =
            toml::to_string_pretty(self).context("Failed to serialize configuration to TOML")?;

        fs::write(path, toml)
            .with_context(|| format!("Failed to write config file: {}", path.display()))?;

        Ok(())
    }

    /// Path to the config file.
    pub fn config_file_path() -> Result<PathBuf> {
        let dirs = ProjectDirs::from("dev", "weather-collector", "weather-collector")
            .ok_or_else(|| anyhow!("Could not determine platform config directory"))?;

        Ok(dirs.config_dir().join("settings.toml"))
    }
}

/// Resolved settings for one run.
#[derive(Clone)]
pub struct Settings {
    /// `None` logs to stderr.
    pub log_file: Option<PathBuf>,
    /// Connection used for schema and view setup.
    pub database: DatabaseTarget,
    /// Connection used for the write batch.
    pub database_async: DatabaseTarget,
    pub api_key: String,
    pub cities_file: PathBuf,
    pub api_url: String,
    pub fetch_concurrency: usize,
}

impl fmt::Debug for Settings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Settings")
            .field("log_file", &self.log_file)
            .field("database", &self.database)
            .field("database_async", &self.database_async)
            .field("api_key", &"<redacted>")
            .field("cities_file", &self.cities_file)
            .field("api_url", &self.api_url)
            .field("fetch_concurrency", &self.fetch_concurrency)
            .finish()
    }
}

impl Settings {
    /// Load from `.env`, the process environment, then the config file.
    pub fn load() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();
        let file = fallback_file(FileConfig::config_file_path())?;
        Self::resolve(|key| std::env::var(key).ok(), &file)
    }

    /// Resolve every setting; `env` wins over `file`, blank values count as unset.
    pub fn resolve<F>(env: F, file: &FileConfig) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let lookup = |key: &str, fallback: Option<String>| {
            env(key)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
                .or(fallback)
        };
        let require = |key: &'static str, fallback: Option<String>| {
            lookup(key, fallback).ok_or(ConfigError::MissingSetting(key))
        };

        let connection_string = require(ENV_CONNECTION_STRING, file.connection_string.clone())?;
        let connection_string_async = lookup(
            ENV_CONNECTION_STRING_ASYNC,
            file.connection_string_async.clone(),
        )
        .unwrap_or_else(|| connection_string.clone());

        let api_key = require(ENV_API_KEY, file.api_key.clone())?;
        let cities_file = require(
            ENV_CITIES_FILE,
            file.cities_file.as_ref().map(|p| p.display().to_string()),
        )?;
        let log_file = lookup(
            ENV_LOG_FILE,
            file.log_file.as_ref().map(|p| p.display().to_string()),
        );
        let api_url = lookup(ENV_API_URL, file.api_url.clone())
            .unwrap_or_else(|| DEFAULT_API_URL.to_string());

        let fetch_concurrency = match lookup(
            ENV_FETCH_CONCURRENCY,
            file.fetch_concurrency.map(|n| n.to_string()),
        ) {
            Some(raw) => parse_concurrency(&raw)?,
            None => DEFAULT_FETCH_CONCURRENCY,
        };

        Ok(Self {
            log_file: log_file.map(PathBuf::from),
            database: parse_target(ENV_CONNECTION_STRING, &connection_string)?,
            database_async: parse_target(ENV_CONNECTION_STRING_ASYNC, &connection_string_async)?,
            api_key,
            cities_file: PathBuf::from(cities_file),
            api_url,
            fetch_concurrency,
        })
    }
}

/// The settings file is optional; without a config directory only the environment is used.
fn fallback_file(path: Result<PathBuf>) -> Result<FileConfig, ConfigError> {
    match path {
        Ok(path) => Ok(FileConfig::load_from(&path)?),
        Err(e) => {
            tracing::debug!(error = %e, "No config directory, using environment only");
            Ok(FileConfig::default())
        }
    }
}

fn parse_target(key: &'static str, value: &str) -> Result<DatabaseTarget, ConfigError> {
    DatabaseTarget::parse(value).map_err(|e| ConfigError::Invalid {
        key,
        value: value.to_string(),
        reason: e.to_string(),
    })
}

fn parse_concurrency(raw: &str) -> Result<usize, ConfigError> {
    let invalid = |reason: &str| ConfigError::Invalid {
        key: ENV_FETCH_CONCURRENCY,
        value: raw.to_string(),
        reason: reason.to_string(),
    };

    match raw.parse::<usize>() {
        Ok(0) => Err(invalid("must be at least 1")),
        Ok(n) => Ok(n),
        Err(_) => Err(invalid("not a positive integer")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn env(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    fn minimal() -> Vec<(&'static str, &'static str)> {
        vec![
            (ENV_CONNECTION_STRING, "sqlite://weather.db"),
            (ENV_API_KEY, "KEY"),
            (ENV_CITIES_FILE, "cities.txt"),
        ]
    }

    #[test]
    fn resolves_required_settings_with_defaults() {
        let settings = Settings::resolve(env(&minimal()), &FileConfig::default()).unwrap();

        assert_eq!(settings.database, DatabaseTarget::File("weather.db".into()));
        assert_eq!(settings.database_async, settings.database);
        assert_eq!(settings.api_key, "KEY");
        assert_eq!(settings.cities_file, PathBuf::from("cities.txt"));
        assert_eq!(settings.log_file, None);
        assert_eq!(settings.api_url, DEFAULT_API_URL);
        assert_eq!(settings.fetch_concurrency, DEFAULT_FETCH_CONCURRENCY);
    }

    #[test]
    fn missing_api_key_is_reported_by_name() {
        let err = Settings::resolve(
            env(&[
                (ENV_CONNECTION_STRING, "weather.db"),
                (ENV_CITIES_FILE, "cities.txt"),
            ]),
            &FileConfig::default(),
        )
        .unwrap_err();

        assert!(matches!(err, ConfigError::MissingSetting("API_KEY")));
        assert!(err.to_string().contains("Missing required setting: API_KEY"));
    }

    #[test]
    fn blank_env_value_counts_as_missing() {
        let mut pairs = minimal();
        pairs[1] = (ENV_API_KEY, "   ");

        let err = Settings::resolve(env(&pairs), &FileConfig::default()).unwrap_err();
        assert!(matches!(err, ConfigError::MissingSetting("API_KEY")));
    }

    #[test]
    fn file_fills_gaps_and_env_wins() {
        let file = FileConfig {
            api_key: Some("FILE_KEY".into()),
            cities_file: Some("/etc/weather/cities.txt".into()),
            connection_string_async: Some("sqlite://batch.db".into()),
            fetch_concurrency: Some(4),
            ..FileConfig::default()
        };

        let settings = Settings::resolve(
            env(&[
                (ENV_CONNECTION_STRING, "weather.db"),
                (ENV_API_KEY, "ENV_KEY"),
            ]),
            &file,
        )
        .unwrap();

        assert_eq!(settings.api_key, "ENV_KEY");
        assert_eq!(settings.cities_file, PathBuf::from("/etc/weather/cities.txt"));
        assert_eq!(settings.database_async, DatabaseTarget::File("batch.db".into()));
        assert_eq!(settings.fetch_concurrency, 4);
    }

    #[test]
    fn invalid_concurrency_is_rejected() {
        for bad in ["0", "many", "-2"] {
            let mut pairs = minimal();
            pairs.push((ENV_FETCH_CONCURRENCY, bad));

            let err = Settings::resolve(env(&pairs), &FileConfig::default()).unwrap_err();
            assert!(
                matches!(err, ConfigError::Invalid { key: "FETCH_CONCURRENCY", .. }),
                "{bad} should be invalid"
            );
        }
    }

    #[test]
    fn unsupported_connection_string_is_invalid() {
        let mut pairs = minimal();
        pairs[0] = (ENV_CONNECTION_STRING, "mysql://root@localhost/weather");

        let err = Settings::resolve(env(&pairs), &FileConfig::default()).unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { key: "CONNECTION_STRING", .. }));
    }

    #[test]
    fn debug_output_hides_api_key() {
        let settings = Settings::resolve(env(&minimal()), &FileConfig::default()).unwrap();
        let debug = format!("{settings:?}");

        assert!(!debug.contains("KEY\""));
        assert!(debug.contains("<redacted>"));
    }

    #[test]
    fn file_config_save_and_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("settings.toml");
        let cfg = FileConfig {
            api_key: Some("OPEN_KEY".into()),
            connection_string: Some("sqlite://weather.db".into()),
            fetch_concurrency: Some(8),
            ..FileConfig::default()
        };

        cfg.save_to(&path).unwrap();

        assert_eq!(FileConfig::load_from(&path).unwrap(), cfg);
    }

    #[test]
    fn missing_config_dir_falls_back_to_environment() {
        let file = fallback_file(Err(anyhow!("no home directory"))).unwrap();
        assert_eq!(file, FileConfig::default());

        let settings = Settings::resolve(env(&minimal()), &file).unwrap();
        assert_eq!(settings.api_key, "KEY");
    }

    #[test]
    fn unreadable_config_file_is_still_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.toml");
        fs::write(&path, "api_key = [").unwrap();

        let err = fallback_file(Ok(path)).unwrap_err();
        assert!(matches!(err, ConfigError::File(_)));
    }

    #[test]
    fn missing_file_config_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        let cfg = FileConfig::load_from(&dir.path().join("absent.toml")).unwrap();

        assert_eq!(cfg, FileConfig::default());
    }
}
