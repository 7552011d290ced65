//! Error taxonomy of the collector.
//!
//! Only [`ConfigError`], [`LocationFileError`] and setup-time [`StoreError`]s
//! end a run (see [`PipelineError`]). Everything scoped to one location, one
//! record or one view is reported and the run carries on.

use std::path::PathBuf;

use thiserror::Error;

/// A required setting is missing or a value cannot be used.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing required setting: {0}")]
    MissingSetting(&'static str),

    #[error("Invalid value for {key} ({value:?}): {reason}")]
    Invalid {
        key: &'static str,
        value: String,
        reason: String,
    },

    #[error(transparent)]
    File(#[from] anyhow::Error),
}

/// The locations file cannot be read or contains a line without `city,country`.
#[derive(Debug, Error)]
pub enum LocationFileError {
    #[error("Failed to read locations file {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Malformed location on line {line}: {content:?} (expected `city,country`)")]
    Malformed { line: usize, content: String },
}

/// One location's request failed; its peers are unaffected.
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("Request failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("Weather API responded with status {status}: {body}")]
    Status { status: u16, body: String },

    #[error("Response body is not valid JSON: {0}")]
    InvalidJson(#[source] serde_json::Error),
}

/// A response that arrived fine but lacks a field every observation must carry.
#[derive(Debug, Error)]
pub enum MalformedResponseError {
    #[error("Malformed weather response: {0}")]
    Shape(#[from] serde_json::Error),

    #[error("Malformed weather response: `weather` array is empty")]
    MissingWeather,

    #[error("Malformed weather response: timestamp {0} is out of range")]
    InvalidTimestamp(i64),
}

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("Failed to prepare database location: {0}")]
    Io(#[from] std::io::Error),

    #[error("Database task failed: {0}")]
    Task(#[from] tokio::task::JoinError),

    #[error("Unsupported connection string: {0}")]
    UnsupportedTarget(String),

    #[error("Unknown view: {0}")]
    UnknownView(String),
}

/// Persisting one record failed; nothing of it was committed.
#[derive(Debug, Error)]
pub enum WriteError {
    #[error(transparent)]
    Mapping(#[from] MalformedResponseError),

    #[error("Failed to store weather record: {0}")]
    Storage(#[from] StoreError),
}

/// The engine rejected one view definition. Other views and the table are unaffected.
#[derive(Debug, Error)]
#[error("Failed to create view `{view}`: {source}")]
pub struct ViewCreationError {
    pub view: String,
    #[source]
    pub source: rusqlite::Error,
}

/// Fatal errors that end a run before or during setup.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Locations file error: {0}")]
    Locations(#[from] LocationFileError),

    #[error("Database setup failed: {0}")]
    Store(#[from] StoreError),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn malformed_location_mentions_line_and_expected_shape() {
        let err = LocationFileError::Malformed {
            line: 3,
            content: "London GB".into(),
        };

        let msg = err.to_string();
        assert!(msg.contains("line 3"));
        assert!(msg.contains("city,country"));
    }

    #[test]
    fn write_error_wraps_mapping_cause() {
        let err = WriteError::from(MalformedResponseError::MissingWeather);
        assert!(matches!(err, WriteError::Mapping(_)));
        assert!(err.to_string().contains("`weather` array is empty"));
    }

    #[test]
    fn status_error_shows_code() {
        let err = FetchError::Status {
            status: 500,
            body: "oops".into(),
        };
        assert!(err.to_string().contains("500"));
    }
}
