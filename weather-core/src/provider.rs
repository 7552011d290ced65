use async_trait::async_trait;
use serde_json::Value;
use std::fmt::Debug;

use crate::{error::FetchError, locations::Location};

pub mod openweather;

pub use openweather::{DEFAULT_API_URL, OpenWeatherClient};

/// Source of raw current-weather JSON for one location.
#[async_trait]
pub trait WeatherSource: Send + Sync + Debug {
    async fn fetch_current(&self, location: &Location) -> Result<Value, FetchError>;
}

/// Shorten an error body before it ends up in a log line.
pub(crate) fn truncate_body(body: &str) -> String {
    const MAX: usize = 200;
    match body.char_indices().nth(MAX) {
        Some((idx, _)) => format!("{}...", &body[..idx]),
        None => body.to_string(),
    }
}
