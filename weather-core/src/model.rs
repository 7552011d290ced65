use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Storage format of [`WeatherRecord::observed_at`]; SQLite date functions read it as-is.
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// One observation for one city at one timestamp.
///
/// Built by [`crate::mapper::map_response`] and inserted once as a new row;
/// nothing ever updates or deletes it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WeatherRecord {
    pub city_id: i64,
    pub city_name: String,
    pub country: String,
    pub longitude: f64,
    pub latitude: f64,
    pub observed_at: DateTime<Utc>,
    /// General condition, e.g. "Clear", "Clouds", "Rain".
    pub weather_type: String,
    pub weather_description: String,
    /// Degrees Celsius, as are the other temperature fields.
    pub temperature: f64,
    pub feels_like: f64,
    pub temperature_min: f64,
    pub temperature_max: f64,
    /// hPa.
    pub pressure: f64,
    /// Percent.
    pub humidity: f64,
    /// Metres; not every station reports it.
    pub visibility: Option<f64>,
    /// m/s.
    pub wind_speed: f64,
    pub wind_deg: f64,
    /// Rain volume for the last hour in mm, `None` when the source omits it.
    pub rain_1h: Option<f64>,
}

impl WeatherRecord {
    pub fn timestamp_text(&self) -> String {
        self.observed_at.format(TIMESTAMP_FORMAT).to_string()
    }
}
