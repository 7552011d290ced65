//! Raw OpenWeather "current weather" JSON → [`WeatherRecord`].

use chrono::{DateTime, Utc};
use serde::Deserialize;
use serde_json::Value;

use crate::{error::MalformedResponseError, model::WeatherRecord};

#[derive(Debug, Deserialize)]
struct OwCoord {
    lon: f64,
    lat: f64,
}

#[derive(Debug, Deserialize)]
struct OwWeather {
    main: String,
    description: String,
}

#[derive(Debug, Deserialize)]
struct OwMain {
    temp: f64,
    feels_like: f64,
    temp_min: f64,
    temp_max: f64,
    pressure: f64,
    humidity: f64,
}

#[derive(Debug, Deserialize)]
struct OwWind {
    speed: f64,
    deg: f64,
}

#[derive(Debug, Deserialize)]
struct OwRain {
    #[serde(rename = "1h")]
    one_hour: Option<f64>,
}

#[derive(Debug, Deserialize)]
struct OwSys {
    country: String,
}

#[derive(Debug, Deserialize)]
struct OwCurrentResponse {
    id: i64,
    name: String,
    dt: i64,
    coord: OwCoord,
    weather: Vec<OwWeather>,
    main: OwMain,
    wind: OwWind,
    sys: OwSys,
    visibility: Option<f64>,
    rain: Option<OwRain>,
}

/// Map one API response into a record.
///
/// Fails when any required block or field is missing or has the wrong type;
/// `visibility` and `rain.1h` become `None` when absent.
pub fn map_response(raw: &Value) -> Result<WeatherRecord, MalformedResponseError> {
    let parsed = OwCurrentResponse::deserialize(raw)?;

    let weather = parsed
        .weather
        .into_iter()
        .next()
        .ok_or(MalformedResponseError::MissingWeather)?;

    let observed_at = unix_to_utc(parsed.dt)?;

    Ok(WeatherRecord {
        city_id: parsed.id,
        city_name: parsed.name,
        country: parsed.sys.country,
        longitude: parsed.coord.lon,
        latitude: parsed.coord.lat,
        observed_at,
        weather_type: weather.main,
        weather_description: weather.description,
        temperature: parsed.main.temp,
        feels_like: parsed.main.feels_like,
        temperature_min: parsed.main.temp_min,
        temperature_max: parsed.main.temp_max,
        pressure: parsed.main.pressure,
        humidity: parsed.main.humidity,
        visibility: parsed.visibility,
        wind_speed: parsed.wind.speed,
        wind_deg: parsed.wind.deg,
        rain_1h: parsed.rain.and_then(|r| r.one_hour),
    })
}

fn unix_to_utc(ts: i64) -> Result<DateTime<Utc>, MalformedResponseError> {
    DateTime::<Utc>::from_timestamp(ts, 0).ok_or(MalformedResponseError::InvalidTimestamp(ts))
}
