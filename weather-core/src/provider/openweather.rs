use async_trait::async_trait;
use reqwest::Client;
use serde_json::Value;

use crate::{error::FetchError, locations::Location};

use super::{WeatherSource, truncate_body};

pub const DEFAULT_API_URL: &str = "https://api.openweathermap.org/data/2.5/weather";

/// Client for the OpenWeather "current weather" endpoint.
///
/// Requests use metric units. No retries and no timeout beyond the transport defaults.
#[derive(Debug, Clone)]
pub struct OpenWeatherClient {
    api_key: String,
    base_url: String,
    http: Client,
}

impl OpenWeatherClient {
    pub fn new(api_key: String) -> Self {
        Self::with_base_url(api_key, DEFAULT_API_URL.to_string())
    }

    pub fn with_base_url(api_key: String, base_url: String) -> Self {
        Self {
            api_key,
            base_url,
            http: Client::new(),
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }
}

#[async_trait]
impl WeatherSource for OpenWeatherClient {
    async fn fetch_current(&self, location: &Location) -> Result<Value, FetchError> {
        let query = location.query();

        // Strip the URL from transport errors, it carries the API key.
        let res = self
            .http
            .get(&self.base_url)
            .query(&[
                ("q", query.as_str()),
                ("appid", self.api_key.as_str()),
                ("units", "metric"),
            ])
            .send()
            .await
            .map_err(|e| FetchError::Transport(e.without_url()))?;

        let status = res.status();
        let body = res
            .text()
            .await
            .map_err(|e| FetchError::Transport(e.without_url()))?;

        if !status.is_success() {
            return Err(FetchError::Status {
                status: status.as_u16(),
                body: truncate_body(&body),
            });
        }

        serde_json::from_str(&body).map_err(FetchError::InvalidJson)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_targets_public_endpoint() {
        let client = OpenWeatherClient::new("KEY".into());
        assert_eq!(client.base_url(), DEFAULT_API_URL);
    }
}
