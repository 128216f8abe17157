//! Current conditions from the OpenWeather `/data/2.5/weather` endpoint.

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use skycast_core::NetworkError;
use tracing::instrument;

use crate::http;
use crate::types::{Coordinate, WeatherReading};

const CURRENT_WEATHER_PATH: &str = "/data/2.5/weather";

/// Fetches the current reading for a coordinate. One request per call.
#[async_trait]
pub trait WeatherClient: Send + Sync {
    async fn fetch_weather(&self, coord: Coordinate) -> Result<WeatherReading, NetworkError>;
}

#[derive(Debug, Deserialize)]
struct CurrentWeatherResponse {
    weather: Vec<ConditionEntry>,
    main: MainBlock,
}

#[derive(Debug, Deserialize)]
struct ConditionEntry {
    #[serde(rename = "main")]
    title: String,
    description: String,
    icon: String,
}

#[derive(Debug, Deserialize)]
struct MainBlock {
    temp: f64,
    feels_like: f64,
    temp_min: f64,
    temp_max: f64,
    humidity: i32,
}

impl TryFrom<CurrentWeatherResponse> for WeatherReading {
    type Error = NetworkError;

    fn try_from(response: CurrentWeatherResponse) -> Result<Self, Self::Error> {
        // Only the first condition is shown
        let condition = response.weather.into_iter().next().ok_or_else(|| {
            NetworkError::InvalidResponse("no weather conditions in response".to_string())
        })?;

        Ok(WeatherReading {
            condition_title: condition.title,
            description: condition.description,
            icon_code: condition.icon,
            temp_kelvin: response.main.temp,
            feels_like_kelvin: response.main.feels_like,
            temp_min_kelvin: response.main.temp_min,
            temp_max_kelvin: response.main.temp_max,
            humidity_percent: response.main.humidity,
        })
    }
}

#[derive(Debug, Clone)]
pub struct WeatherProvider {
    client: Client,
    base_url: String,
    api_key: String,
}

impl WeatherProvider {
    pub fn new(client: Client, base_url: &str, api_key: &str) -> Self {
        Self {
            client,
            base_url: base_url.to_string(),
            api_key: api_key.to_string(),
        }
    }
}

#[async_trait]
impl WeatherClient for WeatherProvider {
    #[instrument(skip(self), level = "debug")]
    async fn fetch_weather(&self, coord: Coordinate) -> Result<WeatherReading, NetworkError> {
        let mut url = http::endpoint(&self.base_url, CURRENT_WEATHER_PATH)?;
        url.query_pairs_mut()
            .append_pair("lat", &coord.latitude.to_string())
            .append_pair("lon", &coord.longitude.to_string())
            .append_pair("appid", &self.api_key);

        let response: CurrentWeatherResponse = http::get_json(&self.client, url).await?;
        let reading = WeatherReading::try_from(response)?;

        tracing::debug!(
            "Weather at {}, {}: {} ({})",
            coord.latitude,
            coord.longitude,
            reading.condition_title,
            reading.description
        );
        Ok(reading)
    }
}
