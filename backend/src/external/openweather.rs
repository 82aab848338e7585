//! OpenWeatherMap client for environmental snapshots
//!
//! Current conditions come from the weather endpoint (looked up by city name,
//! metric units); particulate readings come from the air-pollution endpoint at
//! the coordinates the weather lookup returned.

use chrono::{DateTime, Utc};
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use shared::{Coordinates, EnvironmentalSnapshot};

use super::{EnvironmentalDataProvider, ProviderError};

/// OpenWeatherMap API client
#[derive(Clone)]
pub struct OpenWeatherClient {
    client: Client,
    api_key: String,
    base_url: String,
    default_pollen_level: f64,
}

/// OpenWeatherMap API response for current weather
#[derive(Debug, Deserialize)]
struct OWMCurrentResponse {
    coord: OWMCoord,
    main: OWMMain,
    #[serde(default)]
    wind: Option<OWMWind>,
    dt: Option<i64>,
    name: Option<String>,
}

#[derive(Debug, Deserialize)]
struct OWMCoord {
    lat: f64,
    lon: f64,
}

#[derive(Debug, Deserialize)]
struct OWMMain {
    temp: f64,
    pressure: f64,
    humidity: f64,
}

#[derive(Debug, Deserialize)]
struct OWMWind {
    speed: f64,
}

/// OpenWeatherMap API response for air pollution
#[derive(Debug, Deserialize)]
struct OWMPollutionResponse {
    list: Vec<OWMPollutionItem>,
}

#[derive(Debug, Deserialize)]
struct OWMPollutionItem {
    components: OWMComponents,
}

#[derive(Debug, Deserialize)]
struct OWMComponents {
    pm2_5: Option<f64>,
    pm10: Option<f64>,
}

impl OpenWeatherClient {
    /// Create a client against `base_url` (OpenWeatherMap's `/data/2.5` root)
    pub fn with_base_url(api_key: String, base_url: String) -> Self {
        Self {
            client: Client::new(),
            api_key,
            base_url,
            default_pollen_level: 50.0,
        }
    }

    /// Pollen index reported for every snapshot
    pub fn with_default_pollen_level(mut self, level: f64) -> Self {
        self.default_pollen_level = level;
        self
    }

    async fn get_current_weather(&self, location: &str) -> Result<OWMCurrentResponse, ProviderError> {
        let url = format!("{}/weather", self.base_url);
        let response = self
            .client
            .get(&url)
            .query(&[("q", location), ("appid", self.api_key.as_str()), ("units", "metric")])
            .send()
            .await
            .map_err(|e| ProviderError::Unavailable(format!("Weather API request failed: {}", e)))?;

        if response.status() == StatusCode::NOT_FOUND {
            return Err(ProviderError::LocationNotFound(location.to_string()));
        }
        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(ProviderError::Unavailable(format!(
                "Weather API error: {} - {}",
                status, body
            )));
        }

        response
            .json()
            .await
            .map_err(|e| ProviderError::Unavailable(format!("Failed to parse weather response: {}", e)))
    }

    async fn get_air_pollution(&self, coord: &OWMCoord) -> Result<OWMPollutionResponse, ProviderError> {
        let url = format!("{}/air_pollution", self.base_url);
        let response = self
            .client
            .get(&url)
            .query(&[
                ("lat", coord.lat.to_string()),
                ("lon", coord.lon.to_string()),
                ("appid", self.api_key.clone()),
            ])
            .send()
            .await
            .map_err(|e| ProviderError::Unavailable(format!("Air pollution API request failed: {}", e)))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(ProviderError::Unavailable(format!(
                "Air pollution API error: {} - {}",
                status, body
            )));
        }

        response.json().await.map_err(|e| {
            ProviderError::Unavailable(format!("Failed to parse air pollution response: {}", e))
        })
    }
}

impl EnvironmentalDataProvider for OpenWeatherClient {
    async fn fetch(&self, location: &str) -> Result<EnvironmentalSnapshot, ProviderError> {
        let weather = self.get_current_weather(location).await?;
        let pollution = self.get_air_pollution(&weather.coord).await?;
        convert_response(location, weather, pollution, self.default_pollen_level)
    }
}

/// Merge both OpenWeatherMap responses into a snapshot
fn convert_response(
    location: &str,
    weather: OWMCurrentResponse,
    pollution: OWMPollutionResponse,
    pollen_level: f64,
) -> Result<EnvironmentalSnapshot, ProviderError> {
    let components = pollution
        .list
        .into_iter()
        .next()
        .map(|item| item.components)
        .ok_or_else(|| ProviderError::Unavailable("Air quality data not available".to_string()))?;

    let observed_at = weather
        .dt
        .and_then(|dt| DateTime::from_timestamp(dt, 0))
        .unwrap_or_else(Utc::now);

    Ok(EnvironmentalSnapshot {
        location: weather.name.unwrap_or_else(|| location.to_string()),
        observed_at,
        coordinates: Some(Coordinates::new(weather.coord.lat, weather.coord.lon)),
        pm25: components.pm2_5,
        pm10: components.pm10,
        temperature: Some(weather.main.temp),
        humidity: Some(weather.main.humidity),
        pressure: Some(weather.main.pressure),
        wind_speed: Some(weather.wind.map(|w| w.speed).unwrap_or(0.0)),
        pollen_level: Some(pollen_level),
    })
}
