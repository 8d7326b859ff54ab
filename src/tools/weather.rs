//! Daily weather forecast from Open-Meteo.

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value, json};
use tracing::debug;

use crate::agent::tool::{Tool, ToolDefinition, optional_f64, required_f64};
use crate::error::AgentError;

const OPEN_METEO_URL: &str = "https://api.open-meteo.com/v1/forecast";
const NAME: &str = "get_weather_data";

/// Default forecast length, days.
pub const DEFAULT_FORECAST_DAYS: u8 = 3;
/// Longest forecast Open-Meteo serves, days.
pub const MAX_FORECAST_DAYS: u8 = 16;

#[derive(Debug, Deserialize)]
struct ForecastResponse {
    daily: DailySeries,
}

#[derive(Debug, Deserialize)]
struct DailySeries {
    time: Vec<String>,
    #[serde(default)]
    precipitation_sum: Vec<Option<f64>>,
    #[serde(default)]
    temperature_2m_min: Vec<Option<f64>>,
    #[serde(default)]
    temperature_2m_max: Vec<Option<f64>>,
}

/// One forecast day.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DailyForecast {
    /// ISO date.
    pub date: String,
    /// Precipitation sum, millimetres.
    pub precipitation_mm: f64,
    /// Minimum temperature, Celsius.
    pub temperature_min_c: Option<f64>,
    /// Maximum temperature, Celsius.
    pub temperature_max_c: Option<f64>,
}

/// Parses an Open-Meteo daily forecast body.
fn parse_forecast(body: &str) -> Result<Vec<DailyForecast>, AgentError> {
    let parsed: ForecastResponse =
        serde_json::from_str(body).map_err(|e| AgentError::ResponseParse {
            message: format!("invalid forecast response: {e}"),
            content: body.chars().take(500).collect(),
        })?;
    let daily = parsed.daily;
    Ok(daily
        .time
        .into_iter()
        .enumerate()
        .map(|(i, date)| DailyForecast {
            date,
            precipitation_mm: daily.precipitation_sum.get(i).copied().flatten().unwrap_or(0.0),
            temperature_min_c: daily.temperature_2m_min.get(i).copied().flatten(),
            temperature_max_c: daily.temperature_2m_max.get(i).copied().flatten(),
        })
        .collect())
}

/// `get_weather_data` tool.
#[derive(Clone)]
pub struct GetWeatherData {
    client: Client,
    endpoint: String,
}

impl Default for GetWeatherData {
    fn default() -> Self {
        Self::new()
    }
}

impl GetWeatherData {
    /// Creates the tool against the public Open-Meteo API.
    #[must_use]
    pub fn new() -> Self {
        Self {
            client: Client::new(),
            endpoint: OPEN_METEO_URL.to_string(),
        }
    }

    /// Overrides the forecast endpoint.
    #[must_use]
    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = endpoint.into();
        self
    }

    async fn fetch(&self, latitude: f64, longitude: f64, days: u8) -> Result<String, AgentError> {
        let failed = |message: String| AgentError::ToolExecution {
            name: NAME.to_string(),
            message,
        };
        let response = self
            .client
            .get(&self.endpoint)
            .query(&[
                ("latitude", latitude.to_string()),
                ("longitude", longitude.to_string()),
                (
                    "daily",
                    "precipitation_sum,temperature_2m_min,temperature_2m_max".to_string(),
                ),
                ("forecast_days", days.to_string()),
                ("timezone", "auto".to_string()),
            ])
            .send()
            .await
            .map_err(|e| failed(e.to_string()))?;

        let status = response.status();
        let text = response.text().await.map_err(|e| failed(e.to_string()))?;
        if !status.is_success() {
            return Err(failed(format!(
                "HTTP {status}: {}",
                text.chars().take(200).collect::<String>()
            )));
        }
        Ok(text)
    }
}

impl std::fmt::Debug for GetWeatherData {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GetWeatherData")
            .field("endpoint", &self.endpoint)
            .finish_non_exhaustive()
    }
}

fn forecast_days(arguments: &Map<String, Value>) -> Result<u8, AgentError> {
    let Some(days) = optional_f64(NAME, arguments, "days")? else {
        return Ok(DEFAULT_FORECAST_DAYS);
    };
    if days < 1.0 || days > f64::from(MAX_FORECAST_DAYS) {
        return Err(AgentError::ToolExecution {
            name: NAME.to_string(),
            message: format!("days must be between 1 and {MAX_FORECAST_DAYS}, got {days}"),
        });
    }
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    let days = days.round() as u8;
    Ok(days)
}

#[async_trait]
impl Tool for GetWeatherData {
    fn definition(&self) -> ToolDefinition {
        ToolDefinition {
            name: NAME.to_string(),
            description: "Get the daily weather forecast (precipitation in mm, minimum and maximum temperature in C) for a location.".to_string(),
            parameters: json!({
                "type": "object",
                "properties": {
                    "latitude": { "type": "number", "description": "Latitude in degrees" },
                    "longitude": { "type": "number", "description": "Longitude in degrees" },
                    "days": { "type": "integer", "description": "Forecast length in days (default 3)" }
                },
                "required": ["latitude", "longitude"]
            }),
        }
    }

    async fn invoke(&self, arguments: &Map<String, Value>) -> Result<Value, AgentError> {
        let latitude = required_f64(NAME, arguments, "latitude")?;
        let longitude = required_f64(NAME, arguments, "longitude")?;
        if !(-90.0..=90.0).contains(&latitude) || !(-180.0..=180.0).contains(&longitude) {
            return Err(AgentError::ToolExecution {
                name: NAME.to_string(),
                message: format!("coordinates out of range: {latitude}, {longitude}"),
            });
        }
        let days = forecast_days(arguments)?;

        let body = self.fetch(latitude, longitude, days).await?;
        let forecast = parse_forecast(&body)?;
        let total: f64 = forecast.iter().map(|d| d.precipitation_mm).sum();
        debug!(latitude, longitude, days = forecast.len(), total, "weather forecast");

        Ok(json!({
            "latitude": latitude,
            "longitude": longitude,
            "total_precipitation_mm": (total * 10.0).round() / 10.0,
            "daily": forecast,
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_forecast() {
        let body = r#"{
            "latitude": 35.4, "longitude": -80.6,
            "daily_units": {"precipitation_sum": "mm"},
            "daily": {
                "time": ["2026-05-01", "2026-05-02", "2026-05-03"],
                "precipitation_sum": [0.0, 12.4, null],
                "temperature_2m_min": [11.2, 13.0, 9.8],
                "temperature_2m_max": [24.1, 21.7, 19.5]
            }
        }"#;
        let days = parse_forecast(body).unwrap_or_default();
        assert_eq!(days.len(), 3);
        assert_eq!(days[1].date, "2026-05-02");
        assert!((days[1].precipitation_mm - 12.4).abs() < f64::EPSILON);
        assert!(days[2].precipitation_mm.abs() < f64::EPSILON);
        assert_eq!(days[0].temperature_max_c, Some(24.1));
    }

    #[test]
    fn test_parse_forecast_rejects_garbage() {
        assert!(matches!(
            parse_forecast(r#"{"error": true}"#),
            Err(AgentError::ResponseParse { .. })
        ));
    }

    #[test]
    fn test_forecast_days() {
        let mut args = Map::new();
        assert_eq!(forecast_days(&args).ok(), Some(DEFAULT_FORECAST_DAYS));
        args.insert("days".to_string(), json!(7));
        assert_eq!(forecast_days(&args).ok(), Some(7));
        args.insert("days".to_string(), json!(30));
        assert!(forecast_days(&args).is_err());
    }

    #[tokio::test]
    async fn test_rejects_bad_coordinates() {
        let mut args = Map::new();
        args.insert("latitude".to_string(), json!(120.0));
        args.insert("longitude".to_string(), json!(0.0));
        let tool = GetWeatherData::new().with_endpoint("http://127.0.0.1:9/forecast");
        assert!(matches!(
            tool.invoke(&args).await,
            Err(AgentError::ToolExecution { .. })
        ));
    }
}
