//! Current conditions from OpenWeatherMap.

use super::FetchError;
use crate::retry::RetryPolicy;
use crate::tools::{Arguments, ParamSpec, Tool, ToolError, ToolSpec};
use async_trait::async_trait;
use reqwest::StatusCode;
use serde::Deserialize;
use serde_json::{Value, json};
use std::time::Duration;

const OPENWEATHERMAP_API_URL: &str = "https://api.openweathermap.org/data/2.5/weather";

pub struct Weather {
    client: reqwest::Client,
    endpoint: String,
    api_key: Option<String>,
    retry: RetryPolicy,
}

impl Weather {
    pub fn new(client: reqwest::Client, api_key: Option<String>, retry: RetryPolicy) -> Self {
        Self {
            client,
            endpoint: OPENWEATHERMAP_API_URL.to_string(),
            api_key,
            retry,
        }
    }

    #[cfg(test)]
    fn with_endpoint(mut self, endpoint: &str) -> Self {
        self.endpoint = endpoint.to_string();
        self
    }

    async fn fetch(&self, api_key: &str, location: &str) -> Result<ApiWeather, FetchError> {
        let response = self
            .client
            .get(self.endpoint.as_str())
            .query(&[("q", location), ("appid", api_key), ("units", "metric")])
            .send()
            .await
            .map_err(|e| FetchError::request("network error", e))?;

        match response.status() {
            StatusCode::NOT_FOUND => Err(FetchError::Permanent(format!(
                "could not find weather data for '{location}'; check the location name"
            ))),
            StatusCode::UNAUTHORIZED => Err(FetchError::Permanent(
                "weather service rejected the API key".into(),
            )),
            status if status == StatusCode::TOO_MANY_REQUESTS || status.is_server_error() => {
                Err(FetchError::Transient(format!("weather service returned {status}")))
            }
            status if !status.is_success() => Err(FetchError::Permanent(format!(
                "weather service returned {status}"
            ))),
            _ => response
                .json()
                .await
                .map_err(|e| FetchError::request("unexpected weather response", e)),
        }
    }
}

#[async_trait]
impl Tool for Weather {
    fn spec(&self) -> ToolSpec {
        ToolSpec::new(
            "get_weather",
            "Get current weather information for a specific location.",
        )
        .param(ParamSpec::string(
            "location",
            "The city name and optional country code (e.g. 'London,uk', 'Tokyo').",
        ))
    }

    fn timeout(&self) -> Duration {
        Duration::from_secs(15)
    }

    async fn execute(&self, args: Arguments) -> Result<Value, ToolError> {
        let location = args.str("location")?.trim();
        if location.is_empty() {
            return Err(ToolError::validation("location", "must not be empty"));
        }
        let Some(api_key) = self.api_key.as_deref() else {
            return Err(ToolError::execution(
                "weather service is not configured (missing OpenWeatherMap API key)",
            ));
        };

        let weather = self
            .retry
            .run(
                || self.fetch(api_key, location),
                FetchError::is_transient,
            )
            .await
            .map_err(|e| ToolError::execution(e.to_string()))?;

        Ok(weather.report())
    }
}

#[derive(Debug, Deserialize)]
struct ApiWeather {
    name: String,
    weather: Vec<ApiCondition>,
    main: ApiMain,
    wind: ApiWind,
}

#[derive(Debug, Deserialize)]
struct ApiCondition {
    description: String,
}

#[derive(Debug, Deserialize)]
struct ApiMain {
    temp: f64,
    feels_like: f64,
    humidity: f64,
}

#[derive(Debug, Deserialize)]
struct ApiWind {
    speed: f64,
}

impl ApiWeather {
    fn report(&self) -> Value {
        let conditions = self
            .weather
            .iter()
            .map(|c| c.description.as_str())
            .collect::<Vec<_>>()
            .join(", ");
        json!({
            "location": self.name,
            "weather": if conditions.is_empty() { "unknown".to_string() } else { conditions },
            "temperature_celsius": format!("{}°C", self.main.temp),
            "feels_like_celsius": format!("{}°C", self.main.feels_like),
            "humidity": format!("{}%", self.main.humidity),
            "wind_speed_mps": format!("{} m/s", self.wind.speed),
        })
    }
}
