//! OpenWeather air pollution provider.
//!
//! OpenWeather reports concentrations rather than an index; the PM2.5 value
//! (µg/m³) is used as the reading and the PM2.5 threshold scale should be
//! configured alongside this source.

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use time::OffsetDateTime;
use tracing::debug;

use crate::error::{Error, Result};
use crate::source::{ReadingSource, SourceReading};

/// Default OpenWeather API base URL.
pub const OPENWEATHER_BASE_URL: &str = "https://api.openweathermap.org";

/// OpenWeather air pollution reading source.
#[derive(Debug, Clone)]
pub struct OpenWeatherSource {
    client: Client,
    base_url: String,
    api_key: String,
}

impl OpenWeatherSource {
    /// Create a source using the public API endpoint.
    pub fn new(api_key: impl Into<String>) -> Result<Self> {
        let client = Client::builder()
            .user_agent(concat!("aeroguard/", env!("CARGO_PKG_VERSION")))
            .build()?;
        Ok(Self {
            client,
            base_url: OPENWEATHER_BASE_URL.to_string(),
            api_key: api_key.into(),
        })
    }

    /// Point the source at a different base URL.
    #[must_use]
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }
}

#[async_trait]
impl ReadingSource for OpenWeatherSource {
    fn name(&self) -> &'static str {
        "openweather"
    }

    async fn fetch(&self, latitude: f64, longitude: f64) -> Result<SourceReading> {
        let url = format!("{}/data/2.5/air_pollution", self.base_url);
        debug!("Fetching OpenWeather air pollution for {},{}", latitude, longitude);

        let response = self
            .client
            .get(&url)
            .query(&[
                ("lat", latitude.to_string()),
                ("lon", longitude.to_string()),
                ("appid", self.api_key.clone()),
            ])
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(Error::Status {
                provider: "openweather",
                status: status.as_u16(),
            });
        }

        let body = response.text().await?;
        parse_air_pollution(&body)
    }
}

#[derive(Debug, Deserialize)]
struct AirPollutionResponse {
    #[serde(default)]
    list: Vec<AirPollutionEntry>,
}

#[derive(Debug, Deserialize)]
struct AirPollutionEntry {
    dt: i64,
    components: Components,
}

#[derive(Debug, Deserialize)]
struct Components {
    pm2_5: Option<f64>,
}

/// Parse an OpenWeather air pollution response body.
pub(crate) fn parse_air_pollution(body: &str) -> Result<SourceReading> {
    let response: AirPollutionResponse = serde_json::from_str(body)?;
    let entry = response
        .list
        .into_iter()
        .next()
        .ok_or_else(|| Error::invalid_payload("empty pollution list"))?;

    let pm25 = entry
        .components
        .pm2_5
        .filter(|v| v.is_finite() && *v >= 0.0)
        .ok_or_else(|| Error::invalid_payload("no PM2.5 reported"))?;

    let timestamp = OffsetDateTime::from_unix_timestamp(entry.dt)
        .map_err(|e| Error::invalid_payload(e.to_string()))?;

    Ok(SourceReading::new(
        pm25.round().min(f64::from(u16::MAX)) as u16,
        timestamp,
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_air_pollution() {
        let body = r#"{
            "coord": {"lon": 72.82, "lat": 18.91},
            "list": [{
                "main": {"aqi": 4},
                "components": {"co": 934.6, "no2": 31.2, "pm2_5": 87.46, "pm10": 121.4},
                "dt": 1730556000
            }]
        }"#;

        let reading = parse_air_pollution(body).unwrap();
        assert_eq!(reading.aqi, 87);
        assert_eq!(reading.timestamp.unix_timestamp(), 1_730_556_000);
        assert_eq!(reading.station, None);
    }

    #[test]
    fn test_parse_empty_list() {
        let err = parse_air_pollution(r#"{"list": []}"#).unwrap_err();
        assert!(err.to_string().contains("empty"));
    }

    #[test]
    fn test_parse_missing_pm25() {
        let body = r#"{"list":[{"dt":1730556000,"components":{"co":900.0}}]}"#;
        assert!(matches!(
            parse_air_pollution(body),
            Err(Error::InvalidPayload(_))
        ));
    }
}
