//! World Air Quality Index (WAQI) provider.
//!
//! Uses the geo feed endpoint, which resolves a coordinate to the nearest
//! monitoring station:
//!
//! ```text
//! GET {base}/feed/geo:{lat};{lon}/?token={token}
//! ```

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use time::OffsetDateTime;
use time::format_description::well_known::Rfc3339;
use tracing::debug;

use crate::error::{Error, Result};
use crate::source::{ReadingSource, SourceReading};

/// Default WAQI API base URL.
pub const WAQI_BASE_URL: &str = "https://api.waqi.info";

/// WAQI reading source.
#[derive(Debug, Clone)]
pub struct WaqiSource {
    client: Client,
    base_url: String,
    token: String,
}

impl WaqiSource {
    /// Create a source using the public API endpoint.
    pub fn new(token: impl Into<String>) -> Result<Self> {
        let client = Client::builder()
            .user_agent(concat!("aeroguard/", env!("CARGO_PKG_VERSION")))
            .build()?;
        Ok(Self {
            client,
            base_url: WAQI_BASE_URL.to_string(),
            token: token.into(),
        })
    }

    /// Point the source at a different base URL.
    #[must_use]
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    fn feed_url(&self, latitude: f64, longitude: f64) -> String {
        format!("{}/feed/geo:{};{}/", self.base_url, latitude, longitude)
    }
}

#[async_trait]
impl ReadingSource for WaqiSource {
    fn name(&self) -> &'static str {
        "waqi"
    }

    async fn fetch(&self, latitude: f64, longitude: f64) -> Result<SourceReading> {
        let url = self.feed_url(latitude, longitude);
        debug!("Fetching WAQI feed for {},{}", latitude, longitude);

        let response = self
            .client
            .get(&url)
            .query(&[("token", self.token.as_str())])
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(Error::Status {
                provider: "waqi",
                status: status.as_u16(),
            });
        }

        let body = response.text().await?;
        parse_feed(&body)
    }
}

#[derive(Debug, Deserialize)]
struct FeedResponse {
    status: String,
    data: serde_json::Value,
}

#[derive(Debug, Deserialize)]
struct FeedData {
    aqi: serde_json::Value,
    #[serde(default)]
    city: Option<FeedCity>,
    #[serde(default)]
    time: Option<FeedTime>,
}

#[derive(Debug, Deserialize)]
struct FeedCity {
    #[serde(default)]
    name: Option<String>,
}

#[derive(Debug, Deserialize)]
struct FeedTime {
    #[serde(default)]
    iso: Option<String>,
    #[serde(default)]
    v: Option<i64>,
}

/// Parse a WAQI feed response body.
pub(crate) fn parse_feed(body: &str) -> Result<SourceReading> {
    let response: FeedResponse = serde_json::from_str(body)?;
    if response.status != "ok" {
        let message = response
            .data
            .as_str()
            .map(str::to_string)
            .unwrap_or_else(|| response.data.to_string());
        return Err(Error::invalid_payload(format!(
            "status '{}': {}",
            response.status, message
        )));
    }

    let data: FeedData = serde_json::from_value(response.data)?;

    let aqi = match &data.aqi {
        serde_json::Value::Number(n) => n.as_f64(),
        serde_json::Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    }
    .filter(|v| v.is_finite() && *v >= 0.0)
    .ok_or_else(|| Error::invalid_payload(format!("no AQI reported ({})", data.aqi)))?;

    let time = data
        .time
        .ok_or_else(|| Error::invalid_payload("missing time"))?;
    let timestamp = time
        .iso
        .as_deref()
        .and_then(|iso| OffsetDateTime::parse(iso, &Rfc3339).ok())
        .or_else(|| time.v.and_then(|v| OffsetDateTime::from_unix_timestamp(v).ok()))
        .ok_or_else(|| Error::invalid_payload("missing or unparseable time"))?;

    Ok(SourceReading {
        aqi: aqi.round().min(f64::from(u16::MAX)) as u16,
        timestamp,
        station: data.city.and_then(|c| c.name),
    })
}
