//! Weather provider client.
//!
//! One GET per city per tick, no retries. Any failure is returned as a
//! [`FetchError`] and the caller skips the city for the rest of the tick.

use std::time::Duration;

use async_trait::async_trait;
use tracing::debug;

use crate::models::ReadingError;
use crate::{City, RawWeatherResponse, Reading};

// ---

#[derive(Debug, thiserror::Error)]
pub enum FetchError {
    #[error("request failed: {0}")]
    Transport(#[source] reqwest::Error),
    #[error("provider returned HTTP {0}")]
    Status(reqwest::StatusCode),
    #[error("could not decode provider response: {0}")]
    Decode(#[source] reqwest::Error),
    #[error(transparent)]
    Reading(#[from] ReadingError),
}

/// Anything that can produce a current [`Reading`] for a configured city.
#[async_trait]
pub trait WeatherSource: Send + Sync {
    async fn fetch(&self, city: &City) -> Result<Reading, FetchError>;
}

/// OpenWeatherMap-compatible current-weather client.
#[derive(Debug, Clone)]
pub struct OpenWeatherClient {
    // ---
    client: reqwest::Client,
    api_url: String,
    api_key: String,
}

impl OpenWeatherClient {
    // ---
    pub fn new(api_url: &str, api_key: &str, timeout: Duration) -> Result<Self, FetchError> {
        // ---
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(FetchError::Transport)?;

        Ok(Self {
            client,
            api_url: api_url.to_string(),
            api_key: api_key.to_string(),
        })
    }
}

#[async_trait]
impl WeatherSource for OpenWeatherClient {
    async fn fetch(&self, city: &City) -> Result<Reading, FetchError> {
        // ---
        debug!("Fetching {} ({}, {})", city.name, city.lat, city.lon);

        let response = self
            .client
            .get(&self.api_url)
            .query(&[
                ("lat", city.lat.to_string()),
                ("lon", city.lon.to_string()),
                ("appid", self.api_key.clone()),
            ])
            .send()
            .await
            .map_err(FetchError::Transport)?;

        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::Status(status));
        }

        let raw: RawWeatherResponse = response.json().await.map_err(FetchError::Decode)?;
        debug!("{} raw response: {:?}", city.name, raw);

        Ok(raw.into_reading(&city.name)?)
    }
}
