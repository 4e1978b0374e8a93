// aurora_exporter - Prometheus metrics exporter for NOAA space weather
//
// Copyright 2022 Nick Pillitteri
//
// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.
//
// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
// GNU General Public License for more details.
//
// You should have received a copy of the GNU General Public License
// along with this program.  If not, see <http://www.gnu.org/licenses/>.
//

use crate::model::{KpRow, KpSeries, ScaleResponse};
use reqwest::header::{ACCEPT, USER_AGENT};
use reqwest::{Client, Url};
use serde::de::DeserializeOwned;
use std::error;
use std::fmt;
use std::time::Duration;

pub const DEFAULT_SCALES_URL: &str = "https://services.swpc.noaa.gov/products/noaa-scales.json";
pub const DEFAULT_KP_URL: &str = "https://services.swpc.noaa.gov/products/noaa-planetary-k-index.json";

/// Timeout for each request made upstream. A request that times out is a `ClientError::Transport`.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_millis(5000);

#[derive(Debug)]
pub enum ClientError {
    Transport(reqwest::Error),
    Decode(Url, serde_json::Error),
    EmptySeries(Url),
}

impl fmt::Display for ClientError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Transport(e) => write!(f, "{}", e),
            Self::Decode(url, e) => write!(f, "unable to decode response from {}: {}", url, e),
            Self::EmptySeries(url) => write!(f, "no Kp measurements returned from {}", url),
        }
    }
}

impl error::Error for ClientError {
    fn source(&self) -> Option<&(dyn error::Error + 'static)> {
        match self {
            Self::Transport(e) => Some(e),
            Self::Decode(_, e) => Some(e),
            Self::EmptySeries(_) => None,
        }
    }
}

/// Client for the NOAA Space Weather Prediction Center JSON products.
///
/// Each call makes exactly one request, there is no retry or caching. Use
/// `SwpcClient::with_timeout` for a client bounded by `DEFAULT_TIMEOUT`, or
/// `SwpcClient::new` with an already configured `reqwest::Client`.
#[derive(Debug, Clone)]
pub struct SwpcClient {
    client: Client,
    scales_url: Url,
    kp_url: Url,
}

impl SwpcClient {
    const USER_AGENT: &'static str = concat!("aurora_exporter/", env!("CARGO_PKG_VERSION"));
    const JSON_RESPONSE: &'static str = "application/json";

    pub fn new(client: Client, scales_url: Url, kp_url: Url) -> Self {
        SwpcClient {
            client,
            scales_url,
            kp_url,
        }
    }

    /// Build a client whose requests are bounded by `timeout`.
    pub fn with_timeout(timeout: Duration, scales_url: Url, kp_url: Url) -> Result<Self, ClientError> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(ClientError::Transport)?;

        Ok(Self::new(client, scales_url, kp_url))
    }

    /// Fetch current and forecast NOAA scales.
    pub async fn scales(&self) -> Result<ScaleResponse, ClientError> {
        tracing::debug!(message = "making scales request", url = %self.scales_url);
        self.fetch(&self.scales_url).await
    }

    /// Fetch the planetary K-index series and return the most recent row.
    pub async fn latest_kp(&self) -> Result<KpRow, ClientError> {
        tracing::debug!(message = "making planetary k-index request", url = %self.kp_url);
        let series: KpSeries = self.fetch(&self.kp_url).await?;
        tracing::debug!(message = "decoded planetary k-index series", rows = series.len());

        series
            .into_latest()
            .ok_or_else(|| ClientError::EmptySeries(self.kp_url.clone()))
    }

    async fn fetch<T: DeserializeOwned>(&self, url: &Url) -> Result<T, ClientError> {
        let res = self
            .client
            .get(url.clone())
            .header(USER_AGENT, Self::USER_AGENT)
            .header(ACCEPT, Self::JSON_RESPONSE)
            .send()
            .await
            .map_err(ClientError::Transport)?;

        // Status isn't treated as an error on its own, a body that doesn't decode is.
        let status = res.status();
        if !status.is_success() {
            tracing::debug!(message = "unexpected status from upstream", status = %status, url = %url);
        }

        let body = res.bytes().await.map_err(ClientError::Transport)?;
        serde_json::from_slice(&body).map_err(|e| ClientError::Decode(url.clone(), e))
    }
}
