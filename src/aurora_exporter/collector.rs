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

use crate::client::SwpcClient;
use crate::metrics::{self, Descriptors, MetricSample, Variant};
use crate::model::KpMeasurement;
use prometheus::core::Desc;
use prometheus::proto::MetricFamily;
use tracing::Instrument;

/// Fetches upstream data and converts it to samples on each scrape.
///
/// Nothing is cached between calls to `collect()`: each one makes its own
/// requests upstream. The only state held is the client and the descriptors,
/// neither of which change after construction, so a single instance can serve
/// concurrent scrapes.
#[derive(Debug)]
pub struct SpaceWeatherCollector {
    client: SwpcClient,
    variant: Variant,
    descriptors: Descriptors,
}

impl SpaceWeatherCollector {
    pub fn new(client: SwpcClient, variant: Variant) -> prometheus::Result<Self> {
        Ok(Self {
            client,
            variant,
            descriptors: Descriptors::new(variant)?,
        })
    }

    pub fn variant(&self) -> Variant {
        self.variant
    }

    /// Every descriptor this collector can produce, regardless of whether the
    /// upstream data is currently available.
    pub fn describe(&self) -> Vec<&Desc> {
        self.descriptors.all()
    }

    /// Run one fetch and convert cycle.
    ///
    /// Never fails: any upstream or conversion error is logged and results in
    /// fewer samples. Storm samples come first in horizon order followed by the
    /// K-index sample, if any. The two upstream sources are fetched at the same
    /// time and a failure of one doesn't affect samples from the other.
    pub async fn collect(&self) -> Vec<MetricSample<'_>> {
        let (mut samples, kp) = tokio::join!(
            self.collect_storm().instrument(tracing::span!(tracing::Level::DEBUG, "aurora_scales")),
            self.collect_kp().instrument(tracing::span!(tracing::Level::DEBUG, "aurora_kp_index")),
        );

        samples.extend(kp);
        samples
    }

    /// Group samples from `collect()` into metric families for encoding.
    pub fn gather(&self, samples: &[MetricSample<'_>]) -> Vec<MetricFamily> {
        metrics::families(&self.describe(), samples)
    }

    async fn collect_storm(&self) -> Vec<MetricSample<'_>> {
        match self.client.scales().await {
            Ok(scales) => metrics::storm_samples(self.descriptors.storm(), &scales),
            Err(e) => {
                tracing::error!(message = "failed to fetch space weather scales", error = %e);
                Vec::new()
            }
        }
    }

    async fn collect_kp(&self) -> Option<MetricSample<'_>> {
        let desc = self.descriptors.kp()?;
        let row = match self.client.latest_kp().await {
            Ok(row) => row,
            Err(e) => {
                tracing::error!(message = "failed to fetch planetary k-index", error = %e);
                return None;
            }
        };

        match KpMeasurement::parse(&row) {
            Ok(kp) => {
                tracing::debug!(
                    message = "parsed planetary k-index",
                    timestamp = %kp.timestamp,
                    kp = kp.kp,
                    kp_fraction = kp.kp_fraction,
                    a_running = kp.a_running,
                    station_count = kp.station_count,
                );
                Some(metrics::kp_sample(desc, &kp))
            }
            Err(e) => {
                tracing::error!(message = "failed to parse planetary k-index", error = %e);
                None
            }
        }
    }
}
