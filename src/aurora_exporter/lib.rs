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

//! Prometheus metrics exporter for NOAA space weather
//!
//! ## Features
//!
//! `aurora_exporter` fetches the [NOAA scales] and the [planetary K-index] from the
//! NOAA Space Weather Prediction Center each time it is scraped and emits them as
//! Prometheus gauges. Nothing is cached: every scrape makes fresh requests upstream
//! and a scrape that can't reach upstream simply has fewer (or no) samples.
//!
//! Which metrics are emitted depends on the `--variant` flag.
//!
//! * `aurora` (default)
//!   * `aurora_geomagnetic_storm{timescale=$TIMESCALE}` - Geomagnetic storm scale (0-5) where
//!     `$TIMESCALE` is one of `current`, `predicted`, `two_day`, or `three_day`.
//!   * `planetary_k_index` - Latest planetary K-index, timestamped with the time of the
//!     measurement rather than the time of the scrape.
//! * `storm`
//!   * `aurora_geomagnetic_storm{timescale=$TIMESCALE}` - As above, without the K-index.
//! * `horizons`
//!   * `aurora_geomagnetic_storm_current` - Current geomagnetic storm scale.
//!   * `aurora_geomagnetic_storm_predicted` - Predicted scale for the next 24 hours.
//!   * `aurora_geomagnetic_storm_two_day` - Predicted scale for 24 to 48 hours out.
//!   * `aurora_geomagnetic_storm_three_day` - Predicted scale for 48 to 72 hours out.
//!
//! [NOAA scales]: https://www.swpc.noaa.gov/noaa-scales-explanation
//! [planetary K-index]: https://www.swpc.noaa.gov/products/planetary-k-index
//!
//! ## Build
//!
//! `aurora_exporter` is a Rust program and must be built from source using a
//! [Rust toolchain](https://rustup.rs/).
//!
//! ```text
//! cargo build --release
//! ```
//!
//! ## Usage
//!
//! ```text
//! ./aurora_exporter --bind 0.0.0.0:8080
//! ```
//!
//! ### Prometheus
//!
//! Prometheus metrics are exposed on port `8080` at `/metrics` by default. Since each
//! scrape makes requests to NOAA, there's no point scraping more often than the data
//! changes. Something like the example below is plenty.
//!
//! ```yaml
//! scrape_configs:
//! - job_name: aurora_exporter
//!   scrape_interval: 5m
//!   static_configs:
//!   - targets: ['example:8080']
//! ```
//!

pub mod client;
pub mod collector;
pub mod http;
pub mod metrics;
pub mod model;
