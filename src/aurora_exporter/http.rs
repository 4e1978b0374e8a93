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

use crate::collector::SpaceWeatherCollector;
use axum::extract::State;
use axum::http::header::CONTENT_TYPE;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::Router;
use prometheus::{Encoder, TextEncoder, TEXT_FORMAT};
use std::sync::Arc;
use tower_http::trace::TraceLayer;

/// Global state shared between all HTTP requests.
#[derive(Debug)]
pub struct RequestContext {
    collector: SpaceWeatherCollector,
}

impl RequestContext {
    pub fn new(collector: SpaceWeatherCollector) -> Self {
        RequestContext { collector }
    }
}

/// Router serving metrics in the Prometheus text format at `/metrics`.
///
/// Each request runs a full collection, there is no caching between requests.
pub fn text_metrics(context: Arc<RequestContext>) -> Router {
    Router::new()
        .route("/metrics", get(metrics_handler))
        .layer(TraceLayer::new_for_http())
        .with_state(context)
}

async fn metrics_handler(State(context): State<Arc<RequestContext>>) -> Response {
    let samples = context.collector.collect().await;
    let families = context.collector.gather(&samples);

    let mut buf = Vec::new();
    let encoder = TextEncoder::new();

    match encoder.encode(&families, &mut buf) {
        Ok(_) => {
            tracing::debug!(
                message = "encoded prometheus metrics to text format",
                num_samples = samples.len(),
                num_bytes = buf.len(),
            );

            (StatusCode::OK, [(CONTENT_TYPE, TEXT_FORMAT)], buf).into_response()
        }
        Err(e) => {
            tracing::error!(message = "error encoding metrics", error = %e);
            StatusCode::SERVICE_UNAVAILABLE.into_response()
        }
    }
}
