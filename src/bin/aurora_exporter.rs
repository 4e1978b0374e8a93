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

use aurora_exporter::client::{SwpcClient, DEFAULT_KP_URL, DEFAULT_SCALES_URL, DEFAULT_TIMEOUT};
use aurora_exporter::collector::SpaceWeatherCollector;
use aurora_exporter::http::RequestContext;
use aurora_exporter::metrics::Variant;
use clap::Parser;
use reqwest::Url;
use std::error::Error;
use std::io;
use std::net::SocketAddr;
use std::process;
use std::sync::Arc;
use std::time::Duration;
use tokio::signal::unix::{self, SignalKind};
use tracing::{Instrument, Level};

const DEFAULT_LOG_LEVEL: Level = Level::INFO;
const DEFAULT_BIND_ADDR: ([u8; 4], u16) = ([0, 0, 0, 0], 8080);
const DEFAULT_VARIANT: Variant = Variant::Aurora;

#[derive(Debug, Parser)]
#[clap(name = "aurora_exporter", version = clap::crate_version!())]
struct AuroraExporterApplication {
    /// Which metrics to export. 'aurora' exports the geomagnetic storm scale labeled by
    /// timescale and the planetary K-index, 'storm' exports only the labeled storm scale,
    /// and 'horizons' exports one unlabeled storm scale metric per timescale.
    #[clap(long, default_value_t = DEFAULT_VARIANT)]
    variant: Variant,

    /// URL of the NOAA scales JSON product
    #[clap(long, default_value = DEFAULT_SCALES_URL)]
    scales_url: Url,

    /// URL of the planetary K-index JSON product
    #[clap(long, default_value = DEFAULT_KP_URL)]
    kp_url: Url,

    /// Logging verbosity. Allowed values are 'trace', 'debug', 'info', 'warn', and 'error'
    /// (case insensitive)
    #[clap(long, default_value_t = DEFAULT_LOG_LEVEL)]
    log_level: Level,

    /// Timeout for each request to the NOAA API made during a scrape, in milliseconds.
    #[clap(long, default_value_t = DEFAULT_TIMEOUT.as_millis() as u64)]
    timeout_millis: u64,

    /// Address to bind to. By default, aurora_exporter will bind to public address since
    /// the purpose is to expose metrics to an external system (Prometheus or another
    /// agent for ingestion)
    #[clap(long, default_value_t = DEFAULT_BIND_ADDR.into())]
    bind: SocketAddr,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error + Send + Sync>> {
    let opts = AuroraExporterApplication::parse();
    tracing::subscriber::set_global_default(
        tracing_subscriber::FmtSubscriber::builder()
            .with_max_level(opts.log_level)
            .finish(),
    )
    .expect("failed to set tracing subscriber");

    let timeout = Duration::from_millis(opts.timeout_millis);
    let client = SwpcClient::with_timeout(timeout, opts.scales_url.clone(), opts.kp_url.clone()).unwrap_or_else(|e| {
        tracing::error!(message = "unable to initialize HTTP client", error = %e);
        process::exit(1)
    });

    let collector = SpaceWeatherCollector::new(client, opts.variant).unwrap_or_else(|e| {
        tracing::error!(message = "unable to create metric descriptors", error = %e);
        process::exit(1)
    });

    tracing::info!(message = "starting aurora_exporter", version = clap::crate_version!(), variant = %collector.variant());
    for desc in collector.describe() {
        tracing::info!(message = "exporting metric", name = %desc.fq_name, labels = ?desc.variable_labels);
    }

    // Make an initial collection to verify that the API is reachable before starting the
    // HTTP server. A failure here isn't fatal since every scrape fetches fresh data anyway.
    let initial = collector
        .collect()
        .instrument(tracing::span!(Level::DEBUG, "aurora_startup_collect"))
        .await
        .len();
    if initial == 0 {
        tracing::warn!(
            message = "initial collection produced no samples",
            scales_url = %opts.scales_url,
            kp_url = %opts.kp_url,
        );
    } else {
        tracing::info!(message = "initial collection succeeded", samples = initial);
    }

    let context = Arc::new(RequestContext::new(collector));
    let router = aurora_exporter::http::text_metrics(context);
    let server = axum::Server::try_bind(&opts.bind)
        .unwrap_or_else(|e| {
            tracing::error!(message = "error binding to address", address = %opts.bind, error = %e);
            process::exit(1)
        })
        .serve(router.into_make_service());

    tracing::info!(message = "server started", address = %server.local_addr());
    server
        .with_graceful_shutdown(async {
            // Wait for either SIGTERM or SIGINT to shutdown
            tokio::select! {
                _ = sigterm() => {}
                _ = sigint() => {}
            }
        })
        .await?;

    tracing::info!("server shutdown");
    Ok(())
}

/// Return after the first SIGTERM signal received by this process
async fn sigterm() -> io::Result<()> {
    unix::signal(SignalKind::terminate())?.recv().await;
    Ok(())
}

/// Return after the first SIGINT signal received by this process
async fn sigint() -> io::Result<()> {
    unix::signal(SignalKind::interrupt())?.recv().await;
    Ok(())
}
