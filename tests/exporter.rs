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

use aurora_exporter::client::{ClientError, SwpcClient, DEFAULT_TIMEOUT};
use aurora_exporter::collector::SpaceWeatherCollector;
use aurora_exporter::http::{text_metrics, RequestContext};
use aurora_exporter::metrics::{MetricSample, Variant};
use axum::http::header::{ACCEPT, USER_AGENT};
use axum::http::{HeaderMap, StatusCode};
use axum::routing::get;
use axum::Router;
use reqwest::{Client, Url};
use std::net::{SocketAddr, TcpListener};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::mpsc;

const SCALES: &str = r#"{
    "-1": {"DateStamp": "2024-01-01", "TimeStamp": "00:00:00", "R": {"Scale": "0", "Text": "none", "MinorProb": null, "MajorProb": null}, "S": {"Scale": "0", "Text": "none", "Prob": null}, "G": {"Scale": "0", "Text": "none"}},
    "0": {"DateStamp": "2024-01-02", "TimeStamp": "00:00:00", "R": {"Scale": "0", "Text": "none", "MinorProb": null, "MajorProb": null}, "S": {"Scale": "0", "Text": "none", "Prob": null}, "G": {"Scale": "1", "Text": "minor"}},
    "1": {"DateStamp": "2024-01-02", "TimeStamp": "00:00:00", "R": {"Scale": null, "Text": null, "MinorProb": "35", "MajorProb": "5"}, "S": {"Scale": null, "Text": null, "Prob": "5"}, "G": {"Scale": "2", "Text": "moderate"}},
    "2": {"DateStamp": "2024-01-03", "TimeStamp": "00:00:00", "R": {"Scale": null, "Text": null, "MinorProb": "35", "MajorProb": "5"}, "S": {"Scale": null, "Text": null, "Prob": "5"}, "G": {"Scale": "3", "Text": "strong"}},
    "3": {"DateStamp": "2024-01-04", "TimeStamp": "00:00:00", "R": {"Scale": null, "Text": null, "MinorProb": "35", "MajorProb": "5"}, "S": {"Scale": null, "Text": null, "Prob": "5"}, "G": {"Scale": "0", "Text": "none"}}
}"#;

const KP: &str = r#"[
    ["time_tag", "Kp", "Kp_fraction", "a_running", "station_count"],
    ["2023-12-31 21:00:00.000", "2", "2.00", "7", "8"],
    ["2024-01-01 00:00:00.000", "3", "3.33", "7", "13"]
]"#;

const KP_TIMESTAMP_MS: i64 = 1704067200000;

type Summary = Vec<(String, Option<&'static str>, f64, Option<i64>)>;

fn summarize(samples: &[MetricSample<'_>]) -> Summary {
    samples
        .iter()
        .map(|s| (s.desc.fq_name.clone(), s.label, s.value, s.timestamp_ms))
        .collect()
}

fn storm(label: &'static str, value: f64) -> (String, Option<&'static str>, f64, Option<i64>) {
    ("aurora_geomagnetic_storm".to_owned(), Some(label), value, None)
}

fn kp() -> (String, Option<&'static str>, f64, Option<i64>) {
    ("planetary_k_index".to_owned(), None, 3.33, Some(KP_TIMESTAMP_MS))
}

fn serve(router: Router) -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    listener.set_nonblocking(true).unwrap();
    let addr = listener.local_addr().unwrap();
    let server = axum::Server::from_tcp(listener).unwrap().serve(router.into_make_service());

    tokio::spawn(async move { server.await.unwrap() });
    addr
}

/// Address that nothing is listening on.
fn closed() -> SocketAddr {
    TcpListener::bind("127.0.0.1:0").unwrap().local_addr().unwrap()
}

fn upstream(scales: (StatusCode, &'static str), kp: (StatusCode, &'static str)) -> SocketAddr {
    serve(
        Router::new()
            .route("/products/noaa-scales.json", get(move || async move { scales }))
            .route("/products/noaa-planetary-k-index.json", get(move || async move { kp })),
    )
}

fn scales_url(addr: SocketAddr) -> Url {
    Url::parse(&format!("http://{}/products/noaa-scales.json", addr)).unwrap()
}

fn kp_url(addr: SocketAddr) -> Url {
    Url::parse(&format!("http://{}/products/noaa-planetary-k-index.json", addr)).unwrap()
}

fn collector(scales: Url, kp: Url, variant: Variant) -> SpaceWeatherCollector {
    SpaceWeatherCollector::new(client(scales, kp), variant).unwrap()
}

fn collector_for(addr: SocketAddr, variant: Variant) -> SpaceWeatherCollector {
    collector(scales_url(addr), kp_url(addr), variant)
}

fn client(scales: Url, kp: Url) -> SwpcClient {
    SwpcClient::with_timeout(DEFAULT_TIMEOUT, scales, kp).unwrap()
}

#[tokio::test]
async fn test_client_sends_identifying_headers() {
    let (tx, mut rx) = mpsc::unbounded_channel();
    let addr = serve(Router::new().route(
        "/products/noaa-scales.json",
        get(move |headers: HeaderMap| async move {
            tx.send(headers).unwrap();
            SCALES
        }),
    ));

    client(scales_url(addr), kp_url(addr)).scales().await.unwrap();
    let headers = rx.recv().await.unwrap();

    let agent = headers[USER_AGENT].to_str().unwrap();
    assert!(agent.starts_with("aurora_exporter/"), "unexpected user agent {}", agent);
    assert_eq!("application/json", headers[ACCEPT].to_str().unwrap());
}

#[tokio::test]
async fn test_client_timeout_is_transport_error() {
    let addr = serve(
        Router::new()
            .route(
                "/products/noaa-scales.json",
                get(|| async {
                    tokio::time::sleep(Duration::from_secs(3)).await;
                    SCALES
                }),
            )
            .route("/products/noaa-planetary-k-index.json", get(|| async { KP })),
    );
    let client = SwpcClient::with_timeout(Duration::from_millis(250), scales_url(addr), kp_url(addr)).unwrap();

    let start = Instant::now();
    assert!(matches!(client.scales().await, Err(ClientError::Transport(_))));
    assert!(start.elapsed() < Duration::from_secs(2));

    let collector = SpaceWeatherCollector::new(client, Variant::Aurora).unwrap();
    let samples = collector.collect().await;
    assert_eq!(vec![kp()], summarize(&samples));
}

#[tokio::test]
async fn test_client_latest_kp() {
    let addr = upstream((StatusCode::OK, SCALES), (StatusCode::OK, KP));
    let row = client(scales_url(addr), kp_url(addr)).latest_kp().await.unwrap();

    assert_eq!(vec!["2024-01-01 00:00:00.000", "3", "3.33", "7", "13"], row.0);
}

#[tokio::test]
async fn test_client_empty_series() {
    let addr = upstream((StatusCode::OK, SCALES), (StatusCode::OK, "[]"));
    let res = client(scales_url(addr), kp_url(addr)).latest_kp().await;

    assert!(matches!(res, Err(ClientError::EmptySeries(_))));
}

#[tokio::test]
async fn test_client_decode_error() {
    let addr = upstream((StatusCode::OK, r#"{"0": "not an object"}"#), (StatusCode::OK, r#"{"not": "rows"}"#));
    let client = client(scales_url(addr), kp_url(addr));

    assert!(matches!(client.scales().await, Err(ClientError::Decode(_, _))));
    assert!(matches!(client.latest_kp().await, Err(ClientError::Decode(_, _))));
}

#[tokio::test]
async fn test_client_transport_error() {
    let client = client(scales_url(closed()), kp_url(closed()));

    assert!(matches!(client.scales().await, Err(ClientError::Transport(_))));
    assert!(matches!(client.latest_kp().await, Err(ClientError::Transport(_))));
}

#[tokio::test]
async fn test_collect_all_samples() {
    let addr = upstream((StatusCode::OK, SCALES), (StatusCode::OK, KP));
    let collector = collector_for(addr, Variant::Aurora);

    let samples = collector.collect().await;
    assert_eq!(
        vec![
            storm("current", 1.0),
            storm("predicted", 2.0),
            storm("two_day", 3.0),
            storm("three_day", 0.0),
            kp(),
        ],
        summarize(&samples)
    );
}

#[tokio::test]
async fn test_collect_missing_horizons() {
    let addr = upstream((StatusCode::OK, r#"{"0":{"G":{"Scale":"2"}}}"#), (StatusCode::OK, KP));
    let collector = collector_for(addr, Variant::Aurora);

    let samples = collector.collect().await;
    assert_eq!(vec![storm("current", 2.0), kp()], summarize(&samples));
}

#[tokio::test]
async fn test_collect_malformed_horizon() {
    let body = r#"{
        "0": {"G": {"Scale": "1"}},
        "1": {"G": {"Scale": "G2"}},
        "2": {"G": {"Scale": "3"}},
        "3": {"G": {"Scale": "4"}}
    }"#;
    let addr = upstream((StatusCode::OK, body), (StatusCode::OK, KP));
    let collector = collector_for(addr, Variant::Aurora);

    let samples = collector.collect().await;
    assert_eq!(
        vec![storm("current", 1.0), storm("two_day", 3.0), storm("three_day", 4.0), kp()],
        summarize(&samples)
    );
}

#[tokio::test]
async fn test_collect_empty_kp_series() {
    let addr = upstream((StatusCode::OK, SCALES), (StatusCode::OK, "[]"));
    let collector = collector_for(addr, Variant::Aurora);

    let samples = collector.collect().await;
    assert_eq!(4, samples.len());
    assert!(samples.iter().all(|s| s.desc.fq_name == "aurora_geomagnetic_storm"));
}

#[tokio::test]
async fn test_collect_unparseable_kp_row() {
    let header_only = r#"[["time_tag", "Kp", "Kp_fraction", "a_running", "station_count"]]"#;
    let addr = upstream((StatusCode::OK, SCALES), (StatusCode::OK, header_only));
    let collector = collector_for(addr, Variant::Aurora);

    let samples = collector.collect().await;
    assert_eq!(4, samples.len());
    assert!(samples.iter().all(|s| s.timestamp_ms.is_none()));
}

#[tokio::test]
async fn test_collect_scales_unreachable() {
    let addr = upstream((StatusCode::OK, SCALES), (StatusCode::OK, KP));
    let collector = collector(scales_url(closed()), kp_url(addr), Variant::Aurora);

    let samples = collector.collect().await;
    assert_eq!(vec![kp()], summarize(&samples));
}

#[tokio::test]
async fn test_collect_kp_unreachable() {
    let addr = upstream((StatusCode::OK, SCALES), (StatusCode::OK, KP));
    let collector = collector(scales_url(addr), kp_url(closed()), Variant::Aurora);

    let samples = collector.collect().await;
    assert_eq!(
        vec![
            storm("current", 1.0),
            storm("predicted", 2.0),
            storm("two_day", 3.0),
            storm("three_day", 0.0),
        ],
        summarize(&samples)
    );
}

#[tokio::test]
async fn test_collect_scales_error_status() {
    let addr = upstream((StatusCode::INTERNAL_SERVER_ERROR, "upstream unavailable"), (StatusCode::OK, KP));
    let collector = collector_for(addr, Variant::Aurora);

    let samples = collector.collect().await;
    assert_eq!(vec![kp()], summarize(&samples));
}

#[tokio::test]
async fn test_collect_error_status_with_valid_body() {
    let addr = upstream((StatusCode::SERVICE_UNAVAILABLE, r#"{"0":{"G":{"Scale":"5"}}}"#), (StatusCode::NOT_FOUND, "[]"));
    let collector = collector_for(addr, Variant::Aurora);

    let samples = collector.collect().await;
    assert_eq!(vec![storm("current", 5.0)], summarize(&samples));
}

#[tokio::test]
async fn test_collect_everything_unreachable() {
    let collector = collector(scales_url(closed()), kp_url(closed()), Variant::Aurora);

    assert!(collector.collect().await.is_empty());
    assert_eq!(2, collector.describe().len());
}

#[tokio::test]
async fn test_collect_is_repeatable() {
    let addr = upstream((StatusCode::OK, SCALES), (StatusCode::OK, KP));
    let collector = collector_for(addr, Variant::Aurora);

    let first = summarize(&collector.collect().await);
    let second = summarize(&collector.collect().await);
    assert_eq!(first, second);
}

#[tokio::test]
async fn test_collect_concurrent_scrapes() {
    let addr = upstream((StatusCode::OK, SCALES), (StatusCode::OK, KP));
    let collector = collector_for(addr, Variant::Aurora);

    let (first, second) = tokio::join!(collector.collect(), collector.collect());
    assert_eq!(5, first.len());
    assert_eq!(summarize(&first), summarize(&second));
}

#[tokio::test]
async fn test_collect_storm_variant_skips_kp() {
    let addr = upstream((StatusCode::OK, SCALES), (StatusCode::OK, KP));
    let collector = collector(scales_url(addr), kp_url(closed()), Variant::Storm);

    let samples = collector.collect().await;
    assert_eq!(4, samples.len());
    assert_eq!(1, collector.describe().len());
    assert!(samples.iter().all(|s| s.desc.fq_name == "aurora_geomagnetic_storm"));
}

#[tokio::test]
async fn test_collect_horizons_variant() {
    let addr = upstream((StatusCode::OK, SCALES), (StatusCode::OK, KP));
    let collector = collector_for(addr, Variant::Horizons);

    let samples = collector.collect().await;
    assert_eq!(
        vec![
            ("aurora_geomagnetic_storm_current".to_owned(), None, 1.0, None),
            ("aurora_geomagnetic_storm_predicted".to_owned(), None, 2.0, None),
            ("aurora_geomagnetic_storm_two_day".to_owned(), None, 3.0, None),
            ("aurora_geomagnetic_storm_three_day".to_owned(), None, 0.0, None),
        ],
        summarize(&samples)
    );
}

fn exporter(collector: SpaceWeatherCollector) -> SocketAddr {
    serve(text_metrics(Arc::new(RequestContext::new(collector))))
}

#[tokio::test]
async fn test_http_metrics() {
    let addr = upstream((StatusCode::OK, SCALES), (StatusCode::OK, KP));
    let exporter = exporter(collector_for(addr, Variant::Aurora));

    let res = reqwest::get(format!("http://{}/metrics", exporter)).await.unwrap();
    assert_eq!(reqwest::StatusCode::OK, res.status());
    assert!(res.headers()["content-type"].to_str().unwrap().starts_with("text/plain"));

    let body = res.text().await.unwrap();
    assert!(body.contains("# HELP aurora_geomagnetic_storm Geomagnetic storm index."));
    assert!(body.contains("aurora_geomagnetic_storm{timescale=\"current\"} 1\n"));
    assert!(body.contains("aurora_geomagnetic_storm{timescale=\"predicted\"} 2\n"));
    assert!(body.contains("aurora_geomagnetic_storm{timescale=\"two_day\"} 3\n"));
    assert!(body.contains("aurora_geomagnetic_storm{timescale=\"three_day\"} 0\n"));
    assert!(body.contains("planetary_k_index 3.33 1704067200000\n"));
}

#[tokio::test]
async fn test_http_metrics_upstream_down() {
    let exporter = exporter(collector(scales_url(closed()), kp_url(closed()), Variant::Aurora));

    let res = reqwest::get(format!("http://{}/metrics", exporter)).await.unwrap();
    assert_eq!(reqwest::StatusCode::OK, res.status());
    assert_eq!("", res.text().await.unwrap());
}

#[tokio::test]
async fn test_http_wrong_method_and_path() {
    let exporter = exporter(collector(scales_url(closed()), kp_url(closed()), Variant::Aurora));
    let client = Client::new();

    let res = client.post(format!("http://{}/metrics", exporter)).send().await.unwrap();
    assert_eq!(reqwest::StatusCode::METHOD_NOT_ALLOWED, res.status());

    let res = client.get(format!("http://{}/other", exporter)).send().await.unwrap();
    assert_eq!(reqwest::StatusCode::NOT_FOUND, res.status());
}
