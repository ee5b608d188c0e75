//! Yahoo chart provider against a mock server

use serde_json::{json, Value};
use shiftwatch::config::ProviderSettings;
use shiftwatch::models::Instrument;
use shiftwatch::services::market_data::{FetchError, MarketDataProvider};
use shiftwatch::services::yahoo::YahooMarketDataProvider;
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

const FIRST_BAR: i64 = 1_709_562_600;

fn provider_for(server: &MockServer) -> YahooMarketDataProvider {
    let settings = ProviderSettings {
        base_url: server.uri(),
        timeout_secs: 5,
        ..ProviderSettings::default()
    };
    YahooMarketDataProvider::new(&settings).unwrap()
}

fn chart_body(count: usize) -> Value {
    let timestamps: Vec<i64> = (0..count as i64).map(|i| FIRST_BAR + i * 900).collect();
    let closes: Vec<f64> = (0..count).map(|i| 100.0 + i as f64).collect();
    let highs: Vec<f64> = closes.iter().map(|c| c + 1.0).collect();
    let lows: Vec<f64> = closes.iter().map(|c| c - 1.0).collect();
    let volumes: Vec<u64> = vec![1_000; count];

    json!({
        "chart": {
            "result": [{
                "meta": {"symbol": "AAPL"},
                "timestamp": timestamps,
                "indicators": {
                    "quote": [{
                        "open": closes,
                        "high": highs,
                        "low": lows,
                        "close": closes,
                        "volume": volumes
                    }]
                }
            }],
            "error": null
        }
    })
}

#[tokio::test]
async fn test_fetches_chart_for_interval_and_range() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/v8/finance/chart/AAPL"))
        .and(query_param("interval", "15m"))
        .and(query_param("range", "1d"))
        .respond_with(ResponseTemplate::new(200).set_body_json(chart_body(20)))
        .expect(1)
        .mount(&server)
        .await;

    let bars = provider_for(&server)
        .get_bars(&Instrument::from("AAPL"), "15m", 50)
        .await
        .unwrap();

    assert_eq!(bars.len(), 20);
    assert_eq!(bars[0].close, 100.0);
    assert_eq!(bars[19].high, 120.0);
    assert_eq!(bars[0].timestamp.timestamp(), FIRST_BAR);
}

#[tokio::test]
async fn test_keeps_only_most_recent_bars() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/v8/finance/chart/AAPL"))
        .respond_with(ResponseTemplate::new(200).set_body_json(chart_body(60)))
        .mount(&server)
        .await;

    let bars = provider_for(&server)
        .get_bars(&Instrument::from("AAPL"), "15m", 50)
        .await
        .unwrap();

    assert_eq!(bars.len(), 50);
    assert_eq!(bars[0].close, 110.0);
    assert_eq!(bars[49].close, 159.0);
}

#[tokio::test]
async fn test_empty_result_is_empty_series() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "chart": {"result": [], "error": null}
        })))
        .mount(&server)
        .await;

    let bars = provider_for(&server)
        .get_bars(&Instrument::from("AAPL"), "15m", 50)
        .await
        .unwrap();
    assert!(bars.is_empty());
}

#[tokio::test]
async fn test_chart_error_is_provider_error() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "chart": {
                "result": null,
                "error": {
                    "code": "Not Found",
                    "description": "No data found, symbol may be delisted"
                }
            }
        })))
        .mount(&server)
        .await;

    let err = provider_for(&server)
        .get_bars(&Instrument::from("ZZZZ"), "15m", 50)
        .await
        .unwrap_err();
    match err {
        FetchError::Provider(message) => assert!(message.contains("Not Found")),
        other => panic!("unexpected error: {other:?}"),
    }
}

#[tokio::test]
async fn test_http_error_status() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(429).set_body_string("Too Many Requests"))
        .mount(&server)
        .await;

    let err = provider_for(&server)
        .get_bars(&Instrument::from("AAPL"), "15m", 50)
        .await
        .unwrap_err();
    assert!(matches!(err, FetchError::Status { status: 429, .. }));
}

#[tokio::test]
async fn test_unparseable_body_is_malformed() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200).set_body_string("<html>maintenance</html>"))
        .mount(&server)
        .await;

    let err = provider_for(&server)
        .get_bars(&Instrument::from("AAPL"), "15m", 50)
        .await
        .unwrap_err();
    assert!(matches!(err, FetchError::Malformed(_)));
}
