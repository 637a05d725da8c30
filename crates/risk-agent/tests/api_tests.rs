//! Router-level tests for the scoring API

use async_trait::async_trait;
use axum::{
    body::Body,
    http::{header, Request, StatusCode},
    Router,
};
use chrono::{Duration, Utc};
use risk_core::stats::market_stats;
use risk_core::{AddressHistory, Amount, MarketStats, TxCategory, TxRecord};
use serde_json::{json, Value};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tower::ServiceExt;

use risk_agent::config::AppConfig;
use risk_agent::error::ProviderError;
use risk_agent::provider::ChainDataProvider;
use risk_agent::{create_app, AppState};

const ADDRESS: &str = "sei1kfpm92hs5gsmp84098wc3jpy2a440l50cq2ycsxlkpnlaygl9azqdhsygg0";

// === Test provider ===

#[derive(Default)]
struct TestProvider {
    records: Vec<TxRecord>,
    fail: bool,
    delay_ms: u64,
    calls: AtomicUsize,
}

impl TestProvider {
    fn empty() -> Self {
        Self::default()
    }

    fn failing() -> Self {
        Self {
            fail: true,
            ..Self::default()
        }
    }

    fn slow(delay_ms: u64) -> Self {
        Self {
            delay_ms,
            ..Self::default()
        }
    }

    async fn call(&self) -> Result<(), ProviderError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.delay_ms > 0 {
            tokio::time::sleep(std::time::Duration::from_millis(self.delay_ms)).await;
        }
        if self.fail {
            return Err(ProviderError::Unavailable("indexer offline".to_string()));
        }
        Ok(())
    }
}

#[async_trait]
impl ChainDataProvider for TestProvider {
    async fn address_history(&self, address: &str) -> Result<AddressHistory, ProviderError> {
        self.call().await?;
        Ok(AddressHistory::assemble(address, self.records.clone()))
    }

    async fn market_stats(&self) -> Result<MarketStats, ProviderError> {
        self.call().await?;
        Ok(market_stats(&[], Utc::now()))
    }
}

// === Helpers ===

fn config_with(overrides: &[(&str, i64)]) -> AppConfig {
    let mut builder = AppConfig::defaults().unwrap();
    for (key, value) in overrides {
        builder = builder.set_override(*key, *value).unwrap();
    }
    AppConfig::from_config(builder.build().unwrap()).unwrap()
}

fn app_with(provider: Arc<TestProvider>, config: AppConfig) -> Router {
    create_app(AppState::new(config, provider))
}

fn app(provider: Arc<TestProvider>) -> Router {
    app_with(provider, config_with(&[]))
}

async fn post_json(app: &Router, uri: &str, body: Value) -> (StatusCode, Vec<u8>) {
    let request = Request::builder()
        .method("POST")
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .unwrap();

    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    (status, bytes.to_vec())
}

async fn get_json(app: &Router, uri: &str) -> (StatusCode, Value) {
    let request = Request::builder().uri(uri).body(Body::empty()).unwrap();
    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    (status, serde_json::from_slice(&bytes).unwrap())
}

fn parse(bytes: &[u8]) -> Value {
    serde_json::from_slice(bytes).unwrap()
}

fn transfer(from: &str, quantity: &str) -> Value {
    json!({
        "from": from,
        "to": "sei1qqqqqqqqqqqqqqqqqqqqqqqqqqqqqqqqqqqqqq",
        "amount": {"denom": "usei", "amount": quantity},
        "action": "transfer"
    })
}

// === Health ===

#[tokio::test]
async fn test_health() {
    let app = app(Arc::new(TestProvider::empty()));
    let (status, body) = get_json(&app, "/health").await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["ok"], true);
    assert_eq!(body["service"], "risk-agent");
    assert!(body["timestamp"].is_string());
}

// === Scoring ===

#[tokio::test]
async fn test_zero_history_transfer_is_held() {
    let provider = Arc::new(TestProvider::empty());
    let app = app(provider.clone());
    let (status, bytes) = post_json(&app, "/risk/score", transfer(ADDRESS, "5000000")).await;

    assert_eq!(status, StatusCode::OK);
    let body = parse(&bytes);
    assert_eq!(body["score"], 36);
    assert_eq!(body["recommendation"], "hold");
    assert_eq!(
        body["reasons"],
        json!(["no-history,no-transactions", "normal-amount", "low-velocity"])
    );
    // history once, market once
    assert_eq!(provider.calls.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn test_malformed_address() {
    let app = app(Arc::new(TestProvider::empty()));

    for address in ["cosmos1kfpm92hs5gsmp84098wc3jpy2a440l50cq2y", "sei1short"] {
        let (status, bytes) = post_json(&app, "/risk/score", transfer(address, "5000000")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(parse(&bytes)["reasons"][0], "invalid-address-format");
    }
}

#[tokio::test]
async fn test_total_provider_failure_still_scores() {
    let app = app(Arc::new(TestProvider::failing()));
    let request = json!({
        "from": ADDRESS,
        "amount": {"denom": "usei", "amount": "20000000"},
        "action": "vault.deposit",
        "context": {"txPerHour": "75"}
    });

    let (status, bytes) = post_json(&app, "/risk/score", request).await;
    assert_eq!(status, StatusCode::OK);

    let body = parse(&bytes);
    assert_eq!(
        body["reasons"],
        json!([
            "analysis-error-conservative-score",
            "high-amount-fallback",
            "high-velocity-fallback"
        ])
    );
    // round(50 * 0.45 + 35 * 0.35 + 55 * 0.2) = 46
    assert_eq!(body["score"], 46);
    assert_eq!(body["recommendation"], "hold");
}

#[tokio::test]
async fn test_scores_stay_in_bounds() {
    let app = app(Arc::new(TestProvider::failing()));
    let quantities = ["1", "9999", "5000000", "123456789", "99999999999999", "-3", "x"];
    let hints = [json!({}), json!({"txPerHour": 1e9}), json!({"txPerDay": "5000"})];

    for quantity in quantities {
        for hint in &hints {
            let request = json!({
                "from": ADDRESS,
                "amount": {"denom": "usei", "amount": quantity},
                "action": "transfer",
                "context": hint
            });
            let (status, bytes) = post_json(&app, "/risk/score", request).await;
            assert_eq!(status, StatusCode::OK);
            let score = parse(&bytes)["score"].as_u64().unwrap();
            assert!(score <= 100);
        }
    }
}

#[tokio::test]
async fn test_larger_amounts_never_score_lower() {
    let app = app(Arc::new(TestProvider::empty()));
    let quantities = ["10000001", "50000001", "150000001", "1000000001", "20000000001"];

    let mut previous = 0;
    for quantity in quantities {
        let request = json!({
            "amount": {"denom": "usei", "amount": quantity},
            "action": "transfer"
        });
        let (_, bytes) = post_json(&app, "/risk/score", request).await;
        let score = parse(&bytes)["score"].as_u64().unwrap();
        assert!(score >= previous, "{} scored {} < {}", quantity, score, previous);
        previous = score;
    }
}

#[tokio::test]
async fn test_minimal_request() {
    let app = app(Arc::new(TestProvider::empty()));
    let (status, bytes) = post_json(&app, "/risk/score", json!({"action": "claim"})).await;

    assert_eq!(status, StatusCode::OK);
    let body = parse(&bytes);
    assert_eq!(body["reasons"], json!(["no-address", "no-amount", "low-velocity"]));
    // round(10 * 0.2) = 2
    assert_eq!(body["score"], 2);
    assert_eq!(body["recommendation"], "allow");
}

#[tokio::test]
async fn test_identical_requests_within_ttl_are_identical() {
    let provider = Arc::new(TestProvider {
        records: vec![
            record(1, TxCategory::TransferSent, 400, "3000000"),
            record(2, TxCategory::TransferReceived, 200, "7000000"),
        ],
        ..TestProvider::default()
    });
    let app = app(provider.clone());
    let request = transfer(ADDRESS, "42000000");

    let (_, first) = post_json(&app, "/risk/score", request.clone()).await;
    let calls_after_first = provider.calls.load(Ordering::SeqCst);
    let (_, second) = post_json(&app, "/risk/score", request).await;

    assert_eq!(first, second);
    // Every value came from the cache the second time
    assert_eq!(provider.calls.load(Ordering::SeqCst), calls_after_first);
}

#[tokio::test]
async fn test_timeout_returns_504() {
    let config = config_with(&[("server.request_timeout_ms", 50)]);
    let app = app_with(Arc::new(TestProvider::slow(1_000)), config);

    let (status, bytes) = post_json(&app, "/risk/score", transfer(ADDRESS, "5000000")).await;
    assert_eq!(status, StatusCode::GATEWAY_TIMEOUT);

    let body = parse(&bytes);
    assert_eq!(body["error"], "scoring-timeout");
    assert_eq!(body["code"], "SCORING_TIMEOUT");
}

// === Batch ===

#[tokio::test]
async fn test_batch_preserves_order() {
    let app = app(Arc::new(TestProvider::failing()));
    let inputs = json!([
        transfer(ADDRESS, "1000"),
        {"action": "refund"},
        transfer("not-an-address", "5000000000"),
    ]);

    let (status, bytes) = post_json(&app, "/risk/batch", inputs.clone()).await;
    assert_eq!(status, StatusCode::OK);

    let body = parse(&bytes);
    let items = body.as_array().unwrap();
    assert_eq!(items.len(), 3);
    for (item, input) in items.iter().zip(inputs.as_array().unwrap()) {
        assert_eq!(item["input"]["action"], input["action"]);
        assert_eq!(item["input"]["from"], input["from"]);
    }
    assert_eq!(items[0]["result"]["reasons"][1], "normal-amount-fallback");
    assert_eq!(items[1]["result"]["reasons"][0], "no-address");
    assert_eq!(items[2]["result"]["reasons"][0], "invalid-address-format");
    assert_eq!(items[2]["result"]["reasons"][1], "extreme-amount-fallback");
}

#[tokio::test]
async fn test_empty_batch() {
    let app = app(Arc::new(TestProvider::empty()));
    let (status, bytes) = post_json(&app, "/risk/batch", json!([])).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(parse(&bytes), json!([]));
}

// === Cache ===

#[tokio::test]
async fn test_cache_stats_reflect_scoring() {
    let app = app(Arc::new(TestProvider::empty()));
    let (_, before) = get_json(&app, "/risk/cache").await;
    assert_eq!(before["entries"]["entry_count"], 0);

    post_json(&app, "/risk/score", transfer(ADDRESS, "5000000")).await;

    let (status, after) = get_json(&app, "/risk/cache").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(after["entries"]["market"], 1);
    assert_eq!(after["entries"]["histories"], 1);
    assert_eq!(after["entries"]["velocity"], 1);
    assert_eq!(after["ttl_seconds"]["velocity"], 120);
}

// === Config ===

#[test]
fn test_config_rejects_bad_scoring_values() {
    let unordered = AppConfig::defaults()
        .unwrap()
        .set_override("scoring.thresholds.escalate", 40)
        .unwrap()
        .build()
        .unwrap();
    assert!(AppConfig::from_config(unordered).is_err());

    let negative = AppConfig::defaults()
        .unwrap()
        .set_override("scoring.weights.velocity", -0.5)
        .unwrap()
        .build()
        .unwrap();
    assert!(AppConfig::from_config(negative).is_err());
}

fn record(id: usize, category: TxCategory, minutes_ago: i64, usei: &str) -> TxRecord {
    TxRecord {
        id: id.to_string(),
        category,
        sender: None,
        recipient: None,
        venue: None,
        amount: Some(Amount::new("usei", usei)),
        timestamp: Some(Utc::now() - Duration::minutes(minutes_ago)),
        succeeded: true,
    }
}
