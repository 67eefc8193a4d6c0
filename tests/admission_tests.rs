//! Integration tests for per-shop admission control.
//!
//! These tests drive the gateway end to end over a scripted transport on a
//! paused Tokio clock, so every timing assertion is exact rather than
//! wall-clock dependent.

mod common;

use std::time::Duration;

use common::{cost_body, shop_client, Reply, ScriptedTransport};
use futures::future::join_all;
use serde_json::json;
use shopify_gateway::{HttpError, RateLimitConfig, RestError, ShopifyConfig};
use tokio::time::Instant;

fn config_with(limits: RateLimitConfig) -> ShopifyConfig {
    ShopifyConfig::builder().rate_limits(limits).build().unwrap()
}

// ============================================================================
// REST fixed window
// ============================================================================

#[tokio::test(start_paused = true)]
async fn test_rest_burst_is_spread_over_cooldown_intervals() {
    let transport = ScriptedTransport::sequence(Vec::new());
    let client = shop_client(
        config_with(RateLimitConfig {
            max_rest_queries_per_second: 2,
            ..RateLimitConfig::default()
        }),
        &transport,
        "burst-shop",
    );
    let start = Instant::now();

    let responses = join_all((0..5).map(|_| client.get("shop", None))).await;
    assert!(responses.iter().all(|r| r.as_ref().unwrap().code == 200));

    let offsets: Vec<Duration> = transport.sent().iter().map(|s| s.at - start).collect();
    assert_eq!(
        offsets,
        vec![
            Duration::ZERO,
            Duration::ZERO,
            Duration::from_millis(1500),
            Duration::from_millis(1500),
            Duration::from_millis(3000),
        ]
    );

    // Never more than the ceiling inside any one-second span.
    for (i, first) in offsets.iter().enumerate() {
        let in_span = offsets[i..]
            .iter()
            .filter(|at| **at < *first + Duration::from_secs(1))
            .count();
        assert!(in_span <= 2, "{in_span} requests within 1s of {first:?}");
    }

    let telemetry = client.telemetry().await;
    assert_eq!(telemetry.queries_per_second, vec![2, 2]);
}

#[tokio::test(start_paused = true)]
async fn test_rest_ceiling_is_per_tenant() {
    let transport = ScriptedTransport::sequence(Vec::new());
    let config = config_with(RateLimitConfig {
        max_rest_queries_per_second: 1,
        ..RateLimitConfig::default()
    });
    let gateway = common::gateway(config, &transport);
    let busy = gateway.client(&common::session("busy-shop"));
    let quiet = gateway.client(&common::session("quiet-shop"));
    let start = Instant::now();

    let busy_calls = join_all((0..3).map(|_| busy.get("orders", None)));
    let quiet_call = async {
        tokio::time::sleep(Duration::from_millis(10)).await;
        quiet.get("orders", None).await
    };
    let (busy_responses, quiet_response) = tokio::join!(busy_calls, quiet_call);

    assert_eq!(busy_responses.len(), 3);
    assert_eq!(quiet_response.unwrap().code, 200);

    let sent = transport.sent();
    let quiet_sent: Vec<_> = sent
        .iter()
        .filter(|s| s.request.url.contains("quiet-shop"))
        .collect();
    assert_eq!(quiet_sent.len(), 1);
    assert_eq!(quiet_sent[0].at - start, Duration::from_millis(10));

    let last_busy = sent
        .iter()
        .filter(|s| s.request.url.contains("busy-shop"))
        .map(|s| s.at - start)
        .max()
        .unwrap();
    assert_eq!(last_busy, Duration::from_millis(3000));
}

// ============================================================================
// GraphQL concurrency and cost bucket
// ============================================================================

#[tokio::test(start_paused = true)]
async fn test_graphql_in_flight_stays_below_ceiling() {
    let transport = ScriptedTransport::new(|_, _| {
        Reply::ok(&cost_body(10.0, 1000.0, 50.0)).after(Duration::from_millis(100))
    });
    let client = shop_client(
        config_with(RateLimitConfig {
            max_concurrent_graphql_queries: 3,
            ..RateLimitConfig::default()
        }),
        &transport,
        "graphql-shop",
    );
    let start = Instant::now();

    let responses = join_all((0..10).map(|_| client.graphql("{ shop { name } }", None))).await;
    assert!(responses.iter().all(|r| r.as_ref().unwrap().code == 200));

    assert_eq!(transport.sent().len(), 10);
    // The operation being admitted counts towards the ceiling of three.
    assert_eq!(transport.peak_in_flight(), 2);
    // Five admission rounds of two operations each.
    assert_eq!(Instant::now() - start, Duration::from_millis(500));
    assert_eq!(client.rate_state().graphql().in_flight(), 0);

    let telemetry = client.telemetry().await;
    assert!(telemetry.concurrency.iter().all(|&c| c <= 2));
    assert!(telemetry.concurrency.contains(&2));
    assert_eq!(telemetry.query_cost.len(), 10);
}

#[tokio::test(start_paused = true)]
async fn test_graphql_ceiling_of_two_serializes_operations() {
    let transport = ScriptedTransport::new(|_, _| {
        Reply::ok(&cost_body(10.0, 1000.0, 50.0)).after(Duration::from_millis(100))
    });
    let client = shop_client(
        config_with(RateLimitConfig {
            max_concurrent_graphql_queries: 2,
            ..RateLimitConfig::default()
        }),
        &transport,
        "serial-shop",
    );
    let start = Instant::now();

    join_all((0..3).map(|_| client.graphql("{ shop { id } }", None))).await;

    assert_eq!(transport.peak_in_flight(), 1);
    let offsets: Vec<Duration> = transport.sent().iter().map(|s| s.at - start).collect();
    assert_eq!(
        offsets,
        vec![
            Duration::ZERO,
            Duration::from_millis(100),
            Duration::from_millis(200),
        ]
    );
}

#[tokio::test(start_paused = true)]
async fn test_graphql_low_bucket_waits_for_refill() {
    let transport = ScriptedTransport::sequence(vec![
        Reply::ok(&cost_body(600.0, 400.0, 50.0)),
        Reply::ok(&cost_body(10.0, 990.0, 50.0)),
    ]);
    let client = shop_client(ShopifyConfig::default(), &transport, "bucket-shop");

    client.graphql("{ a }", None).await.unwrap();
    client.graphql("{ b }", None).await.unwrap();

    let sent = transport.sent();
    assert_eq!(sent.len(), 2);
    // (1000 - 400) / 50 = 12 seconds to refill.
    assert_eq!(sent[1].at - sent[0].at, Duration::from_secs(12));
}

#[tokio::test(start_paused = true)]
async fn test_graphql_late_stale_report_does_not_overwrite_newer_one() {
    let transport = ScriptedTransport::new(|_, index| match index {
        0 => Reply::ok(&cost_body(10.0, 100.0, 50.0)).after(Duration::from_millis(500)),
        _ => Reply::ok(&cost_body(10.0, 900.0, 50.0)).after(Duration::from_millis(10)),
    });
    let client = shop_client(ShopifyConfig::default(), &transport, "ordering-shop");

    let slow = client.graphql("{ slow }", None);
    let fast = async {
        tokio::time::sleep(Duration::from_millis(1)).await;
        client.graphql("{ fast }", None).await
    };
    let (slow, fast) = tokio::join!(slow, fast);
    slow.unwrap();
    fast.unwrap();

    let snapshot = client
        .rate_state()
        .graphql()
        .throttle_status()
        .await
        .unwrap();
    assert!((snapshot.status.currently_available - 900.0).abs() < f64::EPSILON);
}

// ============================================================================
// Throttle retry
// ============================================================================

#[tokio::test(start_paused = true)]
async fn test_rest_429_is_retried_transparently() {
    let transport = ScriptedTransport::sequence(vec![
        Reply::json(
            429,
            &json!({ "errors": "Exceeded 2 calls per second for api client." }),
        ),
        Reply::ok(&json!({ "shop": { "id": 1 } })),
    ]);
    let client = shop_client(ShopifyConfig::default(), &transport, "retry-shop");

    let response = client.get("shop", None).await.unwrap();

    assert_eq!(response.code, 200);
    assert_eq!(response.body["shop"]["id"], 1);
    let sent = transport.sent();
    assert_eq!(sent.len(), 2);
    assert_eq!(sent[0].request, sent[1].request);
    // Exactly one fixed cool-down.
    assert_eq!(sent[1].at - sent[0].at, Duration::from_secs(1));
}

#[tokio::test(start_paused = true)]
async fn test_rest_429_honours_retry_after() {
    let transport = ScriptedTransport::sequence(vec![
        Reply::json(429, &json!({ "errors": "Exceeded" })).header("Retry-After", "4.0"),
        Reply::ok(&json!({ "orders": [] })),
    ]);
    let client = shop_client(ShopifyConfig::default(), &transport, "retry-after-shop");

    client.get("orders", None).await.unwrap();

    let sent = transport.sent();
    assert_eq!(sent[1].at - sent[0].at, Duration::from_secs(4));
}

#[tokio::test(start_paused = true)]
async fn test_graphql_throttled_error_is_retried() {
    let transport = ScriptedTransport::sequence(vec![
        Reply::ok(&json!({
            "errors": [{ "message": "Throttled", "extensions": { "code": "THROTTLED" } }]
        })),
        Reply::ok(&json!({ "data": { "shop": { "name": "Snowdevil" } } })),
    ]);
    let client = shop_client(ShopifyConfig::default(), &transport, "throttled-shop");

    let response = client.graphql("{ shop { name } }", None).await.unwrap();

    assert_eq!(response.body["data"]["shop"]["name"], "Snowdevil");
    let sent = transport.sent();
    assert_eq!(sent.len(), 2);
    assert!(sent[1].at - sent[0].at >= Duration::from_secs(1));
    assert_eq!(client.rate_state().graphql().in_flight(), 0);
}

#[tokio::test(start_paused = true)]
async fn test_non_throttle_errors_are_returned_unmodified() {
    let transport = ScriptedTransport::sequence(vec![
        Reply::json(422, &json!({ "errors": { "title": ["can't be blank"] } })),
        Reply::ok(&json!({ "errors": [{ "message": "Field 'nope' doesn't exist" }] })),
    ]);
    let client = shop_client(ShopifyConfig::default(), &transport, "errors-shop");

    let rest = client.post("products", json!({ "product": {} })).await.unwrap();
    assert_eq!(rest.code, 422);
    assert_eq!(rest.body["errors"]["title"][0], "can't be blank");

    let graphql = client.graphql("{ nope }", None).await.unwrap();
    assert_eq!(graphql.code, 200);
    assert!(graphql.body["errors"].is_array());

    assert_eq!(transport.sent().len(), 2);
}

#[tokio::test(start_paused = true)]
async fn test_retry_cap_surfaces_error() {
    let transport = ScriptedTransport::new(|_, _| Reply::json(429, &json!({ "errors": "Exceeded" })));
    let config = ShopifyConfig::builder()
        .max_throttle_retries(1)
        .build()
        .unwrap();
    let client = shop_client(config, &transport, "capped-shop");

    let error = client.get("shop", None).await.unwrap_err();

    match error {
        RestError::Http(HttpError::ThrottleRetries(e)) => {
            assert_eq!(e.retries, 1);
            assert_eq!(e.status, 429);
        }
        other => panic!("unexpected error: {other:?}"),
    }
    assert_eq!(transport.sent().len(), 2);
}

#[tokio::test(start_paused = true)]
async fn test_transport_failure_returns_degenerate_response() {
    let transport = ScriptedTransport::sequence(vec![Reply::failure()]);
    let client = shop_client(ShopifyConfig::default(), &transport, "offline-shop");

    let response = client.graphql("{ shop { name } }", None).await.unwrap();

    assert_eq!(response.code, 0);
    assert!(response.is_degenerate());
    assert_eq!(client.rate_state().graphql().in_flight(), 0);
}
