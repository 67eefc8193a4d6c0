//! Shared helpers for integration tests.

#![allow(dead_code)]

use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;
use shopify_gateway::{
    Session, ShopClient, ShopDomain, ShopifyConfig, ShopifyGateway, Transport, TransportError,
    TransportRequest, TransportResponse,
};
use tokio::time::Instant;

/// What the scripted transport answers to one request.
#[derive(Clone, Debug)]
pub struct Reply {
    pub status: u16,
    pub body: String,
    pub headers: Vec<(String, String)>,
    pub delay: Duration,
    pub fail: bool,
}

impl Reply {
    pub fn json(status: u16, body: &Value) -> Self {
        Self {
            status,
            body: body.to_string(),
            headers: Vec::new(),
            delay: Duration::ZERO,
            fail: false,
        }
    }

    pub fn ok(body: &Value) -> Self {
        Self::json(200, body)
    }

    pub fn failure() -> Self {
        Self {
            fail: true,
            ..Self::json(0, &Value::Null)
        }
    }

    pub fn header(mut self, name: &str, value: &str) -> Self {
        self.headers.push((name.to_lowercase(), value.to_string()));
        self
    }

    pub fn after(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }
}

/// One request seen by the transport.
#[derive(Clone, Debug)]
pub struct Sent {
    pub request: TransportRequest,
    pub at: Instant,
}

impl Sent {
    pub fn body_json(&self) -> Value {
        self.request
            .body
            .as_deref()
            .map_or(Value::Null, |body| serde_json::from_str(body).unwrap())
    }
}

type Handler = dyn Fn(&TransportRequest, usize) -> Reply + Send + Sync;

/// Transport answering from a closure, recording every request.
pub struct ScriptedTransport {
    handler: Box<Handler>,
    sent: Mutex<Vec<Sent>>,
    in_flight: AtomicUsize,
    peak_in_flight: AtomicUsize,
}

impl fmt::Debug for ScriptedTransport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ScriptedTransport")
            .field("sent", &self.sent.lock().unwrap().len())
            .finish_non_exhaustive()
    }
}

impl ScriptedTransport {
    /// `handler` receives each request and its zero-based index.
    pub fn new(
        handler: impl Fn(&TransportRequest, usize) -> Reply + Send + Sync + 'static,
    ) -> Arc<Self> {
        Arc::new(Self {
            handler: Box::new(handler),
            sent: Mutex::new(Vec::new()),
            in_flight: AtomicUsize::new(0),
            peak_in_flight: AtomicUsize::new(0),
        })
    }

    /// Answers with `replies` in order, then `{}` with status 200.
    pub fn sequence(replies: Vec<Reply>) -> Arc<Self> {
        Self::new(move |_, index| {
            replies
                .get(index)
                .cloned()
                .unwrap_or_else(|| Reply::ok(&serde_json::json!({})))
        })
    }

    pub fn sent(&self) -> Vec<Sent> {
        self.sent.lock().unwrap().clone()
    }

    pub fn peak_in_flight(&self) -> usize {
        self.peak_in_flight.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Transport for ScriptedTransport {
    async fn send(&self, request: TransportRequest) -> Result<TransportResponse, TransportError> {
        let index = {
            let mut sent = self.sent.lock().unwrap();
            sent.push(Sent {
                request: request.clone(),
                at: Instant::now(),
            });
            sent.len() - 1
        };
        let reply = (self.handler)(&request, index);

        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak_in_flight.fetch_max(now, Ordering::SeqCst);
        if !reply.delay.is_zero() {
            tokio::time::sleep(reply.delay).await;
        }
        self.in_flight.fetch_sub(1, Ordering::SeqCst);

        if reply.fail {
            return Err(TransportError::Other("connection reset".to_string()));
        }

        let mut headers: HashMap<String, Vec<String>> = HashMap::new();
        for (name, value) in reply.headers {
            headers.entry(name).or_default().push(value);
        }
        Ok(TransportResponse {
            status: reply.status,
            headers,
            body: reply.body,
        })
    }
}

pub fn session(shop: &str) -> Session {
    Session::new(ShopDomain::new(shop).unwrap(), "test-token")
}

pub fn gateway(config: ShopifyConfig, transport: &Arc<ScriptedTransport>) -> ShopifyGateway {
    let transport: Arc<dyn Transport> = Arc::clone(transport) as Arc<dyn Transport>;
    ShopifyGateway::with_transport(config, transport)
}

pub fn shop_client(config: ShopifyConfig, transport: &Arc<ScriptedTransport>, shop: &str) -> ShopClient {
    gateway(config, transport).client(&session(shop))
}

/// Extracts a query parameter from a URL.
pub fn query_param(url: &str, name: &str) -> Option<String> {
    let (_, query) = url.split_once('?')?;
    query.split('&').find_map(|pair| {
        let (key, value) = pair.split_once('=')?;
        (key == name).then(|| value.to_string())
    })
}

/// A GraphQL connection page body.
pub fn connection_page(key: &str, ids: &[u64], has_next_page: bool) -> Value {
    let edges: Vec<Value> = ids
        .iter()
        .map(|id| {
            serde_json::json!({
                "cursor": format!("cursor-{id}"),
                "node": { "id": format!("gid://shopify/Product/{id}") }
            })
        })
        .collect();
    serde_json::json!({
        "data": {
            key: {
                "edges": edges,
                "pageInfo": { "hasNextPage": has_next_page }
            }
        }
    })
}

/// A GraphQL body carrying only a cost report.
pub fn cost_body(actual: f64, currently_available: f64, restore_rate: f64) -> Value {
    serde_json::json!({
        "data": {},
        "extensions": {
            "cost": {
                "requestedQueryCost": actual,
                "actualQueryCost": actual,
                "throttleStatus": {
                    "maximumAvailable": 1000.0,
                    "currentlyAvailable": currently_available,
                    "restoreRate": restore_rate
                }
            }
        }
    })
}
