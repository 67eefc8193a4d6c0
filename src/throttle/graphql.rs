//! Cost-aware admission for GraphQL operations.
//!
//! Shopify meters GraphQL with a leaky bucket: every response reports the
//! query's cost and the bucket level under `extensions.cost`. The limiter
//! keeps the most recent report per tenant and holds back new operations
//! while too many are in flight or the bucket is too low.

use std::collections::HashMap;
use std::sync::{Arc, Mutex as StdMutex, PoisonError};
use std::time::Duration;

use futures::future::join_all;
use serde::Deserialize;
use serde_json::Value;
use tokio::sync::{watch, Mutex};
use tokio::time::Instant;

use crate::throttle::TelemetryBuffer;

/// Bucket state reported by Shopify in `extensions.cost.throttleStatus`.
#[derive(Clone, Copy, Debug, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ThrottleStatus {
    /// Bucket capacity.
    pub maximum_available: f64,
    /// Points left in the bucket.
    pub currently_available: f64,
    /// Points restored per second.
    pub restore_rate: f64,
}

/// The `extensions.cost` object of a GraphQL response.
///
/// # Example
///
/// ```rust
/// use serde_json::json;
/// use shopify_gateway::throttle::QueryCost;
///
/// let body = json!({
///     "data": {},
///     "extensions": {
///         "cost": {
///             "requestedQueryCost": 12,
///             "actualQueryCost": 4,
///             "throttleStatus": {
///                 "maximumAvailable": 1000.0,
///                 "currentlyAvailable": 996,
///                 "restoreRate": 50.0
///             }
///         }
///     }
/// });
///
/// let cost = QueryCost::from_response_body(&body).unwrap();
/// assert_eq!(cost.effective_cost(), Some(4.0));
/// assert_eq!(cost.throttle_status.unwrap().currently_available, 996.0);
/// ```
#[derive(Clone, Debug, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QueryCost {
    /// Cost estimated before execution.
    pub requested_query_cost: Option<f64>,
    /// Cost charged after execution.
    pub actual_query_cost: Option<f64>,
    /// Bucket state after the query ran.
    pub throttle_status: Option<ThrottleStatus>,
}

impl QueryCost {
    /// Extracts `extensions.cost` from a response body.
    ///
    /// Returns `None` when the body carries no cost object or it is malformed.
    #[must_use]
    pub fn from_response_body(body: &Value) -> Option<Self> {
        let cost = body.get("extensions")?.get("cost")?;
        serde_json::from_value(cost.clone()).ok()
    }

    /// Actual cost if reported, otherwise the requested cost.
    #[must_use]
    pub fn effective_cost(&self) -> Option<f64> {
        self.actual_query_cost.or(self.requested_query_cost)
    }
}

/// The latest accepted bucket report and when it was observed.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ThrottleSnapshot {
    /// Reported bucket state.
    pub status: ThrottleStatus,
    /// Start instant of the operation that produced the report.
    pub observed_at: Instant,
}

#[derive(Debug)]
struct CostReport {
    cost: QueryCost,
    observed_at: Instant,
}

#[derive(Debug, Default)]
struct InFlight {
    next_id: u64,
    pending: HashMap<u64, watch::Receiver<bool>>,
    settled: Vec<CostReport>,
}

#[derive(Debug)]
struct GraphqlBucket {
    throttle_status: Option<ThrottleSnapshot>,
    concurrency: TelemetryBuffer<u32>,
    query_cost: TelemetryBuffer<f64>,
}

/// Per-tenant GraphQL admission controller.
///
/// An operation is admitted through [`acquire`](Self::acquire), which returns
/// a [`PendingOperation`] handle. The handle is released by
/// [`PendingOperation::settle`] or simply by dropping it, so the in-flight
/// slot is freed on every exit path.
#[derive(Debug)]
pub struct GraphqlLimiter {
    max_concurrent: usize,
    max_cost_per_request: f64,
    gate: Mutex<GraphqlBucket>,
    in_flight: Arc<StdMutex<InFlight>>,
}

impl GraphqlLimiter {
    /// Creates a limiter for one tenant.
    #[must_use]
    pub fn new(max_concurrent: usize, max_cost_per_request: f64, telemetry_window_size: usize) -> Self {
        Self {
            max_concurrent: max_concurrent.max(1),
            max_cost_per_request,
            gate: Mutex::new(GraphqlBucket {
                throttle_status: None,
                concurrency: TelemetryBuffer::new(telemetry_window_size),
                query_cost: TelemetryBuffer::new(telemetry_window_size),
            }),
            in_flight: Arc::new(StdMutex::new(InFlight::default())),
        }
    }

    /// Returns the configured in-flight ceiling.
    #[must_use]
    pub const fn max_concurrent(&self) -> usize {
        self.max_concurrent
    }

    /// Returns the bucket level below which admission waits for a refill.
    #[must_use]
    pub const fn max_cost_per_request(&self) -> f64 {
        self.max_cost_per_request
    }

    /// Waits until a new operation may be sent and registers it.
    ///
    /// The ceiling counts the operation being admitted: once the in-flight
    /// count plus this one reaches `max_concurrent`, this waits for *every*
    /// operation currently in flight, not just one, so the bucket report
    /// used for the refill check reflects all of them.
    pub async fn acquire(&self) -> PendingOperation {
        let mut bucket = self.gate.lock().await;
        self.fold_settled(&mut bucket);

        let in_flight = self.in_flight();
        bucket
            .concurrency
            .push(u32::try_from(in_flight).unwrap_or(u32::MAX));

        if in_flight > 0 && in_flight + 1 >= self.max_concurrent {
            let waiters: Vec<_> = self.lock_in_flight().pending.values().cloned().collect();
            tracing::debug!(
                in_flight,
                max_concurrent = self.max_concurrent,
                "GraphQL concurrency ceiling reached, waiting for in-flight operations"
            );
            join_all(waiters.into_iter().map(|mut done| async move {
                // Err only means the handle is gone, which also frees the slot.
                let _ = done.wait_for(|finished| *finished).await;
            }))
            .await;
            self.fold_settled(&mut bucket);
        }

        if let Some(snapshot) = bucket.throttle_status.as_mut() {
            if let Some(wait) = refill_wait(&snapshot.status, self.max_cost_per_request) {
                tracing::warn!(
                    currently_available = snapshot.status.currently_available,
                    maximum_available = snapshot.status.maximum_available,
                    wait_ms = wait.as_millis(),
                    "GraphQL bucket low, waiting for refill"
                );
                tokio::time::sleep(wait).await;
                snapshot.status.currently_available = snapshot.status.maximum_available;
            }
        }

        self.register()
    }

    /// Number of operations admitted and not yet settled or dropped.
    #[must_use]
    pub fn in_flight(&self) -> usize {
        self.lock_in_flight().pending.len()
    }

    /// Latest accepted bucket report, after folding any settled operations.
    pub async fn throttle_status(&self) -> Option<ThrottleSnapshot> {
        let mut bucket = self.gate.lock().await;
        self.fold_settled(&mut bucket);
        bucket.throttle_status
    }

    /// In-flight counts observed at each admission attempt, oldest first.
    pub async fn concurrency(&self) -> Vec<u32> {
        self.gate.lock().await.concurrency.to_vec()
    }

    /// Costs of accepted reports, oldest first.
    pub async fn query_cost(&self) -> Vec<f64> {
        let mut bucket = self.gate.lock().await;
        self.fold_settled(&mut bucket);
        bucket.query_cost.to_vec()
    }

    fn register(&self) -> PendingOperation {
        let (done, receiver) = watch::channel(false);
        let mut in_flight = self.lock_in_flight();
        let id = in_flight.next_id;
        in_flight.next_id = in_flight.next_id.wrapping_add(1);
        in_flight.pending.insert(id, receiver);

        PendingOperation {
            id,
            started_at: Instant::now(),
            report: None,
            in_flight: Arc::clone(&self.in_flight),
            done,
        }
    }

    fn fold_settled(&self, bucket: &mut GraphqlBucket) {
        let settled = std::mem::take(&mut self.lock_in_flight().settled);

        for report in settled {
            let Some(status) = report.cost.throttle_status else {
                continue;
            };
            let is_newer = bucket
                .throttle_status
                .map_or(true, |current| report.observed_at >= current.observed_at);
            if !is_newer {
                tracing::debug!("Discarding out-of-order GraphQL cost report");
                continue;
            }

            bucket.throttle_status = Some(ThrottleSnapshot {
                status,
                observed_at: report.observed_at,
            });
            if let Some(cost) = report.cost.effective_cost() {
                bucket.query_cost.push(cost);
            }
        }
    }

    fn lock_in_flight(&self) -> std::sync::MutexGuard<'_, InFlight> {
        self.in_flight.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

fn refill_wait(status: &ThrottleStatus, threshold: f64) -> Option<Duration> {
    if status.currently_available >= threshold {
        return None;
    }
    if !status.restore_rate.is_finite() || status.restore_rate <= 0.0 {
        tracing::warn!(
            restore_rate = status.restore_rate,
            "GraphQL bucket reported no usable restore rate, skipping refill wait"
        );
        return None;
    }

    let deficit = (status.maximum_available - status.currently_available).max(0.0);
    Duration::try_from_secs_f64((deficit / status.restore_rate).ceil()).ok()
}

/// Handle for one admitted GraphQL operation.
///
/// Dropping the handle without calling [`settle`](Self::settle) still frees
/// its in-flight slot; it just contributes no cost report.
#[derive(Debug)]
pub struct PendingOperation {
    id: u64,
    started_at: Instant,
    report: Option<QueryCost>,
    in_flight: Arc<StdMutex<InFlight>>,
    done: watch::Sender<bool>,
}

impl PendingOperation {
    /// When the operation was admitted. Used as the observation time of its
    /// cost report.
    #[must_use]
    pub const fn started_at(&self) -> Instant {
        self.started_at
    }

    /// Completes the operation with the cost object from its response, if any.
    pub fn settle(mut self, cost: Option<QueryCost>) {
        self.report = cost;
    }
}

impl Drop for PendingOperation {
    fn drop(&mut self) {
        {
            let mut in_flight = self.in_flight.lock().unwrap_or_else(PoisonError::into_inner);
            in_flight.pending.remove(&self.id);
            if let Some(cost) = self.report.take() {
                in_flight.settled.push(CostReport {
                    cost,
                    observed_at: self.started_at,
                });
            }
        }
        self.done.send_replace(true);
    }
}
