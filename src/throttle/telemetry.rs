//! Rolling telemetry windows for admission-control diagnostics.

use std::collections::VecDeque;

use chrono::{DateTime, Utc};
use serde::Serialize;

/// Fixed-capacity FIFO of recent samples.
///
/// Pushing into a full buffer evicts the oldest sample first, so the buffer
/// never holds more than `capacity` entries.
///
/// # Example
///
/// ```rust
/// use shopify_gateway::throttle::TelemetryBuffer;
///
/// let mut buffer = TelemetryBuffer::new(2);
/// buffer.push(1u32);
/// buffer.push(2);
/// buffer.push(3);
///
/// assert_eq!(buffer.to_vec(), vec![2, 3]);
/// assert_eq!(buffer.average(), Some(2.5));
/// ```
#[derive(Clone, Debug)]
pub struct TelemetryBuffer<T> {
    samples: VecDeque<T>,
    capacity: usize,
}

impl<T: Copy + Into<f64>> TelemetryBuffer<T> {
    /// Creates an empty buffer. A capacity of zero is treated as one.
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            samples: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    /// Appends a sample, evicting the oldest one when full.
    pub fn push(&mut self, sample: T) {
        if self.samples.len() == self.capacity {
            self.samples.pop_front();
        }
        self.samples.push_back(sample);
    }

    /// Number of samples currently held.
    #[must_use]
    pub fn len(&self) -> usize {
        self.samples.len()
    }

    /// Returns `true` if no sample has been recorded yet.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// Maximum number of samples held.
    #[must_use]
    pub const fn capacity(&self) -> usize {
        self.capacity
    }

    /// Most recently pushed sample.
    #[must_use]
    pub fn latest(&self) -> Option<T> {
        self.samples.back().copied()
    }

    /// Arithmetic mean of the held samples.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn average(&self) -> Option<f64> {
        if self.samples.is_empty() {
            return None;
        }
        let sum: f64 = self.samples.iter().map(|s| (*s).into()).sum();
        Some(sum / self.samples.len() as f64)
    }

    /// Samples from oldest to newest.
    pub fn iter(&self) -> impl Iterator<Item = T> + '_ {
        self.samples.iter().copied()
    }

    /// Copies the samples out, oldest first.
    #[must_use]
    pub fn to_vec(&self) -> Vec<T> {
        self.samples.iter().copied().collect()
    }
}

/// Point-in-time copy of one tenant's telemetry windows.
#[derive(Clone, Debug, Serialize)]
pub struct TelemetrySnapshot {
    /// When the snapshot was taken.
    pub captured_at: DateTime<Utc>,
    /// REST requests counted in each completed window, oldest first.
    pub queries_per_second: Vec<u32>,
    /// GraphQL in-flight count observed at each admission attempt.
    pub concurrency: Vec<u32>,
    /// Reported cost of each settled GraphQL operation.
    pub query_cost: Vec<f64>,
}

impl TelemetrySnapshot {
    /// Mean REST requests per completed window.
    #[must_use]
    pub fn average_queries_per_second(&self) -> Option<f64> {
        mean(self.queries_per_second.iter().map(|v| f64::from(*v)))
    }

    /// Mean GraphQL in-flight count at admission.
    #[must_use]
    pub fn average_concurrency(&self) -> Option<f64> {
        mean(self.concurrency.iter().map(|v| f64::from(*v)))
    }

    /// Mean GraphQL query cost.
    #[must_use]
    pub fn average_query_cost(&self) -> Option<f64> {
        mean(self.query_cost.iter().copied())
    }
}

#[allow(clippy::cast_precision_loss)]
fn mean(values: impl ExactSizeIterator<Item = f64>) -> Option<f64> {
    let count = values.len();
    if count == 0 {
        return None;
    }
    Some(values.sum::<f64>() / count as f64)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_buffer_never_exceeds_capacity() {
        let mut buffer = TelemetryBuffer::new(100);
        for sample in 0..250u32 {
            buffer.push(sample);
            assert!(buffer.len() <= 100);
        }
        assert_eq!(buffer.len(), 100);
        assert_eq!(buffer.capacity(), 100);
    }

    #[test]
    fn test_capacity_plus_one_evicts_oldest_keeps_newest() {
        let mut buffer = TelemetryBuffer::new(3);
        buffer.push(10u32);
        buffer.push(20);
        buffer.push(30);
        buffer.push(40);

        let samples = buffer.to_vec();
        assert!(!samples.contains(&10));
        assert_eq!(samples, vec![20, 30, 40]);
        assert_eq!(buffer.latest(), Some(40));
    }

    #[test]
    fn test_zero_capacity_is_clamped() {
        let mut buffer = TelemetryBuffer::new(0);
        buffer.push(1.5f64);
        buffer.push(2.5);
        assert_eq!(buffer.capacity(), 1);
        assert_eq!(buffer.to_vec(), vec![2.5]);
    }

    #[test]
    fn test_average_of_empty_buffer_is_none() {
        let buffer: TelemetryBuffer<f64> = TelemetryBuffer::new(4);
        assert!(buffer.is_empty());
        assert_eq!(buffer.average(), None);
    }

    #[test]
    fn test_snapshot_averages() {
        let snapshot = TelemetrySnapshot {
            captured_at: Utc::now(),
            queries_per_second: vec![2, 2, 1],
            concurrency: vec![],
            query_cost: vec![10.0, 30.0],
        };

        let qps = snapshot.average_queries_per_second().unwrap();
        assert!((qps - 5.0 / 3.0).abs() < 1e-9);
        assert_eq!(snapshot.average_concurrency(), None);
        assert_eq!(snapshot.average_query_cost(), Some(20.0));
    }

    #[test]
    fn test_snapshot_serializes_for_diagnostics() {
        let snapshot = TelemetrySnapshot {
            captured_at: Utc::now(),
            queries_per_second: vec![2],
            concurrency: vec![0, 1],
            query_cost: vec![12.0],
        };
        let json = serde_json::to_value(&snapshot).unwrap();
        assert_eq!(json["queries_per_second"], serde_json::json!([2]));
        assert_eq!(json["concurrency"], serde_json::json!([0, 1]));
        assert!(json["captured_at"].is_string());
    }
}
