//! Fixed-window admission for REST requests.

use std::time::Duration;

use tokio::sync::Mutex;
use tokio::time::Instant;

use crate::throttle::TelemetryBuffer;

/// Length of one counting window.
pub const REST_WINDOW: Duration = Duration::from_secs(1);

/// How long after the last admitted request a full window reopens.
///
/// Longer than [`REST_WINDOW`] to absorb clock skew and response latency
/// between this process and the platform's own bucket.
pub const REST_COOLDOWN: Duration = Duration::from_millis(1500);

/// Per-tenant fixed-window request counter.
///
/// [`acquire`](Self::acquire) runs entirely under the limiter's gate, so two
/// concurrent callers can never both observe a free slot. Waiters queue on
/// the gate in arrival order.
#[derive(Debug)]
pub struct RestLimiter {
    max_per_second: u32,
    gate: Mutex<RestWindow>,
}

#[derive(Debug)]
struct RestWindow {
    queries_this_window: u32,
    window_start: Option<Instant>,
    last_request: Option<Instant>,
    queries_per_second: TelemetryBuffer<u32>,
}

impl RestWindow {
    /// Closes the current window (recording its count) and opens a new one
    /// that already contains the request being admitted.
    fn restart(&mut self, at: Instant) {
        if self.window_start.is_some() {
            self.queries_per_second.push(self.queries_this_window);
        }
        self.window_start = Some(at);
        self.queries_this_window = 1;
        self.last_request = Some(at);
    }
}

impl RestLimiter {
    /// Creates a limiter admitting `max_per_second` requests per window.
    #[must_use]
    pub fn new(max_per_second: u32, telemetry_window_size: usize) -> Self {
        Self {
            max_per_second: max_per_second.max(1),
            gate: Mutex::new(RestWindow {
                queries_this_window: 0,
                window_start: None,
                last_request: None,
                queries_per_second: TelemetryBuffer::new(telemetry_window_size),
            }),
        }
    }

    /// Returns the configured ceiling.
    #[must_use]
    pub const fn max_per_second(&self) -> u32 {
        self.max_per_second
    }

    /// Waits until one more request may be sent and records it.
    ///
    /// Returns how long the caller was suspended.
    pub async fn acquire(&self) -> Duration {
        let mut window = self.gate.lock().await;
        let now = Instant::now();
        let window_start = window.window_start;

        match window_start {
            Some(start) if now < start + REST_WINDOW => {
                if window.queries_this_window >= self.max_per_second {
                    let resume_at = window.last_request.unwrap_or(now) + REST_COOLDOWN;
                    tracing::debug!(
                        queries = window.queries_this_window,
                        wait_ms = resume_at.saturating_duration_since(now).as_millis(),
                        "REST window full, suspending"
                    );
                    tokio::time::sleep_until(resume_at).await;

                    let resumed = Instant::now();
                    window.restart(resumed);
                    return resumed.saturating_duration_since(now);
                }
                window.queries_this_window += 1;
                window.last_request = Some(now);
            }
            _ => window.restart(now),
        }

        Duration::ZERO
    }

    /// Completed-window counts, oldest first.
    pub async fn queries_per_second(&self) -> Vec<u32> {
        self.gate.lock().await.queries_per_second.to_vec()
    }

    /// Requests admitted in the current window.
    pub async fn queries_this_window(&self) -> u32 {
        self.gate.lock().await.queries_this_window
    }
}
