//! Per-client request accounting for the admin server.
//!
//! The counter is owned by whoever builds the router and handed in as an
//! `Arc<dyn RequestCounter>`, so tests and the daemon each get their own
//! instance.

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

use serde::Serialize;

/// Outcome of counting one request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Admission {
    Allowed,
    /// Over the limit; the window resets after `retry_after`.
    Limited { retry_after: Duration },
}

/// Request counts for one client.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ClientStats {
    pub client: String,
    /// Requests admitted in the current window.
    pub window_requests: u32,
    /// Every request seen since the last reset, admitted or not.
    pub total_requests: u64,
    pub rejected_requests: u64,
}

pub trait RequestCounter: Send + Sync {
    /// Counts one request from `client` and decides whether it may proceed.
    fn admit(&self, client: &str) -> Admission;

    /// Per-client counts, ordered by client.
    fn snapshot(&self) -> Vec<ClientStats>;

    /// Forgets every client.
    fn reset(&self);
}

#[derive(Debug)]
struct Window {
    started: Instant,
    admitted: u32,
    total: u64,
    rejected: u64,
}

/// Allows `limit` requests per client in each fixed `window`.
#[derive(Debug)]
pub struct FixedWindowCounter {
    limit: u32,
    window: Duration,
    clients: Mutex<HashMap<String, Window>>,
}

impl FixedWindowCounter {
    #[must_use]
    pub fn new(limit: u32, window: Duration) -> Self {
        Self {
            limit,
            window,
            clients: Mutex::new(HashMap::new()),
        }
    }

    #[must_use]
    pub const fn limit(&self) -> u32 {
        self.limit
    }

    #[must_use]
    pub const fn window(&self) -> Duration {
        self.window
    }

    /// Same as [`RequestCounter::admit`] against an explicit clock reading.
    pub fn admit_at(&self, client: &str, now: Instant) -> Admission {
        let mut clients = self.lock();
        let entry = clients.entry(client.to_string()).or_insert(Window {
            started: now,
            admitted: 0,
            total: 0,
            rejected: 0,
        });

        let elapsed = now.saturating_duration_since(entry.started);
        if elapsed >= self.window {
            entry.started = now;
            entry.admitted = 0;
        }

        entry.total += 1;
        if entry.admitted < self.limit {
            entry.admitted += 1;
            Admission::Allowed
        } else {
            entry.rejected += 1;
            Admission::Limited {
                retry_after: self
                    .window
                    .saturating_sub(now.saturating_duration_since(entry.started)),
            }
        }
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<String, Window>> {
        // Counts stay usable even if a holder panicked mid-update.
        self.clients.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl RequestCounter for FixedWindowCounter {
    fn admit(&self, client: &str) -> Admission {
        self.admit_at(client, Instant::now())
    }

    fn snapshot(&self) -> Vec<ClientStats> {
        let mut stats: Vec<ClientStats> = self
            .lock()
            .iter()
            .map(|(client, window)| ClientStats {
                client: client.clone(),
                window_requests: window.admitted,
                total_requests: window.total,
                rejected_requests: window.rejected,
            })
            .collect();
        stats.sort_by(|left, right| left.client.cmp(&right.client));
        stats
    }

    fn reset(&self) {
        self.lock().clear();
    }
}
