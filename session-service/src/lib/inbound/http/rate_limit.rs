use std::collections::HashMap;
use std::net::IpAddr;
use std::sync::Mutex;
use std::time::Duration;
use std::time::Instant;

use axum::http::HeaderMap;

/// Sliding-window limiter keyed by client address.
#[derive(Debug)]
pub struct RateLimiter {
    max_attempts: usize,
    window: Duration,
    attempts: Mutex<HashMap<String, Vec<Instant>>>,
}

impl RateLimiter {
    /// A limit of zero disables the limiter.
    pub fn new(max_attempts: usize, window: Duration) -> Self {
        Self {
            max_attempts,
            window,
            attempts: Mutex::new(HashMap::new()),
        }
    }

    /// Record an attempt for `key` and report whether it is within the limit.
    pub fn check(&self, key: &str) -> bool {
        self.check_at(key, Instant::now())
    }

    fn check_at(&self, key: &str, now: Instant) -> bool {
        if self.max_attempts == 0 {
            return true;
        }

        let cutoff = now.checked_sub(self.window);
        let is_live = |instant: &Instant| cutoff.map_or(true, |cutoff| *instant > cutoff);

        let mut attempts = self
            .attempts
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());

        attempts.retain(|_, timestamps| {
            timestamps.retain(is_live);
            !timestamps.is_empty()
        });

        let entry = attempts.entry(key.to_owned()).or_default();
        if entry.len() >= self.max_attempts {
            return false;
        }

        entry.push(now);
        true
    }

    /// Number of keys currently tracked.
    pub fn tracked_keys(&self) -> usize {
        self.attempts
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .len()
    }
}

/// Client address from the first `X-Forwarded-For` hop, then `X-Real-IP`,
/// then the socket peer.
pub fn client_key(headers: &HeaderMap, peer: Option<IpAddr>) -> String {
    for header_name in ["x-forwarded-for", "x-real-ip"] {
        if let Some(value) = headers.get(header_name).and_then(|v| v.to_str().ok()) {
            let first = value.split(',').next().unwrap_or("").trim();
            if !first.is_empty() {
                return first.to_owned();
            }
        }
    }
    peer.map_or_else(|| "unknown".into(), |ip| ip.to_string())
}
