//! Per-key log of admitted request times.

use serde::{Deserialize, Serialize};

use super::admission::Admission;
use super::policy::RateLimitPolicy;

/// Arrival times (epoch ms) of admitted requests, oldest first.
///
/// Stored in the shared cache as a plain JSON array.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct WindowLog {
    timestamps: Vec<i64>,
}

impl WindowLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_timestamps(timestamps: Vec<i64>) -> Self {
        Self { timestamps }
    }

    pub fn timestamps(&self) -> &[i64] {
        &self.timestamps
    }

    pub fn len(&self) -> usize {
        self.timestamps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.timestamps.is_empty()
    }

    pub fn oldest(&self) -> Option<i64> {
        self.timestamps.iter().min().copied()
    }

    /// Drop entries at or before `now - window_ms`.
    pub fn prune(&mut self, now: i64, window_ms: i64) {
        let cutoff = now.saturating_sub(window_ms);
        self.timestamps.retain(|&ts| ts > cutoff);
    }

    /// Decide a request arriving at `now`, recording it only if admitted.
    pub fn admit(&mut self, now: i64, policy: &RateLimitPolicy) -> Admission {
        self.prune(now, policy.window_millis());

        let limit = policy.max_requests() as usize;
        if self.timestamps.len() >= limit {
            let oldest = self.oldest().unwrap_or(now);
            return Admission::denied(policy, oldest, now);
        }

        self.timestamps.push(now);
        let oldest = self.oldest().unwrap_or(now);
        Admission::allowed(policy, self.timestamps.len(), oldest, now)
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    pub fn from_json(raw: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(raw)
    }
}
