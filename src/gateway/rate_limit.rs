//! Per-principal token bucket: 100 requests / 60s, sliding reset, built
//! around a `HashMap<String, VecDeque<Instant>>` with an evict-then-check-
//! then-push shape, reporting back via `AppError::RateLimited`.

use std::collections::{HashMap, VecDeque};
use std::time::{Duration, Instant};

use tokio::sync::Mutex;

use crate::error::{AppError, AppResult};

const MAX_REQUESTS: usize = 100;
const WINDOW: Duration = Duration::from_secs(60);

pub struct RateLimiter {
    requests: Mutex<HashMap<String, VecDeque<Instant>>>,
}

impl RateLimiter {
    pub fn new() -> Self {
        Self {
            requests: Mutex::new(HashMap::new()),
        }
    }

    /// `Ok(())` if `principal_id` still has budget in the current window;
    /// otherwise `AppError::RateLimited(retry_after_secs)`.
    pub async fn check(&self, principal_id: &str) -> AppResult<()> {
        let mut map = self.requests.lock().await;
        let now = Instant::now();
        let entry = map.entry(principal_id.to_string()).or_default();

        while entry.front().is_some_and(|t| now.duration_since(*t) > WINDOW) {
            entry.pop_front();
        }

        if entry.len() >= MAX_REQUESTS {
            let oldest = *entry.front().unwrap();
            let retry_after = WINDOW.as_secs().saturating_sub(now.duration_since(oldest).as_secs());
            return Err(AppError::RateLimited(retry_after.max(1)));
        }

        entry.push_back(now);
        Ok(())
    }
}

impl Default for RateLimiter {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn allows_up_to_cap_then_blocks() {
        let rl = RateLimiter::new();
        for _ in 0..MAX_REQUESTS {
            rl.check("user-1").await.unwrap();
        }
        let result = rl.check("user-1").await;
        assert!(matches!(result, Err(AppError::RateLimited(_))));
    }

    #[tokio::test]
    async fn separate_principals_have_independent_buckets() {
        let rl = RateLimiter::new();
        for _ in 0..MAX_REQUESTS {
            rl.check("a").await.unwrap();
        }
        rl.check("b").await.unwrap();
    }
}
