//! Fixed-window rate limiting for publish operations
//!
//! A scoped limiter value owned by the service facade, not process-global
//! state. Counters live per identifier (`user:<id>` or `ip:<addr>`) in fixed
//! windows; expired windows are dropped by an explicit [`RateLimiter::evict_expired`]
//! call from whoever owns the limiter, so there is no background task and no
//! hidden timer.

use std::collections::HashMap;
use std::sync::Mutex;

use crate::config::RateLimitConfig;
use crate::error::{CrosscastError, Result};

#[derive(Debug, Clone, Copy)]
struct Window {
    started_at: i64,
    count: u32,
}

pub struct RateLimiter {
    max_per_window: u32,
    window_secs: u64,
    windows: Mutex<HashMap<String, Window>>,
}

impl RateLimiter {
    pub fn new(config: &RateLimitConfig) -> Self {
        Self {
            max_per_window: config.max_per_window,
            window_secs: config.window_secs,
            windows: Mutex::new(HashMap::new()),
        }
    }

    /// Count one operation against the identifier's current window.
    ///
    /// Returns `RateLimited` with the seconds remaining in the window once
    /// the cap is reached. A rejected call does not consume from the window.
    pub fn check_and_record(&self, identifier: &str, now: i64) -> Result<()> {
        let mut windows = match self.windows.lock() {
            Ok(guard) => guard,
            // A poisoned lock only means another caller panicked mid-check;
            // the map itself is still valid.
            Err(poisoned) => poisoned.into_inner(),
        };

        let window = windows.entry(identifier.to_string()).or_insert(Window {
            started_at: now,
            count: 0,
        });

        if now - window.started_at >= self.window_secs as i64 {
            window.started_at = now;
            window.count = 0;
        }

        if window.count >= self.max_per_window {
            let elapsed = (now - window.started_at).max(0) as u64;
            return Err(CrosscastError::RateLimited {
                identifier: identifier.to_string(),
                retry_after_secs: self.window_secs.saturating_sub(elapsed),
            });
        }

        window.count += 1;
        Ok(())
    }

    /// Drop windows that ended before `now`. Callers decide when to sweep.
    pub fn evict_expired(&self, now: i64) {
        let mut windows = match self.windows.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        let window_secs = self.window_secs as i64;
        windows.retain(|_, w| now - w.started_at < window_secs);
    }

    /// Number of identifiers currently tracked.
    pub fn tracked_identifiers(&self) -> usize {
        match self.windows.lock() {
            Ok(guard) => guard.len(),
            Err(poisoned) => poisoned.into_inner().len(),
        }
    }
}

/// Identifier for a user-scoped limit.
pub fn user_identifier(user_id: &str) -> String {
    format!("user:{}", user_id)
}

/// Identifier for an address-scoped limit.
pub fn ip_identifier(addr: &str) -> String {
    format!("ip:{}", addr)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn limiter(max: u32, window: u64) -> RateLimiter {
        RateLimiter::new(&RateLimitConfig {
            max_per_window: max,
            window_secs: window,
        })
    }

    #[test]
    fn allows_up_to_cap_within_window() {
        let limiter = limiter(3, 60);
        let id = user_identifier("u1");

        assert!(limiter.check_and_record(&id, 1000).is_ok());
        assert!(limiter.check_and_record(&id, 1010).is_ok());
        assert!(limiter.check_and_record(&id, 1020).is_ok());

        let err = limiter.check_and_record(&id, 1030).unwrap_err();
        match err {
            CrosscastError::RateLimited { retry_after_secs, .. } => {
                assert_eq!(retry_after_secs, 30);
            }
            other => panic!("expected RateLimited, got {:?}", other),
        }
    }

    #[test]
    fn window_resets_after_expiry() {
        let limiter = limiter(1, 60);
        let id = user_identifier("u1");

        assert!(limiter.check_and_record(&id, 1000).is_ok());
        assert!(limiter.check_and_record(&id, 1030).is_err());
        // 60s after window start, the next call opens a fresh window
        assert!(limiter.check_and_record(&id, 1060).is_ok());
    }

    #[test]
    fn identifiers_are_independent() {
        let limiter = limiter(1, 60);

        assert!(limiter.check_and_record(&user_identifier("u1"), 1000).is_ok());
        assert!(limiter.check_and_record(&user_identifier("u2"), 1000).is_ok());
        assert!(limiter.check_and_record(&ip_identifier("10.0.0.1"), 1000).is_ok());
        assert!(limiter.check_and_record(&user_identifier("u1"), 1001).is_err());
    }

    #[test]
    fn evict_expired_drops_only_finished_windows() {
        let limiter = limiter(5, 60);

        limiter.check_and_record(&user_identifier("old"), 1000).unwrap();
        limiter.check_and_record(&user_identifier("fresh"), 1050).unwrap();
        assert_eq!(limiter.tracked_identifiers(), 2);

        limiter.evict_expired(1070);
        assert_eq!(limiter.tracked_identifiers(), 1);
    }

    #[test]
    fn rejected_calls_do_not_extend_the_window() {
        let limiter = limiter(1, 60);
        let id = user_identifier("u1");

        assert!(limiter.check_and_record(&id, 1000).is_ok());
        for t in [1010, 1020, 1059] {
            assert!(limiter.check_and_record(&id, t).is_err());
        }
        assert!(limiter.check_and_record(&id, 1060).is_ok());
    }
}
