//! Token-bucket admission control.
//!
//! Refill is computed lazily on every [`TokenBucket::consume`] call from the
//! time elapsed since the previous call, so there is no background timer.
//! After a long idle period the balance is capped at `capacity`.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

use tracing::debug;

use crate::config::LimiterConfig;
use crate::error::{GateError, Result};
use crate::utils::clock::{self, Clock};

#[derive(Debug)]
struct BucketState {
    /// Current balance, always within `[0, capacity]`.
    tokens: f64,
    last_refill: Instant,
}

/// Token bucket: `capacity` tokens regenerate continuously over `per`.
///
/// ```
/// use std::time::Duration;
/// use promptgate::limiter::TokenBucket;
///
/// let bucket = TokenBucket::new(10.0, Duration::from_secs(60)).unwrap();
/// assert!(bucket.consume(1.0));
/// ```
#[derive(Debug)]
pub struct TokenBucket {
    capacity: f64,
    per: Duration,
    state: Mutex<BucketState>,
    clock: Arc<dyn Clock>,
}

impl TokenBucket {
    /// Create a full bucket backed by the system clock.
    pub fn new(capacity: f64, per: Duration) -> Result<Self> {
        Self::with_clock(capacity, per, clock::system())
    }

    /// Create a full bucket reading time from `clock`.
    ///
    /// Rejects non-finite or non-positive `capacity` and a zero `per`.
    pub fn with_clock(capacity: f64, per: Duration, clock: Arc<dyn Clock>) -> Result<Self> {
        if !capacity.is_finite() || capacity <= 0.0 {
            return Err(GateError::Config(format!(
                "token bucket capacity must be a positive number, got {capacity}"
            )));
        }
        if per.is_zero() {
            return Err(GateError::Config(
                "token bucket refill window must be greater than zero".into(),
            ));
        }
        let now = clock.now();
        Ok(Self {
            capacity,
            per,
            state: Mutex::new(BucketState {
                tokens: capacity,
                last_refill: now,
            }),
            clock,
        })
    }

    /// Build from the `[limiter]` config section.
    pub fn from_config(config: &LimiterConfig) -> Result<Self> {
        if !config.per_secs.is_finite() || config.per_secs <= 0.0 {
            return Err(GateError::Config(format!(
                "limiter.per_secs must be positive, got {}",
                config.per_secs
            )));
        }
        let per = Duration::try_from_secs_f64(config.per_secs).map_err(|e| {
            GateError::Config(format!(
                "limiter.per_secs out of range ({}): {}",
                config.per_secs, e
            ))
        })?;
        Self::new(config.rate, per)
    }

    /// Try to take `n` tokens.
    ///
    /// Returns `true` and deducts `n` when the refilled balance covers it;
    /// otherwise returns `false` and leaves the balance untouched. Negative
    /// or non-finite requests are always rejected. Never blocks beyond the
    /// bucket's own critical section.
    pub fn consume(&self, n: f64) -> bool {
        if !n.is_finite() || n < 0.0 {
            debug!(wanted = n, "rejected invalid token request");
            return false;
        }
        let mut state = self.lock();
        self.refill(&mut state);
        if state.tokens >= n {
            state.tokens -= n;
            debug!(taken = n, remaining = state.tokens, "admitted");
            true
        } else {
            debug!(wanted = n, available = state.tokens, "rejected");
            false
        }
    }

    /// Current balance after applying pending refill.
    pub fn available(&self) -> f64 {
        let mut state = self.lock();
        self.refill(&mut state);
        state.tokens
    }

    pub fn capacity(&self) -> f64 {
        self.capacity
    }

    pub fn per(&self) -> Duration {
        self.per
    }

    fn refill(&self, state: &mut BucketState) {
        let now = self.clock.now();
        let elapsed = now.saturating_duration_since(state.last_refill).as_secs_f64();
        state.last_refill = now;
        // Multiply before dividing so whole-token refills stay exact.
        let earned = elapsed * self.capacity / self.per.as_secs_f64();
        state.tokens = (state.tokens + earned).min(self.capacity);
    }

    fn lock(&self) -> MutexGuard<'_, BucketState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
