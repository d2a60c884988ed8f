//! Bounded liveness polling with configurable backoff and cancellation.
use std::{
    sync::{
        Arc,
        atomic::{AtomicBool, Ordering},
    },
    thread,
    time::{Duration, Instant},
};

use serde::Deserialize;
use strum_macros::{AsRefStr, EnumString};
use tracing::debug;

/// Longest single sleep between cancellation checks.
const CANCEL_CHECK_SLICE: Duration = Duration::from_millis(50);

/// How the delay between poll attempts evolves.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, EnumString, AsRefStr)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum BackoffKind {
    /// Same delay every attempt.
    #[default]
    Fixed,
    /// Delay multiplied by a factor every attempt, up to a ceiling.
    Exponential,
}

/// Delay schedule between attempts.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Backoff {
    Fixed,
    Exponential { factor: f64, max_interval: Duration },
}

/// Retry budget for a liveness poll.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PollPolicy {
    /// Number of checks performed after the initial action.
    pub max_attempts: u32,
    /// Delay before the first check.
    pub interval: Duration,
    pub backoff: Backoff,
}

impl Default for PollPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 30,
            interval: Duration::from_secs(1),
            backoff: Backoff::Fixed,
        }
    }
}

impl PollPolicy {
    /// Fixed-interval policy.
    pub fn fixed(max_attempts: u32, interval: Duration) -> Self {
        Self {
            max_attempts,
            interval,
            backoff: Backoff::Fixed,
        }
    }

    /// Delay to wait before check number `attempt` (zero based).
    pub fn delay(&self, attempt: u32) -> Duration {
        match self.backoff {
            Backoff::Fixed => self.interval,
            Backoff::Exponential {
                factor,
                max_interval,
            } => {
                // Factors below 1.0 (or NaN) would shrink or negate the delay.
                let factor = factor.max(1.0);
                let scaled = self.interval.as_secs_f64() * factor.powi(attempt as i32);
                if !scaled.is_finite() || scaled >= max_interval.as_secs_f64() {
                    max_interval
                } else {
                    Duration::from_secs_f64(scaled)
                }
            }
        }
    }

    /// Upper bound on time spent sleeping across all attempts.
    pub fn ceiling(&self) -> Duration {
        (0..self.max_attempts).map(|attempt| self.delay(attempt)).sum()
    }
}

/// Shared flag that lets a caller abort an in-progress poll.
#[derive(Debug, Clone, Default)]
pub struct CancelToken {
    cancelled: Arc<AtomicBool>,
}

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    /// Requests cancellation; every clone observes it.
    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }
}

/// How a poll loop ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PollOutcome {
    /// The condition held after `attempts` checks.
    Satisfied { attempts: u32 },
    /// The budget ran out.
    Exhausted,
    /// The token was cancelled before the condition held.
    Cancelled,
}

/// Sleeps for `duration`, waking early if `cancel` fires. Returns `false` if cancelled.
fn sleep_unless_cancelled(duration: Duration, cancel: &CancelToken) -> bool {
    let deadline = Instant::now() + duration;
    loop {
        if cancel.is_cancelled() {
            return false;
        }
        let now = Instant::now();
        if now >= deadline {
            return true;
        }
        thread::sleep((deadline - now).min(CANCEL_CHECK_SLICE));
    }
}

/// Sleeps according to `policy` and checks `condition` after each sleep.
pub fn poll_until<F>(policy: &PollPolicy, cancel: &CancelToken, mut condition: F) -> PollOutcome
where
    F: FnMut() -> bool,
{
    for attempt in 0..policy.max_attempts {
        if !sleep_unless_cancelled(policy.delay(attempt), cancel) {
            debug!("Poll cancelled after {attempt} attempt(s)");
            return PollOutcome::Cancelled;
        }
        if condition() {
            return PollOutcome::Satisfied {
                attempts: attempt + 1,
            };
        }
        debug!("Poll attempt {} of {} not satisfied", attempt + 1, policy.max_attempts);
    }
    PollOutcome::Exhausted
}
