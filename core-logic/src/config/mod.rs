use chrono::{DateTime, Utc};
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Inclusive millisecond window a randomized delay is drawn from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DelayRange {
    pub min_ms: u64,
    pub max_ms: u64,
}

impl Default for DelayRange {
    fn default() -> Self {
        Self {
            min_ms: 3000,
            max_ms: 5000,
        }
    }
}

impl DelayRange {
    pub const fn new(min_ms: u64, max_ms: u64) -> Self {
        Self { min_ms, max_ms }
    }

    pub const fn fixed(ms: u64) -> Self {
        Self::new(ms, ms)
    }

    pub const fn zero() -> Self {
        Self::fixed(0)
    }

    pub fn is_zero(&self) -> bool {
        self.min_ms == 0 && self.max_ms == 0
    }

    /// Draws a delay uniformly from the window. A reversed window is read as
    /// `max..=min` rather than rejected.
    pub fn sample(&self) -> Duration {
        let (lo, hi) = if self.min_ms <= self.max_ms {
            (self.min_ms, self.max_ms)
        } else {
            (self.max_ms, self.min_ms)
        };
        if lo == hi {
            return Duration::from_millis(lo);
        }
        Duration::from_millis(rand::thread_rng().gen_range(lo..=hi))
    }
}

/// Bounded retry: `attempts` tries in total, `delay` slept between them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryPolicy {
    pub attempts: u32,
    pub delay: DelayRange,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            attempts: 3,
            delay: DelayRange::default(),
        }
    }
}

impl RetryPolicy {
    pub fn new(attempts: u32, delay: DelayRange) -> Self {
        Self { attempts, delay }
    }

    pub fn without_delay(mut self) -> Self {
        self.delay = DelayRange::zero();
        self
    }
}

/// What the scheduler does once every batch of a cycle has finished.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum CyclePolicy {
    /// Start the next sweep straight away.
    Immediate,
    /// Sleep a fixed number of seconds between sweeps.
    FixedDelay { secs: u64 },
    /// Sleep until the earliest farming end time reported during the sweep.
    /// Falls back to `fallback_secs` when no end time lies in the future.
    NextEligible {
        #[serde(default = "default_fallback_secs")]
        fallback_secs: u64,
        #[serde(default)]
        max_wait_secs: Option<u64>,
    },
}

fn default_fallback_secs() -> u64 {
    600
}

impl Default for CyclePolicy {
    fn default() -> Self {
        CyclePolicy::NextEligible {
            fallback_secs: default_fallback_secs(),
            max_wait_secs: None,
        }
    }
}

impl CyclePolicy {
    /// Delay before the next cycle given the earliest farming end time seen
    /// in the cycle that just finished.
    pub fn next_delay(
        &self,
        earliest_farming_end: Option<DateTime<Utc>>,
        now: DateTime<Utc>,
    ) -> Duration {
        match *self {
            CyclePolicy::Immediate => Duration::ZERO,
            CyclePolicy::FixedDelay { secs } => Duration::from_secs(secs),
            CyclePolicy::NextEligible {
                fallback_secs,
                max_wait_secs,
            } => {
                let wait = earliest_farming_end
                    .and_then(|end| (end - now).to_std().ok())
                    .filter(|d| !d.is_zero())
                    .unwrap_or(Duration::from_secs(fallback_secs));
                match max_wait_secs {
                    Some(cap) => wait.min(Duration::from_secs(cap)),
                    None => wait,
                }
            }
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SchedulerConfig {
    /// Accounts processed concurrently per batch.
    #[serde(default = "default_concurrency")]
    pub concurrency: usize,
    #[serde(default)]
    pub cycle: CyclePolicy,
    /// Stop after this many full sweeps. `None` runs until interrupted.
    #[serde(default)]
    pub max_cycles: Option<u64>,
}

fn default_concurrency() -> usize {
    10
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            concurrency: default_concurrency(),
            cycle: CyclePolicy::default(),
            max_cycles: None,
        }
    }
}
