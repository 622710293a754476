use std::future::Future;
use std::time::Duration;

use paceline_contracts::clock::RetryClock;
use serde::{Deserialize, Serialize};

/// Fixed-interval retry bound for the not-ready case.
///
/// `max_attempts` counts calls, so a loop that never succeeds performs
/// `max_attempts` attempts with `max_attempts - 1` sleeps between them.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub interval_ms: u64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 20,
            interval_ms: 500,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RetryOutcome {
    /// An attempt settled.
    Settled { attempts: u32 },
    /// Every attempt reported not-ready.
    Exhausted { attempts: u32 },
}

impl RetryOutcome {
    pub fn attempts(&self) -> u32 {
        match self {
            RetryOutcome::Settled { attempts } | RetryOutcome::Exhausted { attempts } => {
                *attempts
            }
        }
    }

    pub fn is_settled(&self) -> bool {
        matches!(self, RetryOutcome::Settled { .. })
    }
}

impl RetryPolicy {
    pub fn interval(&self) -> Duration {
        Duration::from_millis(self.interval_ms)
    }

    /// Call `attempt` with 1-based attempt numbers until it returns `true` or
    /// the bound is reached, sleeping on `clock` in between.
    pub async fn run<C, F, Fut>(&self, clock: &C, mut attempt: F) -> RetryOutcome
    where
        C: RetryClock + ?Sized,
        F: FnMut(u32) -> Fut,
        Fut: Future<Output = bool>,
    {
        let max = self.max_attempts.max(1);
        let mut made = 0;
        loop {
            made += 1;
            if attempt(made).await {
                return RetryOutcome::Settled { attempts: made };
            }
            if made >= max {
                return RetryOutcome::Exhausted { attempts: made };
            }
            clock.sleep(self.interval()).await;
        }
    }
}
