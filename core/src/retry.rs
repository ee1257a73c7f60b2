//! Retry budget and the narrow set of failures worth retrying.
//!
//! Only the statuses an intercepting proxy produces while it waits for an
//! unlock call are retried: 407, 403 and "no response received". Everything
//! else is treated as persistent.

use std::time::Duration;

pub const DEFAULT_BACKOFF: Duration = Duration::from_secs(1);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Extra attempts after the first one. `0` means exactly one attempt.
    pub retries: u32,
    /// Fixed pause between attempts.
    pub backoff: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            retries: 0,
            backoff: DEFAULT_BACKOFF,
        }
    }
}

impl RetryPolicy {
    pub fn new(retries: u32, backoff: Duration) -> Self {
        Self { retries, backoff }
    }

    pub fn max_attempts(&self) -> u32 {
        self.retries.saturating_add(1)
    }

    /// `None` is a failure where no response was received.
    pub fn is_retryable(status: Option<u16>) -> bool {
        matches!(status, None | Some(403) | Some(407))
    }
}
