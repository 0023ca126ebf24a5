/// Retries a file may accumulate without an in-order acknowledgment before
/// its next failure abandons it.
pub const DEFAULT_MAX_RETRIES: u32 = 4;

/// What to do with a file that still needs attempts after one settled.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryDecision {
    /// Queue it for another attempt.
    Requeue,
    /// Mark it `Error`; it is never scheduled again.
    Abandon,
}

/// Bounded retry policy.
///
/// `retries` counts failures since the last in-order chunk acknowledgment.
/// With `max_retries = 4` the fifth consecutive failure abandons the file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    max_retries: u32,
}

impl RetryPolicy {
    pub fn new(max_retries: u32) -> Self {
        Self { max_retries }
    }

    pub fn max_retries(&self) -> u32 {
        self.max_retries
    }

    pub fn decide(&self, retries: u32) -> RetryDecision {
        if retries > self.max_retries {
            RetryDecision::Abandon
        } else {
            RetryDecision::Requeue
        }
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_RETRIES)
    }
}
