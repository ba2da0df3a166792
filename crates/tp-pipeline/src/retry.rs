//! Counter for the test-run-and-fix loop.

/// Fix-attempt bookkeeping for one pipeline's test loop.
///
/// `attempt` counts fix cycles already spent; the first test run is free.
/// With `max_attempts = 3` a ticket gets up to three fix cycles, so tests
/// run at most four times.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryState {
    pub attempt: u32,
    pub max_attempts: u32,
    pub last_error: Option<String>,
}

impl RetryState {
    pub fn new(max_attempts: u32) -> Self {
        Self {
            attempt: 0,
            max_attempts,
            last_error: None,
        }
    }

    /// Remember the output of a failed test run.
    pub fn record_failure(&mut self, output: impl Into<String>) {
        self.last_error = Some(output.into());
    }

    /// Whether another fix cycle is permitted.
    pub fn can_retry(&self) -> bool {
        self.attempt < self.max_attempts
    }

    /// Count one completed fix cycle.
    pub fn advance(&mut self) {
        self.attempt += 1;
    }
}
