use std::time::{Duration, Instant};

use crate::error::{Result, SoftstripError};

/// Cooperative wall-clock deadline shared by every stage decoding one file.
///
/// It is only checked at coarse points (per row, per backtracking
/// combination); long single operations are never interrupted.
#[derive(Clone, Copy, Debug)]
pub struct Deadline {
    started: Instant,
    budget: Option<Duration>,
}

impl Deadline {
    /// Start a deadline now.
    pub fn start(budget: Option<Duration>) -> Self {
        Self {
            started: Instant::now(),
            budget,
        }
    }

    /// A deadline that never expires.
    pub fn unbounded() -> Self {
        Self::start(None)
    }

    /// Time spent since the deadline started.
    pub fn elapsed(&self) -> Duration {
        self.started.elapsed()
    }

    /// True once the budget is exceeded.
    pub fn expired(&self) -> bool {
        self.budget.is_some_and(|budget| self.elapsed() > budget)
    }

    /// Fail with `Timeout` once the budget is exceeded.
    pub fn check(&self) -> Result<()> {
        if self.expired() {
            return Err(SoftstripError::Timeout {
                elapsed: self.elapsed(),
            });
        }
        Ok(())
    }
}

impl Default for Deadline {
    fn default() -> Self {
        Self::unbounded()
    }
}
