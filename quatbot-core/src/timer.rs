// ABOUTME: Cancellable, re-armable single-shot deadline used by module timers
// ABOUTME: The room loop sleeps until the earliest deadline and then polls modules

use std::time::Duration;
use tokio::time::Instant;

/// A single-shot timer expressed as a deadline.
///
/// Starting the timer replaces any pending deadline, so re-arming implicitly
/// cancels the previous interval. Expiry is observed by polling
/// [`IdleTimer::poll_expired`]; nothing runs on its own.
#[derive(Debug, Clone, Default)]
pub struct IdleTimer {
    interval: Duration,
    deadline: Option<Instant>,
}

impl IdleTimer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Arm with a new interval, counting from `now`
    pub fn start(&mut self, now: Instant, interval: Duration) {
        self.interval = interval;
        self.deadline = Some(now + interval);
    }

    /// Arm again with the last interval used
    pub fn restart(&mut self, now: Instant) {
        self.deadline = Some(now + self.interval);
    }

    pub fn stop(&mut self) {
        self.deadline = None;
    }

    pub fn is_active(&self) -> bool {
        self.deadline.is_some()
    }

    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Returns true (once) if the deadline has passed; the timer is then idle
    pub fn poll_expired(&mut self, now: Instant) -> bool {
        match self.deadline {
            Some(deadline) if deadline <= now => {
                self.deadline = None;
                true
            }
            _ => false,
        }
    }
}

/// Earliest of two optional deadlines
pub fn earliest(a: Option<Instant>, b: Option<Instant>) -> Option<Instant> {
    match (a, b) {
        (Some(a), Some(b)) => Some(a.min(b)),
        (a, None) => a,
        (None, b) => b,
    }
}
