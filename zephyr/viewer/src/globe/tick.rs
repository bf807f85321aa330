//! Cooperative fixed-period timer. The host calls [`TickLoop::poll`] from its event loop; a
//! tick fires at most once per poll and missed periods are not replayed.

use std::time::{Duration, Instant};

#[derive(Clone, Debug)]
pub struct TickLoop {
    period: Duration,
    next: Option<Instant>,
}

impl TickLoop {
    pub fn new(period: Duration) -> Self {
        Self { period, next: None }
    }

    /// Start (or restart) the loop; the first tick is due immediately.
    pub fn start(&mut self, now: Instant) {
        self.next = Some(now);
    }

    /// Stop the loop, dropping the pending tick.
    pub fn stop(&mut self) {
        self.next = None;
    }

    pub fn is_running(&self) -> bool {
        self.next.is_some()
    }

    pub fn period(&self) -> Duration {
        self.period
    }

    /// True when a tick is due at `now`. The next one is scheduled a full period later.
    pub fn poll(&mut self, now: Instant) -> bool {
        match self.next {
            Some(due) if now >= due => {
                self.next = Some(now + self.period);
                true
            }
            _ => false,
        }
    }

    /// When the host should poll again; `None` while stopped.
    pub fn next_deadline(&self) -> Option<Instant> {
        self.next
    }
}
