//! Poll scheduling for the read plan

use std::time::{Duration, Instant};

use super::connection::ConnectionGate;
use super::watchlist::Watchlist;

pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(10);

/// Reads run only while something is watched and a wallet is connected.
pub fn gate_open(list: &Watchlist, connection: &ConnectionGate) -> bool {
    !list.is_empty() && connection.is_connected()
}

/// Permission to dispatch one batch
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollTicket {
    pub id: u64,
}

/// Decides when the full plan is executed.
///
/// At most one batch is in flight at a time. A plan change or a closed
/// gate makes the next eligible tick dispatch immediately.
#[derive(Debug, Clone)]
pub struct PollScheduler {
    interval: Duration,
    last_dispatch: Option<Instant>,
    in_flight: Option<u64>,
    next_id: u64,
    dispatched: u64,
}

impl Default for PollScheduler {
    fn default() -> Self {
        Self::new(DEFAULT_POLL_INTERVAL)
    }
}

impl PollScheduler {
    pub fn new(interval: Duration) -> Self {
        Self {
            interval,
            last_dispatch: None,
            in_flight: None,
            next_id: 0,
            dispatched: 0,
        }
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Evaluate the guard and the interval for this tick.
    pub fn next_dispatch(&mut self, now: Instant, gate_open: bool) -> Option<PollTicket> {
        if !gate_open {
            self.last_dispatch = None;
            return None;
        }
        if self.in_flight.is_some() {
            return None;
        }
        let due = match self.last_dispatch {
            None => true,
            Some(at) => now.saturating_duration_since(at) >= self.interval,
        };
        if !due {
            return None;
        }

        self.next_id += 1;
        self.dispatched += 1;
        self.in_flight = Some(self.next_id);
        self.last_dispatch = Some(now);
        Some(PollTicket { id: self.next_id })
    }

    /// Forget the last dispatch so the next open tick polls right away
    pub fn invalidate(&mut self) {
        self.last_dispatch = None;
    }

    /// Release the in-flight slot. Returns false for a stale or unknown id.
    pub fn resolve(&mut self, id: u64) -> bool {
        if self.in_flight == Some(id) {
            self.in_flight = None;
            true
        } else {
            false
        }
    }

    pub fn is_in_flight(&self) -> bool {
        self.in_flight.is_some()
    }

    /// Total number of batches dispatched this session
    pub fn dispatched(&self) -> u64 {
        self.dispatched
    }

    /// Time left until the next scheduled poll, if one is scheduled
    pub fn due_in(&self, now: Instant) -> Option<Duration> {
        let at = self.last_dispatch?;
        Some(self.interval.saturating_sub(now.saturating_duration_since(at)))
    }
}
