//! Poll-driven availability state machine.
//!
//! Pure state transitions with the clock injected, so the timing policy is
//! testable without sleeping. The loop in `runner` owns the single
//! process-wide instance.

use std::time::{Duration, Instant};

/// Availability of the bridged device as seen by subscribers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Availability {
    Online,
    Offline,
}

impl Availability {
    /// Wire payload for the availability topic.
    pub fn payload(self) -> &'static str {
        match self {
            Availability::Online => "online",
            Availability::Offline => "offline",
        }
    }
}

/// Tracks the last successful shadow read and decides when the bridge
/// flips between `Online` and `Offline`. A transition fires at most once
/// per edge, so an unchanged state never produces a duplicate publish.
#[derive(Debug)]
pub struct AvailabilityTracker {
    state: Availability,
    last_ok: Instant,
    offline_after: Duration,
}

impl AvailabilityTracker {
    /// Starts `Online` optimistically. `now` also seeds the success timer,
    /// so a device that never answers flips offline `offline_after` after
    /// startup rather than immediately.
    pub fn new(now: Instant, offline_after: Duration) -> Self {
        Self {
            state: Availability::Online,
            last_ok: now,
            offline_after,
        }
    }

    pub fn state(&self) -> Availability {
        self.state
    }

    /// A fetch yielded data. Returns the transition to publish, if any.
    pub fn record_success(&mut self, now: Instant) -> Option<Availability> {
        self.last_ok = now;
        if self.state == Availability::Offline {
            self.state = Availability::Online;
            return Some(Availability::Online);
        }
        None
    }

    /// A fetch yielded nothing. The success timer is left untouched;
    /// offline triggers only once the stale window is exceeded.
    pub fn record_failure(&mut self, now: Instant) -> Option<Availability> {
        if self.state == Availability::Online
            && now.duration_since(self.last_ok) > self.offline_after
        {
            self.state = Availability::Offline;
            return Some(Availability::Offline);
        }
        None
    }

    /// Seconds since the last successful read, for logging.
    pub fn seconds_since_last_success(&self, now: Instant) -> u64 {
        now.duration_since(self.last_ok).as_secs()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const OFFLINE_AFTER: Duration = Duration::from_secs(300);

    fn at(start: Instant, secs: u64) -> Instant {
        start + Duration::from_secs(secs)
    }

    #[test]
    fn test_starts_online() {
        let t0 = Instant::now();
        let tracker = AvailabilityTracker::new(t0, OFFLINE_AFTER);
        assert_eq!(tracker.state(), Availability::Online);
    }

    #[test]
    fn test_failures_before_threshold_do_not_transition() {
        let t0 = Instant::now();
        let mut tracker = AvailabilityTracker::new(t0, OFFLINE_AFTER);

        assert_eq!(tracker.record_failure(at(t0, 100)), None);
        assert_eq!(tracker.record_failure(at(t0, 299)), None);
        assert_eq!(tracker.record_failure(at(t0, 300)), None); // strictly greater-than
        assert_eq!(tracker.state(), Availability::Online);
    }

    #[test]
    fn test_offline_fires_exactly_once_past_threshold() {
        let t0 = Instant::now();
        let mut tracker = AvailabilityTracker::new(t0, OFFLINE_AFTER);

        assert_eq!(
            tracker.record_failure(at(t0, 301)),
            Some(Availability::Offline)
        );
        // Further failures stay silent until a success restores online
        assert_eq!(tracker.record_failure(at(t0, 400)), None);
        assert_eq!(tracker.record_failure(at(t0, 1000)), None);
        assert_eq!(tracker.state(), Availability::Offline);
    }

    #[test]
    fn test_success_restores_online_exactly_once() {
        let t0 = Instant::now();
        let mut tracker = AvailabilityTracker::new(t0, OFFLINE_AFTER);
        tracker.record_failure(at(t0, 301));

        assert_eq!(
            tracker.record_success(at(t0, 350)),
            Some(Availability::Online)
        );
        assert_eq!(tracker.record_success(at(t0, 370)), None);
        assert_eq!(tracker.state(), Availability::Online);
    }

    #[test]
    fn test_success_resets_stale_window() {
        let t0 = Instant::now();
        let mut tracker = AvailabilityTracker::new(t0, OFFLINE_AFTER);

        tracker.record_success(at(t0, 200));
        // 301s after startup but only 101s after the last success
        assert_eq!(tracker.record_failure(at(t0, 301)), None);
        assert_eq!(
            tracker.record_failure(at(t0, 502)),
            Some(Availability::Offline)
        );
    }

    #[test]
    fn test_seconds_since_last_success() {
        let t0 = Instant::now();
        let mut tracker = AvailabilityTracker::new(t0, OFFLINE_AFTER);
        tracker.record_success(at(t0, 10));
        assert_eq!(tracker.seconds_since_last_success(at(t0, 25)), 15);
    }

    #[test]
    fn test_payloads() {
        assert_eq!(Availability::Online.payload(), "online");
        assert_eq!(Availability::Offline.payload(), "offline");
    }
}
