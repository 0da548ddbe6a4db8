//! Countdown clocks driven by the host heartbeat
//!
//! A clock is created when its phase begins and lives in a slot on the
//! owning session; taking the slot (`Option::take`) is the cancellation
//! token, so a cancelled clock can never observe another tick. The
//! battle manager drives every live clock once per heartbeat.
//!
//! Warning emission is guarded by a last-warned watermark so a value fires
//! at most once even if the heartbeat delivers the same remaining second
//! twice.

use std::time::{Duration, Instant};

/// Round a remaining window up to whole seconds, so a display never shows
/// zero while time is actually left.
fn ceil_secs(remaining: Duration) -> u32 {
    let mut secs = remaining.as_secs();
    if remaining.subsec_nanos() > 0 {
        secs += 1;
    }
    secs.min(u32::MAX as u64) as u32
}

/// Result of advancing a clock by one heartbeat.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClockTick {
    /// Still counting down.
    Running { remaining_secs: u32 },
    /// The window is exhausted; the owning phase must transition.
    Expired,
}

/// Countdown over the encounter time limit.
#[derive(Debug, Clone)]
pub struct EncounterClock {
    time_limit: Duration,
    started_at: Instant,
    last_warned: Option<u32>,
}

impl EncounterClock {
    pub fn start(time_limit: Duration, now: Instant) -> Self {
        Self {
            time_limit,
            started_at: now,
            last_warned: None,
        }
    }

    /// Whole seconds left on the clock (rounded up), clamped at zero.
    pub fn remaining_secs(&self, now: Instant) -> u32 {
        let elapsed = now.saturating_duration_since(self.started_at);
        ceil_secs(self.time_limit.saturating_sub(elapsed))
    }

    pub fn tick(&mut self, now: Instant) -> ClockTick {
        let elapsed = now.saturating_duration_since(self.started_at);
        if elapsed >= self.time_limit {
            ClockTick::Expired
        } else {
            ClockTick::Running {
                remaining_secs: self.remaining_secs(now),
            }
        }
    }

    /// Arm the warning for this exact remaining-second value.
    ///
    /// Returns `true` the first time a value is seen; a repeated callback
    /// for the same second is swallowed.
    pub fn check_warning(&mut self, remaining_secs: u32) -> bool {
        if self.last_warned == Some(remaining_secs) {
            return false;
        }
        self.last_warned = Some(remaining_secs);
        true
    }
}

/// Countdown over the post-victory collection window.
///
/// Measured independently from the encounter clock: it starts fresh when
/// the collection phase begins.
#[derive(Debug, Clone)]
pub struct CollectionClock {
    duration: Duration,
    started_at: Instant,
    last_warned: Option<u32>,
}

/// Seconds before expiry at which the collection countdown is announced.
pub const COLLECTION_COUNTDOWN_SECS: u32 = 10;

impl CollectionClock {
    pub fn start(duration: Duration, now: Instant) -> Self {
        Self {
            duration,
            started_at: now,
            last_warned: None,
        }
    }

    pub fn remaining_secs(&self, now: Instant) -> u32 {
        let elapsed = now.saturating_duration_since(self.started_at);
        ceil_secs(self.duration.saturating_sub(elapsed))
    }

    pub fn tick(&mut self, now: Instant) -> ClockTick {
        let elapsed = now.saturating_duration_since(self.started_at);
        if elapsed >= self.duration {
            ClockTick::Expired
        } else {
            ClockTick::Running {
                remaining_secs: self.remaining_secs(now),
            }
        }
    }

    /// Countdown announcement for the final seconds, at most once per value.
    pub fn check_warning(&mut self, remaining_secs: u32) -> bool {
        if remaining_secs > COLLECTION_COUNTDOWN_SECS || self.last_warned == Some(remaining_secs) {
            return false;
        }
        self.last_warned = Some(remaining_secs);
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_encounter_clock_counts_down() {
        let start = Instant::now();
        let mut clock = EncounterClock::start(Duration::from_secs(300), start);

        assert_eq!(
            clock.tick(start),
            ClockTick::Running { remaining_secs: 300 }
        );

        let later = start + Duration::from_secs(42);
        assert_eq!(
            clock.tick(later),
            ClockTick::Running { remaining_secs: 258 }
        );
    }

    #[test]
    fn test_encounter_clock_expires_at_limit() {
        let start = Instant::now();
        let mut clock = EncounterClock::start(Duration::from_secs(120), start);

        let boundary = start + Duration::from_secs(120);
        assert_eq!(clock.tick(boundary), ClockTick::Expired);
        assert_eq!(clock.remaining_secs(boundary), 0);

        // Still expired on a later (stale, re-queued) tick
        assert_eq!(clock.tick(boundary + Duration::from_secs(5)), ClockTick::Expired);
    }

    #[test]
    fn test_warning_fires_once_per_second_value() {
        let start = Instant::now();
        let mut clock = EncounterClock::start(Duration::from_secs(300), start);

        assert!(clock.check_warning(60));
        // Duplicate callback for the same remaining second is swallowed
        assert!(!clock.check_warning(60));
        assert!(clock.check_warning(30));
    }

    #[test]
    fn test_collection_clock_countdown_window() {
        let start = Instant::now();
        let mut clock = CollectionClock::start(Duration::from_secs(30), start);

        // Outside the announcement window
        assert!(!clock.check_warning(25));

        assert!(clock.check_warning(10));
        assert!(!clock.check_warning(10));
        assert!(clock.check_warning(9));

        let done = start + Duration::from_secs(30);
        assert_eq!(clock.tick(done), ClockTick::Expired);
    }
}
