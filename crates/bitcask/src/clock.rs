use std::time::{SystemTime, UNIX_EPOCH};

/// Per-handle monotonic microsecond clock.
///
/// Timestamps order records and name data files, so they must be strictly
/// increasing within a handle even when the wall clock stalls or steps
/// backwards. At open the clock is seeded past every file id and record
/// timestamp observed on disk, so a wall-clock regression across restarts
/// cannot produce a write that compares older than an existing record.
#[derive(Debug)]
pub(crate) struct MicroClock {
    last: u64,
}

impl MicroClock {
    pub fn new() -> Self {
        Self { last: 0 }
    }

    /// Raises the floor to `tstamp`; the next tick will exceed it.
    pub fn advance_past(&mut self, tstamp: u64) {
        self.last = self.last.max(tstamp);
    }

    /// Returns the next timestamp: wall-clock microseconds, or the
    /// previous tick plus one, whichever is greater.
    pub fn tick(&mut self) -> u64 {
        let now = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_micros() as u64)
            .unwrap_or(0);
        self.last = now.max(self.last + 1);
        self.last
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ticks_are_strictly_increasing() {
        let mut clock = MicroClock::new();
        let mut prev = clock.tick();
        for _ in 0..10_000 {
            let next = clock.tick();
            assert!(next > prev);
            prev = next;
        }
    }

    #[test]
    fn advance_past_raises_the_floor() {
        let mut clock = MicroClock::new();
        let far_future = u64::MAX / 2;
        clock.advance_past(far_future);
        assert!(clock.tick() > far_future);
    }
}
