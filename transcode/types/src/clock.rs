/*!
    Clock and real-time pacing types.
*/

use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::Mutex;

/**
    Trait for pipeline clocks.

    A clock provides a monotonically advancing position and a way to sleep
    against it. Real-time pacing goes through this trait so tests can drive
    time by hand instead of sleeping.
*/
pub trait Clock: Send + Sync {
    /// Get the current position.
    fn position(&self) -> Duration;

    /// Block the calling thread for the given duration.
    fn sleep(&self, duration: Duration);

    /// Reset the clock to a specific position.
    fn reset_to(&self, position: Duration);
}

/**
    Wall-time clock.
*/
pub struct WallClock {
    /// When the clock started (or was last reset).
    start_instant: Mutex<Instant>,
    /// Offset to add to elapsed time (from resets).
    offset: Mutex<Duration>,
}

impl WallClock {
    /**
        Create a new wall clock starting at position zero.
    */
    pub fn new() -> Self {
        Self {
            start_instant: Mutex::new(Instant::now()),
            offset: Mutex::new(Duration::ZERO),
        }
    }
}

impl Default for WallClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for WallClock {
    fn position(&self) -> Duration {
        let start = *self.start_instant.lock();
        *self.offset.lock() + start.elapsed()
    }

    fn sleep(&self, duration: Duration) {
        std::thread::sleep(duration);
    }

    fn reset_to(&self, position: Duration) {
        *self.start_instant.lock() = Instant::now();
        *self.offset.lock() = position;
    }
}

// Verify WallClock is Send + Sync
static_assertions::assert_impl_all!(WallClock: Send, Sync, Clock);

/**
    Paces frame delivery to real time.

    The k-th frame since the pacer was anchored may not be released before
    `anchor + k * frame_duration`, where the anchor is the clock position at
    the first call to [`FramePacer::wait`]. Frames that are already late are
    released immediately.
*/
pub struct FramePacer {
    clock: Arc<dyn Clock>,
    frame_duration: Duration,
    anchor: Option<Duration>,
    frames: u32,
}

impl FramePacer {
    pub fn new(clock: Arc<dyn Clock>, frame_duration: Duration) -> Self {
        Self {
            clock,
            frame_duration,
            anchor: None,
            frames: 0,
        }
    }

    pub fn frame_duration(&self) -> Duration {
        self.frame_duration
    }

    /**
        Block until the deadline of the next frame, returning the time slept.
    */
    pub fn wait(&mut self) -> Duration {
        let now = self.clock.position();
        let anchor = *self.anchor.get_or_insert(now);
        let deadline = anchor + self.frame_duration.saturating_mul(self.frames);
        self.frames = self.frames.saturating_add(1);

        if deadline > now {
            let slept = deadline - now;
            self.clock.sleep(slept);
            slept
        } else {
            Duration::ZERO
        }
    }

    /**
        Change the frame duration for subsequent frames.

        Deadlines already reached are kept; the schedule is re-anchored at the
        deadline of the next frame under the old duration.
    */
    pub fn set_frame_duration(&mut self, frame_duration: Duration) {
        if let Some(anchor) = self.anchor {
            self.anchor = Some(anchor + self.frame_duration.saturating_mul(self.frames));
            self.frames = 0;
        }
        self.frame_duration = frame_duration;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Default)]
    struct ManualClock {
        now: Mutex<Duration>,
        slept: Mutex<Vec<Duration>>,
    }

    impl ManualClock {
        fn advance(&self, by: Duration) {
            *self.now.lock() += by;
        }
    }

    impl Clock for ManualClock {
        fn position(&self) -> Duration {
            *self.now.lock()
        }

        fn sleep(&self, duration: Duration) {
            self.slept.lock().push(duration);
            *self.now.lock() += duration;
        }

        fn reset_to(&self, position: Duration) {
            *self.now.lock() = position;
        }
    }

    fn ms(n: u64) -> Duration {
        Duration::from_millis(n)
    }

    #[test]
    fn first_frame_is_not_delayed() {
        let clock = Arc::new(ManualClock::default());
        let mut pacer = FramePacer::new(clock.clone(), ms(40));
        assert_eq!(pacer.wait(), Duration::ZERO);
        assert!(clock.slept.lock().is_empty());
    }

    #[test]
    fn frames_wait_for_their_deadline() {
        let clock = Arc::new(ManualClock::default());
        let mut pacer = FramePacer::new(clock.clone(), ms(40));
        pacer.wait();
        clock.advance(ms(10));
        assert_eq!(pacer.wait(), ms(30));
        assert_eq!(clock.position(), ms(40));
        assert_eq!(pacer.wait(), ms(40));
        assert_eq!(clock.position(), ms(80));
    }

    #[test]
    fn late_frames_are_released_immediately() {
        let clock = Arc::new(ManualClock::default());
        let mut pacer = FramePacer::new(clock.clone(), ms(40));
        pacer.wait();
        clock.advance(ms(100));
        assert_eq!(pacer.wait(), Duration::ZERO);
        // Third frame is due at 80ms, still behind the clock
        assert_eq!(pacer.wait(), Duration::ZERO);
        // Fourth frame is due at 120ms
        assert_eq!(pacer.wait(), ms(20));
    }

    #[test]
    fn rate_change_reanchors_schedule() {
        let clock = Arc::new(ManualClock::default());
        let mut pacer = FramePacer::new(clock.clone(), ms(40));
        pacer.wait();
        pacer.wait();
        assert_eq!(clock.position(), ms(40));

        pacer.set_frame_duration(ms(20));
        // Next deadline under the old rate was 80ms
        assert_eq!(pacer.wait(), ms(40));
        assert_eq!(pacer.wait(), ms(20));
        assert_eq!(clock.position(), ms(100));
    }

    #[test]
    fn wall_clock_advances() {
        let clock = WallClock::new();
        clock.sleep(ms(20));
        assert!(clock.position() >= ms(15));
    }

    #[test]
    fn wall_clock_reset_to() {
        let clock = WallClock::new();
        clock.reset_to(Duration::from_secs(10));
        let pos = clock.position();
        assert!(pos >= Duration::from_secs(10));
        assert!(pos < Duration::from_millis(10_100));
    }
}
