//! Delays between actions and the clock that waits them out.
//!
//! All waiting in the farmer goes through a [`Sleeper`], so tests can swap in
//! a recording implementation and run the loop without real time passing.

use std::time::Duration;

use async_trait::async_trait;
use rand::Rng;

use crate::config::Bounds;

/// Waits for a given duration.
#[async_trait]
pub trait Sleeper: Send + Sync {
    async fn sleep(&self, duration: Duration);
}

/// [`Sleeper`] backed by the tokio timer.
#[derive(Debug, Clone, Copy, Default)]
pub struct TokioSleeper;

#[async_trait]
impl Sleeper for TokioSleeper {
    async fn sleep(&self, duration: Duration) {
        tokio::time::sleep(duration).await;
    }
}

/// How long to wait at one suspension point.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Delay {
    /// Always the same interval.
    Fixed(Duration),
    /// Whole seconds drawn uniformly from a closed range.
    Jitter(Bounds<u64>),
}

impl Delay {
    /// Jitter between `min` and `max` seconds, both inclusive.
    #[must_use]
    pub const fn secs(min: u64, max: u64) -> Self {
        Self::Jitter(Bounds { min, max })
    }

    /// Draws the next interval.
    pub fn next<R: Rng + ?Sized>(&self, rng: &mut R) -> Duration {
        match *self {
            Self::Fixed(duration) => duration,
            Self::Jitter(bounds) if bounds.min >= bounds.max => Duration::from_secs(bounds.min),
            Self::Jitter(bounds) => Duration::from_secs(rng.gen_range(bounds.min..=bounds.max)),
        }
    }
}

/// Every delay the farmer uses.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Pacing {
    /// Before the first login of a session.
    pub startup: Delay,
    /// Human-like pause around task and play requests.
    pub action: Delay,
    /// Simulated length of one milk game.
    pub play: Delay,
    /// After an error reached the loop.
    pub error_backoff: Delay,
    /// Between login attempts while the server is warming up.
    pub warmup_backoff: Delay,
    /// Between two farming cycles.
    pub cycle: Delay,
}

impl Default for Pacing {
    fn default() -> Self {
        Self {
            startup: Delay::secs(1, 15),
            action: Delay::secs(5, 10),
            play: Delay::secs(30, 40),
            error_backoff: Delay::Fixed(Duration::from_secs(3)),
            warmup_backoff: Delay::Fixed(Duration::from_secs(3)),
            cycle: Delay::secs(1800, 3600),
        }
    }
}

impl Pacing {
    /// Default pacing with the configured pause between cycles.
    #[must_use]
    pub fn with_cycle_delay(cycle_secs: Bounds<u64>) -> Self {
        Self {
            cycle: Delay::Jitter(cycle_secs),
            ..Self::default()
        }
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use std::sync::Mutex;

    use super::*;

    /// Records requested sleeps and returns immediately.
    #[derive(Debug, Default)]
    pub struct RecordingSleeper {
        pub slept: Mutex<Vec<Duration>>,
    }

    impl RecordingSleeper {
        pub fn total(&self) -> Duration {
            self.slept.lock().unwrap().iter().sum()
        }

        pub fn count(&self) -> usize {
            self.slept.lock().unwrap().len()
        }
    }

    #[async_trait]
    impl Sleeper for RecordingSleeper {
        async fn sleep(&self, duration: Duration) {
            self.slept.lock().unwrap().push(duration);
        }
    }
}

#[cfg(test)]
mod tests {
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    use super::*;

    #[test]
    fn test_jitter_stays_in_range() {
        let mut rng = StdRng::seed_from_u64(11);
        let delay = Delay::secs(5, 10);
        for _ in 0..500 {
            let d = delay.next(&mut rng);
            assert!(d >= Duration::from_secs(5) && d <= Duration::from_secs(10));
        }
    }

    #[test]
    fn test_fixed_and_degenerate() {
        let mut rng = StdRng::seed_from_u64(0);
        assert_eq!(
            Delay::Fixed(Duration::from_millis(250)).next(&mut rng),
            Duration::from_millis(250)
        );
        assert_eq!(Delay::secs(4, 4).next(&mut rng), Duration::from_secs(4));
    }

    #[test]
    fn test_default_pacing_uses_cycle_override() {
        let pacing = Pacing::with_cycle_delay(Bounds { min: 1, max: 2 });
        assert_eq!(pacing.cycle, Delay::secs(1, 2));
        assert_eq!(pacing.action, Delay::secs(5, 10));
    }

    #[tokio::test]
    async fn test_recording_sleeper() {
        let sleeper = testing::RecordingSleeper::default();
        sleeper.sleep(Duration::from_secs(2)).await;
        sleeper.sleep(Duration::from_secs(3)).await;
        assert_eq!(sleeper.count(), 2);
        assert_eq!(sleeper.total(), Duration::from_secs(5));
    }
}
