//! Reconnect backoff policy

use std::time::Duration;

/// Default floor delay before the first reconnect attempt
pub const DEFAULT_BACKOFF_FLOOR: Duration = Duration::from_secs(1);

/// Default ceiling delay between reconnect attempts
pub const DEFAULT_BACKOFF_CEILING: Duration = Duration::from_secs(10);

/// Exponential reconnect backoff
///
/// Starts at the floor, doubles per consecutive failure, and caps at the
/// ceiling. A successful open resets it to the floor.
#[derive(Debug, Clone)]
pub struct Backoff {
    floor: Duration,
    ceiling: Duration,
    current: Duration,
}

impl Backoff {
    pub fn new(floor: Duration, ceiling: Duration) -> Self {
        Self {
            floor,
            ceiling,
            current: floor,
        }
    }

    /// Delay to wait before the next attempt. Doubles the stored delay
    /// for the attempt after, up to the ceiling.
    pub fn next_delay(&mut self) -> Duration {
        let delay = self.current;
        self.current = (self.current * 2).min(self.ceiling);
        delay
    }

    /// Reset to the floor after a successful open
    pub fn reset(&mut self) {
        self.current = self.floor;
    }
}

impl Default for Backoff {
    fn default() -> Self {
        Self::new(DEFAULT_BACKOFF_FLOOR, DEFAULT_BACKOFF_CEILING)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn doubles_to_the_ceiling_then_stays() {
        let mut backoff = Backoff::default();
        let delays: Vec<u64> = (0..6).map(|_| backoff.next_delay().as_secs()).collect();
        assert_eq!(delays, vec![1, 2, 4, 8, 10, 10]);
    }

    #[test]
    fn reset_returns_to_the_floor() {
        let mut backoff = Backoff::default();
        backoff.next_delay();
        backoff.next_delay();
        backoff.next_delay();
        backoff.reset();
        assert_eq!(backoff.next_delay(), Duration::from_secs(1));
        assert_eq!(backoff.next_delay(), Duration::from_secs(2));
    }

    #[test]
    fn respects_custom_bounds() {
        let mut backoff = Backoff::new(Duration::from_millis(50), Duration::from_millis(120));
        assert_eq!(backoff.next_delay(), Duration::from_millis(50));
        assert_eq!(backoff.next_delay(), Duration::from_millis(100));
        assert_eq!(backoff.next_delay(), Duration::from_millis(120));
        assert_eq!(backoff.next_delay(), Duration::from_millis(120));
    }
}
