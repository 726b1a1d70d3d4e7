//! Idle backoff for scheduling workers.
//!
//! A worker that keeps finding nothing to serve (empty queue, or every
//! runway busy) waits progressively longer between polls, up to a cap. Any
//! successful assignment resets it. Wakeups from the queue signal cut the wait
//! short regardless.

use std::time::{Duration, SystemTime, UNIX_EPOCH};

#[derive(Debug, Clone)]
pub struct Backoff {
    base: Duration,
    max: Duration,
    current: Duration,
    jitter_ratio: f64,
}

impl Backoff {
    pub fn new(base: Duration, max: Duration) -> Self {
        let base = base.max(Duration::from_millis(1));
        let max = max.max(base);
        Self {
            base,
            max,
            current: base,
            jitter_ratio: 0.2,
        }
    }

    pub fn reset(&mut self) {
        self.current = self.base;
    }

    /// Delay for this idle round; the next one doubles, capped at `max`.
    pub fn next_delay(&mut self) -> Duration {
        let delay = jittered(self.current, self.jitter_ratio).min(self.max);
        self.current = self.current.saturating_mul(2).min(self.max);
        delay
    }
}

/// Spread idle workers out: up to `ratio` of the delay is added, taken from
/// the sub-second clock.
fn jittered(delay: Duration, ratio: f64) -> Duration {
    let spread = delay.mul_f64(ratio.clamp(0.0, 1.0));
    if spread.is_zero() {
        return delay;
    }
    let nanos = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.subsec_nanos())
        .unwrap_or(0);
    delay + spread.mul_f64(f64::from(nanos) / 1e9)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn first_delay_starts_at_base() {
        let mut backoff = Backoff::new(Duration::from_millis(100), Duration::from_secs(1));
        let delay = backoff.next_delay();
        assert!(delay >= Duration::from_millis(100));
        assert!(delay <= Duration::from_millis(120));
    }

    #[test]
    fn delays_grow_until_capped_and_reset() {
        let mut backoff = Backoff::new(Duration::from_millis(10), Duration::from_millis(30));
        backoff.next_delay();
        let second = backoff.next_delay();
        assert!(second >= Duration::from_millis(20));

        for _ in 0..5 {
            assert!(backoff.next_delay() <= Duration::from_millis(30));
        }

        backoff.reset();
        assert!(backoff.next_delay() <= Duration::from_millis(12));
    }
}
