//! Exponential backoff with jitter, shared by retries and health probes.

use std::time::Duration;

use rand::Rng;

/// Delay before retrying after the `attempt`-th failure.
///
/// `attempt` counts from 1; attempt 0 never waits. The delay doubles per
/// attempt from `base_ms`, is capped at `max_ms` and gets up to 10% jitter.
pub fn calculate_backoff(attempt: u32, base_ms: u64, max_ms: u64) -> Duration {
    let Some(doublings) = attempt.checked_sub(1) else {
        return Duration::ZERO;
    };

    let factor = 1u64.checked_shl(doublings).unwrap_or(u64::MAX);
    let capped = base_ms.saturating_mul(factor).min(max_ms);
    let jitter = rand::thread_rng().gen_range(0..=capped / 10);

    Duration::from_millis(capped + jitter)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn within(d: Duration, low: u128, high: u128) -> bool {
        (low..=high).contains(&d.as_millis())
    }

    #[test]
    fn test_doubles_per_attempt() {
        assert!(within(calculate_backoff(1, 100, 2000), 100, 110));
        assert!(within(calculate_backoff(2, 100, 2000), 200, 220));
        assert!(within(calculate_backoff(3, 100, 2000), 400, 440));
    }

    #[test]
    fn test_capped_at_max() {
        assert!(within(calculate_backoff(10, 100, 1000), 1000, 1100));
        assert!(within(calculate_backoff(u32::MAX, 100, 5000), 5000, 5500));
    }

    #[test]
    fn test_first_attempt_does_not_wait() {
        assert_eq!(calculate_backoff(0, 100, 1000), Duration::ZERO);
    }

    #[test]
    fn test_tiny_delays_have_no_jitter() {
        assert_eq!(calculate_backoff(1, 5, 100), Duration::from_millis(5));
    }
}
