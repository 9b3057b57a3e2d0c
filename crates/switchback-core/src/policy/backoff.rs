//! Capped exponential backoff
//!
//! Delays grow as `base * 2^n` and never exceed `cap` before jitter. Jitter,
//! when enabled, adds up to 25% on top of the capped value. Arithmetic is done
//! on `Duration` and saturates, so sub-millisecond bases and `Duration::MAX`
//! caps are both exact.

use rand::Rng;
use std::time::Duration;

/// Calculate `min(cap, base * 2^exponent)`, optionally jittered
///
/// # Example
///
/// ```rust
/// use std::time::Duration;
/// use switchback_core::policy::calculate_delay;
///
/// let base = Duration::from_millis(500);
/// let cap = Duration::from_secs(15);
///
/// assert_eq!(calculate_delay(base, cap, 0, false), Duration::from_millis(500));
/// assert_eq!(calculate_delay(base, cap, 3, false), Duration::from_millis(4000));
/// assert_eq!(calculate_delay(base, cap, 10, false), cap);
/// ```
pub fn calculate_delay(base: Duration, cap: Duration, exponent: u32, jitter: bool) -> Duration {
    if base.is_zero() {
        return Duration::ZERO;
    }

    let capped = 1u128
        .checked_shl(exponent)
        .and_then(|multiplier| base.as_nanos().checked_mul(multiplier))
        .map_or(Duration::MAX, saturating_from_nanos)
        .min(cap);

    if jitter && !capped.is_zero() {
        let jitter_range = u64::try_from((capped / 4).as_nanos()).unwrap_or(u64::MAX);
        capped.saturating_add(Duration::from_nanos(
            rand::rng().random_range(0..=jitter_range),
        ))
    } else {
        capped
    }
}

fn saturating_from_nanos(nanos: u128) -> Duration {
    const NANOS_PER_SEC: u128 = 1_000_000_000;
    match u64::try_from(nanos / NANOS_PER_SEC) {
        Ok(secs) => Duration::new(secs, (nanos % NANOS_PER_SEC) as u32),
        Err(_) => Duration::MAX,
    }
}

/// Backoff parameters shared by the delaying policies
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Backoff {
    /// Delay for exponent zero
    pub base: Duration,
    /// Upper bound before jitter
    pub cap: Duration,
    /// Add up to 25% random variation
    pub jitter: bool,
}

impl Backoff {
    /// Create a backoff without jitter
    pub fn new(base: Duration, cap: Duration) -> Self {
        Self {
            base,
            cap,
            jitter: false,
        }
    }

    /// A backoff that never waits
    pub fn none() -> Self {
        Self::new(Duration::ZERO, Duration::ZERO)
    }

    /// Enable or disable jitter
    pub fn with_jitter(mut self, jitter: bool) -> Self {
        self.jitter = jitter;
        self
    }

    /// Delay before the retry that follows `retries` earlier retries
    pub fn retry_delay(&self, retries: u32) -> Duration {
        calculate_delay(self.base, self.cap, retries, self.jitter)
    }

    /// Delay before the attempt that follows failover number `failovers + 1`
    ///
    /// The first failover is immediate.
    pub fn failover_delay(&self, failovers: u32) -> Duration {
        if failovers == 0 {
            Duration::ZERO
        } else {
            calculate_delay(self.base, self.cap, failovers, self.jitter)
        }
    }
}

impl Default for Backoff {
    fn default() -> Self {
        Self::none()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exponential_growth() {
        let base = Duration::from_millis(100);
        let cap = Duration::from_secs(60);

        assert_eq!(calculate_delay(base, cap, 0, false), Duration::from_millis(100));
        assert_eq!(calculate_delay(base, cap, 1, false), Duration::from_millis(200));
        assert_eq!(calculate_delay(base, cap, 2, false), Duration::from_millis(400));
        assert_eq!(calculate_delay(base, cap, 5, false), Duration::from_millis(3200));
    }

    #[test]
    fn test_cap_applies() {
        let base = Duration::from_millis(1000);
        let cap = Duration::from_millis(5000);

        assert_eq!(calculate_delay(base, cap, 3, false), cap);
        assert_eq!(calculate_delay(base, cap, 63, false), cap);
        assert_eq!(calculate_delay(base, cap, u32::MAX, false), cap);
    }

    #[test]
    fn test_jitter_bounds() {
        let base = Duration::from_millis(1000);
        let cap = Duration::from_millis(1000);

        for _ in 0..200 {
            let delay = calculate_delay(base, cap, 4, true);
            assert!(delay >= Duration::from_millis(1000));
            assert!(delay <= Duration::from_millis(1250));
        }
    }

    #[test]
    fn test_jitter_no_effect_on_zero_delay() {
        assert_eq!(
            calculate_delay(Duration::ZERO, Duration::from_secs(1), 3, true),
            Duration::ZERO
        );
    }

    #[test]
    fn test_unbounded_cap_with_jitter_saturates() {
        let base = Duration::from_secs(1);

        assert_eq!(calculate_delay(base, Duration::MAX, 70, true), Duration::MAX);
        let delay = calculate_delay(base, Duration::MAX, 3, true);
        assert!(delay >= Duration::from_secs(8));
        assert!(delay <= Duration::from_secs(10));

        let huge_cap = Duration::from_millis(u64::MAX);
        assert!(calculate_delay(base, huge_cap, u32::MAX, true) >= huge_cap);
    }

    #[test]
    fn test_large_exponent_below_cap_is_exact() {
        let base = Duration::from_nanos(1);
        let cap = Duration::from_secs(10);

        assert_eq!(calculate_delay(base, cap, 32, false), Duration::from_nanos(1 << 32));
        assert_eq!(calculate_delay(base, cap, 40, false), cap);
    }

    #[test]
    fn test_sub_millisecond_delays_kept() {
        let base = Duration::from_micros(500);
        let cap = Duration::from_millis(3);

        assert_eq!(calculate_delay(base, cap, 0, false), Duration::from_micros(500));
        assert_eq!(calculate_delay(base, cap, 2, false), Duration::from_millis(2));
        assert_eq!(calculate_delay(base, cap, 3, false), cap);
    }

    #[test]
    fn test_first_failover_is_immediate() {
        let backoff = Backoff::new(Duration::from_millis(1000), Duration::from_millis(10000));

        assert_eq!(backoff.failover_delay(0), Duration::ZERO);
        assert_eq!(backoff.failover_delay(1), Duration::from_millis(2000));
        assert_eq!(backoff.failover_delay(2), Duration::from_millis(4000));
        assert_eq!(backoff.failover_delay(4), Duration::from_millis(10000));
    }

    #[test]
    fn test_retry_delay_starts_at_base() {
        let backoff = Backoff::new(Duration::from_millis(50), Duration::from_millis(300));

        assert_eq!(backoff.retry_delay(0), Duration::from_millis(50));
        assert_eq!(backoff.retry_delay(2), Duration::from_millis(200));
        assert_eq!(backoff.retry_delay(3), Duration::from_millis(300));
    }

    #[test]
    fn test_none_never_waits() {
        let backoff = Backoff::none();
        assert_eq!(backoff.retry_delay(7), Duration::ZERO);
        assert_eq!(backoff.failover_delay(7), Duration::ZERO);
    }
}
