use std::time::Duration;

/// Upper bound on any single retry delay.
pub const BACKOFF_CAP: Duration = Duration::from_secs(30);

/// Delay before retry number `attempt` (zero-based): `min(2^attempt + jitter, cap)`
/// where `jitter` is a uniform fraction of one second.
///
/// The caller supplies the jitter so tests can pin it; production code uses
/// [`jittered_backoff_delay`].
pub fn backoff_delay(attempt: u32, jitter: f64) -> Duration {
    let exponent = attempt.min(16);
    let base = 2f64.powi(exponent as i32);
    let capped = (base + jitter).min(BACKOFF_CAP.as_secs_f64());
    Duration::from_secs_f64(capped)
}

pub fn jittered_backoff_delay(attempt: u32) -> Duration {
    backoff_delay(attempt, fastrand::f64())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn grows_monotonically_without_jitter() {
        let mut previous = Duration::ZERO;
        for attempt in 0..12 {
            let delay = backoff_delay(attempt, 0.0);
            assert!(delay >= previous, "attempt {attempt} shrank the delay");
            previous = delay;
        }
    }

    #[test]
    fn doubles_until_the_cap() {
        assert_eq!(backoff_delay(0, 0.0), Duration::from_secs(1));
        assert_eq!(backoff_delay(1, 0.0), Duration::from_secs(2));
        assert_eq!(backoff_delay(3, 0.0), Duration::from_secs(8));
        assert_eq!(backoff_delay(10, 0.0), BACKOFF_CAP);
    }

    #[test]
    fn jitter_never_breaks_the_cap() {
        for attempt in 0..20 {
            assert!(backoff_delay(attempt, 0.999_999) <= BACKOFF_CAP);
        }
    }
}
