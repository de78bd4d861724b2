use crate::jobs::error_codes::ErrorCode;
use rand::Rng;

/// Delay policy between retry attempts, configured per queue.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Backoff {
    None,
    Fixed { delay_ms: i64 },
    /// base * 2^(attempt_no - 1), capped by RetryConfig::max_delay_ms.
    Exponential { base_ms: i64 },
}

impl Backoff {
    pub fn delay_ms(&self, attempt_no: i32) -> i64 {
        let attempt_no = attempt_no.max(1) as u32;
        match self {
            Backoff::None => 0,
            Backoff::Fixed { delay_ms } => *delay_ms,
            Backoff::Exponential { base_ms } => {
                let pow2 = 1_i64
                    .checked_shl(attempt_no.saturating_sub(1))
                    .unwrap_or(i64::MAX);
                base_ms.saturating_mul(pow2)
            }
        }
    }
}

#[derive(Debug, Clone)]
pub struct RetryConfig {
    pub max_delay_ms: i64,
    pub jitter_pct: f64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_delay_ms: 15 * 60 * 1_000,
            jitter_pct: 0.20,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorClass {
    Retryable,
    NonRetryable,
}

pub fn classify_error(code: &str) -> ErrorClass {
    match ErrorCode::from_str(code) {
        ErrorCode::BadPayload
        | ErrorCode::UnknownJobType
        | ErrorCode::PermanentFailure => ErrorClass::NonRetryable,
        _ => ErrorClass::Retryable,
    }
}

/// Next retry delay for a queue policy: policy delay, capped, with
/// symmetric jitter applied on top.
pub fn next_delay_ms(
    attempt_no: i32,
    backoff: &Backoff,
    cfg: &RetryConfig,
    rng: &mut impl Rng,
) -> i64 {
    let mut delay = backoff.delay_ms(attempt_no);
    if delay > cfg.max_delay_ms {
        delay = cfg.max_delay_ms;
    }
    if delay == 0 {
        return 0;
    }

    let jitter_range = (delay as f64) * cfg.jitter_pct;
    let jitter = if jitter_range > 0.0 {
        rng.gen_range(-jitter_range..=jitter_range)
    } else {
        0.0
    };

    let jittered = (delay as f64 + jitter).round() as i64;
    jittered.clamp(0, cfg.max_delay_ms)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::{rngs::StdRng, SeedableRng};

    fn no_jitter() -> RetryConfig {
        RetryConfig {
            max_delay_ms: 15 * 60 * 1_000,
            jitter_pct: 0.0,
        }
    }

    #[test]
    fn exponential_doubles_per_attempt() {
        let b = Backoff::Exponential { base_ms: 5_000 };
        assert_eq!(b.delay_ms(1), 5_000);
        assert_eq!(b.delay_ms(2), 10_000);
        assert_eq!(b.delay_ms(3), 20_000);
    }

    #[test]
    fn fixed_stays_flat() {
        let b = Backoff::Fixed { delay_ms: 1_000 };
        assert_eq!(b.delay_ms(1), 1_000);
        assert_eq!(b.delay_ms(5), 1_000);
    }

    #[test]
    fn delay_is_capped() {
        let b = Backoff::Exponential { base_ms: 5_000 };
        let mut rng = StdRng::seed_from_u64(7);
        let d = next_delay_ms(60, &b, &no_jitter(), &mut rng);
        assert_eq!(d, 15 * 60 * 1_000);
    }

    #[test]
    fn jitter_stays_within_bounds() {
        let b = Backoff::Exponential { base_ms: 2_000 };
        let cfg = RetryConfig {
            max_delay_ms: 60_000,
            jitter_pct: 0.2,
        };
        let mut rng = StdRng::seed_from_u64(42);
        for attempt in 1..=4 {
            let base = b.delay_ms(attempt).min(cfg.max_delay_ms);
            let d = next_delay_ms(attempt, &b, &cfg, &mut rng);
            let lo = (base as f64 * 0.8).floor() as i64;
            let hi = (base as f64 * 1.2).ceil() as i64;
            assert!(d >= lo && d <= hi, "delay {d} outside [{lo}, {hi}]");
        }
    }

    #[test]
    fn classification_table() {
        assert_eq!(classify_error("TIMEOUT"), ErrorClass::Retryable);
        assert_eq!(classify_error("DELIVERY_FAILED"), ErrorClass::Retryable);
        assert_eq!(classify_error("BAD_PAYLOAD"), ErrorClass::NonRetryable);
        assert_eq!(classify_error("UNKNOWN_JOB_TYPE"), ErrorClass::NonRetryable);
        assert_eq!(classify_error("whatever"), ErrorClass::Retryable);
    }
}
