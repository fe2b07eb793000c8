use std::time::Duration;

use rand::Rng;

use crate::config::RetryConfig;

/// Delay before retry number `attempt` (zero-based): `initial * 2^attempt`,
/// capped at `max`, plus 0-50% jitter.
pub(crate) fn compute_backoff(config: &RetryConfig, attempt: u32) -> Duration {
    let factor = 1u32.checked_shl(attempt).unwrap_or(u32::MAX);
    let capped = config
        .initial_backoff()
        .saturating_mul(factor)
        .min(config.max_backoff());

    let jitter_range = capped.as_millis() as u64 / 2;
    if jitter_range > 0 {
        let jitter = rand::thread_rng().gen_range(0..=jitter_range);
        capped + Duration::from_millis(jitter)
    } else {
        capped
    }
}
