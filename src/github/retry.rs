//! Transport retry with exponential backoff.

use crate::error::PlatformError;
use std::time::Duration;

/// Maximum backoff between attempts
const MAX_BACKOFF: Duration = Duration::from_secs(60);

/// Retry an async platform call with exponential backoff
///
/// Only failures the platform certainly did not apply are retried (see
/// [`PlatformError::is_safe_to_resend`]), so a create or upload is never sent
/// again after the platform may have committed it. Delays are `base_delay`,
/// `2 * base_delay`, `4 * base_delay`, ... capped at one minute, or the
/// server's retry-after for rate limits.
///
/// # Arguments
/// * `operation` - Async closure performing one attempt
/// * `max_retries` - Maximum number of retry attempts (0 = try once, no retries)
/// * `base_delay` - First backoff delay
/// * `operation_name` - Human-readable name for logging
pub async fn retry_with_backoff<F, T, Fut>(
    mut operation: F,
    max_retries: u32,
    base_delay: Duration,
    operation_name: &str,
) -> Result<T, PlatformError>
where
    F: FnMut() -> Fut,
    Fut: std::future::Future<Output = Result<T, PlatformError>>,
{
    let mut attempts: u32 = 0;

    loop {
        match operation().await {
            Ok(result) => {
                if attempts > 0 {
                    log::info!("{} succeeded after {} retry(ies)", operation_name, attempts);
                }
                return Ok(result);
            }
            Err(e) => {
                if !e.is_safe_to_resend() {
                    return Err(e);
                }

                if attempts >= max_retries {
                    log::warn!("{} failed after {} attempt(s)", operation_name, attempts + 1);
                    return Err(e);
                }

                attempts += 1;

                let wait = match &e {
                    PlatformError::RateLimitExceeded {
                        retry_after_seconds,
                    } => Duration::from_secs(*retry_after_seconds),
                    _ => base_delay.saturating_mul(2u32.saturating_pow(attempts - 1)),
                }
                .min(MAX_BACKOFF);

                log::warn!(
                    "{} failed (attempt {}/{}): {}; retrying in {:.1}s",
                    operation_name,
                    attempts,
                    max_retries + 1,
                    e,
                    wait.as_secs_f64()
                );

                tokio::time::sleep(wait).await;
            }
        }
    }
}
