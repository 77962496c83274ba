//! Timeout helper.

use std::future::Future;
use std::time::Duration;

use crate::auth::AuthError;

/// Wrap a future with a timeout; elapsing is reported as [`AuthError::Timeout`].
pub async fn with_timeout<T>(
    duration: Duration,
    future: impl Future<Output = Result<T, AuthError>>,
) -> Result<T, AuthError> {
    match tokio::time::timeout(duration, future).await {
        Ok(result) => result,
        Err(_) => Err(AuthError::Timeout(
            u64::try_from(duration.as_millis()).unwrap_or(u64::MAX),
        )),
    }
}
