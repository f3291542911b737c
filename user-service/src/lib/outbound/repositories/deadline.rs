use std::future::Future;
use std::time::Duration;

use crate::user::errors::UserError;

/// Run a store operation, failing with `Timeout` once `deadline` elapses.
///
/// The inner future is dropped on expiry, which returns any pooled
/// connection it was holding.
pub async fn with_deadline<T, F>(deadline: Duration, operation: F) -> Result<T, UserError>
where
    F: Future<Output = Result<T, UserError>>,
{
    match tokio::time::timeout(deadline, operation).await {
        Ok(result) => result,
        Err(_) => {
            tracing::warn!(deadline_ms = deadline.as_millis(), "Store operation timed out");
            Err(UserError::Timeout(deadline))
        }
    }
}
