//! Common utilities shared across modules.

use std::time::{Duration, SystemTime};

use tokio_util::sync::CancellationToken;

/// Sleep for `duration` unless `cancel` fires first.
///
/// Returns `true` if the full duration elapsed, `false` on cancellation.
pub async fn sleep_or_cancel(duration: Duration, cancel: &CancellationToken) -> bool {
    if duration.is_zero() {
        return !cancel.is_cancelled();
    }

    tokio::select! {
        _ = tokio::time::sleep(duration) => true,
        _ = cancel.cancelled() => false,
    }
}

/// Time elapsed since `earlier`, or zero when `earlier` is in the future.
pub fn age_since(earlier: SystemTime, now: SystemTime) -> Duration {
    now.duration_since(earlier).unwrap_or(Duration::ZERO)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_sleep_completes() {
        let cancel = CancellationToken::new();
        assert!(sleep_or_cancel(Duration::from_millis(5), &cancel).await);
    }

    #[tokio::test]
    async fn test_sleep_interrupted_by_cancel() {
        let cancel = CancellationToken::new();
        let trigger = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(10)).await;
            trigger.cancel();
        });

        let started = std::time::Instant::now();
        assert!(!sleep_or_cancel(Duration::from_secs(30), &cancel).await);
        assert!(started.elapsed() < Duration::from_secs(5));
    }

    #[test]
    fn test_age_since_future_is_zero() {
        let now = SystemTime::now();
        let future = now + Duration::from_secs(60);
        assert_eq!(age_since(future, now), Duration::ZERO);
        assert_eq!(
            age_since(now - Duration::from_secs(2), now),
            Duration::from_secs(2)
        );
    }
}
