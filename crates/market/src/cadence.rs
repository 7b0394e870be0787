use std::time::Duration;

use tokio_util::sync::CancellationToken;

/// Sleep for one cadence period. Returns `false` if `cancel` fired first.
pub(crate) async fn pause(period: Duration, cancel: &CancellationToken) -> bool {
    if period.is_zero() {
        tokio::task::yield_now().await;
        return !cancel.is_cancelled();
    }
    tokio::select! {
        _ = tokio::time::sleep(period) => true,
        _ = cancel.cancelled() => false,
    }
}
