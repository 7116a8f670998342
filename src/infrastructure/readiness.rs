use std::{future::Future, time::Duration};

use tokio::time::{sleep, Instant};

pub const WAIT_INTERVAL: Duration = Duration::from_millis(500);
pub const MAX_WAIT: Duration = Duration::from_secs(20);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WaitOutcome {
    Ready,
    TimedOut { waited: Duration },
}

/// Polls `probe` every `interval` until it reports ready or `max_wait` has
/// passed. The probe always runs at least once.
pub async fn wait_until<F, Fut>(mut probe: F, interval: Duration, max_wait: Duration) -> WaitOutcome
where
    F: FnMut() -> Fut,
    Fut: Future<Output = bool>,
{
    let start = Instant::now();
    loop {
        if probe().await {
            return WaitOutcome::Ready;
        }
        let waited = start.elapsed();
        if waited >= max_wait {
            return WaitOutcome::TimedOut { waited };
        }
        sleep(interval.min(max_wait - waited)).await;
    }
}
