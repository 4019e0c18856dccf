//! Periodic dashboard refreshes.
//!
//! Each timer runs its task once immediately and then once per period. A
//! tick never starts while the previous task is still running, and ticks
//! missed during a slow task are delayed rather than fired in a burst.
//! Independent timers run concurrently and may interleave with each other,
//! never with themselves.

use std::future::Future;
use std::time::Duration;
use tokio::time::{interval, MissedTickBehavior};
use tracing::warn;

use crate::error::Result;

/// Runs `task` forever on `period`. Errors are logged under `name` and the
/// timer keeps going.
pub async fn every<F, Fut>(name: &str, period: Duration, mut task: F)
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<()>>,
{
    let mut ticker = interval(period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    loop {
        ticker.tick().await;
        if let Err(e) = task().await {
            warn!(timer = name, error = %e, "refresh failed");
        }
    }
}

/// Like [`every`] but stops after `ticks` runs. Useful for one-shot dashboards and tests.
pub async fn times<F, Fut>(name: &str, period: Duration, ticks: usize, mut task: F)
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<()>>,
{
    let mut ticker = interval(period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    for _ in 0..ticks {
        ticker.tick().await;
        if let Err(e) = task().await {
            warn!(timer = name, error = %e, "refresh failed");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ClientError;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    #[tokio::test(start_paused = true)]
    async fn first_tick_is_immediate() {
        let runs = Arc::new(AtomicUsize::new(0));
        let start = tokio::time::Instant::now();
        let r = runs.clone();
        times("t", Duration::from_secs(30), 3, move || {
            let r = r.clone();
            async move {
                r.fetch_add(1, Ordering::SeqCst);
                Ok(())
            }
        })
        .await;
        assert_eq!(runs.load(Ordering::SeqCst), 3);
        let elapsed = start.elapsed();
        assert!(elapsed >= Duration::from_secs(60) && elapsed < Duration::from_secs(90));
    }

    #[tokio::test(start_paused = true)]
    async fn slow_task_never_overlaps() {
        let active = Arc::new(AtomicUsize::new(0));
        let max_seen = Arc::new(AtomicUsize::new(0));
        let (a, m) = (active.clone(), max_seen.clone());
        times("slow", Duration::from_secs(1), 4, move || {
            let (a, m) = (a.clone(), m.clone());
            async move {
                let now = a.fetch_add(1, Ordering::SeqCst) + 1;
                m.fetch_max(now, Ordering::SeqCst);
                tokio::time::sleep(Duration::from_secs(3)).await;
                a.fetch_sub(1, Ordering::SeqCst);
                Ok(())
            }
        })
        .await;
        assert_eq!(max_seen.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn errors_do_not_stop_timer() {
        let runs = Arc::new(AtomicUsize::new(0));
        let r = runs.clone();
        times("flaky", Duration::from_secs(1), 3, move || {
            let r = r.clone();
            async move {
                r.fetch_add(1, Ordering::SeqCst);
                Err(ClientError::Invalid("nope".into()))
            }
        })
        .await;
        assert_eq!(runs.load(Ordering::SeqCst), 3);
    }
}
