//! Repeating tick driver.
//!
//! The first tick fires immediately, then once per period. A tick runs on
//! the blocking pool and is awaited before the next trigger is considered,
//! so ticks never overlap. Triggers missed while a tick overruns are
//! dropped, not queued.

use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, error, warn};

/// Stops the ticker when cancelled or dropped. A tick already running is
/// allowed to finish.
pub struct TickerHandle {
    cancel: watch::Sender<bool>,
    task: Option<JoinHandle<()>>,
}

impl TickerHandle {
    pub fn cancel(&self) {
        // The loop may already have exited; nothing to signal then.
        let _ = self.cancel.send(true);
    }

    /// Cancel and wait for the loop, including any running tick, to end.
    pub async fn shutdown(mut self) {
        self.cancel();
        if let Some(task) = self.task.take() {
            if let Err(e) = task.await {
                error!(error = %e, "ticker task failed");
            }
        }
    }
}

impl Drop for TickerHandle {
    fn drop(&mut self) {
        let _ = self.cancel.send(true);
    }
}

/// Must be called from within a tokio runtime.
pub fn spawn_ticker<F>(period: Duration, tick: F) -> TickerHandle
where
    F: Fn() + Send + Sync + 'static,
{
    let period = period.max(Duration::from_millis(1));
    let (cancel_tx, mut cancel_rx) = watch::channel(false);
    let tick = Arc::new(tick);

    let task = tokio::spawn(async move {
        let mut interval = tokio::time::interval(period);
        interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
        let mut count: u64 = 0;

        loop {
            tokio::select! {
                biased;
                changed = cancel_rx.changed() => {
                    if changed.is_err() || *cancel_rx.borrow() {
                        break;
                    }
                    continue;
                }
                _ = interval.tick() => {}
            }

            count += 1;
            let started = Instant::now();
            let job = Arc::clone(&tick);
            if let Err(e) = tokio::task::spawn_blocking(move || job()).await {
                error!(tick = count, error = %e, "tick failed");
            }
            let elapsed = started.elapsed();
            if elapsed > period {
                warn!(tick = count, ?elapsed, ?period, "tick overran; missed triggers skipped");
            }
        }
        debug!(ticks = count, "ticker stopped");
    });

    TickerHandle {
        cancel: cancel_tx,
        task: Some(task),
    }
}
