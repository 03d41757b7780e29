//! Cancellable polling for long-running backend jobs.
//!
//! Trigger endpoints answer `processing` / `already_running` when a job runs
//! in the background; the client then re-fetches status on a fixed interval
//! until the result record shows up. `Poller::start` packages that loop as a
//! spawned task behind a [`PollHandle`]: completion is delivered exactly
//! once, `cancel()` is idempotent, and dropping the handle tears the loop
//! down unconditionally. No raw interval handles escape this module.

use std::future::Future;
use std::time::Duration;

use tokio::sync::oneshot;
use tokio::time::MissedTickBehavior;
use tracing::{debug, warn};

use crate::errors::ApiError;
use crate::models::TriggerOutcome;

/// Timing knobs for a polling loop.
#[derive(Debug, Clone, Copy)]
pub struct PollConfig {
    /// Delay before the first status check, absorbing job start-up latency.
    pub startup_delay: Duration,
    /// Fixed interval between subsequent checks.
    pub interval: Duration,
}

impl Default for PollConfig {
    fn default() -> Self {
        Self {
            startup_delay: Duration::from_millis(500),
            interval: Duration::from_millis(3000),
        }
    }
}

/// Handle to an in-flight polling loop.
///
/// Dropping the handle cancels the loop; so does `cancel()`, which is safe
/// to call any number of times, including after completion.
pub struct PollHandle<T> {
    cancel_tx: Option<oneshot::Sender<()>>,
    result_rx: oneshot::Receiver<T>,
}

impl<T> PollHandle<T> {
    /// Stop the polling loop. Idempotent.
    pub fn cancel(&mut self) {
        if let Some(tx) = self.cancel_tx.take() {
            let _ = tx.send(());
        }
    }

    /// Wait for the terminal result. Resolves with `None` if the loop was
    /// cancelled (or the handle dropped) before a result arrived.
    pub async fn await_result(self) -> Option<T> {
        let Self {
            cancel_tx,
            result_rx,
        } = self;
        let result = result_rx.await.ok();
        drop(cancel_tx);
        result
    }
}

pub struct Poller;

impl Poller {
    /// Start watching a triggered job.
    ///
    /// A synchronous `Ready` outcome completes the handle immediately with
    /// no polling. `Processing` and `AlreadyRunning` both enter the same
    /// loop: one check after `startup_delay`, then one per `interval` tick,
    /// until `check` yields `Ok(Some(result))`. Fetch failures during the
    /// loop are logged and swallowed; the next tick retries.
    pub fn start<T, C, Fut>(outcome: TriggerOutcome<T>, mut check: C, config: PollConfig) -> PollHandle<T>
    where
        T: Send + 'static,
        C: FnMut() -> Fut + Send + 'static,
        Fut: Future<Output = Result<Option<T>, ApiError>> + Send,
    {
        let (cancel_tx, cancel_rx) = oneshot::channel();
        let (result_tx, result_rx) = oneshot::channel();

        match outcome {
            TriggerOutcome::Ready(value) => {
                // Job finished synchronously; skip polling entirely.
                let _ = result_tx.send(value);
            }
            TriggerOutcome::Processing | TriggerOutcome::AlreadyRunning => {
                tokio::spawn(async move {
                    let poll_loop = async {
                        tokio::time::sleep(config.startup_delay).await;
                        let mut ticker = tokio::time::interval(config.interval);
                        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
                        // The first tick of a fresh interval resolves at once.
                        ticker.tick().await;
                        loop {
                            match check().await {
                                Ok(Some(value)) => return value,
                                Ok(None) => debug!("job still running, polling again"),
                                Err(err) if err.is_poll_tolerable() => {
                                    debug!("status not available yet: {}", err);
                                }
                                Err(err) => {
                                    warn!("status check failed, retrying next tick: {}", err);
                                }
                            }
                            ticker.tick().await;
                        }
                    };
                    tokio::select! {
                        value = poll_loop => {
                            let _ = result_tx.send(value);
                        }
                        _ = cancel_rx => {
                            debug!("polling cancelled");
                        }
                    }
                });
            }
        }

        PollHandle {
            cancel_tx: Some(cancel_tx),
            result_rx,
        }
    }
}
