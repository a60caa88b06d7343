use std::future::Future;
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;

/// A repeating background task, stopped by [`stop`](Self::stop) or on drop.
#[derive(Debug)]
pub struct PollHandle {
    cancel: CancellationToken,
    task: JoinHandle<()>,
}

impl PollHandle {
    /// Run `on_tick` every `period`, first after one full period.
    ///
    /// Returning `false` from the tick future ends the task. A tick that is
    /// still running when the next one is due delays it rather than stacking.
    /// Must be called from within a tokio runtime.
    pub fn spawn<F, Fut>(period: Duration, mut on_tick: F) -> Self
    where
        F: FnMut() -> Fut + Send + 'static,
        Fut: Future<Output = bool> + Send + 'static,
    {
        let cancel = CancellationToken::new();
        let token = cancel.clone();
        let task = tokio::spawn(async move {
            let mut ticker = tokio::time::interval_at(Instant::now() + period, period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                tokio::select! {
                    biased;
                    () = token.cancelled() => break,
                    _ = ticker.tick() => {
                        if !on_tick().await {
                            break;
                        }
                    }
                }
            }
            tracing::debug!("Poller stopped");
        });
        Self { cancel, task }
    }

    /// Stop the task. Consumes the handle so it can only happen once.
    pub fn stop(self) {
        self.cancel.cancel();
    }

    /// Whether the task is still scheduled to tick.
    #[must_use]
    pub fn is_active(&self) -> bool {
        !self.cancel.is_cancelled() && !self.task.is_finished()
    }

    pub(crate) fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }
}

impl Drop for PollHandle {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}
