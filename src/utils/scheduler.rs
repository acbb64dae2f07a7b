use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::debug;

/// Owned periodic timer that delivers a message into a mailbox.
///
/// Restarting cancels the previous timer before arming a new one, so at most
/// one timer is ever live per handle. Dropping the handle stops it.
#[derive(Debug, Default)]
pub struct RefreshTimer {
    cancel: Option<CancellationToken>,
    task: Option<JoinHandle<()>>,
}

impl RefreshTimer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Cancel any running timer and start a new one. The first tick fires
    /// one full `period` after this call.
    pub fn restart<M>(&mut self, period: Duration, tx: mpsc::Sender<M>, message: M)
    where
        M: Clone + Send + 'static,
    {
        self.stop();

        let cancel = CancellationToken::new();
        let token = cancel.clone();
        let task = tokio::spawn(async move {
            let mut ticker = interval_at(Instant::now() + period, period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

            loop {
                tokio::select! {
                    _ = token.cancelled() => break,
                    _ = ticker.tick() => {
                        if tx.send(message.clone()).await.is_err() {
                            // Mailbox gone, nobody left to refresh
                            break;
                        }
                    }
                }
            }
            debug!("Refresh timer stopped");
        });

        self.cancel = Some(cancel);
        self.task = Some(task);
    }

    /// Stop the timer if one is running
    pub fn stop(&mut self) {
        if let Some(cancel) = self.cancel.take() {
            cancel.cancel();
        }
        self.task.take();
    }

    pub fn is_running(&self) -> bool {
        self.task.as_ref().is_some_and(|task| !task.is_finished())
    }
}

impl Drop for RefreshTimer {
    fn drop(&mut self) {
        self.stop();
    }
}
