// Owned, cancellable periodic work.
// Replaces free-running timers: whoever holds the handle decides when the
// ticking stops, and dropping the handle stops it too.

use std::time::Duration;

use futures::future::BoxFuture;
use log::debug;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;

pub struct PeriodicTask {
    name: String,
    cancel: CancellationToken,
    handle: JoinHandle<()>,
}

impl PeriodicTask {
    /// Start ticking every `period`, first tick immediately.
    ///
    /// Every tick's future is spawned on its own, so a request that hangs only
    /// stalls that tick while the timer keeps going. Futures already running
    /// when the task is cancelled are left to finish; they must check for
    /// themselves whether their result still applies.
    pub fn spawn<F>(name: &str, period: Duration, mut tick: F) -> Self
    where
        F: FnMut() -> BoxFuture<'static, ()> + Send + 'static,
    {
        let cancel = CancellationToken::new();
        let token = cancel.clone();
        let task_name = name.to_string();

        let handle = tokio::spawn(async move {
            let mut interval = tokio::time::interval(period);
            interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
            loop {
                tokio::select! {
                    _ = token.cancelled() => {
                        debug!("Periodic task '{}' stopped", task_name);
                        break;
                    }
                    _ = interval.tick() => {
                        tokio::spawn(tick());
                    }
                }
            }
        });

        debug!("Periodic task '{}' started ({:?})", name, period);
        PeriodicTask {
            name: name.to_string(),
            cancel,
            handle,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    pub fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }
}

impl Drop for PeriodicTask {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}
