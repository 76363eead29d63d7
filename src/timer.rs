use std::future::Future;
use std::time::Duration;
use tokio::task::JoinHandle;

/// A delayed task that can be cancelled before it fires.
///
/// Dropping a `PollTimer` detaches it; only [`cancel()`](Self::cancel)
/// stops the task. Must be created inside a tokio runtime.
#[derive(Debug)]
pub struct PollTimer {
    handle: JoinHandle<()>,
}

impl PollTimer {
    /// Run `task` once `delay` has elapsed.
    pub fn schedule<F>(delay: Duration, task: F) -> Self
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let handle = tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            task.await;
        });
        Self { handle }
    }

    /// Stop the task. If it has not fired yet it never will; if it is
    /// mid-flight it is dropped at its next suspension point.
    pub fn cancel(self) {
        self.handle.abort();
    }

    pub fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }
}
