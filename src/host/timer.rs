use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use dashmap::DashMap;
use tokio::task::AbortHandle;

use super::{TimerHandle, TimerService, TimerTask};

/// Timer capability backed by spawned tokio tasks. Per-frame callbacks are
/// emulated with a fixed interval; hosts with a real frame clock supply
/// their own implementation.
pub struct TokioTimers {
    tasks: Arc<DashMap<u64, AbortHandle>>,
    next_id: AtomicU64,
    frame_interval: Duration,
}

impl TokioTimers {
    pub fn new(frame_interval: Duration) -> Self {
        Self {
            tasks: Arc::new(DashMap::new()),
            next_id: AtomicU64::new(1),
            frame_interval,
        }
    }

    fn reserve(&self) -> u64 {
        self.next_id.fetch_add(1, Ordering::Relaxed)
    }

    fn abort(&self, handle: TimerHandle) {
        if let Some((_, task)) = self.tasks.remove(&handle.0) {
            task.abort();
        }
    }
}

impl TimerService for TokioTimers {
    fn delay(&self, after: Duration, task: TimerTask) {
        tokio::spawn(async move {
            tokio::time::sleep(after).await;
            task().await;
        });
    }

    fn repeat(&self, every: Duration, task: TimerTask) -> TimerHandle {
        let every = every.max(Duration::from_millis(1));
        let join = tokio::spawn(async move {
            let mut ticks = tokio::time::interval(every);
            // the first tick resolves immediately
            ticks.tick().await;
            loop {
                ticks.tick().await;
                task().await;
            }
        });
        let id = self.reserve();
        self.tasks.insert(id, join.abort_handle());
        TimerHandle(id)
    }

    fn cancel(&self, handle: TimerHandle) {
        self.abort(handle);
    }

    fn next_frame(&self, task: TimerTask) -> TimerHandle {
        let id = self.reserve();
        let after = self.frame_interval;
        let tasks = self.tasks.clone();
        let join = tokio::spawn(async move {
            tokio::time::sleep(after).await;
            task().await;
            tasks.remove(&id);
        });
        self.tasks.insert(id, join.abort_handle());
        TimerHandle(id)
    }

    fn cancel_frame(&self, handle: TimerHandle) {
        self.abort(handle);
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::AtomicUsize;

    use super::*;

    fn counting_task(counter: Arc<AtomicUsize>) -> TimerTask {
        Arc::new(move || {
            let counter = counter.clone();
            Box::pin(async move {
                counter.fetch_add(1, Ordering::SeqCst);
            })
        })
    }

    #[tokio::test]
    async fn test_delay_fires_once() {
        let timers = TokioTimers::new(Duration::from_millis(16));
        let counter = Arc::new(AtomicUsize::new(0));
        timers.delay(Duration::from_millis(10), counting_task(counter.clone()));

        tokio::time::sleep(Duration::from_millis(60)).await;
        assert_eq!(counter.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_repeat_until_cancelled() {
        let timers = TokioTimers::new(Duration::from_millis(16));
        let counter = Arc::new(AtomicUsize::new(0));
        let handle = timers.repeat(Duration::from_millis(20), counting_task(counter.clone()));

        tokio::time::sleep(Duration::from_millis(90)).await;
        timers.cancel(handle);
        let after_cancel = counter.load(Ordering::SeqCst);
        assert!(after_cancel >= 2, "expected at least two ticks");

        tokio::time::sleep(Duration::from_millis(60)).await;
        assert_eq!(counter.load(Ordering::SeqCst), after_cancel);
    }

    #[tokio::test]
    async fn test_cancelled_frame_never_fires() {
        let timers = TokioTimers::new(Duration::from_millis(20));
        let counter = Arc::new(AtomicUsize::new(0));
        let handle = timers.next_frame(counting_task(counter.clone()));
        timers.cancel_frame(handle);

        tokio::time::sleep(Duration::from_millis(60)).await;
        assert_eq!(counter.load(Ordering::SeqCst), 0);
    }
}
