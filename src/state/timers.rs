use dashmap::DashMap;
use tokio::task::JoinHandle;
use uuid::Uuid;

/// Cancellable countdown tasks, at most one per poll.
///
/// Installing a task for a poll id aborts any previous one, so "no duplicate
/// timers per poll" is a property of the map rather than caller discipline.
#[derive(Default)]
pub struct PollTimers {
    tasks: DashMap<Uuid, JoinHandle<()>>,
}

impl PollTimers {
    /// Create an empty timer map.
    pub fn new() -> Self {
        Self::default()
    }

    /// Track the countdown task for a poll, aborting any prior one.
    pub fn install(&self, poll_id: Uuid, handle: JoinHandle<()>) {
        if let Some(previous) = self.tasks.insert(poll_id, handle) {
            previous.abort();
        }
    }

    /// Abort and forget the countdown for a poll (manual end path).
    pub fn cancel(&self, poll_id: &Uuid) {
        if let Some((_, handle)) = self.tasks.remove(poll_id) {
            handle.abort();
        }
    }

    /// Forget a countdown without aborting it. Called by the fired task
    /// itself once its end-poll work is done.
    pub fn discard(&self, poll_id: &Uuid) {
        self.tasks.remove(poll_id);
    }

    /// Number of pending countdowns.
    pub fn pending(&self) -> usize {
        self.tasks.len()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    use tokio::time::{advance, sleep};
    use uuid::Uuid;

    use super::*;

    fn countdown(fired: Arc<AtomicUsize>, secs: u64) -> JoinHandle<()> {
        tokio::spawn(async move {
            sleep(Duration::from_secs(secs)).await;
            fired.fetch_add(1, Ordering::SeqCst);
        })
    }

    #[tokio::test(start_paused = true)]
    async fn cancel_prevents_firing() {
        let timers = PollTimers::new();
        let fired = Arc::new(AtomicUsize::new(0));
        let poll_id = Uuid::new_v4();

        timers.install(poll_id, countdown(fired.clone(), 30));
        timers.cancel(&poll_id);

        advance(Duration::from_secs(60)).await;
        assert_eq!(fired.load(Ordering::SeqCst), 0);
        assert_eq!(timers.pending(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn install_replaces_previous_countdown() {
        let timers = PollTimers::new();
        let fired = Arc::new(AtomicUsize::new(0));
        let poll_id = Uuid::new_v4();

        timers.install(poll_id, countdown(fired.clone(), 30));
        timers.install(poll_id, countdown(fired.clone(), 30));
        // Let the surviving task register its sleep before the clock jumps.
        tokio::task::yield_now().await;

        advance(Duration::from_secs(60)).await;
        sleep(Duration::from_millis(1)).await;
        assert_eq!(fired.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn countdown_fires_after_its_duration() {
        let timers = PollTimers::new();
        let fired = Arc::new(AtomicUsize::new(0));
        let poll_id = Uuid::new_v4();

        timers.install(poll_id, countdown(fired.clone(), 30));
        // Let the task register its sleep before the clock jumps.
        tokio::task::yield_now().await;

        advance(Duration::from_secs(29)).await;
        assert_eq!(fired.load(Ordering::SeqCst), 0);

        advance(Duration::from_secs(2)).await;
        sleep(Duration::from_millis(1)).await;
        assert_eq!(fired.load(Ordering::SeqCst), 1);
    }
}
