//! Cancellable delayed reconnect.
//!
//! A reconnect is: disconnect, wait for the stack to settle, then connect
//! again. The wait runs as a spawned task tracked here so that any newer
//! connect or disconnect request can cancel it.

use std::time::Duration;

use parking_lot::Mutex;
use tokio::task::JoinHandle;

/// Default settle time between disconnect and reconnect.
pub const DEFAULT_SETTLE_DELAY: Duration = Duration::from_secs(1);

#[derive(Default)]
pub(crate) struct ReconnectTimer {
    pending: Mutex<Pending>,
}

#[derive(Default)]
struct Pending {
    next_id: u64,
    task: Option<(u64, JoinHandle<()>)>,
}

impl ReconnectTimer {
    /// Cancel any pending reconnect and start a new one. `spawn` receives
    /// the ticket id the task must pass to [`ReconnectTimer::disarm`] when
    /// its delay elapses.
    pub(crate) fn schedule(&self, spawn: impl FnOnce(u64) -> JoinHandle<()>) {
        let mut pending = self.pending.lock();
        if let Some((id, task)) = pending.task.take() {
            tracing::debug!(id, "Replacing pending reconnect");
            task.abort();
        }
        pending.next_id += 1;
        let id = pending.next_id;
        // Held across spawn so the task cannot disarm before it is recorded.
        let task = spawn(id);
        pending.task = Some((id, task));
    }

    /// Called by the task itself once the delay elapsed. Returns false when
    /// the ticket was superseded or cancelled in the meantime.
    pub(crate) fn disarm(&self, id: u64) -> bool {
        let mut pending = self.pending.lock();
        match pending.task.as_ref() {
            Some((current, _)) if *current == id => {
                pending.task = None;
                true
            }
            _ => false,
        }
    }

    /// Abort a pending reconnect, if any.
    pub(crate) fn cancel(&self) {
        if let Some((id, task)) = self.pending.lock().task.take() {
            tracing::debug!(id, "Cancelling pending reconnect");
            task.abort();
        }
    }

    #[cfg(test)]
    pub(crate) fn is_pending(&self) -> bool {
        self.pending.lock().task.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn arm(timer: &Arc<ReconnectTimer>, fired: &Arc<AtomicUsize>, delay: Duration) {
        let t = Arc::clone(timer);
        let fired = Arc::clone(fired);
        timer.schedule(move |id| {
            tokio::spawn(async move {
                tokio::time::sleep(delay).await;
                if t.disarm(id) {
                    fired.fetch_add(1, Ordering::SeqCst);
                }
            })
        });
    }

    #[tokio::test(start_paused = true)]
    async fn fires_once_after_delay() {
        let timer = Arc::new(ReconnectTimer::default());
        let fired = Arc::new(AtomicUsize::new(0));

        arm(&timer, &fired, DEFAULT_SETTLE_DELAY);
        assert!(timer.is_pending());

        tokio::time::sleep(Duration::from_millis(1500)).await;
        assert_eq!(fired.load(Ordering::SeqCst), 1);
        assert!(!timer.is_pending());
    }

    #[tokio::test(start_paused = true)]
    async fn cancel_prevents_firing() {
        let timer = Arc::new(ReconnectTimer::default());
        let fired = Arc::new(AtomicUsize::new(0));

        arm(&timer, &fired, DEFAULT_SETTLE_DELAY);
        timer.cancel();
        assert!(!timer.is_pending());

        tokio::time::sleep(Duration::from_secs(2)).await;
        assert_eq!(fired.load(Ordering::SeqCst), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn rescheduling_replaces_the_pending_task() {
        let timer = Arc::new(ReconnectTimer::default());
        let fired = Arc::new(AtomicUsize::new(0));

        arm(&timer, &fired, DEFAULT_SETTLE_DELAY);
        arm(&timer, &fired, DEFAULT_SETTLE_DELAY);

        tokio::time::sleep(Duration::from_secs(3)).await;
        assert_eq!(fired.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn stale_ticket_does_not_disarm() {
        let timer = ReconnectTimer::default();
        assert!(!timer.disarm(1));
    }
}
