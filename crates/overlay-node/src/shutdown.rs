//! Stop signal plus task handles for the node's background work.
//!
//! The node keeps one token for the control API listeners and one for the
//! maintenance loop so that `close` can stop them in order.

use tokio::sync::Mutex;
use tokio::sync::watch;
use tokio::task::JoinHandle;

pub struct ShutdownToken {
    stop_tx: watch::Sender<bool>,
    stop_rx: watch::Receiver<bool>,
    task_handles: Mutex<Vec<JoinHandle<()>>>,
}

impl ShutdownToken {
    pub fn new() -> Self {
        let (stop_tx, stop_rx) = watch::channel(false);
        Self {
            stop_tx,
            stop_rx,
            task_handles: Mutex::new(Vec::new()),
        }
    }

    /// Each background task holds its own receiver and waits on it in a
    /// `tokio::select!` branch.
    pub fn subscribe(&self) -> watch::Receiver<bool> {
        self.stop_rx.clone()
    }

    pub fn is_stopped(&self) -> bool {
        *self.stop_rx.borrow()
    }

    pub async fn add_task(&self, handle: JoinHandle<()>) {
        self.task_handles.lock().await.push(handle);
    }

    /// Idempotent.
    pub fn signal_stop(&self) {
        let _ = self.stop_tx.send(true);
    }

    /// Wait for every registered task to finish.
    pub async fn join_all(&self) {
        let handles: Vec<_> = self.task_handles.lock().await.drain(..).collect();
        for handle in handles {
            if let Err(e) = handle.await
                && e.is_panic()
            {
                tracing::error!("background task panicked: {e}");
            }
        }
    }

    /// Signal, then wait.
    pub async fn stop_and_join(&self) {
        self.signal_stop();
        self.join_all().await;
    }
}

impl Default for ShutdownToken {
    fn default() -> Self {
        Self::new()
    }
}

/// Resolve once `rx` observes the stop signal (or its sender is gone).
pub async fn stopped(mut rx: watch::Receiver<bool>) {
    let _ = rx.wait_for(|stop| *stop).await;
}
