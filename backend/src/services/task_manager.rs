use std::collections::HashMap;
use std::future::Future;
use std::time::Duration;

use tokio::sync::Mutex;
use tokio::task::JoinHandle;

/// Background simulator tasks keyed by scan id, with cancellation support.
#[derive(Default)]
pub struct TaskManager {
    active_handles: Mutex<HashMap<String, JoinHandle<()>>>,
}

impl TaskManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// Spawn `task` for `scan_id`. An earlier task for the same scan is aborted.
    pub async fn submit<F>(&self, scan_id: &str, task: F)
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let handle = tokio::spawn(task);

        let mut handles = self.active_handles.lock().await;
        handles.retain(|_, h| !h.is_finished());
        if let Some(previous) = handles.insert(scan_id.to_string(), handle) {
            previous.abort();
        }

        tracing::debug!(scan_id = %scan_id, "submitted simulator task");
    }

    /// Abort the task for `scan_id`. Returns false if none was running.
    pub async fn cancel(&self, scan_id: &str) -> bool {
        let mut handles = self.active_handles.lock().await;
        match handles.remove(scan_id) {
            Some(handle) => {
                let was_running = !handle.is_finished();
                handle.abort();
                if was_running {
                    tracing::info!(scan_id = %scan_id, "aborted simulator task");
                }
                was_running
            }
            None => false,
        }
    }

    /// Abort every task, then wait up to `grace` for the aborts to land so
    /// no task is still writing afterwards.
    pub async fn shutdown(&self, grace: Duration) -> usize {
        let handles: Vec<(String, JoinHandle<()>)> =
            self.active_handles.lock().await.drain().collect();

        let mut aborted = 0;
        for (_, handle) in &handles {
            if !handle.is_finished() {
                aborted += 1;
            }
            handle.abort();
        }

        let settle = async {
            for (_, handle) in handles {
                let _ = handle.await;
            }
        };
        if tokio::time::timeout(grace, settle).await.is_err() {
            tracing::warn!(grace_ms = grace.as_millis() as u64, "simulator tasks did not stop within grace period");
        }

        tracing::info!(aborted, "simulator tasks stopped");
        aborted
    }

    pub async fn active_count(&self) -> usize {
        let mut handles = self.active_handles.lock().await;
        handles.retain(|_, h| !h.is_finished());
        handles.len()
    }

    /// Wait until the task for `scan_id` has finished.
    pub async fn wait_for(&self, scan_id: &str) {
        let handle = self.active_handles.lock().await.remove(scan_id);
        if let Some(handle) = handle {
            if let Err(e) = handle.await {
                if !e.is_cancelled() {
                    tracing::error!(scan_id = %scan_id, error = %e, "simulator task panicked");
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    #[tokio::test(start_paused = true)]
    async fn test_wait_for_completes_task() {
        let manager = TaskManager::new();
        let counter = Arc::new(AtomicUsize::new(0));

        let c = counter.clone();
        manager
            .submit("SCN-1", async move {
                tokio::time::sleep(Duration::from_secs(5)).await;
                c.fetch_add(1, Ordering::SeqCst);
            })
            .await;

        assert_eq!(manager.active_count().await, 1);
        manager.wait_for("SCN-1").await;
        assert_eq!(counter.load(Ordering::SeqCst), 1);
        assert_eq!(manager.active_count().await, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_prevents_further_work() {
        let manager = TaskManager::new();
        let counter = Arc::new(AtomicUsize::new(0));

        let c = counter.clone();
        manager
            .submit("SCN-1", async move {
                tokio::time::sleep(Duration::from_secs(5)).await;
                c.fetch_add(1, Ordering::SeqCst);
            })
            .await;

        assert!(manager.cancel("SCN-1").await);
        assert!(!manager.cancel("SCN-1").await);

        tokio::time::sleep(Duration::from_secs(10)).await;
        assert_eq!(counter.load(Ordering::SeqCst), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_shutdown_aborts_everything() {
        let manager = TaskManager::new();
        for id in ["SCN-1", "SCN-2", "SCN-3"] {
            manager
                .submit(id, async {
                    tokio::time::sleep(Duration::from_secs(60)).await;
                })
                .await;
        }

        assert_eq!(manager.shutdown(Duration::from_secs(1)).await, 3);
        assert_eq!(manager.active_count().await, 0);
    }
}
