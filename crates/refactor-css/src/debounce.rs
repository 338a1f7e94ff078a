//! Per-document debouncing of rebuilds
//!
//! Each document has at most one pending task. Scheduling a new task for a
//! document aborts the pending one, so a burst of edits runs the work once,
//! `delay` after the last edit.

use std::collections::HashMap;
use std::future::Future;
use std::sync::{Mutex, PoisonError};
use std::time::Duration;

use refactor_css_core::DocumentId;
use tokio::task::JoinHandle;

#[derive(Default)]
pub struct Debouncer {
    pending: Mutex<HashMap<DocumentId, JoinHandle<()>>>,
}

impl Debouncer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Run `work` after `delay`, unless another task is scheduled for `id`
    /// first.
    pub fn schedule<F>(&self, id: DocumentId, delay: Duration, work: F)
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let handle = tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            work.await;
        });

        let mut pending = self.pending.lock().unwrap_or_else(PoisonError::into_inner);
        pending.retain(|_, task| !task.is_finished());
        if let Some(previous) = pending.insert(id, handle) {
            previous.abort();
        }
    }

    /// Drop the pending task for `id`, if any
    pub fn cancel(&self, id: &DocumentId) {
        let mut pending = self.pending.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(task) = pending.remove(id) {
            task.abort();
        }
    }

    /// Number of tasks still waiting or running
    pub fn pending(&self) -> usize {
        self.pending
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .values()
            .filter(|task| !task.is_finished())
            .count()
    }
}

impl Drop for Debouncer {
    fn drop(&mut self) {
        let pending = self.pending.get_mut().unwrap_or_else(PoisonError::into_inner);
        for (_, task) in pending.drain() {
            task.abort();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[tokio::test]
    async fn test_burst_runs_once() {
        let debouncer = Debouncer::new();
        let runs = Arc::new(AtomicUsize::new(0));
        let id = DocumentId::in_memory("burst.html");

        for _ in 0..5 {
            let runs = runs.clone();
            debouncer.schedule(id.clone(), Duration::from_millis(30), async move {
                runs.fetch_add(1, Ordering::SeqCst);
            });
        }

        tokio::time::sleep(Duration::from_millis(200)).await;
        assert_eq!(runs.load(Ordering::SeqCst), 1);
        assert_eq!(debouncer.pending(), 0);
    }

    #[tokio::test]
    async fn test_documents_are_independent() {
        let debouncer = Debouncer::new();
        let runs = Arc::new(AtomicUsize::new(0));

        for name in ["a.html", "b.html"] {
            let runs = runs.clone();
            debouncer.schedule(DocumentId::in_memory(name), Duration::from_millis(10), async move {
                runs.fetch_add(1, Ordering::SeqCst);
            });
        }

        tokio::time::sleep(Duration::from_millis(150)).await;
        assert_eq!(runs.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_cancel() {
        let debouncer = Debouncer::new();
        let runs = Arc::new(AtomicUsize::new(0));
        let id = DocumentId::in_memory("closed.html");

        let counter = runs.clone();
        debouncer.schedule(id.clone(), Duration::from_millis(30), async move {
            counter.fetch_add(1, Ordering::SeqCst);
        });
        debouncer.cancel(&id);

        tokio::time::sleep(Duration::from_millis(100)).await;
        assert_eq!(runs.load(Ordering::SeqCst), 0);
    }
}
