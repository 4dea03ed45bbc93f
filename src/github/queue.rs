// Single-consumer FIFO request queue.
// Serializes upstream calls so at most one is in flight at any time.

use std::collections::VecDeque;
use std::future::Future;
use std::sync::{Arc, Mutex, MutexGuard};

use futures::future::BoxFuture;
use tokio::sync::oneshot;

use crate::error::{HubError, Result};

/// A deferred operation. Delivers its own result to the waiting caller.
type Job = Box<dyn FnOnce() -> BoxFuture<'static, ()> + Send>;

#[derive(Default)]
struct QueueState {
    pending: VecDeque<Job>,
    processing: bool,
}

/// FIFO executor with a worker that only exists while there is work.
///
/// The worker is spawned when the queue goes from empty to non-empty and
/// exits once drained. Must be used from within a Tokio runtime.
#[derive(Clone, Default)]
pub struct RequestQueue {
    state: Arc<Mutex<QueueState>>,
}

impl RequestQueue {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(state: &Mutex<QueueState>) -> MutexGuard<'_, QueueState> {
        state.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Append `operation` and return a future for its result.
    ///
    /// The operation is queued before this returns, so submission order is
    /// call order regardless of when the returned futures are polled. A
    /// failing (or panicking) operation only affects its own caller.
    pub fn enqueue<T, F, Fut>(
        &self,
        operation: F,
    ) -> impl Future<Output = Result<T>> + Send + use<T, F, Fut>
    where
        T: Send + 'static,
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = Result<T>> + Send + 'static,
    {
        let (tx, rx) = oneshot::channel();
        let job: Job = Box::new(move || {
            Box::pin(async move {
                // The caller may have stopped waiting; the result is then discarded.
                let _ = tx.send(operation().await);
            })
        });

        let start_worker = {
            let mut state = Self::lock(&self.state);
            state.pending.push_back(job);
            tracing::debug!(depth = state.pending.len(), "Request queued");

            if state.processing {
                false
            } else {
                state.processing = true;
                true
            }
        };

        if start_worker {
            tokio::spawn(Self::drain(Arc::clone(&self.state)));
        }

        async move {
            match rx.await {
                Ok(result) => result,
                Err(_) => Err(HubError::QueueClosed),
            }
        }
    }

    async fn drain(state: Arc<Mutex<QueueState>>) {
        tracing::debug!("Queue worker started");

        loop {
            let job = {
                let mut state = Self::lock(&state);
                match state.pending.pop_front() {
                    Some(job) => job,
                    None => {
                        state.processing = false;
                        break;
                    }
                }
            };

            // Own task per job so a panic drops only that job's sender.
            if let Err(e) = tokio::spawn(job()).await {
                tracing::warn!(error = %e, "Queued request aborted");
            }
        }

        tracing::debug!("Queue worker drained");
    }

    /// Operations waiting to run (excludes the one in flight).
    pub fn len(&self) -> usize {
        Self::lock(&self.state).pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Whether a worker is currently alive.
    pub fn is_processing(&self) -> bool {
        Self::lock(&self.state).processing
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    #[derive(Default)]
    struct Probe {
        events: Mutex<Vec<String>>,
        in_flight: AtomicUsize,
        max_in_flight: AtomicUsize,
    }

    impl Probe {
        fn log(&self, event: String) {
            self.events.lock().unwrap().push(event);
        }

        fn events(&self) -> Vec<String> {
            self.events.lock().unwrap().clone()
        }
    }

    fn delayed(
        probe: &Arc<Probe>,
        name: &'static str,
        delay_ms: u64,
        fail: bool,
    ) -> impl FnOnce() -> BoxFuture<'static, Result<String>> + Send + 'static {
        let probe = Arc::clone(probe);
        move || {
            Box::pin(async move {
                let now = probe.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
                probe.max_in_flight.fetch_max(now, Ordering::SeqCst);
                probe.log(format!("start {name}"));

                tokio::time::sleep(Duration::from_millis(delay_ms)).await;

                probe.log(format!("end {name}"));
                probe.in_flight.fetch_sub(1, Ordering::SeqCst);

                if fail {
                    Err(HubError::Upstream {
                        status: 500,
                        message: format!("{name} failed"),
                    })
                } else {
                    Ok(name.to_string())
                }
            })
        }
    }

    async fn wait_for_idle(queue: &RequestQueue) {
        for _ in 0..100 {
            if !queue.is_processing() {
                return;
            }
            tokio::task::yield_now().await;
        }
        panic!("queue worker never went idle");
    }

    #[tokio::test(start_paused = true)]
    async fn test_runs_in_submission_order_one_at_a_time() {
        let queue = RequestQueue::new();
        let probe = Arc::new(Probe::default());

        let a = queue.enqueue(delayed(&probe, "A", 30, false));
        let b = queue.enqueue(delayed(&probe, "B", 10, false));
        let c = queue.enqueue(delayed(&probe, "C", 0, false));

        // Poll in reverse to show polling order is irrelevant
        let (c, b, a) = tokio::join!(c, b, a);
        assert_eq!(a.unwrap(), "A");
        assert_eq!(b.unwrap(), "B");
        assert_eq!(c.unwrap(), "C");

        assert_eq!(
            probe.events(),
            vec!["start A", "end A", "start B", "end B", "start C", "end C"]
        );
        assert_eq!(probe.max_in_flight.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_failure_is_isolated() {
        let queue = RequestQueue::new();
        let probe = Arc::new(Probe::default());

        let a = queue.enqueue(delayed(&probe, "A", 5, false));
        let b = queue.enqueue(delayed(&probe, "B", 5, true));
        let c = queue.enqueue(delayed(&probe, "C", 5, false));

        let (a, b, c) = tokio::join!(a, b, c);
        assert_eq!(a.unwrap(), "A");
        assert!(matches!(
            b.unwrap_err(),
            HubError::Upstream { status: 500, ref message } if message == "B failed"
        ));
        assert_eq!(c.unwrap(), "C");
    }

    #[tokio::test]
    async fn test_panicking_operation_does_not_stall_queue() {
        let queue = RequestQueue::new();

        let a = queue.enqueue(|| async { Ok(1) });
        let b = queue.enqueue(|| async {
            if true {
                panic!("boom");
            }
            Ok(2)
        });
        let c = queue.enqueue(|| async { Ok(3) });

        let (a, b, c) = tokio::join!(a, b, c);
        assert_eq!(a.unwrap(), 1);
        assert!(matches!(b.unwrap_err(), HubError::QueueClosed));
        assert_eq!(c.unwrap(), 3);
    }

    #[tokio::test]
    async fn test_worker_lifecycle() {
        let queue = RequestQueue::new();
        assert!(!queue.is_processing());

        let first = queue.enqueue(|| async { Ok("first") });
        let second = queue.enqueue(|| async { Ok("second") });
        // Nothing has run yet; both wait behind a single worker
        assert!(queue.is_processing());
        assert_eq!(queue.len(), 2);

        assert_eq!(first.await.unwrap(), "first");
        assert_eq!(second.await.unwrap(), "second");
        wait_for_idle(&queue).await;
        assert!(queue.is_empty());

        // A fresh worker starts for later work
        let third = queue.enqueue(|| async { Ok("third") });
        assert!(queue.is_processing());
        assert_eq!(third.await.unwrap(), "third");
    }
}
