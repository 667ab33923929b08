//! Per-conversation serial execution.
//!
//! Every conversation key has at most one job running. Jobs submitted while
//! one is running wait in a FIFO for that key; different keys never wait on
//! each other. A key with nothing running has no entry in the map.

use std::{
    any::Any,
    collections::{HashMap, VecDeque},
    future::Future,
    panic::AssertUnwindSafe,
    pin::Pin,
    sync::{Arc, Mutex, MutexGuard, PoisonError},
    task::{Context, Poll},
};

use {
    futures::FutureExt,
    tokio::sync::oneshot,
    tracing::{debug, warn},
};

type Job = Pin<Box<dyn Future<Output = ()> + Send + 'static>>;

/// Key -> jobs waiting behind the running one. Presence means "running".
type Queues = Arc<Mutex<HashMap<String, VecDeque<Job>>>>;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DispatchError {
    #[error("task panicked: {0}")]
    Panicked(String),
    #[error("task was dropped before completing")]
    Canceled,
}

/// Outcome of an enqueued task. Dropping the handle does not cancel the task.
#[must_use = "the task runs regardless; await the handle to observe its outcome"]
pub struct TaskHandle<T> {
    rx: oneshot::Receiver<Result<T, DispatchError>>,
}

impl<T> Future for TaskHandle<T> {
    type Output = Result<T, DispatchError>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        Pin::new(&mut self.rx)
            .poll(cx)
            .map(|res| res.unwrap_or(Err(DispatchError::Canceled)))
    }
}

impl<T> std::fmt::Debug for TaskHandle<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TaskHandle").finish_non_exhaustive()
    }
}

#[derive(Clone, Default)]
pub struct SerialDispatcher {
    queues: Queues,
}

impl SerialDispatcher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Submit `task` to run after everything already queued for `key`.
    ///
    /// Must be called from within a tokio runtime.
    pub fn enqueue<F, T>(&self, key: impl Into<String>, task: F) -> TaskHandle<T>
    where
        F: Future<Output = T> + Send + 'static,
        T: Send + 'static,
    {
        let key = key.into();
        let (tx, rx) = oneshot::channel();
        let job_key = key.clone();
        let job: Job = Box::pin(async move {
            let outcome = AssertUnwindSafe(task)
                .catch_unwind()
                .await
                .map_err(|payload| {
                    let message = panic_message(payload.as_ref());
                    warn!(key = %job_key, panic = %message, "queued task panicked");
                    DispatchError::Panicked(message)
                });
            // The caller may have dropped the handle; the outcome is then unobserved.
            let _ = tx.send(outcome);
        });

        let idle_job = {
            let mut queues = lock(&self.queues);
            match queues.get_mut(&key) {
                Some(waiting) => {
                    waiting.push_back(job);
                    debug!(key = %key, pending = waiting.len(), "task queued behind running task");
                    None
                },
                None => {
                    queues.insert(key.clone(), VecDeque::new());
                    Some(job)
                },
            }
        };

        if let Some(first) = idle_job {
            tokio::spawn(drain(Arc::clone(&self.queues), key, first));
        }

        TaskHandle { rx }
    }

    /// Whether a task is running for `key`.
    pub fn is_active(&self, key: &str) -> bool {
        lock(&self.queues).contains_key(key)
    }

    /// Keys with a running task, sorted.
    pub fn active_keys(&self) -> Vec<String> {
        let mut keys: Vec<String> = lock(&self.queues).keys().cloned().collect();
        keys.sort();
        keys
    }

    /// Tasks waiting behind the running one for `key`.
    pub fn pending(&self, key: &str) -> usize {
        lock(&self.queues).get(key).map_or(0, VecDeque::len)
    }
}

/// Run jobs for one key until its queue is empty, then retire the key.
async fn drain(queues: Queues, key: String, first: Job) {
    let mut next = Some(first);
    while let Some(job) = next {
        job.await;
        next = {
            let mut queues = lock(&queues);
            let popped = queues.get_mut(&key).and_then(VecDeque::pop_front);
            if popped.is_none() {
                queues.remove(&key);
            }
            popped
        };
    }
    debug!(key = %key, "conversation queue drained");
}

fn lock(queues: &Queues) -> MutexGuard<'_, HashMap<String, VecDeque<Job>>> {
    queues.lock().unwrap_or_else(PoisonError::into_inner)
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic payload".to_string()
    }
}
