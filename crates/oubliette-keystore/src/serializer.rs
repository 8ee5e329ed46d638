//! Access serializer: one dedicated worker per engine.
//!
//! Store and hardware calls may block on authentication prompts or disk,
//! so they run on an OS thread owned by the engine rather than on the
//! caller's async runtime. Jobs are enqueued at submission time and run
//! strictly in submission order; callers await a [`Pending`] for the result.

use std::future::Future;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::pin::Pin;
use std::task::{Context, Poll};
use std::thread::{JoinHandle, ThreadId};

use parking_lot::Mutex;
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, error, trace};

use crate::error::{KeystoreError, Result};

type Job = Box<dyn FnOnce() + Send + 'static>;

/// Sequential worker executing keystore jobs in enqueue order.
pub struct AccessSerializer {
    sender: Mutex<Option<mpsc::UnboundedSender<Job>>>,
    worker: Mutex<Option<JoinHandle<()>>>,
    worker_id: ThreadId,
}

impl AccessSerializer {
    /// Start a worker thread named `name`.
    pub fn spawn(name: &str) -> Result<Self> {
        let (tx, mut rx) = mpsc::unbounded_channel::<Job>();

        let handle = std::thread::Builder::new()
            .name(name.to_string())
            .spawn(move || {
                while let Some(job) = rx.blocking_recv() {
                    // The job's reply channel is dropped during unwind, which
                    // the waiting caller observes as EngineUnavailable.
                    if catch_unwind(AssertUnwindSafe(job)).is_err() {
                        error!("keystore job panicked");
                    }
                }
                debug!("keystore worker drained");
            })
            .map_err(|e| {
                KeystoreError::EngineUnavailable(format!("failed to start worker thread: {e}"))
            })?;

        debug!(worker = name, "keystore worker started");
        Ok(Self {
            sender: Mutex::new(Some(tx)),
            worker_id: handle.thread().id(),
            worker: Mutex::new(Some(handle)),
        })
    }

    /// Enqueue `job`. It runs even if the returned future is never polled.
    pub fn submit<T, F>(&self, job: F) -> Pending<T>
    where
        T: Send + 'static,
        F: FnOnce() -> Result<T> + Send + 'static,
    {
        let (reply_tx, reply_rx) = oneshot::channel();
        let boxed: Job = Box::new(move || {
            // The caller may have dropped its Pending; the job still ran.
            let _ = reply_tx.send(job());
        });

        let sender = self.sender.lock();
        match sender.as_ref() {
            Some(tx) if tx.send(boxed).is_ok() => {
                trace!("job enqueued");
                Pending::queued(reply_rx)
            }
            _ => Pending::ready(Err(KeystoreError::EngineUnavailable(
                "keystore has been shut down".to_string(),
            ))),
        }
    }

    /// Whether new jobs are still accepted.
    pub fn is_running(&self) -> bool {
        self.sender.lock().is_some()
    }

    /// Stop accepting jobs, let queued ones finish, and join the worker.
    ///
    /// Safe to call more than once. When called from a job on the worker
    /// itself, the join is skipped and the worker exits after that job.
    pub fn shutdown(&self) {
        let Some(sender) = self.sender.lock().take() else {
            return;
        };
        drop(sender);

        let handle = self.worker.lock().take();
        if std::thread::current().id() == self.worker_id {
            debug!("shutdown requested from worker; not joining");
            return;
        }
        if let Some(handle) = handle {
            if handle.join().is_err() {
                error!("keystore worker terminated abnormally");
            }
        }
        debug!("keystore worker stopped");
    }
}

impl Drop for AccessSerializer {
    fn drop(&mut self) {
        self.shutdown();
    }
}

enum PendingState<T> {
    Ready(Option<Result<T>>),
    Queued(oneshot::Receiver<Result<T>>),
}

/// Result of a submitted keystore operation.
///
/// The operation is already queued when this value is created; awaiting it
/// only observes the outcome. Dropping it does not cancel the operation.
#[must_use = "the operation runs regardless, but its outcome is lost unless awaited"]
pub struct Pending<T> {
    state: PendingState<T>,
}

impl<T> Pending<T> {
    fn queued(rx: oneshot::Receiver<Result<T>>) -> Self {
        Self {
            state: PendingState::Queued(rx),
        }
    }

    pub(crate) fn ready(result: Result<T>) -> Self {
        Self {
            state: PendingState::Ready(Some(result)),
        }
    }
}

impl<T> Unpin for Pending<T> {}

impl<T> Future for Pending<T> {
    type Output = Result<T>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        match &mut self.state {
            PendingState::Ready(slot) => Poll::Ready(slot.take().unwrap_or_else(|| {
                Err(KeystoreError::EngineUnavailable(
                    "operation result already taken".to_string(),
                ))
            })),
            PendingState::Queued(rx) => Pin::new(rx).poll(cx).map(|reply| {
                reply.unwrap_or_else(|_| {
                    Err(KeystoreError::EngineUnavailable(
                        "operation ended without a result".to_string(),
                    ))
                })
            }),
        }
    }
}
