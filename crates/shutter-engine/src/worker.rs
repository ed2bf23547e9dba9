//! The single-threaded worker that owns engine state.
//!
//! Every state change runs as a job on the worker, in submission order.
//! Callbacks arriving on other threads post jobs through a [`WorkerHandle`]
//! instead of touching the state directly.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use crossbeam_channel::{bounded, unbounded, Receiver, RecvTimeoutError, Sender, TryRecvError};
use tracing::{debug, error};

use crate::error::EngineError;
use crate::EngineResult;

type Job<S> = Box<dyn FnOnce(&mut S) + Send>;

enum Message<S> {
    Run(Job<S>),
    Shutdown,
}

/// Posts jobs onto a worker. Cheap to clone.
pub struct WorkerHandle<S> {
    tx: Sender<Message<S>>,

    /// Jobs posted but not yet running.
    queued: Arc<AtomicUsize>,
}

impl<S> Clone for WorkerHandle<S> {
    fn clone(&self) -> Self {
        Self {
            tx: self.tx.clone(),
            queued: Arc::clone(&self.queued),
        }
    }
}

impl<S: 'static> WorkerHandle<S> {
    /// Queue a job. Returns false if the worker is gone.
    pub fn post(&self, job: impl FnOnce(&mut S) + Send + 'static) -> bool {
        self.queued.fetch_add(1, Ordering::SeqCst);
        if self.tx.send(Message::Run(Box::new(job))).is_err() {
            self.queued.fetch_sub(1, Ordering::SeqCst);
            return false;
        }
        true
    }

    /// Queue a job whose result resolves the returned handle.
    pub fn call<T: Send + 'static>(
        &self,
        job: impl FnOnce(&mut S) -> EngineResult<T> + Send + 'static,
    ) -> Pending<T> {
        let (completer, pending) = Pending::channel();
        self.post(move |state| completer.complete(job(state)));
        pending
    }

    /// Resolves once the queue drained, including jobs that running jobs
    /// posted in the meantime.
    pub fn settle(&self) -> Pending<()> {
        let (completer, pending) = Pending::channel();
        self.settle_with(completer);
        pending
    }

    fn settle_with(&self, completer: Completer<()>) {
        let handle = self.clone();
        self.post(move |_| {
            if handle.queued.load(Ordering::SeqCst) == 0 {
                completer.complete(Ok(()));
            } else {
                handle.settle_with(completer);
            }
        });
    }
}

/// A worker thread owning a state value of type `S`.
pub struct Worker<S> {
    handle: WorkerHandle<S>,
    thread: Option<JoinHandle<()>>,
}

impl<S: 'static> Worker<S> {
    /// Spawn a worker. `init` builds the state on the worker thread and may
    /// keep a handle to post continuations to itself.
    pub fn spawn(
        name: &str,
        init: impl FnOnce(WorkerHandle<S>) -> S + Send + 'static,
    ) -> std::io::Result<Self> {
        let (tx, rx) = unbounded();
        let handle = WorkerHandle {
            tx,
            queued: Arc::new(AtomicUsize::new(0)),
        };
        let own_handle = handle.clone();
        let queued = Arc::clone(&handle.queued);
        let thread = thread::Builder::new()
            .name(name.to_string())
            .spawn(move || run(init(own_handle), rx, queued))?;
        Ok(Self {
            handle,
            thread: Some(thread),
        })
    }

    pub fn handle(&self) -> &WorkerHandle<S> {
        &self.handle
    }
}

fn run<S>(mut state: S, rx: Receiver<Message<S>>, queued: Arc<AtomicUsize>) {
    debug!("Worker started");
    for message in rx.iter() {
        match message {
            Message::Run(job) => {
                queued.fetch_sub(1, Ordering::SeqCst);
                job(&mut state);
            }
            Message::Shutdown => break,
        }
    }
    debug!("Worker stopped");
}

impl<S> Drop for Worker<S> {
    fn drop(&mut self) {
        let _ = self.handle.tx.send(Message::Shutdown);
        if let Some(thread) = self.thread.take() {
            if thread.thread().id() == thread::current().id() {
                return;
            }
            if thread.join().is_err() {
                error!("Worker thread panicked");
            }
        }
    }
}

/// Resolves a [`Pending`].
pub struct Completer<T> {
    tx: Sender<EngineResult<T>>,
}

impl<T> Completer<T> {
    pub fn complete(self, result: EngineResult<T>) {
        let _ = self.tx.send(result);
    }
}

/// The eventual result of an engine operation.
///
/// Dropping the completing side without a result resolves it with
/// [`EngineError::WorkerGone`].
pub struct Pending<T> {
    rx: Receiver<EngineResult<T>>,
}

impl<T> Pending<T> {
    pub fn channel() -> (Completer<T>, Pending<T>) {
        let (tx, rx) = bounded(1);
        (Completer { tx }, Pending { rx })
    }

    /// An already resolved handle.
    pub fn resolved(result: EngineResult<T>) -> Self {
        let (completer, pending) = Self::channel();
        completer.complete(result);
        pending
    }

    /// Block until resolved.
    pub fn wait(self) -> EngineResult<T> {
        self.rx.recv().unwrap_or(Err(EngineError::WorkerGone))
    }

    /// Block until resolved or `timeout` elapsed.
    pub fn wait_timeout(&self, timeout: Duration) -> EngineResult<T> {
        match self.rx.recv_timeout(timeout) {
            Ok(result) => result,
            Err(RecvTimeoutError::Timeout) => Err(EngineError::Timeout),
            Err(RecvTimeoutError::Disconnected) => Err(EngineError::WorkerGone),
        }
    }

    /// The result, if already resolved.
    pub fn try_take(&self) -> Option<EngineResult<T>> {
        match self.rx.try_recv() {
            Ok(result) => Some(result),
            Err(TryRecvError::Empty) => None,
            Err(TryRecvError::Disconnected) => Some(Err(EngineError::WorkerGone)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_jobs_run_in_order() {
        let worker = Worker::spawn("test-worker", |_| Vec::<i32>::new()).unwrap();
        for i in 0..10 {
            worker.handle().post(move |log: &mut Vec<i32>| log.push(i));
        }
        let log = worker.handle().call(|log| Ok(log.clone())).wait().unwrap();
        assert_eq!(log, (0..10).collect::<Vec<_>>());
    }

    struct Log {
        handle: WorkerHandle<Log>,
        entries: Vec<&'static str>,
    }

    #[test]
    fn test_continuations_queue_behind_pending_jobs() {
        let worker = Worker::spawn("test-worker", |handle| Log {
            handle,
            entries: Vec::new(),
        })
        .unwrap();
        worker.handle().post(|log: &mut Log| {
            log.entries.push("first");
            log.handle.post(|log| log.entries.push("continuation"));
        });
        worker.handle().post(|log| log.entries.push("second"));

        // Once this resolves, the continuation is already queued.
        worker.handle().call(|_| Ok(())).wait().unwrap();
        let entries = worker.handle().call(|log| Ok(log.entries.clone())).wait().unwrap();
        assert_eq!(entries, vec!["first", "second", "continuation"]);
    }

    #[test]
    fn test_settle_waits_for_continuations() {
        let worker = Worker::spawn("test-worker", |handle| Log {
            handle,
            entries: Vec::new(),
        })
        .unwrap();
        worker.handle().post(|log: &mut Log| {
            log.handle.post(|log| {
                log.handle.post(|log| log.entries.push("nested"));
            });
        });

        worker.handle().settle().wait().unwrap();
        let entries = worker.handle().call(|log| Ok(log.entries.clone())).wait().unwrap();
        assert_eq!(entries, vec!["nested"]);
    }

    #[test]
    fn test_dropped_completer_resolves_worker_gone() {
        let (completer, pending) = Pending::<()>::channel();
        assert!(pending.try_take().is_none());
        drop(completer);
        assert!(matches!(pending.wait(), Err(EngineError::WorkerGone)));
    }

    #[test]
    fn test_wait_timeout() {
        let (_completer, pending) = Pending::<()>::channel();
        assert!(matches!(
            pending.wait_timeout(Duration::from_millis(5)),
            Err(EngineError::Timeout)
        ));
        assert!(Pending::resolved(Ok(3)).wait_timeout(Duration::from_millis(5)).is_ok());
    }
}
