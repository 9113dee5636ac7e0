//! Sequential task queue guaranteeing at most one in-flight mutation.
//!
//! All timeline mutation funnels through [`SequentialTaskQueue`], which runs
//! queued tasks strictly in arrival order. A task may finish synchronously or
//! suspend on collaborator I/O; both cases are modelled explicitly by
//! [`Completion`] instead of probing returned values at runtime.

use std::collections::VecDeque;
use std::future::Future;
use std::sync::{Arc, Mutex};

use futures_util::FutureExt;
use futures_util::future::{BoxFuture, Shared};

/// Result of a unit of work that may or may not have suspended.
pub enum Completion<T> {
    /// The work finished without suspending.
    Ready(T),
    /// The work suspended; awaiting the future yields the result.
    Pending(BoxFuture<'static, T>),
}

impl<T: Send + 'static> Completion<T> {
    /// Wrap a future as a pending completion.
    pub fn pending<F>(fut: F) -> Self
    where
        F: Future<Output = T> + Send + 'static,
    {
        Completion::Pending(Box::pin(fut))
    }

    /// True if the work finished synchronously.
    pub fn is_ready(&self) -> bool {
        matches!(self, Completion::Ready(_))
    }

    /// Resolve the completion, awaiting if necessary.
    pub async fn wait(self) -> T {
        match self {
            Completion::Ready(value) => value,
            Completion::Pending(fut) => fut.await,
        }
    }

    /// Map the completed value, preserving the sync/async distinction.
    pub fn map<U, F>(self, f: F) -> Completion<U>
    where
        U: Send + 'static,
        F: FnOnce(T) -> U + Send + 'static,
    {
        match self {
            Completion::Ready(value) => Completion::Ready(f(value)),
            Completion::Pending(fut) => Completion::Pending(Box::pin(fut.map(f))),
        }
    }

    /// Chain another possibly-suspending step after this one. The result is
    /// `Ready` only if both steps finished synchronously.
    pub fn and_then<U, F>(self, f: F) -> Completion<U>
    where
        U: Send + 'static,
        F: FnOnce(T) -> Completion<U> + Send + 'static,
    {
        match self {
            Completion::Ready(value) => f(value),
            Completion::Pending(fut) => {
                Completion::Pending(Box::pin(async move { f(fut.await).wait().await }))
            }
        }
    }
}

impl<T> std::fmt::Debug for Completion<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Completion::Ready(_) => f.write_str("Completion::Ready"),
            Completion::Pending(_) => f.write_str("Completion::Pending"),
        }
    }
}

/// A queued unit of work. Runs once, reporting whether it suspended.
pub type Task = Box<dyn FnOnce() -> Completion<()> + Send + 'static>;

struct QueueState {
    pending: VecDeque<Task>,
    /// Completion handle of the currently running task, if it suspended.
    in_flight: Option<Shared<BoxFuture<'static, ()>>>,
    disposed: bool,
}

impl std::fmt::Debug for QueueState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("QueueState")
            .field("pending", &self.pending.len())
            .field("in_flight", &self.in_flight.is_some())
            .field("disposed", &self.disposed)
            .finish()
    }
}

/// FIFO queue that admits exactly one in-flight task at a time.
///
/// Tasks execute in enqueue order with no interleaving. A task that finishes
/// synchronously signals completion immediately; an asynchronous task holds
/// the queue until its future settles. Clones share the same queue.
#[derive(Clone, Debug)]
pub struct SequentialTaskQueue {
    state: Arc<Mutex<QueueState>>,
}

impl Default for SequentialTaskQueue {
    fn default() -> Self {
        Self::new()
    }
}

impl SequentialTaskQueue {
    /// Create a new empty queue.
    pub fn new() -> Self {
        Self {
            state: Arc::new(Mutex::new(QueueState {
                pending: VecDeque::new(),
                in_flight: None,
                disposed: false,
            })),
        }
    }

    /// Append a task to the pending list. The queue is unbounded. Pushes to a
    /// disposed queue are dropped.
    pub fn push(&self, task: Task) {
        let mut state = self.state.lock().expect("queue lock poisoned");
        if state.disposed {
            return;
        }
        state.pending.push_back(task);
    }

    /// Number of tasks waiting to start.
    pub fn len(&self) -> usize {
        self.state.lock().expect("queue lock poisoned").pending.len()
    }

    /// True when no task is waiting to start.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Discard all not-yet-started tasks, e.g. when switching documents. The
    /// in-flight task, if any, still runs to completion.
    pub fn dispose(&self) {
        let mut state = self.state.lock().expect("queue lock poisoned");
        state.disposed = true;
        state.pending.clear();
    }

    /// Run the next pending task.
    ///
    /// If a task is already in flight, its existing completion handle is
    /// returned instead of starting another one. An empty queue completes
    /// immediately.
    pub fn process_next(&self) -> Completion<()> {
        let (task, notify) = {
            let mut state = self.state.lock().expect("queue lock poisoned");
            if let Some(handle) = &state.in_flight {
                return Completion::Pending(Box::pin(handle.clone()));
            }
            let Some(task) = state.pending.pop_front() else {
                return Completion::Ready(());
            };
            // Mark the slot busy before running so reentrant calls observe
            // the in-flight task rather than dequeuing past it.
            let (notify, notified) = tokio::sync::oneshot::channel::<()>();
            let handle: Shared<BoxFuture<'static, ()>> = (Box::pin(async move {
                let _ = notified.await;
            }) as BoxFuture<'static, ()>)
                .shared();
            state.in_flight = Some(handle);
            (task, notify)
        };

        match task() {
            Completion::Ready(()) => {
                self.state.lock().expect("queue lock poisoned").in_flight = None;
                let _ = notify.send(());
                Completion::Ready(())
            }
            Completion::Pending(fut) => {
                let state = Arc::clone(&self.state);
                Completion::Pending(Box::pin(async move {
                    fut.await;
                    state.lock().expect("queue lock poisoned").in_flight = None;
                    let _ = notify.send(());
                }))
            }
        }
    }

    /// Drain the queue in strict arrival order.
    ///
    /// Task N+1 never starts before task N has fully completed. Returns
    /// `Ready` when the whole drain ran without suspending once; otherwise a
    /// future resolving once the queue (including tasks pushed while
    /// draining) is empty.
    pub fn process_all(&self) -> Completion<()> {
        loop {
            {
                let state = self.state.lock().expect("queue lock poisoned");
                if state.pending.is_empty() && state.in_flight.is_none() {
                    return Completion::Ready(());
                }
            }
            match self.process_next() {
                Completion::Ready(()) => continue,
                Completion::Pending(fut) => {
                    let queue = self.clone();
                    return Completion::Pending(Box::pin(async move {
                        fut.await;
                        queue.process_all().wait().await;
                    }));
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn order_log() -> Arc<Mutex<Vec<&'static str>>> {
        Arc::new(Mutex::new(Vec::new()))
    }

    fn sync_task(log: &Arc<Mutex<Vec<&'static str>>>, name: &'static str) -> Task {
        let log = Arc::clone(log);
        Box::new(move || {
            log.lock().unwrap().push(name);
            Completion::Ready(())
        })
    }

    #[test]
    fn test_process_next_empty_queue() {
        let queue = SequentialTaskQueue::new();
        assert!(queue.process_next().is_ready());
    }

    #[test]
    fn test_process_all_sync_tasks_run_in_push_order() {
        let queue = SequentialTaskQueue::new();
        let log = order_log();
        queue.push(sync_task(&log, "a"));
        queue.push(sync_task(&log, "b"));
        queue.push(sync_task(&log, "c"));

        let completion = queue.process_all();
        assert!(completion.is_ready());
        assert_eq!(*log.lock().unwrap(), vec!["a", "b", "c"]);
        assert!(queue.is_empty());
    }

    #[tokio::test]
    async fn test_async_task_blocks_successor_until_settled() {
        let queue = SequentialTaskQueue::new();
        let log = order_log();
        let (gate_tx, gate_rx) = tokio::sync::oneshot::channel::<()>();

        let log1 = Arc::clone(&log);
        queue.push(Box::new(move || {
            log1.lock().unwrap().push("first:start");
            let log1 = Arc::clone(&log1);
            Completion::pending(async move {
                let _ = gate_rx.await;
                log1.lock().unwrap().push("first:end");
            })
        }));
        queue.push(sync_task(&log, "second"));

        let completion = queue.process_all();
        assert!(!completion.is_ready());
        // The second task must not have been invoked yet.
        assert_eq!(*log.lock().unwrap(), vec!["first:start"]);

        gate_tx.send(()).unwrap();
        completion.wait().await;
        assert_eq!(
            *log.lock().unwrap(),
            vec!["first:start", "first:end", "second"]
        );
    }

    #[tokio::test]
    async fn test_process_next_returns_existing_in_flight_handle() {
        let queue = SequentialTaskQueue::new();
        let log = order_log();
        let (gate_tx, gate_rx) = tokio::sync::oneshot::channel::<()>();

        queue.push(Box::new(move || {
            Completion::pending(async move {
                let _ = gate_rx.await;
            })
        }));
        queue.push(sync_task(&log, "waiting"));

        let first = queue.process_next();
        assert!(!first.is_ready());
        // Reentrant call observes the running task; the second task stays
        // queued.
        let second = queue.process_next();
        assert!(!second.is_ready());
        assert_eq!(queue.len(), 1);

        gate_tx.send(()).unwrap();
        first.wait().await;
        second.wait().await;
        assert!(log.lock().unwrap().is_empty());
        assert!(queue.process_all().is_ready());
        assert_eq!(*log.lock().unwrap(), vec!["waiting"]);
    }

    #[test]
    fn test_dispose_drops_unstarted_tasks() {
        let queue = SequentialTaskQueue::new();
        let log = order_log();
        queue.push(sync_task(&log, "never"));
        queue.dispose();
        assert!(queue.process_all().is_ready());
        assert!(log.lock().unwrap().is_empty());

        queue.push(sync_task(&log, "ignored"));
        assert!(queue.is_empty());
    }

    #[tokio::test]
    async fn test_and_then_preserves_sync_distinction() {
        let sync = Completion::Ready(1).and_then(|v| Completion::Ready(v + 1));
        assert!(sync.is_ready());
        assert_eq!(sync.wait().await, 2);

        let suspended =
            Completion::Ready(1).and_then(|v| Completion::pending(async move { v + 1 }));
        assert!(!suspended.is_ready());
        assert_eq!(suspended.wait().await, 2);
    }
}
