//! Mutual exclusion for response cycles.
//!
//! The guarded state lives on a dedicated worker task. Callers submit jobs
//! that borrow the state mutably; jobs run one at a time, in the order they
//! were submitted, and nothing else can touch the state in between.

pub use futures::future::BoxFuture;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;

type Job<S> = Box<dyn for<'a> FnOnce(&'a mut S) -> BoxFuture<'a, ()> + Send>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("response guard worker has shut down")]
pub struct GuardClosed;

pub struct ResponseGuard<S> {
    jobs: mpsc::UnboundedSender<Job<S>>,
}

impl<S> Clone for ResponseGuard<S> {
    fn clone(&self) -> Self {
        Self {
            jobs: self.jobs.clone(),
        }
    }
}

fn into_job<S, F>(f: F) -> Job<S>
where
    F: for<'a> FnOnce(&'a mut S) -> BoxFuture<'a, ()> + Send + 'static,
{
    Box::new(f)
}

impl<S: Send + 'static> ResponseGuard<S> {
    /// Moves `state` onto a worker task. The handle yields the state back
    /// once every guard has been dropped and the queue is drained.
    pub fn spawn(state: S) -> (Self, JoinHandle<S>) {
        let (jobs, mut queue) = mpsc::unbounded_channel::<Job<S>>();
        let worker = tokio::spawn(async move {
            let mut state = state;
            while let Some(job) = queue.recv().await {
                job(&mut state).await;
            }
            state
        });
        (Self { jobs }, worker)
    }

    /// Queues `f` behind every previously submitted job without waiting for it.
    pub fn submit<F, T>(&self, f: F) -> Result<oneshot::Receiver<T>, GuardClosed>
    where
        F: for<'a> FnOnce(&'a mut S) -> BoxFuture<'a, T> + Send + 'static,
        T: Send + 'static,
    {
        let (done, result) = oneshot::channel();
        let job = into_job(move |state| {
            Box::pin(async move {
                let output = f(state).await;
                // The submitter may not care about the result.
                let _ = done.send(output);
            })
        });
        self.jobs.send(job).map_err(|_| GuardClosed)?;
        Ok(result)
    }

    /// Runs `f` with exclusive access to the state and waits for its result.
    pub async fn run_exclusive<F, T>(&self, f: F) -> Result<T, GuardClosed>
    where
        F: for<'a> FnOnce(&'a mut S) -> BoxFuture<'a, T> + Send + 'static,
        T: Send + 'static,
    {
        self.submit(f)?.await.map_err(|_| GuardClosed)
    }
}
