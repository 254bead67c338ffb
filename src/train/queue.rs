//! Single-concurrency FIFO job queue.
//!
//! Each repository owns one `JobQueue`. Jobs are sent over an unbounded
//! channel to a dedicated worker task which runs them strictly one at a
//! time, in arrival order. A job that panics is logged and the worker moves
//! on to the next one.
//!
//! ```text
//! enqueue ──► mpsc ──► worker task ──► runner.run(job)   (one at a time)
//!                          ▲
//!                  pause ──┘ (watch<bool>)
//! ```
//!
//! `size()` counts pending plus running jobs and is published on a watch
//! channel so `drain()` can wait for it to reach zero.

use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use futures::FutureExt;
use thiserror::Error;
use tokio::sync::{mpsc, watch};
use tracing::{error, trace};

/// Runs the jobs of one queue.
pub trait JobRunner<J>: Send + Sync + 'static {
    fn run(&self, job: J) -> impl Future<Output = ()> + Send;
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum QueueError {
    /// The worker task is gone (the runtime is shutting down).
    #[error("job queue worker has stopped")]
    Closed,
}

/// A per-repository job queue.
pub struct JobQueue<J> {
    tx: mpsc::UnboundedSender<J>,
    paused: watch::Sender<bool>,
    pending: Arc<watch::Sender<usize>>,
}

impl<J: Send + 'static> JobQueue<J> {
    /// Spawns the worker task. Must be called within a tokio runtime.
    ///
    /// `name` labels the worker's log events.
    pub fn spawn<R: JobRunner<J>>(name: impl Into<String>, runner: Arc<R>) -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        let (paused, paused_rx) = watch::channel(false);
        let pending = Arc::new(watch::Sender::new(0usize));

        tokio::spawn(run_worker(name.into(), rx, paused_rx, pending.clone(), runner));

        Self {
            tx,
            paused,
            pending,
        }
    }

    /// Appends a job.
    pub fn enqueue(&self, job: J) -> Result<(), QueueError> {
        self.pending.send_modify(|n| *n += 1);
        if self.tx.send(job).is_err() {
            self.pending.send_modify(|n| *n = n.saturating_sub(1));
            return Err(QueueError::Closed);
        }
        Ok(())
    }

    /// Number of jobs pending or running.
    pub fn size(&self) -> usize {
        *self.pending.borrow()
    }

    /// Stops starting new jobs. A running job finishes.
    pub fn pause(&self) {
        self.paused.send_replace(true);
    }

    pub fn resume(&self) {
        self.paused.send_replace(false);
    }

    pub fn is_paused(&self) -> bool {
        *self.paused.borrow()
    }

    /// Resolves once no job is pending or running.
    ///
    /// Never resolves while the queue is paused with jobs pending.
    pub async fn drain(&self) {
        let mut rx = self.pending.subscribe();
        let _ = rx.wait_for(|n| *n == 0).await;
    }
}

async fn run_worker<J, R>(
    name: String,
    mut rx: mpsc::UnboundedReceiver<J>,
    mut paused: watch::Receiver<bool>,
    pending: Arc<watch::Sender<usize>>,
    runner: Arc<R>,
) where
    J: Send + 'static,
    R: JobRunner<J>,
{
    while let Some(job) = rx.recv().await {
        let resumed = paused.wait_for(|p| !*p).await.is_ok();
        if !resumed {
            // The queue handle was dropped while paused.
            break;
        }

        trace!(queue = %name, queue_len = *pending.borrow(), "Running job");
        if AssertUnwindSafe(runner.run(job))
            .catch_unwind()
            .await
            .is_err()
        {
            error!(queue = %name, "Job panicked; continuing with next job");
        }

        pending.send_modify(|n| *n = n.saturating_sub(1));
    }

    trace!(queue = %name, "Job queue worker stopped");
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;
    use std::time::Duration;
    use tokio::time::timeout;

    /// Records job ids; panics on id 0.
    #[derive(Default)]
    struct Recorder {
        seen: Mutex<Vec<u32>>,
        running: Mutex<u32>,
        max_running: Mutex<u32>,
    }

    impl JobRunner<u32> for Recorder {
        async fn run(&self, job: u32) {
            {
                let mut running = self.running.lock().unwrap();
                *running += 1;
                let mut max = self.max_running.lock().unwrap();
                *max = (*max).max(*running);
            }
            tokio::time::sleep(Duration::from_millis(1)).await;
            *self.running.lock().unwrap() -= 1;

            if job == 0 {
                panic!("boom");
            }
            self.seen.lock().unwrap().push(job);
        }
    }

    fn queue() -> (JobQueue<u32>, Arc<Recorder>) {
        let recorder = Arc::new(Recorder::default());
        (JobQueue::spawn("test", recorder.clone()), recorder)
    }

    #[tokio::test]
    async fn paused_queue_counts_jobs_then_drains_in_order() {
        let (queue, recorder) = queue();
        queue.pause();

        for id in 1..=5 {
            queue.enqueue(id).unwrap();
        }
        tokio::task::yield_now().await;
        assert_eq!(queue.size(), 5);
        assert!(recorder.seen.lock().unwrap().is_empty());

        queue.resume();
        timeout(Duration::from_secs(5), queue.drain()).await.unwrap();

        assert_eq!(queue.size(), 0);
        assert_eq!(*recorder.seen.lock().unwrap(), vec![1, 2, 3, 4, 5]);
    }

    #[tokio::test]
    async fn runs_one_job_at_a_time() {
        let (queue, recorder) = queue();
        for id in 1..=20 {
            queue.enqueue(id).unwrap();
        }
        timeout(Duration::from_secs(5), queue.drain()).await.unwrap();

        assert_eq!(*recorder.max_running.lock().unwrap(), 1);
        assert_eq!(recorder.seen.lock().unwrap().len(), 20);
    }

    #[tokio::test]
    async fn panicking_job_does_not_stop_the_queue() {
        let (queue, recorder) = queue();
        queue.enqueue(1).unwrap();
        queue.enqueue(0).unwrap();
        queue.enqueue(2).unwrap();

        timeout(Duration::from_secs(5), queue.drain()).await.unwrap();
        assert_eq!(*recorder.seen.lock().unwrap(), vec![1, 2]);
    }

    #[tokio::test]
    async fn drain_on_idle_queue_returns_immediately() {
        let (queue, _) = queue();
        timeout(Duration::from_millis(100), queue.drain())
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn queues_are_independent() {
        let (a, recorder_a) = queue();
        let (b, recorder_b) = queue();

        a.pause();
        a.enqueue(1).unwrap();
        b.enqueue(7).unwrap();
        b.enqueue(8).unwrap();

        timeout(Duration::from_secs(5), b.drain()).await.unwrap();
        assert_eq!(*recorder_b.seen.lock().unwrap(), vec![7, 8]);
        assert_eq!(a.size(), 1);
        assert!(recorder_a.seen.lock().unwrap().is_empty());

        a.resume();
        timeout(Duration::from_secs(5), a.drain()).await.unwrap();
        assert_eq!(*recorder_a.seen.lock().unwrap(), vec![1]);
    }
}
