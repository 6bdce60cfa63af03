use anyhow::{anyhow, Result};
use std::sync::Arc;
use tokio::sync::{mpsc, Mutex};
use tracing::debug;

use crate::job::Job;

/// Closed, preloaded job queue shared by every worker in the pool.
///
/// Each job is handed to exactly one caller of [`JobQueue::claim`]. Once all
/// jobs have been claimed every further claim returns `None`.
#[derive(Clone)]
pub struct JobQueue {
    rx: Arc<Mutex<mpsc::Receiver<Job>>>,
}

impl JobQueue {
    /// Load every job in input order, then close the queue
    pub async fn dispatch(jobs: Vec<Job>) -> Result<Self> {
        let (tx, rx) = mpsc::channel(jobs.len().max(1));
        let total = jobs.len();

        for job in jobs {
            tx.send(job)
                .await
                .map_err(|e| anyhow!("Job queue closed while dispatching {:?}", e.0.path))?;
        }
        drop(tx);
        debug!("Dispatched {} jobs", total);

        Ok(Self {
            rx: Arc::new(Mutex::new(rx)),
        })
    }

    /// Take the next job, or `None` once the queue is drained
    pub async fn claim(&self) -> Option<Job> {
        self.rx.lock().await.recv().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;
    use std::path::PathBuf;

    #[tokio::test]
    async fn test_claim_in_dispatch_order() {
        let queue = JobQueue::dispatch(vec![Job::new("a.txt.gz"), Job::new("b.darshan")])
            .await
            .unwrap();

        assert_eq!(queue.claim().await.unwrap().path, PathBuf::from("a.txt.gz"));
        assert_eq!(queue.claim().await.unwrap().path, PathBuf::from("b.darshan"));
        assert!(queue.claim().await.is_none());
        assert!(queue.claim().await.is_none());
    }

    #[tokio::test]
    async fn test_empty_queue_is_closed() {
        let queue = JobQueue::dispatch(Vec::new()).await.unwrap();
        assert!(queue.claim().await.is_none());
    }

    #[tokio::test]
    async fn test_each_job_claimed_once() {
        let jobs: Vec<Job> = (0..100).map(|i| Job::new(format!("{i}.darshan"))).collect();
        let queue = JobQueue::dispatch(jobs).await.unwrap();

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let queue = queue.clone();
                tokio::spawn(async move {
                    let mut claimed = Vec::new();
                    while let Some(job) = queue.claim().await {
                        claimed.push(job.path);
                    }
                    claimed
                })
            })
            .collect();

        let mut seen = HashSet::new();
        for handle in handles {
            for path in handle.await.unwrap() {
                assert!(seen.insert(path), "job claimed twice");
            }
        }
        assert_eq!(seen.len(), 100);
    }
}
