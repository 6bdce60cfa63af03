use std::sync::Arc;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::decoder::TraceDecoder;
use crate::job::MountCount;
use crate::queue::JobQueue;

/// One member of the fixed scan pool
pub struct Worker {
    pub id: usize,
    decoder: Arc<TraceDecoder>,
    cancel: CancellationToken,
}

impl Worker {
    pub fn new(id: usize, decoder: Arc<TraceDecoder>, cancel: CancellationToken) -> Self {
        Self {
            id,
            decoder,
            cancel,
        }
    }

    /// Scan jobs until the queue is drained, sending one result per job.
    ///
    /// Returns the number of jobs this worker handled.
    pub async fn run(self, jobs: JobQueue, results: mpsc::Sender<MountCount>) -> usize {
        let mut processed = 0;

        while let Some(job) = jobs.claim().await {
            info!("Task {:2} processing {}", self.id, job.path.display());

            let outcome = self.decoder.scan(&job, &self.cancel).await;
            processed += 1;

            if results.send(MountCount::new(job.path, outcome)).await.is_err() {
                debug!("Task {:2}: result queue closed", self.id);
                break;
            }
        }

        debug!("Task {:2} finished after {} jobs", self.id, processed);
        processed
    }
}
