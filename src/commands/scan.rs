use anyhow::{anyhow, Result};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

use crate::config::Config;
use crate::decoder::TraceDecoder;
use crate::job::{Job, MountCount};
use crate::queue::JobQueue;
use crate::worker::Worker;

/// Results of one batch, in completion order
#[derive(Debug)]
pub struct BatchReport {
    pub results: Vec<MountCount>,
    pub elapsed: Duration,
}

impl BatchReport {
    pub fn total(&self) -> usize {
        self.results.len()
    }

    /// Files with at least one matching mount
    pub fn matched(&self) -> usize {
        self.results.iter().filter(|r| r.is_match()).count()
    }

    pub fn failed(&self) -> usize {
        self.results.iter().filter(|r| r.error().is_some()).count()
    }

    pub fn total_matches(&self) -> usize {
        self.results
            .iter()
            .filter_map(|r| r.outcome.as_ref().ok())
            .sum()
    }

    pub fn print_summary(&self) {
        info!(
            "✅ Scan complete: {} files, {} with matching mounts ({} mounts), {} failed in {:.2}s",
            self.total(),
            self.matched(),
            self.total_matches(),
            self.failed(),
            self.elapsed.as_secs_f64()
        );
    }
}

/// Scan a batch of trace files with a fixed pool of workers
pub struct ScanCommand {
    files: Vec<PathBuf>,
    config: Config,
}

impl ScanCommand {
    pub fn new(files: Vec<PathBuf>, config: Config) -> Self {
        Self { files, config }
    }

    /// Returns once exactly one result per input file has been collected.
    pub async fn execute(&self, cancel: CancellationToken) -> Result<BatchReport> {
        let started = Instant::now();
        let total = self.files.len();
        info!("Got {} files to process", total);

        let jobs: Vec<Job> = self.files.iter().cloned().map(Job::new).collect();
        let queue = JobQueue::dispatch(jobs).await?;

        let (results_tx, mut results_rx) = mpsc::channel(total.max(1));
        let decoder = Arc::new(TraceDecoder::new(&self.config));
        let pool_size = self.config.pool_size.max(1);
        debug!("Starting {} workers", pool_size);

        for id in 0..pool_size {
            let worker = Worker::new(id, Arc::clone(&decoder), cancel.clone());
            tokio::spawn(worker.run(queue.clone(), results_tx.clone()));
        }
        // Workers hold the only senders now
        drop(results_tx);

        let mut results = Vec::with_capacity(total);
        while results.len() < total {
            let result = results_rx.recv().await.ok_or_else(|| {
                anyhow!(
                    "Result queue closed after {} of {} results",
                    results.len(),
                    total
                )
            })?;
            report(&result);
            results.push(result);
        }

        Ok(BatchReport {
            results,
            elapsed: started.elapsed(),
        })
    }
}

/// Failures and matches are reported; zero-match successes stay quiet
fn report(result: &MountCount) {
    info!("Got result from {}", result.filename());
    match &result.outcome {
        Err(e) => error!("❌ {}: {}", result.filename(), e),
        Ok(count) if *count > 0 => {
            info!("{} contains {} relevant mounts", result.filename(), count)
        }
        Ok(_) => {}
    }
}
