//! Worker-pool scheduler over a queue of landmark IDs.
//!
//! Work items flow through a bounded queue consumed by exactly `parallelism` workers.
//! Each worker owns its processor instance for the lifetime of the run; processors
//! are never shared between workers. Results are aggregated in completion order, so
//! input order is preserved only for reporting, not for side effects.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{Mutex, mpsc, watch};
use tokio::time::{Instant, timeout};

use crate::catalog::LandmarkId;
use crate::config::get_config;
use crate::pipeline::types::{
    BatchRunReport, BatchStatistics, LandmarkProcessor, ProcessingResult,
};

/// Scheduling knobs for one batch run.
#[derive(Debug, Clone)]
pub struct OrchestratorConfig {
    /// Number of concurrent workers; also the queue capacity.
    pub parallelism: usize,
    /// Deadline applied to each landmark individually.
    pub per_landmark_timeout: Duration,
    /// Optional deadline for the whole run. When it elapses, dispatch stops,
    /// outstanding workers are cancelled, and accumulated results are drained.
    pub global_timeout: Option<Duration>,
}

impl OrchestratorConfig {
    /// Read the scheduling configuration from the environment-backed config.
    pub fn from_env() -> Self {
        let config = get_config();
        Self {
            parallelism: config.parallelism,
            per_landmark_timeout: config.per_landmark_timeout,
            global_timeout: config.global_timeout,
        }
    }
}

/// Dispatches landmark IDs onto a worker pool and aggregates the results.
pub struct Orchestrator {
    config: OrchestratorConfig,
}

impl Orchestrator {
    /// Build an orchestrator with explicit scheduling configuration.
    pub fn new(config: OrchestratorConfig) -> Self {
        Self { config }
    }

    /// Run a batch. `make_processor` is invoked once per worker, before the worker
    /// starts, so each worker owns its processor outright.
    pub async fn run<P, F>(&self, ids: Vec<LandmarkId>, mut make_processor: F) -> BatchRunReport
    where
        P: LandmarkProcessor + 'static,
        F: FnMut(usize) -> P,
    {
        let started = Instant::now();
        let total = ids.len();
        let parallelism = self.config.parallelism.max(1);
        tracing::info!(landmarks = total, parallelism, "Starting batch run");

        let (work_tx, work_rx) = mpsc::channel::<LandmarkId>(parallelism);
        let work_rx = Arc::new(Mutex::new(work_rx));
        let (result_tx, mut result_rx) = mpsc::channel::<ProcessingResult>(parallelism);
        let (cancel_tx, cancel_rx) = watch::channel(false);

        // Dispatcher feeds the bounded queue and stops early on cancellation.
        let dispatcher = {
            let mut cancel_rx = cancel_rx.clone();
            tokio::spawn(async move {
                for id in ids {
                    tokio::select! {
                        _ = cancel_rx.changed() => {
                            tracing::warn!("Dispatch stopped by cancellation");
                            break;
                        }
                        sent = work_tx.send(id) => {
                            if sent.is_err() {
                                break;
                            }
                        }
                    }
                }
            })
        };

        let per_landmark_timeout = self.config.per_landmark_timeout;
        let mut workers = Vec::with_capacity(parallelism);
        for worker_index in 0..parallelism {
            let processor = make_processor(worker_index);
            let work_rx = work_rx.clone();
            let result_tx = result_tx.clone();
            let cancel_rx = cancel_rx.clone();
            workers.push(tokio::spawn(worker_loop(
                worker_index,
                processor,
                work_rx,
                result_tx,
                cancel_rx,
                per_landmark_timeout,
            )));
        }
        drop(result_tx);

        if let Some(global) = self.config.global_timeout {
            let cancel_tx = cancel_tx.clone();
            tokio::spawn(async move {
                tokio::time::sleep(global).await;
                tracing::warn!(timeout_secs = global.as_secs_f64(), "Global timeout elapsed");
                let _ = cancel_tx.send(true);
            });
        }

        let mut statistics = BatchStatistics::default();
        let mut results = Vec::with_capacity(total);
        while let Some(result) = result_rx.recv().await {
            statistics.record(&result);
            results.push(result);
        }

        let _ = dispatcher.await;
        for worker in workers {
            let _ = worker.await;
        }

        statistics.finish(started.elapsed());
        tracing::info!(
            attempted = statistics.attempted,
            succeeded = statistics.succeeded,
            failed = statistics.failed,
            chunks = statistics.chunks,
            duration_secs = statistics.duration_secs,
            "Batch run complete"
        );
        BatchRunReport {
            statistics,
            results,
        }
    }
}

async fn worker_loop<P: LandmarkProcessor>(
    worker_index: usize,
    processor: P,
    work_rx: Arc<Mutex<mpsc::Receiver<LandmarkId>>>,
    result_tx: mpsc::Sender<ProcessingResult>,
    mut cancel_rx: watch::Receiver<bool>,
    per_landmark_timeout: Duration,
) {
    loop {
        if *cancel_rx.borrow() {
            break;
        }
        let next = {
            let mut queue = work_rx.lock().await;
            tokio::select! {
                _ = cancel_rx.changed() => None,
                id = queue.recv() => id,
            }
        };
        let Some(id) = next else {
            break;
        };

        // Dropping the in-flight future on cancellation aborts outstanding I/O at
        // its next suspension point.
        let result = tokio::select! {
            _ = cancel_rx.changed() => ProcessingResult::failed(id.clone(), "cancelled"),
            finished = timeout(per_landmark_timeout, processor.process_landmark(&id)) => {
                match finished {
                    Ok(result) => result,
                    Err(_) => {
                        tracing::warn!(worker = worker_index, landmark_id = %id, "Landmark timed out");
                        ProcessingResult::failed(id.clone(), "timeout")
                    }
                }
            }
        };

        if result_tx.send(result).await.is_err() {
            break;
        }
    }
    tracing::debug!(worker = worker_index, "Worker finished");
}
