//! Phase 2 of a run: execute the queued jobs in parallel.
//!
//! Each run builds its own rayon pool sized to the requested worker count.
//! Jobs share nothing but the read-only [`Transform`] and backend, so they
//! run in any order. A recoverable failure is logged, reported as a
//! [`JobEvent::Failed`] and counted; a fatal one stops scheduling and is
//! returned as [`PoolError::Fatal`].

use crate::imaging::ImageBackend;
use crate::transform::{JobOutcome, Transform, TransformError, TransformJob};
use rayon::prelude::*;
use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::mpsc::Sender;
use thiserror::Error;
use tracing::{info, warn};

#[derive(Error, Debug)]
pub enum PoolError {
    #[error("Failed to build worker pool: {0}")]
    Build(#[from] rayon::ThreadPoolBuildError),
    #[error("Fatal error processing {path}: {source}")]
    Fatal {
        path: PathBuf,
        #[source]
        source: TransformError,
    },
}

/// Progress from a worker, sent as each job finishes.
#[derive(Debug)]
pub enum JobEvent {
    Done { source: PathBuf, outcome: JobOutcome },
    Failed { source: PathBuf, error: String },
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunSummary {
    pub total: usize,
    pub succeeded: usize,
    pub failed: usize,
}

impl RunSummary {
    pub fn all_succeeded(&self) -> bool {
        self.failed == 0
    }
}

pub fn run<B: ImageBackend>(
    backend: &B,
    transform: &Transform,
    jobs: &[TransformJob],
    worker_count: usize,
    progress: Option<Sender<JobEvent>>,
) -> Result<RunSummary, PoolError> {
    let workers = worker_count.max(1);
    info!(workers, jobs = jobs.len(), transform = %transform.kind(), "processing");

    let pool = rayon::ThreadPoolBuilder::new()
        .num_threads(workers)
        .build()?;

    let succeeded = AtomicUsize::new(0);
    let failed = AtomicUsize::new(0);

    pool.install(|| {
        jobs.par_iter()
            .try_for_each_with(progress, |tx, job| {
                let event = match transform.apply(backend, job) {
                    Ok(outcome) => {
                        succeeded.fetch_add(1, Ordering::Relaxed);
                        JobEvent::Done {
                            source: job.source_path.clone(),
                            outcome,
                        }
                    }
                    Err(e) if e.is_fatal() => {
                        return Err(PoolError::Fatal {
                            path: job.source_path.clone(),
                            source: e,
                        });
                    }
                    Err(e) => {
                        warn!(path = %job.source_path.display(), error = %e, "job failed");
                        failed.fetch_add(1, Ordering::Relaxed);
                        JobEvent::Failed {
                            source: job.source_path.clone(),
                            error: e.to_string(),
                        }
                    }
                };
                if let Some(tx) = tx {
                    // The receiver may already be gone; progress is best effort.
                    let _ = tx.send(event);
                }
                Ok(())
            })
    })?;

    Ok(RunSummary {
        total: jobs.len(),
        succeeded: succeeded.into_inner(),
        failed: failed.into_inner(),
    })
}
