use crate::config::AppConfig;
use crate::engine::ScanEngine;
use crate::error::Error;
use crate::hasher::FrameHasher;
use crate::media::FrameSource;
use crate::progress::{ProgressReporter, SilentReporter};
use crate::storage::models::JobRecord;
use crate::storage::Database;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;
use std::time::{Duration, Instant};
use tracing::{error, info, warn};

#[derive(Debug, Clone)]
pub struct WorkerSettings {
    pub poll_interval: Duration,
    pub ignore_patterns: Vec<String>,
    pub parallel: bool,
}

impl Default for WorkerSettings {
    fn default() -> Self {
        Self::from_config(&AppConfig::default())
    }
}

impl WorkerSettings {
    pub fn from_config(config: &AppConfig) -> Self {
        Self {
            poll_interval: config.poll_interval(),
            ignore_patterns: config.ignore_patterns.clone(),
            parallel: config.parallel,
        }
    }
}

/// Counters kept across the worker's lifetime.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WorkerState {
    pub jobs_processed: u64,
    pub jobs_failed: u64,
    pub idle_polls: u64,
}

#[derive(Debug, Clone, PartialEq)]
pub enum JobOutcome {
    Done { job_id: i64, pairs: usize, groups: usize },
    Failed { job_id: i64, error: String },
    /// The job left `running` or was claimed again while being processed
    /// (reset, deleted or re-queued), so its results were thrown away.
    Discarded { job_id: i64 },
}

/// Claims queued jobs one at a time and runs them to completion.
pub struct Worker {
    db: Database,
    source: Box<dyn FrameSource>,
    hasher: Box<dyn FrameHasher>,
    reporter: Box<dyn ProgressReporter>,
    settings: WorkerSettings,
    state: WorkerState,
}

impl Worker {
    pub fn new(
        db: Database,
        source: Box<dyn FrameSource>,
        hasher: Box<dyn FrameHasher>,
        settings: WorkerSettings,
    ) -> Self {
        Self {
            db,
            source,
            hasher,
            reporter: Box::new(SilentReporter),
            settings,
            state: WorkerState::default(),
        }
    }

    pub fn with_reporter(mut self, reporter: Box<dyn ProgressReporter>) -> Self {
        self.reporter = reporter;
        self
    }

    pub fn state(&self) -> WorkerState {
        self.state
    }

    pub fn database(&self) -> &Database {
        &self.db
    }

    /// Claim and process at most one job. `Ok(None)` means the queue was empty.
    ///
    /// Errors returned here come from the store itself (claiming or recording
    /// the outcome). Anything that goes wrong inside the job is recorded on the
    /// job and reported as [`JobOutcome::Failed`].
    pub fn run_once(&mut self) -> Result<Option<JobOutcome>, Error> {
        let Some(job) = self.db.claim_next_job()? else {
            self.state.idle_polls += 1;
            return Ok(None);
        };
        info!("Processing job {}", job.id);

        let outcome = match self.process(&job) {
            Ok(outcome) => outcome,
            Err(e) => {
                let message = e.to_string();
                error!("Job {} failed: {}", job.id, message);
                if self.db.fail_job(job.id, job.claim, &message)? {
                    JobOutcome::Failed {
                        job_id: job.id,
                        error: message,
                    }
                } else {
                    JobOutcome::Discarded { job_id: job.id }
                }
            }
        };

        match &outcome {
            JobOutcome::Failed { .. } => self.state.jobs_failed += 1,
            _ => self.state.jobs_processed += 1,
        }
        Ok(Some(outcome))
    }

    fn process(&self, job: &JobRecord) -> Result<JobOutcome, Error> {
        let params = job.parsed_params()?;
        params.validate()?;

        let engine = ScanEngine::new(self.source.as_ref(), self.hasher.as_ref())
            .with_parallelism(self.settings.parallel);
        let result = engine.run_job(&params, &self.settings.ignore_patterns, self.reporter.as_ref())?;

        self.reporter.on_persist_start();
        let persist_start = Instant::now();
        let written = self
            .db
            .complete_job(job.id, job.claim, &result.pairs, &result.groups)?;
        self.reporter.on_persist_complete(
            result.pairs.len() + result.groups.len(),
            persist_start.elapsed().as_secs_f64(),
        );

        if !written {
            warn!("Job {} is no longer running, discarding its results", job.id);
            return Ok(JobOutcome::Discarded { job_id: job.id });
        }
        info!(
            "Job {} done: {} pairs, {} groups",
            job.id,
            result.pairs.len(),
            result.groups.len()
        );
        Ok(JobOutcome::Done {
            job_id: job.id,
            pairs: result.pairs.len(),
            groups: result.groups.len(),
        })
    }

    /// Poll for jobs until `stop` is set, sleeping the poll interval whenever
    /// the queue is empty or the store is unavailable.
    pub fn run(&mut self, stop: &AtomicBool) {
        info!(
            "Worker started, polling every {:.1}s",
            self.settings.poll_interval.as_secs_f64()
        );
        while !stop.load(Ordering::Relaxed) {
            match self.run_once() {
                Ok(Some(_)) => continue,
                Ok(None) => {}
                Err(e) => error!("Worker error, retrying: {}", e),
            }
            thread::sleep(self.settings.poll_interval);
        }
        info!(
            "Worker stopped: {} jobs processed, {} failed",
            self.state.jobs_processed, self.state.jobs_failed
        );
    }
}
