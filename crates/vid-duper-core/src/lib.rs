pub mod analysis;
pub mod config;
pub mod engine;
pub mod error;
pub mod fingerprint;
pub mod hasher;
pub mod job;
pub mod media;
pub mod progress;
pub mod scanner;
pub mod storage;
pub mod worker;

pub use config::AppConfig;
pub use engine::{ScanEngine, ScanResult};
pub use error::Error;
pub use fingerprint::{FileMeta, Fingerprint, Resolution, SamplingParams};
pub use job::{JobParams, JobStatus};
pub use progress::{ProgressReporter, SilentReporter};
pub use worker::{JobOutcome, Worker, WorkerSettings, WorkerState};
