use clap::{Args, Parser, Subcommand};
use vid_duper_core::{AppConfig, JobParams};

#[derive(Debug, Parser)]
#[command(name = "vid-duper")]
#[command(about = "Find duplicate and near-duplicate videos", long_about = None)]
pub struct Cli {
    /// SQLite database file (overrides the configured db_path)
    #[arg(long, global = true)]
    pub db: Option<String>,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Debug, Args)]
pub struct SearchArgs {
    /// Directories or files to search (defaults to configured default_roots)
    pub roots: Vec<String>,
    /// Frames sampled per video (4-80)
    #[arg(long)]
    pub frames: Option<usize>,
    /// Frame width in pixels before hashing, 0 for native size
    #[arg(long)]
    pub scale: Option<u32>,
    /// Minimum similarity for a pair (0.5-1.0)
    #[arg(long)]
    pub threshold: Option<f64>,
    /// File extension to include; repeat for several (defaults to common video types)
    #[arg(long = "ext")]
    pub exts: Vec<String>,
}

impl SearchArgs {
    /// Job parameters from the arguments, falling back to configured defaults.
    pub fn to_params(&self, config: &AppConfig) -> JobParams {
        let roots = if self.roots.is_empty() {
            config.default_roots.clone()
        } else {
            self.roots.clone()
        };
        let mut params = JobParams::new(roots);
        params.frames = self.frames.unwrap_or(config.default_frames);
        params.scale = self.scale.unwrap_or(config.default_scale);
        params.threshold = self.threshold.unwrap_or(config.default_threshold);
        if !self.exts.is_empty() {
            params.exts = self.exts.clone();
        }
        params
    }
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Queue a duplicate search for the worker
    Enqueue(SearchArgs),
    /// Process queued jobs until interrupted
    Worker,
    /// Process at most one queued job and exit
    RunOnce,
    /// Search right away and print results without queueing
    Scan(SearchArgs),
    /// List all jobs, newest first
    Jobs,
    /// Show one job with its result counts
    Job { id: i64 },
    /// List matched pairs of a job, most similar first
    Pairs {
        job_id: i64,
        /// Show at most this many pairs
        #[arg(long)]
        limit: Option<usize>,
    },
    /// List duplicate groups of a job
    Groups { job_id: i64 },
    /// Put a job back in the queue, discarding its results
    Reset { job_id: i64 },
    /// Delete a job and its results
    DeleteJob { job_id: i64 },
    /// Delete files from disk and update every stored group
    Delete {
        #[arg(required = true)]
        paths: Vec<String>,
        /// Skip the confirmation prompt
        #[arg(long, short)]
        yes: bool,
    },
    /// Delete files of one group; without paths, all but the representative
    DeleteGroup {
        group_id: i64,
        paths: Vec<String>,
        /// Skip the confirmation prompt
        #[arg(long, short)]
        yes: bool,
    },
    /// Re-queue jobs stuck running longer than the given age
    RequeueStale {
        #[arg(long, default_value_t = 60)]
        minutes: i64,
    },
    /// Print the default job parameters
    Defaults,
    /// Print configuration values
    PrintConfig,
}
