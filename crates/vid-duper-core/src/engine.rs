use crate::analysis::cluster::{build_groups, DuplicateGroup};
use crate::analysis::pairs::{compare_all, MatchOptions, Pair};
use crate::error::Error;
use crate::fingerprint::{Fingerprint, FingerprintGenerator, SamplingParams};
use crate::hasher::FrameHasher;
use crate::job::JobParams;
use crate::media::FrameSource;
use crate::progress::ProgressReporter;
use crate::scanner;
use rayon::prelude::*;
use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::{Duration, Instant};
use tracing::{debug, info};

/// Runs the fingerprint, compare and cluster phases over a set of files.
/// Persistence is left to the caller.
pub struct ScanEngine<'a> {
    source: &'a dyn FrameSource,
    hasher: &'a dyn FrameHasher,
    parallel: bool,
}

#[derive(Debug)]
pub struct ScanResult {
    pub files_gathered: usize,
    pub fingerprints: Vec<Fingerprint>,
    pub pairs: Vec<Pair>,
    pub groups: Vec<DuplicateGroup>,
    pub fingerprint_duration: Duration,
    pub compare_duration: Duration,
}

impl ScanResult {
    pub fn rankable_count(&self) -> usize {
        self.fingerprints.iter().filter(|fp| fp.is_rankable()).count()
    }

    /// Bytes held by every member of every group except the representatives.
    pub fn reclaimable_bytes(&self) -> u64 {
        self.groups
            .iter()
            .flat_map(|g| g.members.iter())
            .filter(|m| !m.is_representative)
            .map(|m| m.file.size)
            .sum()
    }
}

impl<'a> ScanEngine<'a> {
    pub fn new(source: &'a dyn FrameSource, hasher: &'a dyn FrameHasher) -> Self {
        Self {
            source,
            hasher,
            parallel: true,
        }
    }

    pub fn with_parallelism(mut self, parallel: bool) -> Self {
        self.parallel = parallel;
        self
    }

    /// Gather the job's files, then run the pipeline over them.
    pub fn run_job(
        &self,
        params: &JobParams,
        ignore_patterns: &[String],
        reporter: &dyn ProgressReporter,
    ) -> Result<ScanResult, Error> {
        let paths = scanner::gather_videos(&params.roots, &params.effective_exts(), ignore_patterns);
        info!("Found {} candidate videos", paths.len());
        reporter.on_gather_complete(paths.len());
        self.run(&paths, &params.sampling(), &params.match_options(), reporter)
    }

    /// Fingerprint `paths`, compare all rankable fingerprints pairwise and
    /// cluster the matches.
    ///
    /// Any fingerprinting error (e.g. a file vanishing mid-scan) aborts the
    /// whole run. Fingerprints come back in the order of `paths`.
    pub fn run(
        &self,
        paths: &[PathBuf],
        sampling: &SamplingParams,
        options: &MatchOptions,
        reporter: &dyn ProgressReporter,
    ) -> Result<ScanResult, Error> {
        let total = paths.len();

        // Phase 1: Fingerprint
        reporter.on_fingerprint_start(total);
        let fingerprint_start = Instant::now();
        let generator = FingerprintGenerator::new(self.source, self.hasher);
        let done = AtomicUsize::new(0);
        let fingerprint_one = |path: &PathBuf| {
            let fp = generator.generate(path, sampling);
            let n = done.fetch_add(1, Ordering::Relaxed) + 1;
            reporter.on_fingerprint_progress(n, total);
            fp
        };
        let fingerprints: Vec<Fingerprint> = if self.parallel {
            paths
                .par_iter()
                .map(fingerprint_one)
                .collect::<Result<Vec<_>, Error>>()?
        } else {
            paths
                .iter()
                .map(fingerprint_one)
                .collect::<Result<Vec<_>, Error>>()?
        };
        let fingerprint_duration = fingerprint_start.elapsed();

        let rankable: Vec<Fingerprint> = fingerprints
            .iter()
            .filter(|fp| fp.is_rankable())
            .cloned()
            .collect();
        reporter.on_fingerprint_complete(rankable.len(), fingerprint_duration.as_secs_f64());
        debug!(
            "Fingerprinted {} files in {:.2}s, {} rankable",
            total,
            fingerprint_duration.as_secs_f64(),
            rankable.len()
        );

        // Phase 2: Compare and cluster
        reporter.on_compare_start(rankable.len());
        let compare_start = Instant::now();
        let options = MatchOptions {
            parallel: self.parallel,
            ..*options
        };
        let pairs = compare_all(&rankable, &options);
        let groups = build_groups(&rankable, &pairs);
        let compare_duration = compare_start.elapsed();
        reporter.on_compare_complete(pairs.len(), groups.len(), compare_duration.as_secs_f64());
        debug!(
            "Compared in {:.2}s: {} pairs, {} groups",
            compare_duration.as_secs_f64(),
            pairs.len(),
            groups.len()
        );

        Ok(ScanResult {
            files_gathered: total,
            fingerprints,
            pairs,
            groups,
            fingerprint_duration,
            compare_duration,
        })
    }
}
