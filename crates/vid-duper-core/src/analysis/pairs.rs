use super::matcher::{hamming, sequence_similarity};
use crate::error::Error;
use crate::fingerprint::{FileMeta, Fingerprint};
use rayon::prelude::*;
use std::fmt;
use std::str::FromStr;
use tracing::debug;

pub const DEFAULT_THRESHOLD: f64 = 0.88;

/// Pairs whose central frames differ by more than this many bits are skipped
/// without a full comparison. Heuristic: it trades a few false negatives
/// (an outlier central frame, e.g. a black scene cut) for throughput. Tunable
/// through [`MatchOptions::central_max_distance`].
pub const CENTRAL_PREFILTER_MAX_DISTANCE: u32 = 20;

/// Duration ratio (shorter / longer) above which a pair may be a full duplicate.
pub const FULL_DUPLICATE_DURATION_RATIO: f64 = 0.95;

/// Similarity above which a pair may be a full duplicate.
pub const FULL_DUPLICATE_MIN_SIMILARITY: f64 = 0.98;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MatchLabel {
    FullDuplicate,
    NearDuplicate,
}

impl MatchLabel {
    pub fn as_str(&self) -> &'static str {
        match self {
            MatchLabel::FullDuplicate => "full-duplicate",
            MatchLabel::NearDuplicate => "near/partial-duplicate",
        }
    }

    pub fn classify(a: &FileMeta, b: &FileMeta, similarity: f64) -> Self {
        let shorter = a.duration.min(b.duration);
        let longer = a.duration.max(b.duration);
        let same_length = shorter > 0.0 && shorter / longer > FULL_DUPLICATE_DURATION_RATIO;
        if same_length && similarity > FULL_DUPLICATE_MIN_SIMILARITY {
            MatchLabel::FullDuplicate
        } else {
            MatchLabel::NearDuplicate
        }
    }
}

impl fmt::Display for MatchLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for MatchLabel {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "full-duplicate" => Ok(MatchLabel::FullDuplicate),
            "near/partial-duplicate" => Ok(MatchLabel::NearDuplicate),
            other => Err(Error::Other(format!("unknown match label '{}'", other))),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Pair {
    pub similarity: f64,
    pub label: MatchLabel,
    pub a: FileMeta,
    pub b: FileMeta,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MatchOptions {
    pub threshold: f64,
    pub central_max_distance: u32,
    /// Spread comparisons over the rayon pool.
    pub parallel: bool,
}

impl MatchOptions {
    pub fn new(threshold: f64) -> Self {
        Self {
            threshold,
            central_max_distance: CENTRAL_PREFILTER_MAX_DISTANCE,
            parallel: true,
        }
    }
}

impl Default for MatchOptions {
    fn default() -> Self {
        Self::new(DEFAULT_THRESHOLD)
    }
}

fn central(hashes: &[u64]) -> Option<u64> {
    hashes.get(hashes.len() / 2).copied()
}

fn compare_one(a: &Fingerprint, b: &Fingerprint, options: &MatchOptions) -> Option<Pair> {
    let (ca, cb) = (central(&a.hashes)?, central(&b.hashes)?);
    if hamming(ca, cb) > options.central_max_distance {
        return None;
    }

    let similarity = sequence_similarity(&a.hashes, &b.hashes);
    if similarity < options.threshold {
        return None;
    }

    Some(Pair {
        similarity,
        label: MatchLabel::classify(&a.file, &b.file, similarity),
        a: a.file.clone(),
        b: b.file.clone(),
    })
}

/// Compare every unordered pair of rankable fingerprints and keep those at or
/// above the threshold, most similar first.
pub fn compare_all(fingerprints: &[Fingerprint], options: &MatchOptions) -> Vec<Pair> {
    let n = fingerprints.len();
    let row = move |i: usize| {
        let a = &fingerprints[i];
        (i + 1..n).filter_map(move |j| compare_one(a, &fingerprints[j], options))
    };
    let mut pairs: Vec<Pair> = if options.parallel {
        (0..n).into_par_iter().flat_map_iter(row).collect()
    } else {
        (0..n).flat_map(row).collect()
    };

    pairs.sort_by(|x, y| y.similarity.total_cmp(&x.similarity));
    debug!(
        "Compared {} fingerprints, {} pairs at or above {:.3}",
        n,
        pairs.len(),
        options.threshold
    );
    pairs
}
