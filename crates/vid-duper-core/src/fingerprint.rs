use crate::error::Error;
use crate::hasher::FrameHasher;
use crate::media::FrameSource;
use std::fmt;
use std::fs;
use std::path::Path;
use std::str::FromStr;
use tracing::{debug, warn};

/// Sampling horizon used when a file reports no usable duration.
pub const FALLBACK_HORIZON_SECS: f64 = 600.0;

/// Probed durations at or below this are treated as unknown.
pub const MIN_PROBED_DURATION_SECS: f64 = 0.1;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Resolution {
    pub width: u32,
    pub height: u32,
}

impl Resolution {
    pub fn area(&self) -> u64 {
        u64::from(self.width) * u64::from(self.height)
    }

    /// Parse a stored `WxH` string; anything unparsable is `None`.
    pub fn parse_lossy(s: &str) -> Option<Self> {
        s.parse().ok()
    }
}

impl fmt::Display for Resolution {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}x{}", self.width, self.height)
    }
}

impl FromStr for Resolution {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let lower = s.trim().to_ascii_lowercase();
        let (w, h) = lower
            .split_once('x')
            .ok_or_else(|| Error::Other(format!("invalid resolution '{}'", s)))?;
        let width = w
            .trim()
            .parse()
            .map_err(|_| Error::Other(format!("invalid resolution width '{}'", s)))?;
        let height = h
            .trim()
            .parse()
            .map_err(|_| Error::Other(format!("invalid resolution height '{}'", s)))?;
        Ok(Resolution { width, height })
    }
}

/// Metadata snapshot of one video file, as stored with pairs and groups.
#[derive(Debug, Clone, PartialEq)]
pub struct FileMeta {
    pub path: String,
    pub size: u64,
    pub duration: f64,
    pub resolution: Option<Resolution>,
}

impl FileMeta {
    /// Resolution area; unknown resolution counts as 0.
    pub fn area(&self) -> u64 {
        self.resolution.map(|r| r.area()).unwrap_or(0)
    }

    /// `WxH`, or an empty string when unknown.
    pub fn resolution_label(&self) -> String {
        self.resolution.map(|r| r.to_string()).unwrap_or_default()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    Extraction,
    Hashing,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SkippedFrame {
    pub timestamp: f64,
    pub reason: SkipReason,
}

/// Ordered frame hashes of one video plus its metadata.
#[derive(Debug, Clone, PartialEq)]
pub struct Fingerprint {
    pub file: FileMeta,
    pub hashes: Vec<u64>,
    pub frames_requested: usize,
    pub skipped: Vec<SkippedFrame>,
    /// False when the duration probe failed and the fallback horizon was sampled.
    pub probed: bool,
}

impl Fingerprint {
    /// A fingerprint with no hashes cannot be compared to anything.
    pub fn is_rankable(&self) -> bool {
        !self.hashes.is_empty()
    }

    pub fn path(&self) -> &str {
        &self.file.path
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SamplingParams {
    pub frames: usize,
    /// Target frame width in pixels; 0 keeps the native size.
    pub scale: u32,
}

impl SamplingParams {
    pub fn scale_width(&self) -> Option<u32> {
        (self.scale > 0).then_some(self.scale)
    }
}

/// `count` timestamps evenly spaced over `[0, horizon)`. The horizon itself is
/// never sampled since seeking to the exact end of a stream usually fails.
pub fn sample_timestamps(horizon: f64, count: usize) -> Vec<f64> {
    if count == 0 {
        return Vec::new();
    }
    let step = horizon / count as f64;
    (0..count).map(|i| i as f64 * step).collect()
}

pub struct FingerprintGenerator<'a> {
    source: &'a dyn FrameSource,
    hasher: &'a dyn FrameHasher,
}

impl<'a> FingerprintGenerator<'a> {
    pub fn new(source: &'a dyn FrameSource, hasher: &'a dyn FrameHasher) -> Self {
        Self { source, hasher }
    }

    pub fn generate(&self, path: &Path, params: &SamplingParams) -> Result<Fingerprint, Error> {
        if params.frames == 0 {
            return Err(Error::InvalidParams(
                "frame count must be at least 1".to_string(),
            ));
        }

        let probe = self.source.probe(path);
        let probed = probe.duration > MIN_PROBED_DURATION_SECS;
        let horizon = if probed {
            probe.duration
        } else {
            debug!(
                "No usable duration for {}, sampling {}s",
                path.display(),
                FALLBACK_HORIZON_SECS
            );
            FALLBACK_HORIZON_SECS
        };

        let mut hashes = Vec::with_capacity(params.frames);
        let mut skipped = Vec::new();
        for timestamp in sample_timestamps(horizon, params.frames) {
            let frame = match self
                .source
                .extract_frame(path, timestamp, params.scale_width())
            {
                Ok(frame) => frame,
                Err(e) => {
                    debug!("Skipping {} at {:.3}s: {}", path.display(), timestamp, e);
                    skipped.push(SkippedFrame {
                        timestamp,
                        reason: SkipReason::Extraction,
                    });
                    continue;
                }
            };
            match self.hasher.hash_frame(&frame) {
                Ok(hash) => hashes.push(hash),
                Err(e) => {
                    warn!(
                        "Could not hash frame of {} at {:.3}s: {}",
                        path.display(),
                        timestamp,
                        e
                    );
                    skipped.push(SkippedFrame {
                        timestamp,
                        reason: SkipReason::Hashing,
                    });
                }
            }
        }

        // Read after sampling: a file removed mid-scan fails here.
        let size = fs::metadata(path)?.len();

        if hashes.is_empty() {
            warn!("No usable frames in {}", path.display());
        }

        Ok(Fingerprint {
            file: FileMeta {
                path: path.to_string_lossy().into_owned(),
                size,
                duration: probe.duration.max(0.0),
                resolution: probe.resolution(),
            },
            hashes,
            frames_requested: params.frames,
            skipped,
            probed,
        })
    }
}
