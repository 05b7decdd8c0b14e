use crate::analysis::pairs::{MatchOptions, DEFAULT_THRESHOLD};
use crate::error::Error;
use crate::fingerprint::SamplingParams;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

pub const DEFAULT_FRAMES: usize = 20;
pub const DEFAULT_SCALE: u32 = 320;

pub const MIN_FRAMES: usize = 4;
pub const MAX_FRAMES: usize = 80;
pub const MAX_SCALE: u32 = 1920;
pub const MIN_THRESHOLD: f64 = 0.5;
pub const MAX_THRESHOLD: f64 = 1.0;

pub const DEFAULT_VIDEO_EXTS: [&str; 11] = [
    ".mp4", ".mkv", ".avi", ".mov", ".m4v", ".webm", ".ts", ".mts", ".m2ts", ".wmv", ".flv",
];

/// Lifecycle: `Queued -> Running -> Done | Error`; a reset returns any job to `Queued`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum JobStatus {
    Queued,
    Running,
    Done,
    Error,
}

impl JobStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            JobStatus::Queued => "queued",
            JobStatus::Running => "running",
            JobStatus::Done => "done",
            JobStatus::Error => "error",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, JobStatus::Done | JobStatus::Error)
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for JobStatus {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "queued" => Ok(JobStatus::Queued),
            "running" => Ok(JobStatus::Running),
            "done" => Ok(JobStatus::Done),
            "error" => Ok(JobStatus::Error),
            other => Err(Error::Other(format!("unknown job status '{}'", other))),
        }
    }
}

fn default_frames() -> usize {
    DEFAULT_FRAMES
}

fn default_scale() -> u32 {
    DEFAULT_SCALE
}

fn default_threshold() -> f64 {
    DEFAULT_THRESHOLD
}

fn default_exts() -> Vec<String> {
    DEFAULT_VIDEO_EXTS.iter().map(|e| e.to_string()).collect()
}

/// Parameters of one duplicate search, stored as JSON with the job.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobParams {
    pub roots: Vec<String>,
    #[serde(default = "default_frames")]
    pub frames: usize,
    #[serde(default = "default_scale")]
    pub scale: u32,
    #[serde(default = "default_threshold")]
    pub threshold: f64,
    #[serde(default = "default_exts")]
    pub exts: Vec<String>,
}

impl JobParams {
    pub fn new(roots: Vec<String>) -> Self {
        Self {
            roots,
            frames: DEFAULT_FRAMES,
            scale: DEFAULT_SCALE,
            threshold: DEFAULT_THRESHOLD,
            exts: default_exts(),
        }
    }

    pub fn validate(&self) -> Result<(), Error> {
        if self.roots.iter().all(|r| r.trim().is_empty()) {
            return Err(Error::InvalidParams("at least one root is required".to_string()));
        }
        if !(MIN_FRAMES..=MAX_FRAMES).contains(&self.frames) {
            return Err(Error::InvalidParams(format!(
                "frames must be between {} and {}, got {}",
                MIN_FRAMES, MAX_FRAMES, self.frames
            )));
        }
        if self.scale > MAX_SCALE {
            return Err(Error::InvalidParams(format!(
                "scale must be between 0 and {}, got {}",
                MAX_SCALE, self.scale
            )));
        }
        if !(MIN_THRESHOLD..=MAX_THRESHOLD).contains(&self.threshold) {
            return Err(Error::InvalidParams(format!(
                "threshold must be between {} and {}, got {}",
                MIN_THRESHOLD, MAX_THRESHOLD, self.threshold
            )));
        }
        Ok(())
    }

    /// Extension allowlist; an empty list means the default video extensions.
    pub fn effective_exts(&self) -> Vec<String> {
        if self.exts.is_empty() {
            default_exts()
        } else {
            self.exts.clone()
        }
    }

    pub fn sampling(&self) -> SamplingParams {
        SamplingParams {
            frames: self.frames,
            scale: self.scale,
        }
    }

    pub fn match_options(&self) -> MatchOptions {
        MatchOptions::new(self.threshold)
    }

    pub fn to_json(&self) -> Result<String, Error> {
        Ok(serde_json::to_string(self)?)
    }

    pub fn from_json(json: &str) -> Result<Self, Error> {
        Ok(serde_json::from_str(json)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_round_trip() {
        for status in [
            JobStatus::Queued,
            JobStatus::Running,
            JobStatus::Done,
            JobStatus::Error,
        ] {
            assert_eq!(status.as_str().parse::<JobStatus>().unwrap(), status);
        }
        assert!("cancelled".parse::<JobStatus>().is_err());
        assert!(JobStatus::Error.is_terminal());
        assert!(!JobStatus::Running.is_terminal());
    }

    #[test]
    fn test_params_defaults_from_minimal_json() {
        let params = JobParams::from_json(r#"{"roots": ["/videos/dir1"]}"#).unwrap();
        assert_eq!(params, JobParams::new(vec!["/videos/dir1".to_string()]));
        assert!(params.validate().is_ok());
        assert_eq!(params.sampling(), SamplingParams { frames: 20, scale: 320 });
    }

    #[test]
    fn test_params_validation_bounds() {
        let base = JobParams::new(vec!["/videos".to_string()]);

        assert!(JobParams { frames: 3, ..base.clone() }.validate().is_err());
        assert!(JobParams { frames: 80, ..base.clone() }.validate().is_ok());
        assert!(JobParams { scale: 1921, ..base.clone() }.validate().is_err());
        assert!(JobParams { scale: 0, ..base.clone() }.validate().is_ok());
        assert!(JobParams { threshold: 0.49, ..base.clone() }.validate().is_err());
        assert!(JobParams { threshold: 1.0, ..base.clone() }.validate().is_ok());
        assert!(JobParams { roots: vec![], ..base.clone() }.validate().is_err());
        assert!(JobParams { roots: vec!["  ".to_string()], ..base }.validate().is_err());
    }

    #[test]
    fn test_empty_exts_fall_back_to_defaults() {
        let params = JobParams {
            exts: vec![],
            ..JobParams::new(vec!["/v".to_string()])
        };
        assert_eq!(params.effective_exts().len(), DEFAULT_VIDEO_EXTS.len());
    }
}
