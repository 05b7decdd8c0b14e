pub mod ffmpeg;

use crate::error::Error;
use crate::fingerprint::Resolution;
use std::path::Path;

pub use ffmpeg::FfmpegFrameSource;

/// Result of probing a video container. A failed probe is the default value:
/// zero duration and no dimensions.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct ProbeInfo {
    pub duration: f64,
    pub width: Option<u32>,
    pub height: Option<u32>,
}

impl ProbeInfo {
    pub fn resolution(&self) -> Option<Resolution> {
        match (self.width, self.height) {
            (Some(width), Some(height)) if width > 0 && height > 0 => {
                Some(Resolution { width, height })
            }
            _ => None,
        }
    }
}

/// Access to a video's container metadata and individual frames.
///
/// `probe` never fails; `extract_frame` fails for a single timestamp only and
/// callers are expected to carry on with the next one.
pub trait FrameSource: Send + Sync {
    fn probe(&self, path: &Path) -> ProbeInfo;

    /// Encoded image bytes of the frame nearest to `timestamp` seconds,
    /// rescaled to `scale_width` pixels wide when given.
    fn extract_frame(
        &self,
        path: &Path,
        timestamp: f64,
        scale_width: Option<u32>,
    ) -> Result<Vec<u8>, Error>;
}
