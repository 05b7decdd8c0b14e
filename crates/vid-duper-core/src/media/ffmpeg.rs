use super::{FrameSource, ProbeInfo};
use crate::error::Error;
use serde::Deserialize;
use std::path::Path;
use std::process::Command;
use tracing::{debug, warn};

/// Frame source backed by the `ffprobe` and `ffmpeg` executables.
#[derive(Debug, Clone)]
pub struct FfmpegFrameSource {
    ffmpeg: String,
    ffprobe: String,
}

impl Default for FfmpegFrameSource {
    fn default() -> Self {
        Self::new("ffmpeg", "ffprobe")
    }
}

impl FfmpegFrameSource {
    pub fn new(ffmpeg: &str, ffprobe: &str) -> Self {
        Self {
            ffmpeg: ffmpeg.to_string(),
            ffprobe: ffprobe.to_string(),
        }
    }
}

#[derive(Debug, Default, Deserialize)]
struct ProbeOutput {
    #[serde(default)]
    format: ProbeFormat,
    #[serde(default)]
    streams: Vec<ProbeStream>,
}

#[derive(Debug, Default, Deserialize)]
struct ProbeFormat {
    duration: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ProbeStream {
    width: Option<u32>,
    height: Option<u32>,
}

/// Parse `ffprobe -of json` output. Returns `None` when the output is not
/// valid probe JSON.
pub fn parse_probe_output(stdout: &[u8]) -> Option<ProbeInfo> {
    let output: ProbeOutput = serde_json::from_slice(stdout).ok()?;

    let duration = output
        .format
        .duration
        .as_deref()
        .and_then(|d| d.trim().parse::<f64>().ok())
        .filter(|d| d.is_finite() && *d > 0.0)
        .unwrap_or(0.0);

    let dimensions = output.streams.iter().find_map(|stream| match (stream.width, stream.height) {
        (Some(w), Some(h)) if w > 0 && h > 0 => Some((w, h)),
        _ => None,
    });

    Some(ProbeInfo {
        duration,
        width: dimensions.map(|(w, _)| w),
        height: dimensions.map(|(_, h)| h),
    })
}

/// `-vf` argument for the requested scale; height keeps the aspect ratio and
/// stays even for the mjpeg encoder.
fn scale_filter(scale_width: Option<u32>) -> String {
    match scale_width {
        Some(width) if width > 0 => format!("scale={}:-2", width),
        _ => "null".to_string(),
    }
}

impl FrameSource for FfmpegFrameSource {
    fn probe(&self, path: &Path) -> ProbeInfo {
        let output = Command::new(&self.ffprobe)
            .args(["-v", "error", "-select_streams", "v:0"])
            .args(["-show_entries", "format=duration"])
            .args(["-show_entries", "stream=width,height"])
            .args(["-of", "json"])
            .arg(path)
            .output();

        match output {
            Ok(output) if output.status.success() => parse_probe_output(&output.stdout)
                .unwrap_or_else(|| {
                    warn!("Unreadable ffprobe output for {}", path.display());
                    ProbeInfo::default()
                }),
            Ok(output) => {
                warn!(
                    "ffprobe failed for {}: {}",
                    path.display(),
                    String::from_utf8_lossy(&output.stderr).trim()
                );
                ProbeInfo::default()
            }
            Err(e) => {
                warn!("Could not run {}: {}", self.ffprobe, e);
                ProbeInfo::default()
            }
        }
    }

    fn extract_frame(
        &self,
        path: &Path,
        timestamp: f64,
        scale_width: Option<u32>,
    ) -> Result<Vec<u8>, Error> {
        let output = Command::new(&self.ffmpeg)
            .arg("-ss")
            .arg(format!("{:.3}", timestamp))
            .arg("-i")
            .arg(path)
            .args(["-frames:v", "1", "-vf"])
            .arg(scale_filter(scale_width))
            .args(["-f", "image2pipe", "-vcodec", "mjpeg"])
            .args(["-loglevel", "error", "pipe:1"])
            .output()?;

        if !output.status.success() {
            return Err(Error::Media(format!(
                "ffmpeg exited with {} at {:.3}s: {}",
                output.status,
                timestamp,
                String::from_utf8_lossy(&output.stderr).trim()
            )));
        }
        if output.stdout.is_empty() {
            return Err(Error::Media(format!("no frame at {:.3}s", timestamp)));
        }

        debug!(
            "Extracted {} bytes from {} at {:.3}s",
            output.stdout.len(),
            path.display(),
            timestamp
        );
        Ok(output.stdout)
    }
}
