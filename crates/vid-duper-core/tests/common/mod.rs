#![allow(dead_code)]

use std::fs;
use std::path::{Path, PathBuf};

use vid_duper_core::analysis::{DuplicateGroup, MatchLabel, Pair};
use vid_duper_core::hasher::FrameHasher;
use vid_duper_core::media::{FrameSource, ProbeInfo};
use vid_duper_core::{Error, FileMeta, JobParams, Resolution};

/// Frame source that never touches ffmpeg: every frame of a file is derived
/// from the file's first byte, so files starting with the same byte have
/// identical fingerprints.
pub struct FakeSource {
    pub duration: f64,
}

impl Default for FakeSource {
    fn default() -> Self {
        Self { duration: 120.0 }
    }
}

impl FrameSource for FakeSource {
    fn probe(&self, _path: &Path) -> ProbeInfo {
        ProbeInfo {
            duration: self.duration,
            width: Some(640),
            height: Some(360),
        }
    }

    fn extract_frame(&self, path: &Path, timestamp: f64, _scale: Option<u32>) -> Result<Vec<u8>, Error> {
        let bytes = fs::read(path)?;
        let seed = *bytes
            .first()
            .ok_or_else(|| Error::Media("empty file".to_string()))?;
        Ok(vec![seed, (timestamp as u64 % 251) as u8])
    }
}

pub struct FakeHasher;

impl FrameHasher for FakeHasher {
    fn hash_frame(&self, frame: &[u8]) -> Result<u64, Error> {
        if frame.len() < 2 {
            return Err(Error::Media("short frame".to_string()));
        }
        let seed = frame[0] as u64;
        let t = frame[1] as u64;
        Ok(seed.wrapping_mul(0x9E37_79B9_7F4A_7C15) ^ (t << 8))
    }
}

/// Write a fake video whose fingerprint is keyed by `seed`, padded to `len` bytes.
pub fn fake_video(dir: &Path, name: &str, seed: u8, len: usize) -> PathBuf {
    let path = dir.join(name);
    let mut content = vec![0u8; len.max(1)];
    content[0] = seed;
    fs::write(&path, content).unwrap();
    path
}

pub fn params_for(dir: &Path) -> JobParams {
    JobParams::new(vec![dir.to_string_lossy().into_owned()])
}

pub fn meta(path: &str, duration: f64, res: &str, size: u64) -> FileMeta {
    FileMeta {
        path: path.to_string(),
        size,
        duration,
        resolution: Resolution::parse_lossy(res),
    }
}

pub fn pair(a: &FileMeta, b: &FileMeta, similarity: f64) -> Pair {
    Pair {
        similarity,
        label: MatchLabel::classify(a, b, similarity),
        a: a.clone(),
        b: b.clone(),
    }
}

pub fn group(files: &[&FileMeta]) -> DuplicateGroup {
    DuplicateGroup::from_members(files.iter().map(|f| (*f).clone()).collect()).unwrap()
}
