pub mod phash;

use crate::error::Error;

pub use phash::PerceptualHasher;

/// Computes a 64-bit perceptual hash from an encoded image. Visually similar
/// images produce hashes with a small Hamming distance.
pub trait FrameHasher: Send + Sync {
    fn hash_frame(&self, image: &[u8]) -> Result<u64, Error>;
}
