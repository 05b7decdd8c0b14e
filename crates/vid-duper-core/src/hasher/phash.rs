use super::FrameHasher;
use crate::error::Error;
use image_hasher::{HashAlg, HasherConfig};

const HASH_SIDE: u32 = 8;

/// pHash: DCT-preprocessed mean hash over an 8x8 grid, packed big-endian
/// into a `u64`.
#[derive(Debug, Clone, Copy, Default)]
pub struct PerceptualHasher;

impl PerceptualHasher {
    pub fn new() -> Self {
        Self
    }
}

impl FrameHasher for PerceptualHasher {
    fn hash_frame(&self, image: &[u8]) -> Result<u64, Error> {
        let decoded = image::load_from_memory(image)?;

        let hasher = HasherConfig::new()
            .hash_size(HASH_SIDE, HASH_SIDE)
            .hash_alg(HashAlg::Mean)
            .preproc_dct()
            .to_hasher();
        let hash = hasher.hash_image(&decoded);

        pack_hash_bytes(hash.as_bytes())
    }
}

fn pack_hash_bytes(bytes: &[u8]) -> Result<u64, Error> {
    if bytes.len() != 8 {
        return Err(Error::Media(format!(
            "expected a 64-bit hash, got {} bytes",
            bytes.len()
        )));
    }
    Ok(bytes.iter().fold(0u64, |acc, b| (acc << 8) | u64::from(*b)))
}
