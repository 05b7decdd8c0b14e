/// Similarity above which scanning further offsets is pointless.
pub const EARLY_EXIT_SIMILARITY: f64 = 0.999;

const HASH_BITS: f64 = 64.0;

/// Number of differing bits between two 64-bit hashes.
#[inline]
pub fn hamming(a: u64, b: u64) -> u32 {
    (a ^ b).count_ones()
}

/// Best sliding-window similarity between two ordered hash sequences.
///
/// The shorter sequence is slid across the longer one and compared frame by
/// frame at every offset; the score of an offset is
/// `1 - total_distance / (64 * shorter_len)` and the best offset wins.
/// Frame order is preserved, so a trimmed or extended copy still lines up at
/// some offset. Returns 0.0 when either sequence is empty.
pub fn sequence_similarity(sig_a: &[u64], sig_b: &[u64]) -> f64 {
    if sig_a.is_empty() || sig_b.is_empty() {
        return 0.0;
    }
    let (short, long) = if sig_a.len() <= sig_b.len() {
        (sig_a, sig_b)
    } else {
        (sig_b, sig_a)
    };

    let denom = HASH_BITS * short.len() as f64;
    let mut best = 0.0f64;
    for window in long.windows(short.len()) {
        let dist_sum: u64 = short
            .iter()
            .zip(window)
            .map(|(a, b)| u64::from(hamming(*a, *b)))
            .sum();
        let sim = 1.0 - dist_sum as f64 / denom;
        if sim > best {
            best = sim;
        }
        if best > EARLY_EXIT_SIMILARITY {
            break;
        }
    }
    best
}
