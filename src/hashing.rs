//! Deterministic string hashing used to derive per-stream RNG seed
//! offsets. The standard library hasher is randomly seeded per process,
//! which would break seed-controlled reproducibility across runs.

use xxhash_rust::xxh3::xxh3_64;

/// A convenience method to compute the hash of a `&str`.
pub fn hash_str(data: &str) -> u64 {
    xxh3_64(data.as_bytes())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hashes_strings() {
        let a = hash_str("hello");
        let b = hash_str("hello");
        let c = hash_str("world");
        assert_eq!(a, b);
        assert_ne!(a, c);
    }

    #[test]
    fn distinct_stream_labels_get_distinct_offsets() {
        let offsets: Vec<u64> = (0..32).map(|i| hash_str(&format!("stochastic-{i}"))).collect();
        for (i, a) in offsets.iter().enumerate() {
            for b in &offsets[i + 1..] {
                assert_ne!(a, b);
            }
        }
    }
}
