//! Packing and comparison helpers for the opaque embedding BLOB format:
//! little-endian IEEE-754 32-bit floats, no header, length = 4 * dimension.
//!
//! Grounded in the pack's `elisplash-paw` memory engine, whose `embedding`
//! module exposes the same `bytes_to_f32_vec` / `f32_vec_to_bytes` /
//! `cosine_similarity` trio for a vector-search-over-SQLite store.

/// Pack a vector of `f32` into its little-endian byte representation.
pub fn pack(vector: &[f32]) -> Vec<u8> {
    let mut out = Vec::with_capacity(vector.len() * 4);
    for v in vector {
        out.extend_from_slice(&v.to_le_bytes());
    }
    out
}

/// Unpack a little-endian byte buffer into a vector of `f32`.
///
/// A buffer whose length is not a multiple of 4 yields an empty vector
/// rather than panicking or truncating silently into a misaligned read.
pub fn unpack(bytes: &[u8]) -> Vec<f32> {
    if bytes.len() % 4 != 0 {
        return Vec::new();
    }
    bytes
        .chunks_exact(4)
        .map(|c| f32::from_le_bytes([c[0], c[1], c[2], c[3]]))
        .collect()
}

/// Cosine similarity of two vectors. Returns `0.0` if either vector has
/// zero norm or their dimensions differ, matching the ranker's
/// short-circuit-and-skip contract rather than returning `NaN`.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }
    let mut dot = 0.0f32;
    let mut norm_a = 0.0f32;
    let mut norm_b = 0.0f32;
    for (x, y) in a.iter().zip(b.iter()) {
        dot += x * y;
        norm_a += x * x;
        norm_b += y * y;
    }
    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }
    dot / (norm_a.sqrt() * norm_b.sqrt())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pack_unpack_round_trips() {
        let v = vec![1.0_f32, -2.5, 0.0, 3.333];
        assert_eq!(unpack(&pack(&v)), v);
    }

    #[test]
    fn unpack_rejects_misaligned_buffers() {
        assert_eq!(unpack(&[1, 2, 3]), Vec::<f32>::new());
        assert_eq!(unpack(&[]), Vec::<f32>::new());
    }

    #[test]
    fn cosine_of_identical_nonzero_vector_is_one() {
        let v = vec![1.0_f32, 2.0, 3.0];
        assert!((cosine_similarity(&v, &v) - 1.0).abs() < 1e-6);
    }

    #[test]
    fn cosine_is_symmetric() {
        let a = vec![1.0_f32, 0.0, 2.0];
        let b = vec![0.5_f32, 1.0, -1.0];
        assert!((cosine_similarity(&a, &b) - cosine_similarity(&b, &a)).abs() < 1e-6);
    }

    #[test]
    fn cosine_with_zero_vector_is_zero() {
        let a = vec![0.0_f32, 0.0, 0.0];
        let b = vec![1.0_f32, 2.0, 3.0];
        assert_eq!(cosine_similarity(&a, &b), 0.0);
    }

    #[test]
    fn cosine_with_mismatched_dimension_is_zero() {
        let a = vec![1.0_f32, 2.0];
        let b = vec![1.0_f32, 2.0, 3.0];
        assert_eq!(cosine_similarity(&a, &b), 0.0);
    }
}

#[cfg(test)]
mod proptests {
    use super::*;
    use proptest::prelude::*;

    proptest! {
        #[test]
        fn pack_unpack_round_trips_arbitrary_vectors(
            values in proptest::collection::vec(-1.0e6f32..1.0e6, 0..64)
        ) {
            prop_assert_eq!(unpack(&pack(&values)), values);
        }

        #[test]
        fn cosine_similarity_stays_within_unit_bounds(
            a in proptest::collection::vec(-1.0e3f32..1.0e3, 1..16),
            b in proptest::collection::vec(-1.0e3f32..1.0e3, 1..16),
        ) {
            let len = a.len().min(b.len());
            let sim = cosine_similarity(&a[..len], &b[..len]);
            prop_assert!(sim.is_finite());
            prop_assert!(sim >= -1.0001 && sim <= 1.0001);
        }
    }
}
