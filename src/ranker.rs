//! Semantic ranking over candidate entries.
//!
//! The store supplies filtered candidates; the [`Ranker`] scores them
//! against a caller-supplied query vector. Kept as a narrow trait so a
//! future approximate-nearest-neighbor index can replace
//! [`BruteForceRanker`] without touching [`crate::store::Store`] (§4.6,
//! §9 "dynamic dispatch... model as a small tagged choice").

use crate::embedding::cosine_similarity;

/// One ranked result: an entry id paired with its similarity score.
#[derive(Debug, Clone, PartialEq)]
pub struct Scored {
    pub id: String,
    pub score: f32,
}

/// Contract for scoring `(id, embedding)` candidates against a query vector.
pub trait Ranker {
    /// Score and sort `candidates` against `query`, descending by score,
    /// truncated to the top `k`. Candidates with a zero-norm or
    /// dimension-mismatched embedding are silently skipped rather than
    /// erroring, since a broken embedding is not the caller's fault.
    fn rank(&self, query: &[f32], candidates: &[(String, Vec<f32>)], k: usize) -> Vec<Scored>;
}

/// Reference brute-force ranker: cosine similarity over every candidate.
#[derive(Debug, Default, Clone, Copy)]
pub struct BruteForceRanker;

impl Ranker for BruteForceRanker {
    fn rank(&self, query: &[f32], candidates: &[(String, Vec<f32>)], k: usize) -> Vec<Scored> {
        let mut scored: Vec<Scored> = candidates
            .iter()
            .filter_map(|(id, embedding)| {
                if embedding.is_empty() || embedding.len() != query.len() {
                    return None;
                }
                let score = cosine_similarity(query, embedding);
                if score == 0.0 && is_zero(embedding) {
                    return None;
                }
                Some(Scored {
                    id: id.clone(),
                    score,
                })
            })
            .collect();

        scored.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(std::cmp::Ordering::Equal));
        scored.truncate(k);
        scored
    }
}

fn is_zero(v: &[f32]) -> bool {
    v.iter().all(|x| *x == 0.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ranks_by_descending_similarity_and_truncates() {
        let ranker = BruteForceRanker;
        let query = vec![1.0_f32, 0.0];
        let candidates = vec![
            ("a".to_string(), vec![1.0, 0.0]),   // cos = 1
            ("b".to_string(), vec![0.0, 1.0]),   // cos = 0 (orthogonal, non-zero norm)
            ("c".to_string(), vec![0.7, 0.7]),   // cos ~ 0.707
        ];
        let ranked = ranker.rank(&query, &candidates, 2);
        assert_eq!(ranked.len(), 2);
        assert_eq!(ranked[0].id, "a");
        assert_eq!(ranked[1].id, "c");
    }

    #[test]
    fn skips_zero_norm_and_mismatched_candidates() {
        let ranker = BruteForceRanker;
        let query = vec![1.0_f32, 0.0];
        let candidates = vec![
            ("zero".to_string(), vec![0.0, 0.0]),
            ("mismatched".to_string(), vec![1.0, 0.0, 0.0]),
            ("ok".to_string(), vec![1.0, 0.0]),
        ];
        let ranked = ranker.rank(&query, &candidates, 10);
        assert_eq!(ranked.len(), 1);
        assert_eq!(ranked[0].id, "ok");
    }
}
