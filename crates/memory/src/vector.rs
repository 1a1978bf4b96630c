//! Vector similarity and ranking utilities shared by the stores.

use swarmforge_core::error::MemoryError;
use swarmforge_core::memory::{MemoryEntry, RetrievalRank};

/// Compute cosine similarity between two vectors.
///
/// Returns a value in [-1, 1] where 1 = identical, 0 = orthogonal, -1 = opposite.
/// Returns 0.0 if either vector is zero-length or empty.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }

    let mut dot = 0.0f64;
    let mut norm_a = 0.0f64;
    let mut norm_b = 0.0f64;

    for (x, y) in a.iter().zip(b.iter()) {
        let x = *x as f64;
        let y = *y as f64;
        dot += x * y;
        norm_a += x * x;
        norm_b += y * y;
    }

    let denom = norm_a.sqrt() * norm_b.sqrt();
    if denom < 1e-10 {
        return 0.0;
    }

    (dot / denom) as f32
}

/// Rank entries by cosine similarity to a query embedding.
///
/// Entries without an embedding are ignored. Results are sorted by
/// descending similarity; ties keep the newer entry first.
pub fn vector_search(entries: &[MemoryEntry], query_embedding: &[f32], limit: usize) -> Vec<MemoryEntry> {
    let mut scored: Vec<(f32, &MemoryEntry)> = entries
        .iter()
        .filter_map(|entry| {
            let emb = entry.embedding.as_ref()?;
            Some((cosine_similarity(emb, query_embedding), entry))
        })
        .collect();

    scored.sort_by(|a, b| {
        b.0.partial_cmp(&a.0)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then_with(|| b.1.created_at.cmp(&a.1.created_at))
    });
    scored.truncate(limit);
    scored
        .into_iter()
        .map(|(sim, e)| {
            let mut e = e.clone();
            e.rank = Some(RetrievalRank::Similarity(sim));
            e
        })
        .collect()
}

/// The `limit` newest entries by `created_at`, newest first.
pub fn most_recent(entries: &[MemoryEntry], limit: usize) -> Vec<MemoryEntry> {
    let mut sorted: Vec<&MemoryEntry> = entries.iter().collect();
    // Stable: among equal timestamps, later appends win.
    sorted.reverse();
    sorted.sort_by(|a, b| b.created_at.cmp(&a.created_at));
    sorted
        .into_iter()
        .take(limit)
        .enumerate()
        .map(|(i, e)| {
            let mut e = e.clone();
            e.rank = Some(RetrievalRank::Recency(i + 1));
            e
        })
        .collect()
}

/// Reject an entry whose embedding doesn't have `dimension` components.
pub fn check_dimension(entry: &MemoryEntry, dimension: Option<usize>) -> Result<(), MemoryError> {
    match (&entry.embedding, dimension) {
        (Some(emb), Some(expected)) if emb.len() != expected => Err(MemoryError::DimensionMismatch {
            expected,
            actual: emb.len(),
        }),
        _ => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, Utc};

    fn entry(id: &str, embedding: Option<Vec<f32>>) -> MemoryEntry {
        let mut e = MemoryEntry::new(format!("Content for {id}"));
        e.id = id.into();
        e.embedding = embedding;
        e
    }

    #[test]
    fn cosine_identical_vectors() {
        let v = vec![1.0, 2.0, 3.0];
        assert!((cosine_similarity(&v, &v) - 1.0).abs() < 1e-6);
    }

    #[test]
    fn cosine_orthogonal_vectors() {
        let a = vec![1.0, 0.0, 0.0];
        let b = vec![0.0, 1.0, 0.0];
        assert!(cosine_similarity(&a, &b).abs() < 1e-6);
    }

    #[test]
    fn cosine_opposite_vectors() {
        let a = vec![1.0, 2.0];
        let b = vec![-1.0, -2.0];
        assert!((cosine_similarity(&a, &b) + 1.0).abs() < 1e-6);
    }

    #[test]
    fn cosine_mismatched_or_zero() {
        assert_eq!(cosine_similarity(&[1.0], &[1.0, 2.0]), 0.0);
        assert_eq!(cosine_similarity(&[], &[]), 0.0);
        assert_eq!(cosine_similarity(&[0.0, 0.0], &[1.0, 1.0]), 0.0);
    }

    #[test]
    fn vector_search_ranks_and_annotates() {
        let entries = vec![
            entry("a", Some(vec![1.0, 0.0])),
            entry("b", Some(vec![0.7, 0.7])),
            entry("c", None),
            entry("d", Some(vec![0.0, 1.0])),
        ];

        let results = vector_search(&entries, &[1.0, 0.0], 2);
        assert_eq!(results.len(), 2);
        assert_eq!(results[0].id, "a");
        assert_eq!(results[1].id, "b");
        match results[0].rank {
            Some(RetrievalRank::Similarity(s)) => assert!((s - 1.0).abs() < 1e-6),
            other => panic!("unexpected rank {other:?}"),
        }
    }

    #[test]
    fn most_recent_orders_by_created_at() {
        let now = Utc::now();
        let entries = vec![
            entry("t1", None).with_created_at(now - Duration::minutes(3)),
            entry("t3", None).with_created_at(now - Duration::minutes(1)),
            entry("t2", None).with_created_at(now - Duration::minutes(2)),
        ];

        let results = most_recent(&entries, 2);
        let ids: Vec<&str> = results.iter().map(|e| e.id.as_str()).collect();
        assert_eq!(ids, vec!["t3", "t2"]);
        assert_eq!(results[1].rank, Some(RetrievalRank::Recency(2)));
    }

    #[test]
    fn dimension_check() {
        let e = entry("x", Some(vec![0.1, 0.2]));
        assert!(check_dimension(&e, Some(2)).is_ok());
        assert!(check_dimension(&e, None).is_ok());
        assert!(matches!(
            check_dimension(&e, Some(3)),
            Err(MemoryError::DimensionMismatch { expected: 3, actual: 2 })
        ));
        assert!(check_dimension(&entry("y", None), Some(3)).is_ok());
    }
}
