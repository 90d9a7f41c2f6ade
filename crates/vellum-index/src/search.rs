//! Brute-force top-k similarity search over every stored vector.

use std::fmt::Write;

use serde::Serialize;
use vellum_llm::EmbeddingProvider;
use vellum_llm::vector::dot;

use crate::error::Result;
use crate::record::EmbeddingRecord;
use crate::store::EmbeddingStore;

/// One ranked record. `score` is the dot product of unit vectors, in `[-1, 1]`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SearchHit {
    #[serde(flatten)]
    pub record: EmbeddingRecord,
    pub score: f32,
}

/// Embed `query` and return the `limit` most similar stored chunks, best first.
///
/// # Errors
///
/// Returns an error if the query cannot be embedded or the store scan fails.
pub async fn search_similar<P, S>(
    store: &S,
    provider: &P,
    query: &str,
    limit: usize,
) -> Result<Vec<SearchHit>>
where
    P: EmbeddingProvider,
    S: EmbeddingStore,
{
    if limit == 0 {
        return Ok(Vec::new());
    }
    let query_vector = provider.embed(query).await?;
    let records = store.scan_all().await?;
    let scanned = records.len();
    let hits = rank(&query_vector, records, limit);
    tracing::debug!(scanned, returned = hits.len(), "similarity search");
    Ok(hits)
}

/// Score `records` against `query` and keep the best `limit`.
///
/// Records whose dimension differs from the query are skipped. Ties keep
/// the input order.
#[must_use]
pub fn rank(query: &[f32], records: Vec<EmbeddingRecord>, limit: usize) -> Vec<SearchHit> {
    let mut hits: Vec<SearchHit> = records
        .into_iter()
        .filter_map(|record| {
            if record.vector.len() != query.len() {
                tracing::debug!(
                    id = %record.id,
                    file = %record.file_path,
                    dimensions = record.vector.len(),
                    expected = query.len(),
                    "skipping record with mismatched dimensions"
                );
                return None;
            }
            let score = dot(query, &record.vector);
            Some(SearchHit { record, score })
        })
        .collect();

    hits.sort_by(|a, b| b.score.total_cmp(&a.score));
    hits.truncate(limit);
    hits
}

/// Render hits as a `<code_context>` block for an assistant prompt.
#[must_use]
pub fn format_as_context(hits: &[SearchHit]) -> String {
    if hits.is_empty() {
        return String::new();
    }

    let mut out = String::from("<code_context>\n");
    for hit in hits {
        let meta = &hit.record.metadata;
        let name = meta.name.as_deref().unwrap_or(meta.kind.as_str());
        let _ = writeln!(
            out,
            "  <chunk file=\"{}\" lines=\"{}-{}\" name=\"{}\" score=\"{:.2}\">",
            hit.record.file_path, meta.line_start, meta.line_end, name, hit.score,
        );
        out.push_str(&hit.record.content);
        out.push_str("\n  </chunk>\n");
    }
    out.push_str("</code_context>");
    out
}

#[cfg(test)]
mod tests {
    use proptest::prelude::*;
    use vellum_llm::mock::MockEmbedder;

    use super::*;
    use crate::store::InMemoryStore;
    use crate::store::test_support::record;

    fn unit(x: f32, y: f32) -> Vec<f32> {
        let n = (x * x + y * y).sqrt();
        vec![x / n, y / n]
    }

    #[test]
    fn rank_orders_by_score() {
        let records = vec![
            record("a.ts", 0, "a", unit(0.0, 1.0)),
            record("b.ts", 0, "b", unit(1.0, 0.0)),
            record("c.ts", 0, "c", unit(1.0, 1.0)),
        ];
        let hits = rank(&[1.0, 0.0], records, 10);
        let paths: Vec<&str> = hits.iter().map(|h| h.record.file_path.as_str()).collect();
        assert_eq!(paths, vec!["b.ts", "c.ts", "a.ts"]);
        assert!((hits[0].score - 1.0).abs() < 1e-6);
    }

    #[test]
    fn rank_truncates_to_limit() {
        let records = (0..10)
            .map(|i| record("a.ts", i, "x", unit(1.0, i as f32)))
            .collect();
        assert_eq!(rank(&[1.0, 0.0], records, 3).len(), 3);
    }

    #[test]
    fn rank_skips_mismatched_dimensions() {
        let records = vec![
            record("a.ts", 0, "a", vec![1.0, 0.0, 0.0]),
            record("b.ts", 0, "b", unit(1.0, 0.0)),
        ];
        let hits = rank(&[1.0, 0.0], records, 5);
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].record.file_path, "b.ts");
    }

    #[test]
    fn rank_is_stable_on_ties() {
        let records = vec![
            record("first.ts", 0, "a", unit(1.0, 0.0)),
            record("second.ts", 0, "b", unit(1.0, 0.0)),
        ];
        let hits = rank(&[1.0, 0.0], records, 2);
        assert_eq!(hits[0].record.file_path, "first.ts");
        assert_eq!(hits[1].record.file_path, "second.ts");
    }

    #[tokio::test]
    async fn zero_limit_skips_embedding() {
        let store = InMemoryStore::new();
        let provider = MockEmbedder::new();
        let hits = search_similar(&store, &provider, "anything", 0).await.unwrap();
        assert!(hits.is_empty());
        assert_eq!(provider.calls(), 0);
    }

    #[tokio::test]
    async fn empty_store_returns_nothing() {
        let store = InMemoryStore::new();
        let hits = search_similar(&store, &MockEmbedder::new(), "query", 5)
            .await
            .unwrap();
        assert!(hits.is_empty());
    }

    #[test]
    fn format_as_context_empty() {
        assert_eq!(format_as_context(&[]), "");
    }

    #[test]
    fn format_as_context_xml() {
        let hits = vec![SearchHit {
            record: record("src/lib.rs", 0, "fn hello() {}", vec![1.0]),
            score: 0.85,
        }];
        let xml = format_as_context(&hits);
        assert!(xml.starts_with("<code_context>"));
        assert!(xml.ends_with("</code_context>"));
        assert!(xml.contains("file=\"src/lib.rs\""));
        assert!(xml.contains("lines=\"1-9\""));
        assert!(xml.contains("name=\"f0\""));
        assert!(xml.contains("score=\"0.85\""));
        assert!(xml.contains("fn hello() {}"));
    }

    proptest! {
        #[test]
        fn top_k_is_min_k_n_and_non_increasing(
            angles in prop::collection::vec(0.0f32..6.0, 0..60),
            k in 0usize..80,
        ) {
            let records: Vec<_> = angles
                .iter()
                .enumerate()
                .map(|(i, a)| record("p.ts", i, "x", vec![a.cos(), a.sin()]))
                .collect();
            let n = records.len();
            let hits = rank(&[1.0, 0.0], records, k);
            prop_assert_eq!(hits.len(), k.min(n));
            for pair in hits.windows(2) {
                prop_assert!(pair[0].score >= pair[1].score);
            }
        }
    }
}
