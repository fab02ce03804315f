use crate::models::SearchHit;
use crate::traits::IndexStore;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::warn;

pub const RRF_K: f64 = 60.0;
pub const DEFAULT_SEARCH_LIMIT: usize = 20;

pub struct HybridSearchEngine<S>
where
    S: IndexStore,
{
    store: Arc<RwLock<S>>,
}

impl<S> HybridSearchEngine<S>
where
    S: IndexStore + Send + Sync,
{
    pub fn new(store: Arc<RwLock<S>>) -> Self {
        Self { store }
    }

    pub async fn search(&self, query: &str, limit: usize) -> Vec<SearchHit> {
        if query.trim().is_empty() {
            return Vec::new();
        }

        let store = self.store.read().await;
        let (vector_result, fts_result) = tokio::join!(
            store.vector_search(query, limit),
            store.fts_search(query, limit)
        );

        let vector_hits = vector_result.unwrap_or_else(|error| {
            warn!(%error, "vector channel failed, continuing with full-text only");
            Vec::new()
        });
        let fts_hits = fts_result.unwrap_or_else(|error| {
            warn!(%error, "full-text channel failed, continuing with vector only");
            Vec::new()
        });

        fuse(&vector_hits, &fts_hits, limit)
    }
}

pub fn fuse(vector_hits: &[SearchHit], fts_hits: &[SearchHit], limit: usize) -> Vec<SearchHit> {
    fused_scores(vector_hits, fts_hits)
        .into_iter()
        .take(limit)
        .map(|(hit, _)| hit)
        .collect()
}

fn fused_scores(vector_hits: &[SearchHit], fts_hits: &[SearchHit]) -> Vec<(SearchHit, f64)> {
    let mut scores: HashMap<SearchHit, f64> = HashMap::new();

    for channel in [vector_hits, fts_hits] {
        for (rank, hit) in channel.iter().enumerate() {
            *scores.entry(hit.clone()).or_insert(0.0) += 1.0 / (RRF_K + rank as f64);
        }
    }

    let mut fused: Vec<(SearchHit, f64)> = scores.into_iter().collect();
    fused.sort_by(|left, right| {
        right
            .1
            .total_cmp(&left.1)
            .then_with(|| left.0.title.cmp(&right.0.title))
            .then_with(|| left.0.content.cmp(&right.0.content))
    });

    fused
}

#[cfg(test)]
mod tests {
    use super::{fuse, fused_scores, HybridSearchEngine, RRF_K};
    use crate::embeddings::HashNgramEmbedder;
    use crate::error::StoreError;
    use crate::models::{IndexedNote, InsertOutcome, SearchHit};
    use crate::stores::SqliteStore;
    use crate::traits::IndexStore;
    use async_trait::async_trait;
    use std::sync::Arc;
    use tokio::sync::RwLock;

    fn hit(title: &str, content: &str) -> SearchHit {
        SearchHit {
            title: title.to_string(),
            content: content.to_string(),
        }
    }

    #[derive(Default)]
    struct FakeIndexStore {
        vector_hits: Option<Vec<SearchHit>>,
        fts_hits: Option<Vec<SearchHit>>,
    }

    #[async_trait]
    impl IndexStore for FakeIndexStore {
        async fn clear(&self) -> Result<(), StoreError> {
            Ok(())
        }

        async fn add_notes(&self, _notes: Vec<IndexedNote>) -> Result<InsertOutcome, StoreError> {
            Ok(InsertOutcome::default())
        }

        async fn vector_search(
            &self,
            _query: &str,
            _limit: usize,
        ) -> Result<Vec<SearchHit>, StoreError> {
            match &self.vector_hits {
                Some(hits) => Ok(hits.clone()),
                None => Err(StoreError::Background("vector channel down".to_string())),
            }
        }

        async fn fts_search(
            &self,
            _query: &str,
            _limit: usize,
        ) -> Result<Vec<SearchHit>, StoreError> {
            match &self.fts_hits {
                Some(hits) => Ok(hits.clone()),
                None => Err(StoreError::Background("fts channel down".to_string())),
            }
        }

        async fn count(&self) -> Result<usize, StoreError> {
            Ok(0)
        }
    }

    fn engine(store: FakeIndexStore) -> HybridSearchEngine<FakeIndexStore> {
        HybridSearchEngine::new(Arc::new(RwLock::new(store)))
    }

    #[test]
    fn fusion_scores_follow_reciprocal_ranks() {
        let vector = vec![hit("A", "a"), hit("B", "b")];
        let fts = vec![hit("B", "b"), hit("C", "c")];

        let scored = fused_scores(&vector, &fts);

        assert_eq!(scored[0].0.title, "B");
        assert_eq!(scored[1].0.title, "A");
        assert_eq!(scored[2].0.title, "C");

        assert!((scored[0].1 - (1.0 / (RRF_K + 1.0) + 1.0 / RRF_K)).abs() < 1e-12);
        assert!((scored[1].1 - 1.0 / RRF_K).abs() < 1e-12);
        assert!((scored[2].1 - 1.0 / (RRF_K + 1.0)).abs() < 1e-12);
    }

    #[test]
    fn identity_is_the_title_content_pair() {
        let vector = vec![hit("Note", "same body")];
        let fts = vec![hit("Note", "same body"), hit("Note", "different body")];

        let fused = fuse(&vector, &fts, 10);

        assert_eq!(fused.len(), 2);
        assert_eq!(fused[0], hit("Note", "same body"));
    }

    #[test]
    fn equal_scores_break_ties_lexicographically() {
        let vector = vec![hit("Zebra", "z")];
        let fts = vec![hit("Alpha", "a")];

        let fused = fuse(&vector, &fts, 10);

        assert_eq!(fused[0].title, "Alpha");
        assert_eq!(fused[1].title, "Zebra");
    }

    #[test]
    fn limit_caps_fused_results() {
        let vector = vec![hit("A", "a"), hit("B", "b"), hit("C", "c")];
        let fused = fuse(&vector, &[], 2);
        assert_eq!(fused.len(), 2);
    }

    #[tokio::test]
    async fn one_failed_channel_does_not_sink_the_other() {
        let engine = engine(FakeIndexStore {
            vector_hits: None,
            fts_hits: Some(vec![hit("Groceries", "apples")]),
        });

        let hits = engine.search("apples", 10).await;

        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].title, "Groceries");
    }

    #[tokio::test]
    async fn both_channels_failing_yields_empty_results() {
        let engine = engine(FakeIndexStore {
            vector_hits: None,
            fts_hits: None,
        });

        assert!(engine.search("anything", 10).await.is_empty());
    }

    #[tokio::test]
    async fn empty_index_yields_empty_results() {
        let engine = engine(FakeIndexStore {
            vector_hits: Some(Vec::new()),
            fts_hits: Some(Vec::new()),
        });

        assert!(engine.search("anything", 10).await.is_empty());
    }

    #[tokio::test]
    async fn blank_queries_short_circuit() {
        let engine = engine(FakeIndexStore::default());
        assert!(engine.search("   ", 10).await.is_empty());
    }

    async fn seeded_store() -> Arc<RwLock<SqliteStore>> {
        let store =
            SqliteStore::open_in_memory("notes", Arc::new(HashNgramEmbedder::default())).unwrap();

        store
            .add_notes(vec![
                IndexedNote {
                    id: "0".to_string(),
                    title: "Test Note".to_string(),
                    content: "This is a test note content".to_string(),
                    creation_date: "2024-01-01".to_string(),
                    modification_date: "2024-01-01".to_string(),
                },
                IndexedNote {
                    id: "1".to_string(),
                    title: "Groceries".to_string(),
                    content: "apples rye bread and coffee".to_string(),
                    creation_date: "2024-01-01".to_string(),
                    modification_date: "2024-01-01".to_string(),
                },
                IndexedNote {
                    id: "2".to_string(),
                    title: "15/12".to_string(),
                    content: "protocol review at noon".to_string(),
                    creation_date: "2024-01-01".to_string(),
                    modification_date: "2024-01-01".to_string(),
                },
            ])
            .await
            .unwrap();

        Arc::new(RwLock::new(store))
    }

    #[tokio::test]
    async fn indexed_notes_are_findable_by_phrase() {
        let engine = HybridSearchEngine::new(seeded_store().await);

        let hits = engine.search("test note", 20).await;

        assert!(!hits.is_empty());
        assert_eq!(hits[0].title, "Test Note");
        assert_eq!(hits[0].content, "This is a test note content");
    }

    #[tokio::test]
    async fn punctuation_titles_surface_in_results() {
        let engine = HybridSearchEngine::new(seeded_store().await);

        let hits = engine.search("15/12", 20).await;

        assert!(hits.iter().any(|found| found.title == "15/12"));
    }

    #[tokio::test]
    async fn repeated_searches_return_identical_rankings() {
        let engine = HybridSearchEngine::new(seeded_store().await);

        let first = engine.search("notes about meetings", 20).await;
        let second = engine.search("notes about meetings", 20).await;

        assert_eq!(first, second);
    }
}
