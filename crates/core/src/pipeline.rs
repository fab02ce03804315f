use crate::error::PipelineError;
use crate::models::{IndexReport, IndexedNote};
use crate::normalize::ContentNormalizer;
use crate::traits::{IndexStore, NoteSource};
use futures::stream::{self, StreamExt};
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::RwLock;
use tracing::{info, warn};

pub const DEFAULT_FETCH_CONCURRENCY: usize = 8;

pub struct IndexingPipeline<N, S, C>
where
    N: NoteSource,
    S: IndexStore,
    C: ContentNormalizer,
{
    source: Arc<N>,
    store: Arc<RwLock<S>>,
    normalizer: C,
    fetch_concurrency: usize,
}

impl<N, S, C> IndexingPipeline<N, S, C>
where
    N: NoteSource + Send + Sync,
    S: IndexStore + Send + Sync,
    C: ContentNormalizer,
{
    pub fn new(
        source: Arc<N>,
        store: Arc<RwLock<S>>,
        normalizer: C,
        fetch_concurrency: usize,
    ) -> Self {
        Self {
            source,
            store,
            normalizer,
            fetch_concurrency: fetch_concurrency.max(1),
        }
    }

    pub async fn run(&self) -> Result<IndexReport, PipelineError> {
        let started = Instant::now();
        let mut warnings = Vec::new();

        let store = self.store.write().await;

        if let Err(error) = store.clear().await {
            warn!(%error, "index clear failed, stale rows may remain");
            warnings.push(format!("failed to clear previous index: {error}"));
        }

        let titles = self.source.list_titles().await?;
        let total_notes = titles.len();

        if titles.is_empty() {
            return Ok(IndexReport {
                total_notes: 0,
                indexed: 0,
                elapsed: started.elapsed(),
                warnings,
            });
        }

        let source = self.source.as_ref();
        let normalizer = &self.normalizer;

        let fetched: Vec<_> = stream::iter(titles)
            .map(|title| async move {
                let mut item_warnings = Vec::new();
                let note = match source.get_by_title(&title).await {
                    Ok(Some(mut note)) => {
                        if note.title.trim().is_empty() {
                            item_warnings
                                .push(format!("skipping untitled note fetched as '{title}'"));
                            None
                        } else {
                            match normalizer.normalize(&note.content) {
                                Ok(normalized) => note.content = normalized,
                                Err(error) => item_warnings.push(format!(
                                    "normalization failed for '{title}', indexing raw content: {error}"
                                )),
                            }
                            Some(note)
                        }
                    }
                    Ok(None) => {
                        item_warnings
                            .push(format!("note '{title}' disappeared before it could be read"));
                        None
                    }
                    Err(error) => {
                        item_warnings.push(format!("failed to fetch note '{title}': {error}"));
                        None
                    }
                };
                (note, item_warnings)
            })
            .buffered(self.fetch_concurrency)
            .collect()
            .await;

        let mut rows = Vec::new();
        for (note, item_warnings) in fetched {
            warnings.extend(item_warnings);
            if let Some(note) = note {
                rows.push(IndexedNote {
                    id: rows.len().to_string(),
                    title: note.title,
                    content: note.content,
                    creation_date: note.creation_date,
                    modification_date: note.modification_date,
                });
            }
        }

        if rows.is_empty() {
            return Ok(IndexReport {
                total_notes,
                indexed: 0,
                elapsed: started.elapsed(),
                warnings,
            });
        }

        let outcome = store.add_notes(rows).await?;
        warnings.extend(outcome.warnings);

        info!(
            total = total_notes,
            indexed = outcome.inserted,
            warnings = warnings.len(),
            "index rebuild finished"
        );

        Ok(IndexReport {
            total_notes,
            indexed: outcome.inserted,
            elapsed: started.elapsed(),
            warnings,
        })
    }
}
