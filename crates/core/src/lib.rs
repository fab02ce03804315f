pub mod embeddings;
pub mod error;
pub mod models;
pub mod normalize;
pub mod pipeline;
pub mod search;
pub mod stores;
pub mod traits;

#[cfg(feature = "fastembed")]
pub use embeddings::FastembedEmbedder;
pub use embeddings::{Embedder, HashNgramEmbedder, DEFAULT_EMBEDDING_DIMENSIONS};
pub use error::{
    EmbeddingError, NormalizeError, NoteStoreError, PipelineError, StoreError,
};
pub use models::{IndexReport, IndexedNote, InsertOutcome, NoteRecord, SearchHit};
pub use normalize::{ContentNormalizer, HtmlNormalizer};
pub use pipeline::{IndexingPipeline, DEFAULT_FETCH_CONCURRENCY};
pub use search::{fuse, HybridSearchEngine, DEFAULT_SEARCH_LIMIT, RRF_K};
pub use stores::{AppleScriptNoteSource, SqliteStore};
pub use traits::{IndexStore, NoteSource};
