use crate::error::{NoteStoreError, StoreError};
use crate::models::{IndexedNote, InsertOutcome, NoteRecord, SearchHit};
use async_trait::async_trait;

#[async_trait]
pub trait NoteSource {
    async fn list_titles(&self) -> Result<Vec<String>, NoteStoreError>;

    async fn get_by_title(&self, title: &str) -> Result<Option<NoteRecord>, NoteStoreError>;

    async fn create(
        &self,
        title: &str,
        content: &str,
        folder: Option<&str>,
    ) -> Result<(), NoteStoreError>;
}

#[async_trait]
pub trait IndexStore {
    async fn clear(&self) -> Result<(), StoreError>;

    async fn add_notes(&self, notes: Vec<IndexedNote>) -> Result<InsertOutcome, StoreError>;

    async fn vector_search(&self, query: &str, limit: usize)
        -> Result<Vec<SearchHit>, StoreError>;

    async fn fts_search(&self, query: &str, limit: usize) -> Result<Vec<SearchHit>, StoreError>;

    async fn count(&self) -> Result<usize, StoreError>;
}
