use crate::embeddings::Embedder;
use crate::error::{Result, StoreError};
use crate::models::{IndexedNote, InsertOutcome, SearchHit};
use crate::traits::IndexStore;
use async_trait::async_trait;
use rusqlite::{params, Connection, OptionalExtension};
use std::path::Path;
use std::sync::{Arc, Mutex};
use tracing::debug;

pub struct SqliteStore {
    conn: Arc<Mutex<Connection>>,
    table: String,
    embedder: Arc<dyn Embedder>,
}

impl SqliteStore {
    pub fn open(dir: &Path, table: &str, embedder: Arc<dyn Embedder>) -> Result<Self> {
        validate_table_name(table)?;
        std::fs::create_dir_all(dir)?;
        let conn = Connection::open(dir.join(format!("{table}.sqlite")))?;
        conn.execute_batch("PRAGMA journal_mode = WAL; PRAGMA busy_timeout = 5000;")?;
        Self::from_connection(conn, table, embedder)
    }

    pub fn open_in_memory(table: &str, embedder: Arc<dyn Embedder>) -> Result<Self> {
        validate_table_name(table)?;
        Self::from_connection(Connection::open_in_memory()?, table, embedder)
    }

    fn from_connection(conn: Connection, table: &str, embedder: Arc<dyn Embedder>) -> Result<Self> {
        conn.execute(
            &format!(
                r#"CREATE TABLE IF NOT EXISTS "{table}" (
                    id TEXT NOT NULL,
                    title TEXT NOT NULL,
                    content TEXT NOT NULL,
                    creation_date TEXT NOT NULL,
                    modification_date TEXT NOT NULL,
                    embedding BLOB NOT NULL
                )"#
            ),
            [],
        )?;
        ensure_fts(&conn, table)?;

        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
            table: table.to_string(),
            embedder,
        })
    }

    async fn with_connection<T, F>(&self, operation: F) -> Result<T>
    where
        F: FnOnce(&Connection) -> Result<T> + Send + 'static,
        T: Send + 'static,
    {
        let conn = Arc::clone(&self.conn);
        tokio::task::spawn_blocking(move || {
            let guard = conn.lock().map_err(|_| StoreError::Poisoned)?;
            operation(&guard)
        })
        .await
        .map_err(|error| StoreError::Background(error.to_string()))?
    }
}

#[async_trait]
impl IndexStore for SqliteStore {
    async fn clear(&self) -> Result<(), StoreError> {
        let table = self.table.clone();
        self.with_connection(move |conn| {
            let tx = conn.unchecked_transaction()?;
            tx.execute(&format!(r#"DELETE FROM "{table}""#), [])?;
            tx.execute(&format!(r#"DELETE FROM "{}""#, fts_table(&table)), [])?;
            tx.commit()?;
            Ok(())
        })
        .await
    }

    async fn add_notes(&self, notes: Vec<IndexedNote>) -> Result<InsertOutcome, StoreError> {
        if notes.is_empty() {
            return Ok(InsertOutcome::default());
        }

        let mut warnings = Vec::new();
        let contents: Vec<String> = notes.iter().map(|note| note.content.clone()).collect();

        let vectors: Vec<Option<Vec<f32>>> = match self.embedder.embed_batch(&contents) {
            Ok(vectors) if vectors.len() == notes.len() => {
                vectors.into_iter().map(Some).collect()
            }
            Ok(vectors) => {
                warnings.push(format!(
                    "batch embedding returned {} vectors for {} notes, retrying individually",
                    vectors.len(),
                    notes.len()
                ));
                embed_each(self.embedder.as_ref(), &notes, &mut warnings)
            }
            Err(error) => {
                warnings.push(format!(
                    "batch embedding failed, retrying individually: {error}"
                ));
                embed_each(self.embedder.as_ref(), &notes, &mut warnings)
            }
        };

        let expected = self.embedder.dimensions();
        let mut rows = Vec::new();
        for (note, vector) in notes.into_iter().zip(vectors) {
            match vector {
                Some(vector) if vector.len() == expected => {
                    rows.push((note, embedding_to_blob(&vector)));
                }
                Some(vector) => warnings.push(format!(
                    "unexpected embedding width {} for note '{}', skipping",
                    vector.len(),
                    note.title
                )),
                None => {}
            }
        }

        if rows.is_empty() {
            return Ok(InsertOutcome {
                inserted: 0,
                warnings,
            });
        }

        let table = self.table.clone();
        let inserted = self
            .with_connection(move |conn| {
                let insert_note = format!(
                    r#"INSERT INTO "{table}"
                        (id, title, content, creation_date, modification_date, embedding)
                        VALUES (?1, ?2, ?3, ?4, ?5, ?6)"#
                );
                let insert_fts = format!(
                    r#"INSERT INTO "{}" (rowid, title, content) VALUES (?1, ?2, ?3)"#,
                    fts_table(&table)
                );

                let tx = conn.unchecked_transaction()?;
                let mut count = 0usize;
                for (note, blob) in &rows {
                    tx.execute(
                        &insert_note,
                        params![
                            note.id,
                            note.title,
                            note.content,
                            note.creation_date,
                            note.modification_date,
                            blob
                        ],
                    )?;
                    let rowid = tx.last_insert_rowid();
                    tx.execute(&insert_fts, params![rowid, note.title, note.content])?;
                    count += 1;
                }
                tx.commit()?;
                Ok(count)
            })
            .await?;

        Ok(InsertOutcome { inserted, warnings })
    }

    async fn vector_search(
        &self,
        query: &str,
        limit: usize,
    ) -> Result<Vec<SearchHit>, StoreError> {
        let query_vector = self.embedder.embed_query(query)?;
        let table = self.table.clone();

        self.with_connection(move |conn| {
            let mut statement =
                conn.prepare(&format!(r#"SELECT title, content, embedding FROM "{table}""#))?;
            let rows = statement.query_map([], |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, Vec<u8>>(2)?,
                ))
            })?;

            let mut scored = Vec::new();
            for row in rows {
                let (title, content, blob) = row?;
                let stored = blob_to_embedding(&blob);
                if stored.len() != query_vector.len() {
                    debug!(title = %title, "skipping row with stale embedding width");
                    continue;
                }
                scored.push((
                    cosine_distance(&query_vector, &stored),
                    SearchHit { title, content },
                ));
            }

            scored.sort_by(|left, right| left.0.total_cmp(&right.0));
            Ok(scored.into_iter().take(limit).map(|(_, hit)| hit).collect())
        })
        .await
    }

    async fn fts_search(&self, query: &str, limit: usize) -> Result<Vec<SearchHit>, StoreError> {
        let match_query = match build_match_query(query) {
            Some(match_query) => match_query,
            None => return Ok(Vec::new()),
        };
        let table = self.table.clone();

        self.with_connection(move |conn| {
            let fts = fts_table(&table);
            let mut statement = conn.prepare(&format!(
                r#"SELECT title, content FROM "{fts}" WHERE "{fts}" MATCH ?1 ORDER BY bm25("{fts}") LIMIT ?2"#
            ))?;
            let rows = statement.query_map(params![match_query, limit as i64], |row| {
                Ok(SearchHit {
                    title: row.get(0)?,
                    content: row.get(1)?,
                })
            })?;

            rows.collect::<std::result::Result<Vec<_>, _>>()
                .map_err(StoreError::from)
        })
        .await
    }

    async fn count(&self) -> Result<usize, StoreError> {
        let table = self.table.clone();
        self.with_connection(move |conn| {
            let count: i64 = conn.query_row(
                &format!(r#"SELECT COUNT(*) FROM "{table}""#),
                [],
                |row| row.get(0),
            )?;
            Ok(count as usize)
        })
        .await
    }
}

fn ensure_fts(conn: &Connection, table: &str) -> Result<()> {
    let fts = fts_table(table);
    let existing: Option<String> = conn
        .query_row(
            "SELECT name FROM sqlite_master WHERE type = 'table' AND name = ?1",
            params![fts],
            |row| row.get(0),
        )
        .optional()?;

    if existing.is_none() {
        conn.execute(
            &format!(r#"CREATE VIRTUAL TABLE "{fts}" USING fts5(title UNINDEXED, content)"#),
            [],
        )?;
    }

    Ok(())
}

fn fts_table(table: &str) -> String {
    format!("{table}_fts")
}

fn validate_table_name(table: &str) -> Result<()> {
    let valid = !table.is_empty()
        && table
            .chars()
            .all(|character| character.is_ascii_alphanumeric() || character == '_');

    if valid {
        Ok(())
    } else {
        Err(StoreError::InvalidTableName(table.to_string()))
    }
}

fn embed_each(
    embedder: &dyn Embedder,
    notes: &[IndexedNote],
    warnings: &mut Vec<String>,
) -> Vec<Option<Vec<f32>>> {
    notes
        .iter()
        .map(|note| {
            match embedder.embed_batch(std::slice::from_ref(&note.content)) {
                Ok(mut vectors) if !vectors.is_empty() => Some(vectors.swap_remove(0)),
                Ok(_) => {
                    warnings.push(format!(
                        "embedding produced no vector for note '{}', skipping",
                        note.title
                    ));
                    None
                }
                Err(error) => {
                    warnings.push(format!(
                        "embedding failed for note '{}', skipping: {error}",
                        note.title
                    ));
                    None
                }
            }
        })
        .collect()
}

pub fn build_match_query(query: &str) -> Option<String> {
    let tokens: Vec<String> = query
        .split_whitespace()
        .map(|token| format!("\"{}\"", token.replace('"', "\"\"")))
        .collect();

    if tokens.is_empty() {
        None
    } else {
        Some(tokens.join(" OR "))
    }
}

pub fn embedding_to_blob(vector: &[f32]) -> Vec<u8> {
    let mut blob = Vec::with_capacity(vector.len() * 4);
    for value in vector {
        blob.extend_from_slice(&value.to_le_bytes());
    }
    blob
}

pub fn blob_to_embedding(blob: &[u8]) -> Vec<f32> {
    blob.chunks_exact(4)
        .map(|bytes| f32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]))
        .collect()
}

fn cosine_distance(left: &[f32], right: &[f32]) -> f32 {
    let mut dot = 0.0f32;
    let mut left_norm = 0.0f32;
    let mut right_norm = 0.0f32;

    for (a, b) in left.iter().zip(right.iter()) {
        dot += a * b;
        left_norm += a * a;
        right_norm += b * b;
    }

    if left_norm <= 0.0 || right_norm <= 0.0 {
        return 1.0;
    }

    1.0 - dot / (left_norm.sqrt() * right_norm.sqrt())
}
