use thiserror::Error;

#[derive(Debug, Error)]
pub enum NoteStoreError {
    #[error("failed to run osascript: {0}")]
    Io(#[from] std::io::Error),

    #[error("osascript exited with status {status}: {stderr}")]
    Script { status: i32, stderr: String },

    #[error("unexpected script output: {0}")]
    Output(#[from] serde_json::Error),
}

#[derive(Debug, Error)]
pub enum EmbeddingError {
    #[error("embedding model failure: {0}")]
    Model(String),

    #[error("embedding batch size mismatch: expected {expected}, got {actual}")]
    BatchSize { expected: usize, actual: usize },
}

#[derive(Debug, Error)]
#[error("content normalization failed: {0}")]
pub struct NormalizeError(pub String);

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("sqlite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("invalid table name: {0}")]
    InvalidTableName(String),

    #[error("embedding error: {0}")]
    Embedding(#[from] EmbeddingError),

    #[error("connection lock poisoned")]
    Poisoned,

    #[error("blocking task failed: {0}")]
    Background(String),
}

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("note store error: {0}")]
    NoteStore(#[from] NoteStoreError),

    #[error("index store error: {0}")]
    Store(#[from] StoreError),
}

pub type Result<T, E = StoreError> = std::result::Result<T, E>;
