pub mod apple_notes;
pub mod sqlite;

pub use apple_notes::AppleScriptNoteSource;
pub use sqlite::SqliteStore;
