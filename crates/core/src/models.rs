use serde::{Deserialize, Serialize};
use std::time::Duration;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct NoteRecord {
    pub title: String,
    pub content: String,
    pub creation_date: String,
    pub modification_date: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct IndexedNote {
    pub id: String,
    pub title: String,
    pub content: String,
    pub creation_date: String,
    pub modification_date: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub struct SearchHit {
    pub title: String,
    pub content: String,
}

#[derive(Debug, Clone, Default)]
pub struct InsertOutcome {
    pub inserted: usize,
    pub warnings: Vec<String>,
}

#[derive(Debug, Clone)]
pub struct IndexReport {
    pub total_notes: usize,
    pub indexed: usize,
    pub elapsed: Duration,
    pub warnings: Vec<String>,
}

impl IndexReport {
    pub fn render(&self) -> String {
        let mut out = if self.total_notes == 0 {
            "No notes were found to index.".to_string()
        } else if self.indexed == 0 {
            format!(
                "No notes could be indexed ({} found) in {:.1}s.",
                self.total_notes,
                self.elapsed.as_secs_f64()
            )
        } else {
            format!(
                "Indexed {} of {} notes in {:.1}s.",
                self.indexed,
                self.total_notes,
                self.elapsed.as_secs_f64()
            )
        };

        if !self.warnings.is_empty() {
            out.push_str("\nWarnings:");
            for warning in &self.warnings {
                out.push_str("\n- ");
                out.push_str(warning);
            }
        }

        out
    }
}
