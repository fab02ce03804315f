use crate::error::NoteStoreError;
use crate::models::NoteRecord;
use crate::traits::NoteSource;
use async_trait::async_trait;
use tokio::process::Command;

const LIST_TITLES_SCRIPT: &str = r#"
function run() {
  const app = Application("Notes");
  return JSON.stringify(app.notes.name());
}
"#;

const GET_NOTE_SCRIPT: &str = r#"
function run(argv) {
  const app = Application("Notes");
  const matches = app.notes.whose({ name: argv[0] });
  if (matches.length === 0) {
    return JSON.stringify(null);
  }
  const note = matches[0];
  return JSON.stringify({
    title: note.name(),
    content: note.body(),
    creation_date: note.creationDate().toISOString(),
    modification_date: note.modificationDate().toISOString()
  });
}
"#;

const CREATE_NOTE_SCRIPT: &str = r#"
function run(argv) {
  const app = Application("Notes");
  const note = app.Note({ name: argv[0], body: argv[1] });
  const folderName = argv[2];
  if (folderName && folderName.length > 0) {
    const folders = app.folders.whose({ name: folderName });
    let target;
    if (folders.length > 0) {
      target = folders[0];
    } else {
      target = app.Folder({ name: folderName });
      app.folders.push(target);
    }
    target.notes.push(note);
  } else {
    app.notes.push(note);
  }
  return JSON.stringify({ created: argv[0] });
}
"#;

pub struct AppleScriptNoteSource {
    osascript: String,
}

impl AppleScriptNoteSource {
    pub fn new(osascript: impl Into<String>) -> Self {
        Self {
            osascript: osascript.into(),
        }
    }

    async fn run_script(&self, script: &str, args: &[&str]) -> Result<String, NoteStoreError> {
        let output = Command::new(&self.osascript)
            .arg("-l")
            .arg("JavaScript")
            .arg("-e")
            .arg(script)
            .arg("--")
            .args(args)
            .output()
            .await?;

        if !output.status.success() {
            return Err(NoteStoreError::Script {
                status: output.status.code().unwrap_or(-1),
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }

        Ok(String::from_utf8_lossy(&output.stdout).trim().to_string())
    }
}

impl Default for AppleScriptNoteSource {
    fn default() -> Self {
        Self::new("osascript")
    }
}

#[async_trait]
impl NoteSource for AppleScriptNoteSource {
    async fn list_titles(&self) -> Result<Vec<String>, NoteStoreError> {
        let stdout = self.run_script(LIST_TITLES_SCRIPT, &[]).await?;
        parse_titles(&stdout)
    }

    async fn get_by_title(&self, title: &str) -> Result<Option<NoteRecord>, NoteStoreError> {
        let stdout = self.run_script(GET_NOTE_SCRIPT, &[title]).await?;
        parse_note(&stdout)
    }

    async fn create(
        &self,
        title: &str,
        content: &str,
        folder: Option<&str>,
    ) -> Result<(), NoteStoreError> {
        self.run_script(CREATE_NOTE_SCRIPT, &[title, content, folder.unwrap_or("")])
            .await?;
        Ok(())
    }
}

fn parse_titles(json: &str) -> Result<Vec<String>, NoteStoreError> {
    Ok(serde_json::from_str(json)?)
}

fn parse_note(json: &str) -> Result<Option<NoteRecord>, NoteStoreError> {
    Ok(serde_json::from_str(json)?)
}

#[cfg(test)]
mod tests {
    use super::{parse_note, parse_titles};

    #[test]
    fn titles_parse_from_json_array() {
        let titles = parse_titles(r#"["Groceries", "Meeting notes"]"#).unwrap();
        assert_eq!(titles, vec!["Groceries", "Meeting notes"]);
    }

    #[test]
    fn missing_note_parses_as_none() {
        assert_eq!(parse_note("null").unwrap(), None);
    }

    #[test]
    fn note_parses_with_all_fields() {
        let json = r#"{
            "title": "Groceries",
            "content": "<div>apples</div>",
            "creation_date": "2024-01-01T10:00:00.000Z",
            "modification_date": "2024-01-02T10:00:00.000Z"
        }"#;

        let note = parse_note(json).unwrap().unwrap();
        assert_eq!(note.title, "Groceries");
        assert_eq!(note.content, "<div>apples</div>");
        assert_eq!(note.creation_date, "2024-01-01T10:00:00.000Z");
    }

    #[test]
    fn malformed_output_is_an_error() {
        assert!(parse_titles("execution error: Notes got an error").is_err());
    }
}
