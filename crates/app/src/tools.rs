use crate::rpc::{Request, Response, INVALID_PARAMS, METHOD_NOT_FOUND};
use notes_search_core::{
    ContentNormalizer, HybridSearchEngine, IndexReport, IndexStore, IndexingPipeline, NoteSource,
    PipelineError, SearchHit,
};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::{json, Value};
use std::sync::Arc;
use tracing::debug;

pub const PROTOCOL_VERSION: &str = "2024-11-05";

pub struct NotesService<N, S, C>
where
    N: NoteSource,
    S: IndexStore,
    C: ContentNormalizer,
{
    source: Arc<N>,
    pipeline: IndexingPipeline<N, S, C>,
    engine: HybridSearchEngine<S>,
    search_limit: usize,
}

#[derive(Debug, Deserialize)]
struct ToolCall {
    name: String,
    #[serde(default)]
    arguments: Value,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct GetNoteArgs {
    title: String,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct CreateNoteArgs {
    title: String,
    content: String,
    #[serde(default)]
    folder: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct SearchArgs {
    query: String,
    #[serde(default)]
    limit: Option<usize>,
}

impl<N, S, C> NotesService<N, S, C>
where
    N: NoteSource + Send + Sync,
    S: IndexStore + Send + Sync,
    C: ContentNormalizer,
{
    pub fn new(
        source: Arc<N>,
        pipeline: IndexingPipeline<N, S, C>,
        engine: HybridSearchEngine<S>,
        search_limit: usize,
    ) -> Self {
        Self {
            source,
            pipeline,
            engine,
            search_limit,
        }
    }

    pub async fn run_index(&self) -> Result<IndexReport, PipelineError> {
        self.pipeline.run().await
    }

    pub async fn run_search(&self, query: &str, limit: Option<usize>) -> Vec<SearchHit> {
        let limit = limit.unwrap_or(self.search_limit);
        self.engine.search(query, limit).await
    }

    pub async fn dispatch(&self, request: Request) -> Option<Response> {
        let id = match request.id {
            Some(id) => id,
            None => {
                debug!(method = %request.method, "ignoring notification");
                return None;
            }
        };

        let result = match request.method.as_str() {
            "initialize" => Ok(initialize_result()),
            "ping" => Ok(json!({})),
            "tools/list" => Ok(tool_listing()),
            "tools/call" => self.call_tool(request.params).await,
            other => Err((METHOD_NOT_FOUND, format!("method not found: {other}"))),
        };

        Some(match result {
            Ok(value) => Response::success(id, value),
            Err((code, message)) => Response::failure(id, code, message),
        })
    }

    async fn call_tool(&self, params: Value) -> Result<Value, (i64, String)> {
        let call: ToolCall = serde_json::from_value(params)
            .map_err(|error| (INVALID_PARAMS, format!("invalid tool call: {error}")))?;

        match call.name.as_str() {
            "list-notes" => Ok(self.list_notes().await),
            "get-note" => {
                let args: GetNoteArgs = parse_arguments(call.arguments)?;
                Ok(self.get_note(&args.title).await)
            }
            "create-note" => {
                let args: CreateNoteArgs = parse_arguments(call.arguments)?;
                Ok(self.create_note(&args).await)
            }
            "index-notes" => Ok(self.index_notes().await),
            "search-notes" => {
                let args: SearchArgs = parse_arguments(call.arguments)?;
                Ok(self.search_notes(&args.query, args.limit).await)
            }
            other => Err((INVALID_PARAMS, format!("unknown tool: {other}"))),
        }
    }

    async fn list_notes(&self) -> Value {
        match self.source.list_titles().await {
            Ok(titles) if titles.is_empty() => text_payload("No notes found.", false),
            Ok(titles) => {
                let listing = titles
                    .iter()
                    .map(|title| format!("- {title}"))
                    .collect::<Vec<_>>()
                    .join("\n");
                text_payload(&format!("{} notes:\n{listing}", titles.len()), false)
            }
            Err(error) => text_payload(&format!("Failed to list notes: {error}"), true),
        }
    }

    async fn get_note(&self, title: &str) -> Value {
        match self.source.get_by_title(title).await {
            Ok(Some(note)) => text_payload(
                &format!(
                    "{}\nCreated: {}\nModified: {}\n\n{}",
                    note.title, note.creation_date, note.modification_date, note.content
                ),
                false,
            ),
            Ok(None) => text_payload(&format!("No note titled '{title}' was found."), false),
            Err(error) => text_payload(&format!("Failed to read note '{title}': {error}"), true),
        }
    }

    async fn create_note(&self, args: &CreateNoteArgs) -> Value {
        match self
            .source
            .create(&args.title, &args.content, args.folder.as_deref())
            .await
        {
            Ok(()) => text_payload(&format!("Created note '{}'.", args.title), false),
            Err(error) => text_payload(
                &format!("Failed to create note '{}': {error}", args.title),
                true,
            ),
        }
    }

    async fn index_notes(&self) -> Value {
        match self.run_index().await {
            Ok(report) => text_payload(&report.render(), false),
            Err(error) => text_payload(
                &format!("Indexing failed: {error}. No notes were indexed."),
                true,
            ),
        }
    }

    async fn search_notes(&self, query: &str, limit: Option<usize>) -> Value {
        let hits = self.run_search(query, limit).await;
        text_payload(&render_hits(query, &hits), false)
    }
}

pub fn render_hits(query: &str, hits: &[SearchHit]) -> String {
    if hits.is_empty() {
        return format!("No notes matched '{query}'.");
    }

    let mut rendered = format!("{} result(s) for '{query}':", hits.len());
    for (position, hit) in hits.iter().enumerate() {
        rendered.push_str(&format!("\n\n{}. {}\n{}", position + 1, hit.title, hit.content));
    }
    rendered
}

fn parse_arguments<T: DeserializeOwned>(arguments: Value) -> Result<T, (i64, String)> {
    serde_json::from_value(arguments)
        .map_err(|error| (INVALID_PARAMS, format!("invalid arguments: {error}")))
}

fn text_payload(text: &str, is_error: bool) -> Value {
    json!({
        "content": [{ "type": "text", "text": text }],
        "isError": is_error,
    })
}

fn initialize_result() -> Value {
    json!({
        "protocolVersion": PROTOCOL_VERSION,
        "capabilities": { "tools": {} },
        "serverInfo": {
            "name": "notes-search-mcp",
            "version": env!("CARGO_PKG_VERSION"),
        },
    })
}

fn tool_listing() -> Value {
    json!({
        "tools": [
            {
                "name": "list-notes",
                "description": "List the titles of every note in Apple Notes.",
                "inputSchema": { "type": "object", "properties": {} }
            },
            {
                "name": "get-note",
                "description": "Fetch a single note by its exact title.",
                "inputSchema": {
                    "type": "object",
                    "properties": {
                        "title": { "type": "string", "description": "Exact note title" }
                    },
                    "required": ["title"]
                }
            },
            {
                "name": "create-note",
                "description": "Create a new note, optionally inside a folder (created when missing).",
                "inputSchema": {
                    "type": "object",
                    "properties": {
                        "title": { "type": "string" },
                        "content": { "type": "string" },
                        "folder": { "type": "string" }
                    },
                    "required": ["title", "content"]
                }
            },
            {
                "name": "index-notes",
                "description": "Rebuild the local search index from every note. Run this before searching.",
                "inputSchema": { "type": "object", "properties": {} }
            },
            {
                "name": "search-notes",
                "description": "Hybrid semantic and full-text search over the indexed notes.",
                "inputSchema": {
                    "type": "object",
                    "properties": {
                        "query": { "type": "string" },
                        "limit": { "type": "integer", "minimum": 1 }
                    },
                    "required": ["query"]
                }
            }
        ]
    })
}
