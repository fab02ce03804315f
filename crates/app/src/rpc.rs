use crate::tools::NotesService;
use notes_search_core::{ContentNormalizer, IndexStore, NoteSource};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};

pub const PARSE_ERROR: i64 = -32700;
pub const INVALID_REQUEST: i64 = -32600;
pub const METHOD_NOT_FOUND: i64 = -32601;
pub const INVALID_PARAMS: i64 = -32602;

#[derive(Debug, Deserialize)]
pub struct Request {
    #[serde(default)]
    pub id: Option<Value>,
    pub method: String,
    #[serde(default)]
    pub params: Value,
}

#[derive(Debug, Serialize)]
pub struct Response {
    pub jsonrpc: &'static str,
    pub id: Value,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<ErrorObject>,
}

#[derive(Debug, Serialize)]
pub struct ErrorObject {
    pub code: i64,
    pub message: String,
}

impl Response {
    pub fn success(id: Value, result: Value) -> Self {
        Self {
            jsonrpc: "2.0",
            id,
            result: Some(result),
            error: None,
        }
    }

    pub fn failure(id: Value, code: i64, message: impl Into<String>) -> Self {
        Self {
            jsonrpc: "2.0",
            id,
            result: None,
            error: Some(ErrorObject {
                code,
                message: message.into(),
            }),
        }
    }
}

pub async fn serve<N, S, C>(service: &NotesService<N, S, C>) -> anyhow::Result<()>
where
    N: NoteSource + Send + Sync,
    S: IndexStore + Send + Sync,
    C: ContentNormalizer,
{
    let stdin = BufReader::new(tokio::io::stdin());
    let mut lines = stdin.lines();
    let mut stdout = tokio::io::stdout();

    while let Some(line) = lines.next_line().await? {
        if line.trim().is_empty() {
            continue;
        }

        let response = match read_request(&line) {
            Ok(request) => match service.dispatch(request).await {
                Some(response) => response,
                None => continue,
            },
            Err(response) => response,
        };

        let mut payload = serde_json::to_string(&response)?;
        payload.push('\n');
        stdout.write_all(payload.as_bytes()).await?;
        stdout.flush().await?;
    }

    Ok(())
}

pub fn read_request(line: &str) -> Result<Request, Response> {
    let value: Value = serde_json::from_str(line).map_err(|error| {
        Response::failure(Value::Null, PARSE_ERROR, format!("parse error: {error}"))
    })?;

    let id = value.get("id").cloned().unwrap_or(Value::Null);
    serde_json::from_value(value).map_err(|error| {
        Response::failure(id, INVALID_REQUEST, format!("invalid request: {error}"))
    })
}

#[cfg(test)]
mod tests {
    use super::{read_request, Response, INVALID_REQUEST, PARSE_ERROR};
    use serde_json::{json, Value};

    #[test]
    fn requests_parse_with_and_without_ids() {
        let with_id = read_request(r#"{"jsonrpc":"2.0","id":7,"method":"ping"}"#).unwrap();
        assert_eq!(with_id.id, Some(json!(7)));
        assert_eq!(with_id.method, "ping");
        assert_eq!(with_id.params, Value::Null);

        let notification =
            read_request(r#"{"jsonrpc":"2.0","method":"notifications/initialized"}"#).unwrap();
        assert!(notification.id.is_none());
    }

    #[test]
    fn garbage_lines_answer_with_parse_error() {
        let response = read_request("not json at all").unwrap_err();
        let error = response.error.expect("error object");
        assert_eq!(error.code, PARSE_ERROR);
        assert_eq!(response.id, Value::Null);
    }

    #[test]
    fn shapeless_json_answers_with_invalid_request() {
        let response = read_request(r#"{"id":3,"no_method":true}"#).unwrap_err();
        let error = response.error.expect("error object");
        assert_eq!(error.code, INVALID_REQUEST);
        assert_eq!(response.id, json!(3));
    }

    #[test]
    fn success_responses_omit_the_error_field() {
        let response = Response::success(json!(1), json!({"ok": true}));
        let encoded = serde_json::to_string(&response).unwrap();
        assert!(encoded.contains(r#""jsonrpc":"2.0""#));
        assert!(encoded.contains(r#""result""#));
        assert!(!encoded.contains(r#""error""#));
    }
}
