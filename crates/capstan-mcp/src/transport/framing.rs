//! Message framing for newline-delimited JSON.

use serde_json::Value;

use crate::types::{JsonRpcError, JsonRpcMessage, McpError, McpResult, RequestId};

/// Parse a single line of text as a JSON-RPC message.
pub fn parse_message(line: &str) -> McpResult<JsonRpcMessage> {
    let trimmed = line.trim();
    if trimmed.is_empty() {
        return Err(McpError::ParseError("Empty message".to_string()));
    }

    serde_json::from_str(trimmed).map_err(|e| McpError::ParseError(e.to_string()))
}

/// Serialize a value to a JSON line (with trailing newline).
pub fn frame_message(value: &Value) -> McpResult<String> {
    let mut json = serde_json::to_string(value).map_err(McpError::Json)?;
    json.push('\n');
    Ok(json)
}

/// Error response for a line that could not be parsed; its id is unknown.
pub fn parse_error_response(error: &McpError) -> McpResult<Value> {
    let response: JsonRpcError = error.to_json_rpc_error(RequestId::Null);
    serde_json::to_value(response).map_err(|e| McpError::InternalError(e.to_string()))
}
