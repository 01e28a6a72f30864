//! JSON-RPC message validation.

use url::Url;

use crate::types::{JsonRpcRequest, McpError, McpResult, JSONRPC_VERSION};

/// Validate that a JSON-RPC request is well-formed.
pub fn validate_request(request: &JsonRpcRequest) -> McpResult<()> {
    if request.jsonrpc != JSONRPC_VERSION {
        return Err(McpError::InvalidRequest(format!(
            "Expected jsonrpc version \"{JSONRPC_VERSION}\", got \"{}\"",
            request.jsonrpc
        )));
    }

    if request.method.is_empty() {
        return Err(McpError::InvalidRequest(
            "Method name must not be empty".to_string(),
        ));
    }

    Ok(())
}

/// Reject empty or unparseable resource URIs.
pub fn validate_uri(uri: &str) -> McpResult<()> {
    if uri.trim().is_empty() {
        return Err(McpError::InvalidRequest("URI must not be empty".to_string()));
    }

    Url::parse(uri)
        .map(|_| ())
        .map_err(|e| McpError::InvalidRequest(format!("Invalid URI '{uri}': {e}")))
}
