//! Error types and JSON-RPC error codes for the MCP server.

use serde_json::Value;

use capstan::{CapabilityKind, CapstanError, ValidationErrors};

use super::message::{JsonRpcError, JsonRpcErrorObject, RequestId, JSONRPC_VERSION};

/// Standard JSON-RPC 2.0 error codes.
pub mod error_codes {
    pub const PARSE_ERROR: i32 = -32700;
    pub const INVALID_REQUEST: i32 = -32600;
    pub const METHOD_NOT_FOUND: i32 = -32601;
    pub const INVALID_PARAMS: i32 = -32602;
    pub const INTERNAL_ERROR: i32 = -32603;
}

/// MCP-specific error codes.
pub mod mcp_error_codes {
    /// Resource URI did not resolve to any resource or template.
    pub const RESOURCE_NOT_FOUND: i32 = -32002;
}

/// All errors that can occur in the MCP server.
#[derive(thiserror::Error, Debug)]
pub enum McpError {
    #[error("Parse error: {0}")]
    ParseError(String),

    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("Method not found: {0}")]
    MethodNotFound(String),

    #[error("Invalid params: {0}")]
    InvalidParams(String),

    #[error("Invalid params: {0}")]
    Validation(ValidationErrors),

    #[error("Internal error: {0}")]
    InternalError(String),

    #[error("Resource not found: {0}")]
    ResourceNotFound(String),

    #[error("Tool not found: {0}")]
    ToolNotFound(String),

    #[error("Prompt not found: {0}")]
    PromptNotFound(String),

    #[error("{kind} already registered: {key}")]
    AlreadyRegistered { kind: CapabilityKind, key: String },

    #[error("Transport error: {0}")]
    Transport(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl McpError {
    pub fn code(&self) -> i32 {
        use error_codes::*;
        use mcp_error_codes::*;
        match self {
            McpError::ParseError(_) | McpError::Json(_) => PARSE_ERROR,
            McpError::InvalidRequest(_) | McpError::AlreadyRegistered { .. } => INVALID_REQUEST,
            McpError::MethodNotFound(_)
            | McpError::ToolNotFound(_)
            | McpError::PromptNotFound(_) => METHOD_NOT_FOUND,
            McpError::InvalidParams(_) | McpError::Validation(_) => INVALID_PARAMS,
            McpError::InternalError(_) | McpError::Transport(_) | McpError::Io(_) => {
                INTERNAL_ERROR
            }
            McpError::ResourceNotFound(_) => RESOURCE_NOT_FOUND,
        }
    }

    /// Structured payload for the error's `data` field.
    pub fn data(&self) -> Option<Value> {
        match self {
            McpError::Validation(errors) => serde_json::to_value(errors).ok(),
            McpError::ResourceNotFound(uri) => Some(serde_json::json!({ "uri": uri })),
            _ => None,
        }
    }

    /// Not-found error for a capability kind.
    pub fn not_found(kind: CapabilityKind, key: &str) -> Self {
        match kind {
            CapabilityKind::Tool => McpError::ToolNotFound(key.to_string()),
            CapabilityKind::Resource | CapabilityKind::ResourceTemplate => {
                McpError::ResourceNotFound(key.to_string())
            }
            CapabilityKind::Prompt | CapabilityKind::PromptTemplate => {
                McpError::PromptNotFound(key.to_string())
            }
        }
    }

    pub fn to_json_rpc_error(&self, id: RequestId) -> JsonRpcError {
        JsonRpcError {
            jsonrpc: JSONRPC_VERSION.to_string(),
            id,
            error: JsonRpcErrorObject {
                code: self.code(),
                message: self.to_string(),
                data: self.data(),
            },
        }
    }
}

impl From<CapstanError> for McpError {
    fn from(e: CapstanError) -> Self {
        match e {
            CapstanError::InvalidTemplate { .. } => McpError::InternalError(e.to_string()),
            CapstanError::InvalidInput(message) => McpError::InvalidParams(message),
            CapstanError::Validation(errors) => McpError::Validation(errors),
        }
    }
}

impl From<ValidationErrors> for McpError {
    fn from(errors: ValidationErrors) -> Self {
        McpError::Validation(errors)
    }
}

pub type McpResult<T> = Result<T, McpError>;
