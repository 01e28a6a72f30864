//! HTTP transport — JSON-RPC over POST /mcp, plus /health.
//!
//! Request/response only: no notification sender is installed, so
//! list-changed and resource-updated events are dropped.

use std::sync::Arc;

use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Json as AxumJson, Response},
    routing::{get, post},
    Router,
};
use serde_json::{json, Value};
use tower::ServiceBuilder;
use tower_http::cors::{Any, CorsLayer};

use crate::protocol::ProtocolHandler;
use crate::types::{JsonRpcMessage, McpError, McpResult};

/// HTTP transport for web-based MCP clients.
pub struct HttpTransport {
    handler: Arc<ProtocolHandler>,
}

impl HttpTransport {
    pub fn new(handler: ProtocolHandler) -> Self {
        Self {
            handler: Arc::new(handler),
        }
    }

    pub fn router(&self) -> Router {
        let cors = CorsLayer::new()
            .allow_origin(Any)
            .allow_methods(Any)
            .allow_headers(Any);

        Router::new()
            .route("/mcp", post(handle_request))
            .route("/health", get(handle_health))
            .layer(ServiceBuilder::new().layer(cors))
            .with_state(self.handler.clone())
    }

    /// Run the HTTP server on the given address.
    pub async fn run(&self, addr: &str) -> McpResult<()> {
        let listener = tokio::net::TcpListener::bind(addr)
            .await
            .map_err(McpError::Io)?;

        tracing::info!("HTTP transport listening on {addr}");

        axum::serve(listener, self.router())
            .await
            .map_err(|e| McpError::Transport(e.to_string()))?;

        Ok(())
    }
}

async fn handle_request(
    State(handler): State<Arc<ProtocolHandler>>,
    AxumJson(body): AxumJson<Value>,
) -> Response {
    let msg: JsonRpcMessage = match serde_json::from_value(body) {
        Ok(msg) => msg,
        Err(e) => {
            tracing::warn!("Parse error: {e}");
            return (
                StatusCode::BAD_REQUEST,
                AxumJson(json!({
                    "jsonrpc": "2.0",
                    "id": null,
                    "error": { "code": -32700, "message": "Parse error" }
                })),
            )
                .into_response();
        }
    };

    match handler.handle_message(msg).await {
        Some(response) => AxumJson(response).into_response(),
        None => StatusCode::ACCEPTED.into_response(),
    }
}

async fn handle_health(State(handler): State<Arc<ProtocolHandler>>) -> AxumJson<Value> {
    AxumJson(json!({
        "status": "ok",
        "name": handler.config().server_name,
        "version": handler.config().server_version,
    }))
}
