//! MCP protocol handling — JSON-RPC dispatch.

pub mod handler;
pub mod invoke;
pub mod negotiation;
pub mod schema;
pub mod validator;

pub use handler::ProtocolHandler;
pub use schema::{ParamSchemaGenerator, SchemaGenerator};
