//! Capstan MCP server — capability registry, request dispatch,
//! subscriptions, notifications, and completions over JSON-RPC.

pub mod catalog;
pub mod config;
pub mod notify;
pub mod protocol;
pub mod registry;
pub mod repl;
pub mod transport;
pub mod types;

pub use catalog::BuiltinCatalog;
pub use config::{resolve_page_size, ServerConfig};
pub use notify::{ChannelSender, NotificationManager, NotificationSender};
pub use protocol::ProtocolHandler;
pub use registry::{
    completer_fn, handler_fn, CapabilityGenerator, CapabilityHandler, CapabilityRegistry,
    MetadataProvider, Registration,
};
pub use transport::StdioTransport;
