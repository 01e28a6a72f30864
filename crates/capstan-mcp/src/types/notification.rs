//! MCP notification types and method names.

use serde::{Deserialize, Serialize};

use capstan::CapabilityKind;

pub const TOOLS_LIST_CHANGED: &str = "notifications/tools/list_changed";
pub const RESOURCES_LIST_CHANGED: &str = "notifications/resources/list_changed";
pub const PROMPTS_LIST_CHANGED: &str = "notifications/prompts/list_changed";
pub const RESOURCE_UPDATED: &str = "notifications/resources/updated";

/// Which client-visible listing a change affects.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ListKind {
    Tools,
    Resources,
    Prompts,
}

impl ListKind {
    pub fn method(self) -> &'static str {
        match self {
            ListKind::Tools => TOOLS_LIST_CHANGED,
            ListKind::Resources => RESOURCES_LIST_CHANGED,
            ListKind::Prompts => PROMPTS_LIST_CHANGED,
        }
    }
}

impl From<CapabilityKind> for ListKind {
    fn from(kind: CapabilityKind) -> Self {
        match kind {
            CapabilityKind::Tool => ListKind::Tools,
            CapabilityKind::Resource | CapabilityKind::ResourceTemplate => ListKind::Resources,
            CapabilityKind::Prompt | CapabilityKind::PromptTemplate => ListKind::Prompts,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResourceUpdatedParams {
    pub uri: String,
}
