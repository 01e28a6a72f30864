//! MCP capability negotiation during initialization.

use capstan::CapabilityKind;

use crate::config::ServerConfig;
use crate::registry::CapabilityRegistry;
use crate::types::{
    ClientCapabilities, CompletionsCapability, Implementation, InitializeParams, InitializeResult,
    LoggingCapability, McpResult, PromptsCapability, ResourcesCapability, ServerCapabilities,
    ToolsCapability, MCP_VERSION,
};

/// Stored client capabilities after negotiation.
#[derive(Debug, Clone, Default)]
pub struct NegotiatedCapabilities {
    pub client: ClientCapabilities,
    pub client_info: Option<Implementation>,
    pub initialized: bool,
}

impl NegotiatedCapabilities {
    pub fn negotiate(
        &mut self,
        params: InitializeParams,
        capabilities: ServerCapabilities,
        config: &ServerConfig,
    ) -> McpResult<InitializeResult> {
        if params.protocol_version != MCP_VERSION {
            tracing::warn!(
                "Client requested protocol version {}, server supports {}. Proceeding with server version.",
                params.protocol_version,
                MCP_VERSION
            );
        }

        self.client = params.capabilities;

        tracing::info!(
            "Initialized with client: {} v{}",
            params.client_info.name,
            params.client_info.version
        );
        self.client_info = Some(params.client_info);

        Ok(InitializeResult {
            protocol_version: MCP_VERSION.to_string(),
            capabilities,
            server_info: Implementation {
                name: config.server_name.clone(),
                version: config.server_version.clone(),
            },
            instructions: config.instructions.clone(),
        })
    }

    pub fn mark_initialized(&mut self) -> McpResult<()> {
        self.initialized = true;
        tracing::info!("MCP handshake complete");
        Ok(())
    }
}

/// Capability summary for the registry's current contents.
///
/// A category is declared iff it has at least one entry, templates included.
/// `resources.subscribe` appears only when something is subscribable.
pub fn server_capabilities(registry: &CapabilityRegistry) -> ServerCapabilities {
    let tools = registry.count(CapabilityKind::Tool);
    let resources = registry.count(CapabilityKind::Resource)
        + registry.count(CapabilityKind::ResourceTemplate);
    let prompts =
        registry.count(CapabilityKind::Prompt) + registry.count(CapabilityKind::PromptTemplate);

    ServerCapabilities {
        logging: Some(LoggingCapability {}),
        completions: Some(CompletionsCapability {}),
        tools: (tools > 0).then_some(ToolsCapability { list_changed: true }),
        resources: (resources > 0).then(|| ResourcesCapability {
            subscribe: registry.has_subscribable_resource().then_some(true),
            list_changed: true,
        }),
        prompts: (prompts > 0).then_some(PromptsCapability { list_changed: true }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::{handler_fn, Registration};
    use capstan::Descriptor;
    use serde_json::{json, Value};

    fn noop(descriptor: Descriptor) -> Registration {
        Registration::new(descriptor, handler_fn(|_| async { Ok(Value::Null) }))
    }

    #[test]
    fn test_empty_registry_declares_only_ambient() {
        let caps = server_capabilities(&CapabilityRegistry::new());
        assert!(caps.tools.is_none());
        assert!(caps.resources.is_none());
        assert!(caps.prompts.is_none());
        assert!(caps.completions.is_some());
    }

    #[test]
    fn test_templates_count_toward_presence() {
        let mut registry = CapabilityRegistry::new();
        registry
            .register(noop(Descriptor::prompt_template("review-{language}")))
            .unwrap();
        let caps = server_capabilities(&registry);
        assert_eq!(caps.prompts, Some(PromptsCapability { list_changed: true }));
        assert!(caps.tools.is_none());
    }

    #[test]
    fn test_subscribe_only_when_subscribable() {
        let mut registry = CapabilityRegistry::new();
        registry.register(noop(Descriptor::resource("mem://a"))).unwrap();
        let value = serde_json::to_value(server_capabilities(&registry)).unwrap();
        assert_eq!(value["resources"], json!({"listChanged": true}));

        registry
            .register(noop(Descriptor::resource("mem://b").subscribable()))
            .unwrap();
        let value = serde_json::to_value(server_capabilities(&registry)).unwrap();
        assert_eq!(value["resources"], json!({"listChanged": true, "subscribe": true}));
    }
}
