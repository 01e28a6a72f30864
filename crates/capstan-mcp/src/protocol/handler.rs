//! Main request dispatcher — receives JSON-RPC messages, routes to handlers.

use std::sync::Arc;
use tokio::sync::Mutex;

use serde::de::DeserializeOwned;
use serde_json::{json, Value};

use capstan::{
    bind, coerce_template_params, complete, merge_arguments, paginate, remaining_arguments,
    validate, Arguments, CapabilityKind, CompletionCandidate, Descriptor, HandlerArity,
    SubscriptionManager, TemplateParams,
};

use crate::config::ServerConfig;
use crate::notify::NotificationManager;
use crate::registry::{
    CapabilityRegistry, HandlerContext, HandlerInput, MetadataProvider, Registration, Resolved,
};
use crate::types::*;

use super::invoke::{invoke, run_completer};
use super::negotiation::{server_capabilities, NegotiatedCapabilities};
use super::schema::{ParamSchemaGenerator, SchemaGenerator};
use super::validator::{validate_request, validate_uri};

/// The main protocol handler that dispatches incoming JSON-RPC messages.
///
/// Locks are held only around registry and subscription bookkeeping, never
/// across a handler invocation.
pub struct ProtocolHandler {
    registry: Arc<Mutex<CapabilityRegistry>>,
    subscriptions: Arc<Mutex<SubscriptionManager>>,
    notifications: Arc<NotificationManager>,
    capabilities: Arc<Mutex<NegotiatedCapabilities>>,
    schema: Arc<dyn SchemaGenerator>,
    config: ServerConfig,
    client_id: String,
}

impl ProtocolHandler {
    pub fn new(provider: &dyn MetadataProvider, config: ServerConfig) -> McpResult<Self> {
        let registry = CapabilityRegistry::from_provider(provider)?;
        let subscriptions = Arc::new(Mutex::new(SubscriptionManager::new()));
        let notifications = Arc::new(NotificationManager::new(subscriptions.clone()));

        Ok(Self {
            registry: Arc::new(Mutex::new(registry)),
            subscriptions,
            notifications,
            capabilities: Arc::new(Mutex::new(NegotiatedCapabilities::default())),
            schema: Arc::new(ParamSchemaGenerator),
            config,
            client_id: uuid::Uuid::new_v4().to_string(),
        })
    }

    /// Replace the schema generator used for listings.
    pub fn with_schema_generator(mut self, schema: Arc<dyn SchemaGenerator>) -> Self {
        self.schema = schema;
        self
    }

    /// Identifier of the client this handler serves.
    pub fn client_id(&self) -> &str {
        &self.client_id
    }

    pub fn config(&self) -> &ServerConfig {
        &self.config
    }

    pub fn notifications(&self) -> Arc<NotificationManager> {
        self.notifications.clone()
    }

    pub fn subscriptions(&self) -> Arc<Mutex<SubscriptionManager>> {
        self.subscriptions.clone()
    }

    pub async fn handle_message(&self, msg: JsonRpcMessage) -> Option<Value> {
        match msg {
            JsonRpcMessage::Request(req) => Some(self.handle_request(req).await),
            JsonRpcMessage::Notification(notif) => {
                self.handle_notification(notif).await;
                None
            }
            _ => {
                tracing::warn!("Received unexpected message type from client");
                None
            }
        }
    }

    async fn handle_request(&self, request: JsonRpcRequest) -> Value {
        if let Err(e) = validate_request(&request) {
            return serde_json::to_value(e.to_json_rpc_error(request.id)).unwrap_or_default();
        }

        let id = request.id.clone();
        tracing::debug!("Dispatching {} (id {id})", request.method);
        let result = self.dispatch_request(&request).await;

        match result {
            Ok(value) => serde_json::to_value(JsonRpcResponse::new(id, value)).unwrap_or_default(),
            Err(e) => {
                tracing::debug!("{} failed: {e}", request.method);
                serde_json::to_value(e.to_json_rpc_error(id)).unwrap_or_default()
            }
        }
    }

    async fn dispatch_request(&self, request: &JsonRpcRequest) -> McpResult<Value> {
        match request.method.as_str() {
            "initialize" => self.handle_initialize(request.params.clone()).await,

            "tools/list" => self.handle_tools_list(request.params.clone()).await,
            "tools/call" => self.handle_tools_call(request.params.clone()).await,

            "resources/list" => self.handle_resources_list(request.params.clone()).await,
            "resources/templates/list" => {
                self.handle_resource_templates_list(request.params.clone())
                    .await
            }
            "resources/read" => self.handle_resources_read(request.params.clone()).await,
            "resources/subscribe" => self.handle_subscribe(request.params.clone()).await,
            "resources/unsubscribe" => self.handle_unsubscribe(request.params.clone()).await,

            "prompts/list" => self.handle_prompts_list(request.params.clone()).await,
            "prompts/get" => self.handle_prompts_get(request.params.clone()).await,

            "completion/complete" => self.handle_complete(request.params.clone()).await,

            "ping" => Ok(Value::Object(serde_json::Map::new())),

            _ => Err(McpError::MethodNotFound(request.method.clone())),
        }
    }

    async fn handle_notification(&self, notification: JsonRpcNotification) {
        match notification.method.as_str() {
            "initialized" | "notifications/initialized" => {
                let mut caps = self.capabilities.lock().await;
                if let Err(e) = caps.mark_initialized() {
                    tracing::error!("Failed to mark initialized: {e}");
                }
            }
            "notifications/cancelled" | "$/cancelRequest" => {
                let request = notification
                    .params
                    .map(serde_json::from_value::<CancelRequestParams>)
                    .and_then(Result::ok)
                    .map(|p| p.request_id.to_string())
                    .unwrap_or_else(|| "unknown".to_string());
                tracing::info!("Cancellation requested for {request}; requests run to completion");
            }
            _ => {
                tracing::debug!("Unknown notification: {}", notification.method);
            }
        }
    }

    async fn handle_initialize(&self, params: Option<Value>) -> McpResult<Value> {
        let init_params: InitializeParams = required_params(params, "Initialize")?;

        let capabilities = {
            let mut registry = self.registry.lock().await;
            for kind in CapabilityKind::ALL {
                registry.ensure_initialized(kind);
            }
            server_capabilities(&registry)
        };

        let mut caps = self.capabilities.lock().await;
        let result = caps.negotiate(init_params, capabilities, &self.config)?;

        to_result(result)
    }

    async fn handle_tools_list(&self, params: Option<Value>) -> McpResult<Value> {
        let list_params: ListParams = optional_params(params)?;
        let tools = self.listing(&[CapabilityKind::Tool]).await;

        let definitions = tools
            .into_iter()
            .map(|d| ToolDefinition {
                input_schema: self.schema.input_schema(&d.params),
                name: d.key,
                description: d.description,
            })
            .collect();

        let page = paginate(
            definitions,
            list_params.cursor.as_deref(),
            self.config.page_size,
        );
        to_result(ToolListResult {
            tools: page.items,
            next_cursor: page.next_cursor,
        })
    }

    async fn handle_tools_call(&self, params: Option<Value>) -> McpResult<Value> {
        let call_params: ToolCallParams = required_params(params, "Tool call")?;

        let resolved = {
            let mut registry = self.registry.lock().await;
            registry.ensure_initialized(CapabilityKind::Tool);
            registry.resolve(CapabilityKind::Tool, &call_params.name)
        }
        .ok_or_else(|| McpError::ToolNotFound(call_params.name.clone()))?;

        let value = self
            .run(resolved, call_params.arguments.unwrap_or_default())
            .await?;

        tool_result(value)
    }

    async fn handle_resources_list(&self, params: Option<Value>) -> McpResult<Value> {
        let list_params: ListParams = optional_params(params)?;
        let resources = self.listing(&[CapabilityKind::Resource]).await;

        let definitions = resources
            .into_iter()
            .map(|d| ResourceDefinition {
                uri: d.key,
                name: d.name,
                description: d.description,
                mime_type: d.mime_type,
            })
            .collect();

        let page = paginate(
            definitions,
            list_params.cursor.as_deref(),
            self.config.page_size,
        );
        to_result(ResourceListResult {
            resources: page.items,
            next_cursor: page.next_cursor,
        })
    }

    async fn handle_resource_templates_list(&self, params: Option<Value>) -> McpResult<Value> {
        let list_params: ListParams = optional_params(params)?;
        let templates = self.listing(&[CapabilityKind::ResourceTemplate]).await;

        let definitions = templates
            .into_iter()
            .map(|d| ResourceTemplateDefinition {
                uri_template: d.key,
                name: d.name,
                description: d.description,
                mime_type: d.mime_type,
            })
            .collect();

        let page = paginate(
            definitions,
            list_params.cursor.as_deref(),
            self.config.page_size,
        );
        to_result(ResourceTemplateListResult {
            resource_templates: page.items,
            next_cursor: page.next_cursor,
        })
    }

    async fn handle_resources_read(&self, params: Option<Value>) -> McpResult<Value> {
        let read_params: ResourceReadParams = required_params(params, "Resource read")?;
        validate_uri(&read_params.uri)?;

        let resolved = self
            .resolve_resource(&read_params.uri)
            .await
            .ok_or_else(|| McpError::ResourceNotFound(read_params.uri.clone()))?;
        let mime_type = resolved.descriptor.mime_type.clone();

        let value = self.run(resolved, Arguments::new()).await?;

        read_result(&read_params.uri, mime_type, value)
    }

    async fn handle_subscribe(&self, params: Option<Value>) -> McpResult<Value> {
        let sub_params: ResourceSubscribeParams = required_params(params, "Subscribe")?;
        validate_uri(&sub_params.uri)?;

        let resolved = self
            .resolve_resource(&sub_params.uri)
            .await
            .ok_or_else(|| McpError::ResourceNotFound(sub_params.uri.clone()))?;
        if !resolved.descriptor.subscribable {
            return Err(McpError::InvalidRequest(format!(
                "Resource does not support subscriptions: {}",
                sub_params.uri
            )));
        }

        let client = sub_params
            .client_id
            .unwrap_or_else(|| self.client_id.clone());
        let added = self
            .subscriptions
            .lock()
            .await
            .subscribe(&client, &sub_params.uri)?;
        if added {
            tracing::debug!("{client} subscribed to {}", sub_params.uri);
        }

        Ok(json!({}))
    }

    async fn handle_unsubscribe(&self, params: Option<Value>) -> McpResult<Value> {
        let sub_params: ResourceSubscribeParams = required_params(params, "Unsubscribe")?;
        validate_uri(&sub_params.uri)?;

        let client = sub_params
            .client_id
            .unwrap_or_else(|| self.client_id.clone());
        let removed = self
            .subscriptions
            .lock()
            .await
            .unsubscribe(&client, &sub_params.uri)?;
        if removed {
            tracing::debug!("{client} unsubscribed from {}", sub_params.uri);
        }

        Ok(json!({}))
    }

    async fn handle_prompts_list(&self, params: Option<Value>) -> McpResult<Value> {
        let list_params: ListParams = optional_params(params)?;
        let prompts = self
            .listing(&[CapabilityKind::Prompt, CapabilityKind::PromptTemplate])
            .await;

        let definitions = prompts
            .into_iter()
            .map(|d| {
                let arguments = self.schema.prompt_arguments(&d.params);
                PromptDefinition {
                    name: d.key,
                    description: d.description,
                    arguments: (!arguments.is_empty()).then_some(arguments),
                }
            })
            .collect();

        let page = paginate(
            definitions,
            list_params.cursor.as_deref(),
            self.config.page_size,
        );
        to_result(PromptListResult {
            prompts: page.items,
            next_cursor: page.next_cursor,
        })
    }

    async fn handle_prompts_get(&self, params: Option<Value>) -> McpResult<Value> {
        let get_params: PromptGetParams = required_params(params, "Prompt get")?;

        let resolved = {
            let mut registry = self.registry.lock().await;
            registry.ensure_initialized(CapabilityKind::Prompt);
            registry.ensure_initialized(CapabilityKind::PromptTemplate);
            registry.resolve_prompt(&get_params.name)
        }
        .ok_or_else(|| McpError::PromptNotFound(get_params.name.clone()))?;
        let description = resolved.descriptor.description.clone();

        let value = self
            .run(resolved, get_params.arguments.unwrap_or_default())
            .await?;

        prompt_result(description, value)
    }

    async fn handle_complete(&self, params: Option<Value>) -> McpResult<Value> {
        let params =
            params.ok_or_else(|| McpError::InvalidParams("Completion params required".to_string()))?;

        let reference: CompletionReference = params
            .get("ref")
            .cloned()
            .ok_or_else(|| McpError::InvalidRequest("Missing completion reference".to_string()))
            .and_then(|r| {
                serde_json::from_value(r).map_err(|e| {
                    McpError::InvalidRequest(format!("Invalid completion reference: {e}"))
                })
            })?;
        let argument: CompletionArgument = params
            .get("argument")
            .cloned()
            .ok_or_else(|| McpError::InvalidParams("Missing completion argument".to_string()))
            .and_then(|a| {
                serde_json::from_value(a).map_err(|e| McpError::InvalidParams(e.to_string()))
            })?;

        let (descriptor, completer) = {
            let mut registry = self.registry.lock().await;
            let target = match &reference {
                CompletionReference::Prompt { name } => {
                    registry.ensure_initialized(CapabilityKind::Prompt);
                    registry.ensure_initialized(CapabilityKind::PromptTemplate);
                    registry
                        .resolve(CapabilityKind::PromptTemplate, name)
                        .or_else(|| registry.resolve_prompt(name))
                        .ok_or_else(|| McpError::PromptNotFound(name.clone()))?
                }
                CompletionReference::Resource { uri } => {
                    registry.ensure_initialized(CapabilityKind::Resource);
                    registry.ensure_initialized(CapabilityKind::ResourceTemplate);
                    registry
                        .resolve(CapabilityKind::ResourceTemplate, uri)
                        .or_else(|| registry.resolve_resource(uri))
                        .ok_or_else(|| McpError::ResourceNotFound(uri.clone()))?
                }
            };
            let completer = registry.completer(
                target.descriptor.kind,
                &target.descriptor.key,
                &argument.name,
            );
            (target.descriptor, completer)
        };

        let mut candidates: Vec<CompletionCandidate> = descriptor
            .find_param(&argument.name)
            .map(|p| p.suggestions.clone())
            .unwrap_or_default();
        if let Some(completer) = completer {
            for candidate in run_completer(completer, &argument.value).await? {
                if !candidates.iter().any(|c| c.value == candidate.value) {
                    candidates.push(candidate);
                }
            }
        }

        to_result(CompleteResult::from(complete(&candidates, &argument.value)))
    }

    /// Add a dynamic capability and announce the changed listing.
    pub async fn register(&self, registration: Registration) -> McpResult<()> {
        let kind = registration.kind();
        {
            let mut registry = self.registry.lock().await;
            registry.ensure_initialized(kind);
            registry.register(registration)?;
        }
        self.notifications
            .notify_list_changed(ListKind::from(kind))
            .await;
        Ok(())
    }

    /// Remove a dynamic capability.
    ///
    /// Removing a resource drops every subscription to its URI. Removing a
    /// resource template drops subscriptions to URIs that no longer resolve.
    pub async fn unregister(&self, kind: CapabilityKind, key: &str) -> McpResult<Descriptor> {
        let descriptor = {
            let mut registry = self.registry.lock().await;
            registry.ensure_initialized(kind);
            registry.unregister(kind, key)?
        };

        match kind {
            CapabilityKind::Resource => self.drop_subscriptions(&[key.to_string()]).await,
            CapabilityKind::ResourceTemplate => {
                let subscribed = self.subscriptions.lock().await.uris();
                let orphaned: Vec<String> = {
                    let registry = self.registry.lock().await;
                    subscribed
                        .into_iter()
                        .filter(|uri| registry.resolve_resource(uri).is_none())
                        .collect()
                };
                self.drop_subscriptions(&orphaned).await;
            }
            _ => {}
        }

        self.notifications
            .notify_list_changed(ListKind::from(kind))
            .await;
        Ok(descriptor)
    }

    /// Unsubscribe every client from each URI, best-effort.
    async fn drop_subscriptions(&self, uris: &[String]) {
        let mut subscriptions = self.subscriptions.lock().await;
        for uri in uris {
            for client in subscriptions.subscribers(uri) {
                if let Err(e) = subscriptions.unsubscribe(&client, uri) {
                    tracing::warn!("Failed to unsubscribe {client} from {uri}: {e}");
                }
            }
        }
    }

    /// Tell subscribers of `uri` that its content changed.
    pub async fn notify_resource_changed(&self, uri: &str) -> usize {
        self.notifications.notify_resource_update(uri).await
    }

    /// Drop everything this handler's client subscribed to.
    pub async fn disconnect(&self) -> usize {
        let removed = self
            .subscriptions
            .lock()
            .await
            .clear_client(&self.client_id);
        tracing::debug!("Client {} disconnected, {removed} subscriptions cleared", self.client_id);
        removed
    }

    async fn listing(&self, kinds: &[CapabilityKind]) -> Vec<Descriptor> {
        let mut registry = self.registry.lock().await;
        let mut descriptors = Vec::new();
        for &kind in kinds {
            registry.ensure_initialized(kind);
            descriptors.extend(registry.list(kind));
        }
        descriptors
    }

    async fn resolve_resource(&self, uri: &str) -> Option<Resolved> {
        let mut registry = self.registry.lock().await;
        registry.ensure_initialized(CapabilityKind::Resource);
        registry.ensure_initialized(CapabilityKind::ResourceTemplate);
        registry.resolve_resource(uri)
    }

    /// Validate, bind and invoke a resolved capability.
    async fn run(&self, resolved: Resolved, explicit: Arguments) -> McpResult<Value> {
        let Resolved {
            descriptor,
            handler,
            template_params,
        } = resolved;

        let input = self.prepare_input(&descriptor, template_params.as_ref(), explicit)?;
        tracing::debug!("Invoking {} {}", descriptor.kind, descriptor.key);
        invoke(handler, input).await.into_result()
    }

    fn prepare_input(
        &self,
        descriptor: &Descriptor,
        template_params: Option<&TemplateParams>,
        explicit: Arguments,
    ) -> McpResult<HandlerInput> {
        let template_args = template_params
            .map(|p| coerce_template_params(&descriptor.params, p))
            .unwrap_or_default();
        let merged = merge_arguments(&template_args, &explicit);

        validate(&descriptor.params, &merged)?;
        let positional = bind(&descriptor.params, &merged);
        let context = HandlerContext::new(self.client_id.clone(), self.notifications.clone());

        let input = match descriptor.arity {
            HandlerArity::Split if template_params.is_some() => HandlerInput {
                arguments: remaining_arguments(&template_args, &explicit),
                template_params: Some(template_args),
                positional,
                context,
            },
            _ => HandlerInput {
                arguments: merged,
                template_params: None,
                positional,
                context,
            },
        };
        Ok(input)
    }
}

fn required_params<T: DeserializeOwned>(params: Option<Value>, what: &str) -> McpResult<T> {
    params
        .map(serde_json::from_value)
        .transpose()
        .map_err(|e| McpError::InvalidParams(e.to_string()))?
        .ok_or_else(|| McpError::InvalidParams(format!("{what} params required")))
}

fn optional_params<T: DeserializeOwned + Default>(params: Option<Value>) -> McpResult<T> {
    match params {
        None | Some(Value::Null) => Ok(T::default()),
        Some(value) => {
            serde_json::from_value(value).map_err(|e| McpError::InvalidParams(e.to_string()))
        }
    }
}

fn to_result(value: impl serde::Serialize) -> McpResult<Value> {
    serde_json::to_value(value).map_err(|e| McpError::InternalError(e.to_string()))
}

/// Pass `{content: [...]}` through; wrap anything else as text content.
fn tool_result(value: Value) -> McpResult<Value> {
    if value.get("content").is_some() {
        let result = serde_json::from_value::<ToolCallResult>(value)
            .map_err(|e| McpError::InternalError(format!("Malformed tool content: {e}")))?;
        return to_result(result);
    }
    match value {
        Value::String(text) => to_result(ToolCallResult::text(text)),
        other => to_result(ToolCallResult::json(&other)),
    }
}

/// Build a read result whose content carries the requested URI.
fn read_result(uri: &str, mime_type: Option<String>, value: Value) -> McpResult<Value> {
    let result = match value {
        Value::Object(mut obj) if obj.contains_key("contents") => {
            if let Some(Value::Array(items)) = obj.get_mut("contents") {
                for item in items.iter_mut().filter_map(Value::as_object_mut) {
                    item.entry("uri").or_insert_with(|| json!(uri));
                }
            }
            serde_json::from_value::<ReadResourceResult>(Value::Object(obj)).map_err(|e| {
                McpError::InternalError(format!("Malformed resource contents: {e}"))
            })?
        }
        Value::String(text) => ReadResourceResult {
            contents: vec![ResourceContent {
                uri: uri.to_string(),
                mime_type: mime_type.or_else(|| Some("text/plain".to_string())),
                text: Some(text),
                blob: None,
            }],
        },
        other => ReadResourceResult {
            contents: vec![ResourceContent {
                uri: uri.to_string(),
                mime_type: mime_type.or_else(|| Some("application/json".to_string())),
                text: Some(
                    serde_json::to_string_pretty(&other)
                        .map_err(|e| McpError::InternalError(e.to_string()))?,
                ),
                blob: None,
            }],
        },
    };
    to_result(result)
}

/// Pass `{messages: [...]}` through; wrap anything else as one user message.
fn prompt_result(description: Option<String>, value: Value) -> McpResult<Value> {
    if value.get("messages").is_some() {
        let result = serde_json::from_value::<PromptGetResult>(value)
            .map_err(|e| McpError::InternalError(format!("Malformed prompt messages: {e}")))?;
        return to_result(result);
    }
    let result = match value {
        Value::String(text) => PromptGetResult {
            description,
            messages: vec![PromptMessage::user(text)],
        },
        other => PromptGetResult {
            description,
            messages: vec![PromptMessage::user(
                serde_json::to_string_pretty(&other)
                    .map_err(|e| McpError::InternalError(e.to_string()))?,
            )],
        },
    };
    to_result(result)
}
