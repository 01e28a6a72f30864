//! Core data types for capability descriptors and their parameters.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::binder::ValidationErrors;

/// The five kinds of capability a server can expose.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CapabilityKind {
    Tool,
    Resource,
    ResourceTemplate,
    Prompt,
    PromptTemplate,
}

impl CapabilityKind {
    pub const ALL: [CapabilityKind; 5] = [
        CapabilityKind::Tool,
        CapabilityKind::Resource,
        CapabilityKind::ResourceTemplate,
        CapabilityKind::Prompt,
        CapabilityKind::PromptTemplate,
    ];

    /// Whether keys of this kind are `{param}` templates.
    pub fn is_template(self) -> bool {
        matches!(
            self,
            CapabilityKind::ResourceTemplate | CapabilityKind::PromptTemplate
        )
    }

    pub fn as_str(self) -> &'static str {
        match self {
            CapabilityKind::Tool => "tool",
            CapabilityKind::Resource => "resource",
            CapabilityKind::ResourceTemplate => "resource template",
            CapabilityKind::Prompt => "prompt",
            CapabilityKind::PromptTemplate => "prompt template",
        }
    }
}

impl std::fmt::Display for CapabilityKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Semantic type tag for a parameter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ParamType {
    String,
    Number,
    Boolean,
    Array,
    Object,
    Any,
}

impl ParamType {
    /// JSON-schema `type` keyword for this tag, if it has one.
    pub fn schema_type(self) -> Option<&'static str> {
        match self {
            ParamType::String => Some("string"),
            ParamType::Number => Some("number"),
            ParamType::Boolean => Some("boolean"),
            ParamType::Array => Some("array"),
            ParamType::Object => Some("object"),
            ParamType::Any => None,
        }
    }
}

impl std::fmt::Display for ParamType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.schema_type().unwrap_or("any"))
    }
}

/// A single completion suggestion.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompletionCandidate {
    pub value: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

impl CompletionCandidate {
    pub fn new(value: impl Into<String>) -> Self {
        Self {
            value: value.into(),
            description: None,
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }
}

impl From<&str> for CompletionCandidate {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

/// Declared parameter of a tool, prompt, or template.
///
/// `position` orders positional binding; `name` is the lookup key into an
/// arguments object.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParamDescriptor {
    pub name: String,
    pub position: usize,
    #[serde(rename = "type")]
    pub param_type: ParamType,
    #[serde(default)]
    pub required: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Static completion candidates for this parameter.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub suggestions: Vec<CompletionCandidate>,
}

impl ParamDescriptor {
    /// An optional parameter. The position is assigned when it is attached to a descriptor.
    pub fn new(name: impl Into<String>, param_type: ParamType) -> Self {
        Self {
            name: name.into(),
            position: 0,
            param_type,
            required: false,
            description: None,
            suggestions: Vec::new(),
        }
    }

    pub fn required(mut self) -> Self {
        self.required = true;
        self
    }

    pub fn describe(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn suggest<I, C>(mut self, candidates: I) -> Self
    where
        I: IntoIterator<Item = C>,
        C: Into<CompletionCandidate>,
    {
        self.suggestions
            .extend(candidates.into_iter().map(Into::into));
        self
    }
}

/// How a handler wants its arguments delivered.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HandlerArity {
    /// One object: template parameters merged with explicit arguments.
    #[default]
    Merged,
    /// Two objects: template parameters, then the remaining explicit arguments.
    Split,
}

/// Registered metadata for a capability.
///
/// The key is the tool/prompt name, the resource URI, or the template string.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Descriptor {
    pub kind: CapabilityKind,
    pub key: String,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mime_type: Option<String>,
    #[serde(default)]
    pub params: Vec<ParamDescriptor>,
    #[serde(default)]
    pub subscribable: bool,
    #[serde(default)]
    pub arity: HandlerArity,
}

impl Descriptor {
    pub fn new(kind: CapabilityKind, key: impl Into<String>) -> Self {
        let key = key.into();
        Self {
            kind,
            name: key.clone(),
            key,
            description: None,
            mime_type: None,
            params: Vec::new(),
            subscribable: false,
            arity: HandlerArity::Merged,
        }
    }

    pub fn tool(name: impl Into<String>) -> Self {
        Self::new(CapabilityKind::Tool, name)
    }

    pub fn resource(uri: impl Into<String>) -> Self {
        Self::new(CapabilityKind::Resource, uri)
    }

    pub fn resource_template(uri_template: impl Into<String>) -> Self {
        Self::new(CapabilityKind::ResourceTemplate, uri_template)
    }

    pub fn prompt(name: impl Into<String>) -> Self {
        Self::new(CapabilityKind::Prompt, name)
    }

    pub fn prompt_template(name_template: impl Into<String>) -> Self {
        Self::new(CapabilityKind::PromptTemplate, name_template)
    }

    /// Human-readable display name (defaults to the key).
    pub fn named(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    pub fn describe(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn mime(mut self, mime_type: impl Into<String>) -> Self {
        self.mime_type = Some(mime_type.into());
        self
    }

    pub fn subscribable(mut self) -> Self {
        self.subscribable = true;
        self
    }

    pub fn split_arguments(mut self) -> Self {
        self.arity = HandlerArity::Split;
        self
    }

    /// Append a parameter at the next position.
    pub fn param(mut self, mut param: ParamDescriptor) -> Self {
        param.position = self.params.len();
        self.params.push(param);
        self
    }

    /// Look up a declared parameter by name.
    pub fn find_param(&self, name: &str) -> Option<&ParamDescriptor> {
        self.params.iter().find(|p| p.name == name)
    }
}

/// Errors raised by the capability library.
#[derive(thiserror::Error, Debug)]
pub enum CapstanError {
    #[error("Invalid template '{template}': {reason}")]
    InvalidTemplate { template: String, reason: String },

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("{0}")]
    Validation(#[from] ValidationErrors),
}

/// Convenience result type.
pub type CapstanResult<T> = Result<T, CapstanError>;

/// JSON type name of a value, for diagnostics.
pub fn json_type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
