//! Listing shapes derived from parameter descriptors.

use serde_json::{json, Map, Value};

use capstan::ParamDescriptor;

use crate::types::PromptArgument;

/// Turns declared parameters into the schemas clients see in listings.
pub trait SchemaGenerator: Send + Sync {
    /// JSON schema for a tool's `inputSchema`.
    fn input_schema(&self, params: &[ParamDescriptor]) -> Value;

    /// Argument list for a prompt definition.
    fn prompt_arguments(&self, params: &[ParamDescriptor]) -> Vec<PromptArgument> {
        let mut ordered: Vec<&ParamDescriptor> = params.iter().collect();
        ordered.sort_by_key(|p| p.position);
        ordered
            .into_iter()
            .map(|p| PromptArgument {
                name: p.name.clone(),
                description: p.description.clone(),
                required: p.required,
            })
            .collect()
    }
}

/// Plain JSON-schema object built straight from the descriptors.
#[derive(Debug, Default, Clone, Copy)]
pub struct ParamSchemaGenerator;

impl SchemaGenerator for ParamSchemaGenerator {
    fn input_schema(&self, params: &[ParamDescriptor]) -> Value {
        let mut ordered: Vec<&ParamDescriptor> = params.iter().collect();
        ordered.sort_by_key(|p| p.position);

        let mut properties = Map::new();
        let mut required = Vec::new();
        for param in ordered {
            let mut property = Map::new();
            if let Some(ty) = param.param_type.schema_type() {
                property.insert("type".to_string(), json!(ty));
            }
            if let Some(description) = &param.description {
                property.insert("description".to_string(), json!(description));
            }
            if !param.suggestions.is_empty() {
                let examples: Vec<&str> =
                    param.suggestions.iter().map(|c| c.value.as_str()).collect();
                property.insert("examples".to_string(), json!(examples));
            }
            properties.insert(param.name.clone(), Value::Object(property));
            if param.required {
                required.push(param.name.clone());
            }
        }

        let mut schema = json!({
            "type": "object",
            "properties": properties,
        });
        if !required.is_empty() {
            schema["required"] = json!(required);
        }
        schema
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use capstan::{Descriptor, ParamType};

    #[test]
    fn test_input_schema() {
        let tool = Descriptor::tool("add")
            .param(ParamDescriptor::new("a", ParamType::Number).required())
            .param(ParamDescriptor::new("b", ParamType::Number).describe("second addend"))
            .param(ParamDescriptor::new("extra", ParamType::Any));
        let schema = ParamSchemaGenerator.input_schema(&tool.params);
        assert_eq!(
            schema,
            json!({
                "type": "object",
                "properties": {
                    "a": { "type": "number" },
                    "b": { "type": "number", "description": "second addend" },
                    "extra": {}
                },
                "required": ["a"]
            })
        );
    }

    #[test]
    fn test_prompt_arguments_follow_position() {
        let prompt = Descriptor::prompt("summarize")
            .param(ParamDescriptor::new("text", ParamType::String).required())
            .param(ParamDescriptor::new("style", ParamType::String));
        let args = ParamSchemaGenerator.prompt_arguments(&prompt.params);
        assert_eq!(args.len(), 2);
        assert_eq!(args[0].name, "text");
        assert!(args[0].required);
        assert!(!args[1].required);
    }
}
