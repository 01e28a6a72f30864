//! Demonstration prompts.

use serde_json::{json, Value};

use capstan::{CapabilityKind, CompletionCandidate, Descriptor, ParamDescriptor, ParamType};

use crate::registry::{completer_fn, handler_fn, CompleterRegistration, HandlerInput, Registration};

pub const REVIEW_TEMPLATE: &str = "review-{language}";

const LANGUAGES: [&str; 6] = ["rust", "go", "python", "typescript", "java", "c"];

pub fn summarize_prompt() -> Registration {
    Registration::new(
        Descriptor::prompt("summarize")
            .describe("Summarize a piece of text")
            .param(
                ParamDescriptor::new("text", ParamType::String)
                    .required()
                    .describe("Text to summarize"),
            )
            .param(
                ParamDescriptor::new("style", ParamType::String)
                    .describe("Summary style")
                    .suggest(["concise", "detailed", "bullet-points", "executive"]),
            ),
        handler_fn(|input: HandlerInput| async move {
            let text = input.str("text").unwrap_or_default();
            let style = input.str("style").unwrap_or("concise");
            Ok(Value::String(format!(
                "Write a {style} summary of the following text:\n\n{text}"
            )))
        }),
    )
}

pub fn review_prompt() -> Registration {
    Registration::new(
        Descriptor::prompt_template(REVIEW_TEMPLATE)
            .describe("Code review checklist for a language")
            .param(ParamDescriptor::new("language", ParamType::String).required())
            .param(ParamDescriptor::new("focus", ParamType::String).describe("Area to focus on"))
            .split_arguments(),
        handler_fn(|input: HandlerInput| async move {
            let language = input
                .template_params
                .as_ref()
                .and_then(|t| t.get("language"))
                .and_then(Value::as_str)
                .unwrap_or("code");
            let focus = input
                .arguments
                .get("focus")
                .and_then(Value::as_str)
                .unwrap_or("correctness and readability");
            Ok(json!({
                "description": format!("Review {language} code"),
                "messages": [{
                    "role": "user",
                    "content": {
                        "type": "text",
                        "text": format!(
                            "Review the following {language} code, focusing on {focus}. \
                             Point out bugs before style issues."
                        )
                    }
                }]
            }))
        }),
    )
}

pub fn language_completer() -> CompleterRegistration {
    CompleterRegistration {
        kind: CapabilityKind::PromptTemplate,
        key: REVIEW_TEMPLATE.to_string(),
        argument: "language".to_string(),
        completer: completer_fn(|_| async {
            Ok(LANGUAGES.iter().copied().map(CompletionCandidate::new).collect())
        }),
    }
}
