//! Handler table entries and the invocation outcome.

use std::future::Future;
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{json, Value};

use capstan::{Arguments, CompletionCandidate};

use crate::notify::NotificationManager;
use crate::types::{McpError, McpResult};

/// Per-call context handed to a handler.
#[derive(Clone)]
pub struct HandlerContext {
    client_id: String,
    notifications: Arc<NotificationManager>,
}

impl HandlerContext {
    pub fn new(client_id: impl Into<String>, notifications: Arc<NotificationManager>) -> Self {
        Self {
            client_id: client_id.into(),
            notifications,
        }
    }

    /// Client on whose behalf the handler runs.
    pub fn client_id(&self) -> &str {
        &self.client_id
    }

    /// Signal that a resource's content changed. Returns how many
    /// subscribers were notified.
    pub async fn resource_changed(&self, uri: &str) -> usize {
        self.notifications.notify_resource_update(uri).await
    }
}

/// Arguments delivered to a handler.
///
/// For split-arity handlers `template_params` holds the values extracted from
/// the template and `arguments` only the remaining explicit arguments. For
/// merged handlers `template_params` is `None` and `arguments` holds both.
pub struct HandlerInput {
    pub arguments: Arguments,
    pub template_params: Option<Arguments>,
    /// Declared parameters in position order; absent ones are `None`.
    pub positional: Vec<Option<Value>>,
    pub context: HandlerContext,
}

impl HandlerInput {
    /// Look up an argument, template parameters first.
    pub fn get(&self, name: &str) -> Option<&Value> {
        self.template_params
            .as_ref()
            .and_then(|t| t.get(name))
            .or_else(|| self.arguments.get(name))
    }

    pub fn str(&self, name: &str) -> Option<&str> {
        self.get(name).and_then(Value::as_str)
    }

    pub fn f64(&self, name: &str) -> Option<f64> {
        self.get(name).and_then(Value::as_f64)
    }
}

/// The invocable half of a capability.
///
/// Handlers may return a plain value, or a success/failure wrapper built from
/// [`Outcome`]; an `Err` is reported to the client as an internal error.
#[async_trait]
pub trait CapabilityHandler: Send + Sync {
    async fn call(&self, input: HandlerInput) -> anyhow::Result<Value>;
}

struct FnHandler<F>(F);

#[async_trait]
impl<F, Fut> CapabilityHandler for FnHandler<F>
where
    F: Fn(HandlerInput) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = anyhow::Result<Value>> + Send + 'static,
{
    async fn call(&self, input: HandlerInput) -> anyhow::Result<Value> {
        (self.0)(input).await
    }
}

/// Wrap an async closure as a handler.
pub fn handler_fn<F, Fut>(f: F) -> Arc<dyn CapabilityHandler>
where
    F: Fn(HandlerInput) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = anyhow::Result<Value>> + Send + 'static,
{
    Arc::new(FnHandler(f))
}

/// Dynamic completion source for one argument of one capability.
#[async_trait]
pub trait Completer: Send + Sync {
    async fn complete(&self, partial: &str) -> anyhow::Result<Vec<CompletionCandidate>>;
}

struct FnCompleter<F>(F);

#[async_trait]
impl<F, Fut> Completer for FnCompleter<F>
where
    F: Fn(String) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = anyhow::Result<Vec<CompletionCandidate>>> + Send + 'static,
{
    async fn complete(&self, partial: &str) -> anyhow::Result<Vec<CompletionCandidate>> {
        (self.0)(partial.to_string()).await
    }
}

/// Wrap an async closure as a completer.
pub fn completer_fn<F, Fut>(f: F) -> Arc<dyn Completer>
where
    F: Fn(String) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = anyhow::Result<Vec<CompletionCandidate>>> + Send + 'static,
{
    Arc::new(FnCompleter(f))
}

/// Normalized result of one handler invocation.
#[derive(Debug, Clone, PartialEq)]
pub enum Outcome {
    Success(Value),
    Failure(String),
}

const WRAPPER_KEYS: [&str; 3] = ["success", "data", "error"];

impl Outcome {
    pub fn success(value: impl Into<Value>) -> Self {
        Outcome::Success(value.into())
    }

    pub fn failure(message: impl Into<String>) -> Self {
        Outcome::Failure(message.into())
    }

    /// Interpret a handler's return value, unwrapping a
    /// `{"success": bool, "data"?, "error"?}` wrapper if present.
    pub fn from_value(value: Value) -> Self {
        let mut obj = match value {
            Value::Object(obj)
                if obj.get("success").is_some_and(Value::is_boolean)
                    && obj.keys().all(|k| WRAPPER_KEYS.contains(&k.as_str())) =>
            {
                obj
            }
            other => return Outcome::Success(other),
        };
        if obj.get("success").and_then(Value::as_bool) == Some(true) {
            Outcome::Success(obj.remove("data").unwrap_or(Value::Null))
        } else {
            let message = match obj.remove("error") {
                Some(Value::String(s)) => s,
                Some(Value::Object(err)) => err
                    .get("message")
                    .and_then(Value::as_str)
                    .map(str::to_string)
                    .unwrap_or_else(|| Value::Object(err).to_string()),
                Some(Value::Null) | None => "handler reported failure".to_string(),
                Some(other) => other.to_string(),
            };
            Outcome::Failure(message)
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, Outcome::Success(_))
    }

    /// Failures become internal errors carrying the handler's message.
    pub fn into_result(self) -> McpResult<Value> {
        match self {
            Outcome::Success(value) => Ok(value),
            Outcome::Failure(message) => Err(McpError::InternalError(message)),
        }
    }
}

impl From<Outcome> for Value {
    fn from(outcome: Outcome) -> Self {
        match outcome {
            Outcome::Success(data) => json!({ "success": true, "data": data }),
            Outcome::Failure(error) => json!({ "success": false, "error": error }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plain_value_is_success() {
        assert_eq!(
            Outcome::from_value(json!({"rows": 3})),
            Outcome::Success(json!({"rows": 3}))
        );
        assert_eq!(Outcome::from_value(json!("hi")), Outcome::success("hi"));
    }

    #[test]
    fn test_wrappers_unwrap() {
        assert_eq!(
            Outcome::from_value(json!({"success": true, "data": [1, 2]})),
            Outcome::Success(json!([1, 2]))
        );
        assert_eq!(
            Outcome::from_value(json!({"success": false, "error": "quota exceeded"})),
            Outcome::failure("quota exceeded")
        );
        assert_eq!(
            Outcome::from_value(json!({"success": false, "error": {"message": "nope"}})),
            Outcome::failure("nope")
        );
    }

    #[test]
    fn test_success_field_alone_is_not_enough() {
        let value = json!({"success": true, "count": 4});
        assert_eq!(Outcome::from_value(value.clone()), Outcome::Success(value));
    }

    #[test]
    fn test_outcome_roundtrips_through_value() {
        let failure: Value = Outcome::failure("boom").into();
        assert_eq!(Outcome::from_value(failure), Outcome::failure("boom"));
        let success: Value = Outcome::success(json!({"ok": 1})).into();
        assert_eq!(Outcome::from_value(success), Outcome::success(json!({"ok": 1})));
    }

    #[test]
    fn test_failure_maps_to_internal_error() {
        let err = Outcome::failure("disk full").into_result().unwrap_err();
        assert_eq!(err.code(), crate::types::error_codes::INTERNAL_ERROR);
        assert!(err.to_string().contains("disk full"));
    }
}
