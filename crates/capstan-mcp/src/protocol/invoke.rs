//! The invocation boundary: every handler failure becomes an [`Outcome`].

use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use futures::FutureExt;

use capstan::CompletionCandidate;

use crate::registry::{CapabilityHandler, Completer, HandlerInput, Outcome};
use crate::types::{McpError, McpResult};

/// Run a handler to completion and normalize whatever it produced.
///
/// Errors, panics and `{"success": false}` wrappers all map to
/// [`Outcome::Failure`] carrying the original message.
pub async fn invoke(handler: Arc<dyn CapabilityHandler>, input: HandlerInput) -> Outcome {
    match AssertUnwindSafe(handler.call(input)).catch_unwind().await {
        Ok(Ok(value)) => Outcome::from_value(value),
        Ok(Err(e)) => Outcome::Failure(format!("{e:#}")),
        Err(panic) => {
            let msg = panic_message(panic.as_ref());
            tracing::error!("Handler panicked: {msg}");
            Outcome::Failure(format!("handler panicked: {msg}"))
        }
    }
}

/// Ask a completer for candidates, under the same failure boundary as handlers.
pub async fn run_completer(
    completer: Arc<dyn Completer>,
    partial: &str,
) -> McpResult<Vec<CompletionCandidate>> {
    match AssertUnwindSafe(completer.complete(partial)).catch_unwind().await {
        Ok(Ok(candidates)) => Ok(candidates),
        Ok(Err(e)) => Err(McpError::InternalError(format!("{e:#}"))),
        Err(panic) => {
            let msg = panic_message(panic.as_ref());
            tracing::error!("Completer panicked: {msg}");
            Err(McpError::InternalError(format!("completer panicked: {msg}")))
        }
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}
