//! Static server information resource and the basic tools.

use chrono::{DateTime, Utc};
use serde_json::{json, Value};

use capstan::{Descriptor, ParamDescriptor, ParamType};

use crate::registry::{handler_fn, HandlerInput, Registration};

pub const SERVER_INFO_URI: &str = "capstan://server/info";

pub fn server_info(name: String, version: String, started_at: DateTime<Utc>) -> Registration {
    Registration::new(
        Descriptor::resource(SERVER_INFO_URI)
            .named("server-info")
            .describe("Server name, version and uptime")
            .mime("application/json"),
        handler_fn(move |_| {
            let name = name.clone();
            let version = version.clone();
            async move {
                let now = Utc::now();
                Ok(json!({
                    "name": name,
                    "version": version,
                    "startedAt": started_at.to_rfc3339(),
                    "uptimeSeconds": (now - started_at).num_seconds(),
                }))
            }
        }),
    )
}

pub fn echo_tool() -> Registration {
    Registration::new(
        Descriptor::tool("echo")
            .describe("Return the message unchanged")
            .param(ParamDescriptor::new("message", ParamType::String).required()),
        handler_fn(|input: HandlerInput| async move {
            Ok(Value::String(
                input.str("message").unwrap_or_default().to_string(),
            ))
        }),
    )
}

pub fn add_tool() -> Registration {
    Registration::new(
        Descriptor::tool("add")
            .describe("Add two numbers")
            .param(ParamDescriptor::new("a", ParamType::Number).required())
            .param(ParamDescriptor::new("b", ParamType::Number).required()),
        handler_fn(|input: HandlerInput| async move {
            let a = input.f64("a").unwrap_or_default();
            let b = input.f64("b").unwrap_or_default();
            Ok(json!({ "sum": a + b }))
        }),
    )
}
