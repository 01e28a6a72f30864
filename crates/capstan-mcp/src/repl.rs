//! Interactive console for the Capstan MCP server.
//!
//! Launch with `capstan-mcp repl`. Every command goes through the same
//! dispatcher a client would reach, so responses are exactly what a client
//! would see. Type `/help` for available commands, Tab for completion.

use rustyline::completion::{Completer, Pair};
use rustyline::config::CompletionType;
use rustyline::error::ReadlineError;
use rustyline::highlight::Highlighter;
use rustyline::hint::Hinter;
use rustyline::validate::Validator;
use rustyline::{
    Cmd, ConditionalEventHandler, Config, Editor, Event, EventContext, EventHandler, Helper,
    KeyEvent, RepeatCount,
};
use serde_json::{json, Value};

use crate::protocol::ProtocolHandler;
use crate::types::{JsonRpcMessage, JsonRpcRequest, RequestId, MCP_VERSION};

/// Available REPL commands.
const COMMANDS: &[(&str, &str)] = &[
    ("/info", "Show negotiated server capabilities"),
    ("/tools", "List tools"),
    ("/resources", "List resources"),
    ("/templates", "List resource templates"),
    ("/prompts", "List prompts"),
    ("/call", "Call a tool: /call <name> [json-arguments]"),
    ("/read", "Read a resource: /read <uri>"),
    ("/prompt", "Render a prompt: /prompt <name> [json-arguments]"),
    (
        "/complete",
        "Complete an argument: /complete <prompt|resource> <name-or-uri> <argument> [partial]",
    ),
    ("/clear", "Clear the screen"),
    ("/help", "Show available commands"),
    ("/exit", "Quit the REPL"),
];

/// REPL helper for tab completion.
#[derive(Default)]
struct ConsoleHelper {
    tools: Vec<String>,
}

impl Completer for ConsoleHelper {
    type Candidate = Pair;

    fn complete(
        &self,
        line: &str,
        pos: usize,
        _ctx: &rustyline::Context<'_>,
    ) -> rustyline::Result<(usize, Vec<Pair>)> {
        let input = &line[..pos];

        if !input.contains(' ') {
            let matches: Vec<Pair> = COMMANDS
                .iter()
                .filter(|(cmd, _)| cmd.starts_with(input))
                .map(|(cmd, desc)| Pair {
                    display: format!("{cmd:<16} {desc}"),
                    replacement: format!("{cmd} "),
                })
                .collect();
            return Ok((0, matches));
        }

        if let Some(partial) = input.strip_prefix("/call ") {
            if !partial.contains(' ') {
                let matches: Vec<Pair> = self
                    .tools
                    .iter()
                    .filter(|t| t.starts_with(partial))
                    .map(|t| Pair {
                        display: t.clone(),
                        replacement: format!("{t} "),
                    })
                    .collect();
                return Ok((input.len() - partial.len(), matches));
            }
        }

        Ok((pos, Vec::new()))
    }
}

impl Hinter for ConsoleHelper {
    type Hint = String;

    fn hint(&self, line: &str, pos: usize, _ctx: &rustyline::Context<'_>) -> Option<String> {
        if pos < line.len() || line.is_empty() {
            return None;
        }
        if line.starts_with('/') && !line.contains(' ') {
            for (cmd, _) in COMMANDS {
                if cmd.starts_with(line) && *cmd != line {
                    return Some(cmd[line.len()..].to_string());
                }
            }
        }
        None
    }
}

impl Highlighter for ConsoleHelper {}
impl Validator for ConsoleHelper {}
impl Helper for ConsoleHelper {}

struct TabCompleteOrAcceptHint;

impl ConditionalEventHandler for TabCompleteOrAcceptHint {
    fn handle(
        &self,
        _evt: &Event,
        _n: RepeatCount,
        _positive: bool,
        ctx: &EventContext<'_>,
    ) -> Option<Cmd> {
        if ctx.has_hint() {
            Some(Cmd::CompleteHint)
        } else {
            Some(Cmd::Complete)
        }
    }
}

/// Sends requests to the dispatcher with increasing ids.
struct Console {
    handler: ProtocolHandler,
    next_id: i64,
}

impl Console {
    async fn request(&mut self, method: &str, params: Value) -> Result<Value, Value> {
        self.next_id += 1;
        let request = JsonRpcRequest::new(RequestId::Number(self.next_id), method, Some(params));
        let response = self
            .handler
            .handle_message(JsonRpcMessage::Request(request))
            .await
            .unwrap_or_default();
        match response.get("error") {
            Some(error) => Err(error.clone()),
            None => Ok(response.get("result").cloned().unwrap_or_default()),
        }
    }

    async fn tool_names(&mut self) -> Vec<String> {
        self.request("tools/list", json!({}))
            .await
            .ok()
            .and_then(|r| r.get("tools").and_then(Value::as_array).cloned())
            .unwrap_or_default()
            .iter()
            .filter_map(|t| t.get("name").and_then(Value::as_str).map(str::to_string))
            .collect()
    }
}

/// Run the interactive REPL.
pub async fn run(handler: ProtocolHandler) -> anyhow::Result<()> {
    eprintln!();
    eprintln!(
        "  \x1b[32m\u{25c9}\x1b[0m \x1b[1mcapstan-mcp v{}\x1b[0m \x1b[90m- capability console\x1b[0m",
        env!("CARGO_PKG_VERSION")
    );
    eprintln!();
    eprintln!(
        "    Press \x1b[36m/\x1b[0m to browse commands, \x1b[90mTab\x1b[0m to complete, \x1b[90m/exit\x1b[0m to quit."
    );
    eprintln!();

    let mut console = Console { handler, next_id: 0 };

    let config = Config::builder()
        .history_ignore_space(true)
        .auto_add_history(true)
        .completion_type(CompletionType::List)
        .completion_prompt_limit(20)
        .build();

    let mut rl: Editor<ConsoleHelper, rustyline::history::DefaultHistory> =
        Editor::with_config(config)?;
    rl.set_helper(Some(ConsoleHelper {
        tools: console.tool_names().await,
    }));
    rl.bind_sequence(
        KeyEvent::from('\t'),
        EventHandler::Conditional(Box::new(TabCompleteOrAcceptHint)),
    );

    let home = std::env::var("HOME")
        .or_else(|_| std::env::var("USERPROFILE"))
        .unwrap_or_else(|_| ".".to_string());
    let hist_path = std::path::PathBuf::from(&home).join(".capstan_mcp_history");
    if hist_path.exists() {
        let _ = rl.load_history(&hist_path);
    }

    let prompt = " \x1b[36mcapstan>\x1b[0m ";

    loop {
        let line = tokio::task::block_in_place(|| rl.readline(prompt));
        match line {
            Ok(line) => {
                let line = line.trim();
                if line.is_empty() {
                    continue;
                }

                let input = line.strip_prefix('/').unwrap_or(line);
                if input.is_empty() {
                    cmd_help();
                    continue;
                }

                let mut parts = input.splitn(2, ' ');
                let cmd = parts.next().unwrap_or("");
                let args = parts.next().unwrap_or("").trim();

                match cmd {
                    "exit" | "quit" => {
                        eprintln!("  Goodbye!");
                        break;
                    }
                    "help" | "h" | "?" => cmd_help(),
                    "clear" | "cls" => eprint!("\x1b[2J\x1b[H"),
                    "info" => cmd_info(&mut console).await,
                    "tools" => cmd_list(&mut console, "tools/list", "tools", "name").await,
                    "resources" => {
                        cmd_list(&mut console, "resources/list", "resources", "uri").await
                    }
                    "templates" => {
                        cmd_list(
                            &mut console,
                            "resources/templates/list",
                            "resourceTemplates",
                            "uriTemplate",
                        )
                        .await
                    }
                    "prompts" => cmd_list(&mut console, "prompts/list", "prompts", "name").await,
                    "call" => cmd_call(&mut console, args).await,
                    "read" => cmd_read(&mut console, args).await,
                    "prompt" => cmd_prompt(&mut console, args).await,
                    "complete" => cmd_complete(&mut console, args).await,
                    _ => {
                        eprintln!("  Unknown command '/{cmd}'. Type /help for commands.");
                    }
                }
            }
            Err(ReadlineError::Interrupted) => {
                eprintln!("  \x1b[90m(Ctrl+C)\x1b[0m Type \x1b[1m/exit\x1b[0m to quit.");
            }
            Err(ReadlineError::Eof) => {
                eprintln!("  Goodbye!");
                break;
            }
            Err(err) => {
                eprintln!("  Error: {err}");
                break;
            }
        }
    }

    let _ = rl.save_history(&hist_path);

    Ok(())
}

fn cmd_help() {
    eprintln!();
    eprintln!("  Commands:");
    eprintln!();
    for (cmd, desc) in COMMANDS {
        eprintln!("    {cmd:<18} {desc}");
    }
    eprintln!();
    eprintln!("  Tip: Tab completes commands and tool names after /call.");
    eprintln!();
}

fn print_json(value: &Value) {
    let text = serde_json::to_string_pretty(value).unwrap_or_else(|_| value.to_string());
    for line in text.lines() {
        eprintln!("  {line}");
    }
}

fn print_error(error: &Value) {
    let code = error.get("code").and_then(Value::as_i64).unwrap_or_default();
    let message = error
        .get("message")
        .and_then(Value::as_str)
        .unwrap_or("unknown error");
    eprintln!("  \x1b[31merror {code}\x1b[0m {message}");
    if let Some(data) = error.get("data") {
        print_json(data);
    }
}

/// Split `<word> [json]` into the word and a parsed arguments object.
fn split_json_args(args: &str) -> Result<(&str, Value), String> {
    let mut parts = args.splitn(2, ' ');
    let head = parts.next().unwrap_or("").trim();
    let rest = parts.next().unwrap_or("").trim();
    if head.is_empty() {
        return Err("missing name".to_string());
    }
    if rest.is_empty() {
        return Ok((head, json!({})));
    }
    match serde_json::from_str::<Value>(rest) {
        Ok(value @ Value::Object(_)) => Ok((head, value)),
        Ok(_) => Err("arguments must be a JSON object".to_string()),
        Err(e) => Err(format!("invalid JSON arguments: {e}")),
    }
}

async fn cmd_info(console: &mut Console) {
    let params = json!({
        "protocolVersion": MCP_VERSION,
        "capabilities": {},
        "clientInfo": { "name": "capstan-repl", "version": env!("CARGO_PKG_VERSION") }
    });
    match console.request("initialize", params).await {
        Ok(result) => {
            eprintln!();
            eprintln!(
                "  Server:   {} v{}",
                result["serverInfo"]["name"].as_str().unwrap_or("?"),
                result["serverInfo"]["version"].as_str().unwrap_or("?")
            );
            eprintln!(
                "  Protocol: {}",
                result["protocolVersion"].as_str().unwrap_or("?")
            );
            eprintln!("  Capabilities:");
            print_json(&result["capabilities"]);
            eprintln!();
        }
        Err(error) => print_error(&error),
    }
}

async fn cmd_list(console: &mut Console, method: &str, field: &str, key: &str) {
    let mut cursor: Option<String> = None;
    let mut items = Vec::new();
    loop {
        let params = match &cursor {
            Some(c) => json!({ "cursor": c }),
            None => json!({}),
        };
        match console.request(method, params).await {
            Ok(result) => {
                items.extend(
                    result
                        .get(field)
                        .and_then(Value::as_array)
                        .cloned()
                        .unwrap_or_default(),
                );
                cursor = result
                    .get("nextCursor")
                    .and_then(Value::as_str)
                    .map(str::to_string);
                if cursor.is_none() {
                    break;
                }
            }
            Err(error) => {
                print_error(&error);
                return;
            }
        }
    }

    eprintln!();
    eprintln!("  {} {field}:", items.len());
    eprintln!();
    for item in &items {
        eprintln!(
            "    {:<32} {}",
            item.get(key).and_then(Value::as_str).unwrap_or("?"),
            item.get("description").and_then(Value::as_str).unwrap_or("")
        );
    }
    eprintln!();
}

async fn cmd_call(console: &mut Console, args: &str) {
    let (name, arguments) = match split_json_args(args) {
        Ok(parsed) => parsed,
        Err(e) => {
            eprintln!("  Usage: /call <name> [json-arguments] ({e})");
            return;
        }
    };
    let params = json!({ "name": name, "arguments": arguments });
    match console.request("tools/call", params).await {
        Ok(result) => print_json(&result),
        Err(error) => print_error(&error),
    }
}

async fn cmd_read(console: &mut Console, args: &str) {
    let uri = args.split_whitespace().next().unwrap_or("");
    if uri.is_empty() {
        eprintln!("  Usage: /read <uri>");
        return;
    }
    match console.request("resources/read", json!({ "uri": uri })).await {
        Ok(result) => print_json(&result),
        Err(error) => print_error(&error),
    }
}

async fn cmd_prompt(console: &mut Console, args: &str) {
    let (name, arguments) = match split_json_args(args) {
        Ok(parsed) => parsed,
        Err(e) => {
            eprintln!("  Usage: /prompt <name> [json-arguments] ({e})");
            return;
        }
    };
    let params = json!({ "name": name, "arguments": arguments });
    match console.request("prompts/get", params).await {
        Ok(result) => print_json(&result),
        Err(error) => print_error(&error),
    }
}

async fn cmd_complete(console: &mut Console, args: &str) {
    let parts: Vec<&str> = args.split_whitespace().collect();
    if parts.len() < 3 {
        eprintln!("  Usage: /complete <prompt|resource> <name-or-uri> <argument> [partial]");
        return;
    }
    let reference = match parts[0] {
        "prompt" => json!({ "type": "ref/prompt", "name": parts[1] }),
        "resource" => json!({ "type": "ref/resource", "uri": parts[1] }),
        other => {
            eprintln!("  Unknown reference type '{other}' (expected prompt or resource)");
            return;
        }
    };
    let params = json!({
        "ref": reference,
        "argument": { "name": parts[2], "value": parts.get(3).copied().unwrap_or("") }
    });
    match console.request("completion/complete", params).await {
        Ok(result) => {
            let completion = &result["completion"];
            eprintln!();
            for value in completion["values"].as_array().into_iter().flatten() {
                eprintln!("    {}", value.as_str().unwrap_or("?"));
            }
            eprintln!(
                "  ({} shown of {}{})",
                completion["values"].as_array().map_or(0, Vec::len),
                completion["total"].as_u64().unwrap_or_default(),
                if completion["hasMore"].as_bool() == Some(true) {
                    ", more available"
                } else {
                    ""
                }
            );
            eprintln!();
        }
        Err(error) => print_error(&error),
    }
}
