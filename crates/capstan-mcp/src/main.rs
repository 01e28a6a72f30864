//! Capstan MCP server — entry point.

use clap::{CommandFactory, Parser, Subcommand};
use clap_complete::Shell;

use capstan::CapabilityKind;
use capstan_mcp::catalog::BuiltinCatalog;
use capstan_mcp::config::{resolve_page_size, ServerConfig};
use capstan_mcp::protocol::ProtocolHandler;
use capstan_mcp::registry::{CapabilityRegistry, MetadataProvider};
use capstan_mcp::transport::StdioTransport;
use capstan_mcp::types::MCP_VERSION;

#[derive(Parser)]
#[command(
    name = "capstan-mcp",
    about = "MCP server exposing tools, resources and prompts from a capability registry",
    version
)]
struct Cli {
    /// Listing page size (overrides CAPSTAN_PAGE_SIZE).
    #[arg(long)]
    page_size: Option<usize>,

    /// Log level (trace, debug, info, warn, error).
    #[arg(long, default_value = "info")]
    log_level: String,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Start MCP server over stdio (default).
    Serve,

    /// Start MCP server over HTTP.
    #[cfg(feature = "sse")]
    ServeHttp {
        /// Listen address (host:port).
        #[arg(long, default_value = capstan_mcp::config::DEFAULT_HTTP_ADDR)]
        addr: String,
    },

    /// Print server capabilities as JSON.
    Info,

    /// Generate shell completion scripts.
    ///
    /// Examples:
    ///   capstan-mcp completions bash > ~/.local/share/bash-completion/completions/capstan-mcp
    ///   capstan-mcp completions zsh > ~/.zfunc/_capstan-mcp
    Completions {
        /// Shell type (bash, zsh, fish, powershell, elvish).
        shell: Shell,
    },

    /// Launch interactive REPL mode.
    Repl,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&cli.log_level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let config = ServerConfig::default()
        .with_page_size(resolve_page_size(cli.page_size))
        .with_instructions(
            "Capstan exposes tools, resources and prompts. \
             Subscribe to capstan://notes to hear about note changes.",
        );
    let catalog = BuiltinCatalog::new(config.server_name.clone(), config.server_version.clone());

    match cli.command.unwrap_or(Commands::Serve) {
        Commands::Serve => {
            tracing::info!("Capstan MCP server (stdio, page size {})", config.page_size);
            let handler = ProtocolHandler::new(&catalog, config)?;
            let transport = StdioTransport::new(handler);
            transport.run().await?;
        }

        #[cfg(feature = "sse")]
        Commands::ServeHttp { addr } => {
            use capstan_mcp::transport::HttpTransport;

            tracing::info!("Capstan MCP server (http, page size {})", config.page_size);
            let handler = ProtocolHandler::new(&catalog, config)?;
            let transport = HttpTransport::new(handler);
            transport.run(&addr).await?;
        }

        Commands::Info => {
            let info = describe(&catalog, &config)?;
            println!("{}", serde_json::to_string_pretty(&info)?);
        }

        Commands::Completions { shell } => {
            let mut cmd = Cli::command();
            clap_complete::generate(shell, &mut cmd, "capstan-mcp", &mut std::io::stdout());
        }

        Commands::Repl => {
            let handler = ProtocolHandler::new(&catalog, config)?;
            capstan_mcp::repl::run(handler).await?;
        }
    }

    Ok(())
}

fn describe(
    provider: &dyn MetadataProvider,
    config: &ServerConfig,
) -> anyhow::Result<serde_json::Value> {
    let mut registry = CapabilityRegistry::from_provider(provider)?;
    for kind in CapabilityKind::ALL {
        registry.ensure_initialized(kind);
    }
    let keys = |kind| {
        registry
            .list(kind)
            .into_iter()
            .map(|d| d.key)
            .collect::<Vec<_>>()
    };

    Ok(serde_json::json!({
        "server": { "name": config.server_name, "version": config.server_version },
        "protocol_version": MCP_VERSION,
        "capabilities": capstan_mcp::protocol::negotiation::server_capabilities(&registry),
        "page_size": config.page_size,
        "tools": keys(CapabilityKind::Tool),
        "resources": keys(CapabilityKind::Resource),
        "resource_templates": keys(CapabilityKind::ResourceTemplate),
        "prompts": keys(CapabilityKind::Prompt),
        "prompt_templates": keys(CapabilityKind::PromptTemplate),
    }))
}
