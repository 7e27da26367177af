use tracing_subscriber::{self, EnvFilter};

mod cli;
mod config;
mod core;
mod server;

use cli::Cli;

/// Weather MCP Server
///
/// An MCP server exposing:
/// - Tools: Current weather, multi-day forecasts and spoken local time
/// - Resources: Server status and help documentation
/// - Prompts: Guidance on how locations are resolved
///
/// Usage: npx @modelcontextprotocol/inspector cargo run --bin mcp-server-weather
#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let (config, log_level) = Cli::parse_config()?;

    // Initialize logging only if a log level was given
    let logging = log_level.is_some();
    if let Some(log_level) = log_level {
        tracing_subscriber::fmt()
            .with_env_filter(
                EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&log_level)),
            )
            .with_writer(std::io::stderr)
            .with_ansi(false)
            .init();

        tracing::info!("Starting Weather MCP server with log level: {}", log_level);
    }

    if let Err(e) = server::run(config).await {
        if logging {
            tracing::error!("Error running Weather MCP server: {}", e);
        }
        return Err(e);
    }

    Ok(())
}
