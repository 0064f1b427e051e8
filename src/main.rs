//! Ax bridge - interactive tool-calling loop over an Ax tool server

use ax_bridge::catalog::{translate, ToolCatalog};
use ax_bridge::cli::{run_repl, BridgeConfig, ReplExit};
use ax_bridge::conversation::Conversation;
use ax_bridge::llm::build_service;
use ax_bridge::mcp::{McpError, McpSession};
use ax_bridge::runtime::{BridgeRuntime, ServiceLlmClient};
use ax_bridge::state_machine::ConvContext;
use ax_bridge::system_prompt::build_system_prompt;
use std::sync::Arc;
use tokio::io::BufReader;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    ax_bridge::init_logging("ax_bridge=info");

    let config = match BridgeConfig::from_env() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Configuration error: {e}");
            std::process::exit(2);
        }
    };

    let mut session = match McpSession::open(&config.server) {
        Ok(session) => session,
        Err(e) => {
            eprintln!("Could not start tool server: {e}");
            std::process::exit(1);
        }
    };

    let catalog = match connect(&mut session).await {
        Ok(catalog) => catalog,
        Err(e) => {
            eprintln!("Tool server handshake failed: {e}");
            close(session).await;
            std::process::exit(1);
        }
    };

    let session = Arc::new(session);
    let result = chat(&config, catalog, session.clone()).await;

    // The runtime is gone, so this is the last handle
    match Arc::try_unwrap(session) {
        Ok(session) => close(session).await,
        Err(_) => tracing::warn!("Session still shared at exit; relying on kill-on-drop"),
    }

    if let Err(e) = result {
        eprintln!("Error: {e}");
        std::process::exit(1);
    }
    Ok(())
}

async fn connect(session: &mut McpSession) -> Result<ToolCatalog, McpError> {
    let info = session.initialize().await?;
    tracing::info!(
        server = %info.server_info.name,
        version = %info.server_info.version,
        "Connected to tool server"
    );

    let tools = session.list_tools().await?;
    let catalog = translate(&tools);
    tracing::info!(tools = ?catalog.names().collect::<Vec<_>>(), "Tools discovered");
    Ok(catalog)
}

async fn chat(
    config: &BridgeConfig,
    catalog: ToolCatalog,
    session: Arc<McpSession>,
) -> Result<(), Box<dyn std::error::Error>> {
    let service = build_service(&config.llm)?;
    let conversation =
        Conversation::with_system_prompt(build_system_prompt(&config.system_prompt, &catalog));

    let mut runtime: BridgeRuntime = BridgeRuntime::new(
        ConvContext::new(config.max_tool_rounds),
        conversation,
        catalog,
        ServiceLlmClient::new(service),
        session,
    )
    .with_sampling(config.llm.sampling());

    println!(
        "Ax bridge ready with {} tools on {}. Type 'quit' to exit.",
        runtime.catalog().len(),
        config.llm.model
    );
    let stdin = BufReader::new(tokio::io::stdin());
    let mut stdout = tokio::io::stdout();

    match run_repl(stdin, &mut stdout, &mut runtime).await? {
        ReplExit::Quit | ReplExit::EndOfInput => tracing::info!("Session ended"),
        ReplExit::Interrupted => tracing::info!("Interrupted at prompt"),
    }
    Ok(())
}

async fn close(session: McpSession) {
    if let Err(e) = session.close().await {
        tracing::warn!(error = %e, "Tool server did not shut down cleanly");
    }
}
