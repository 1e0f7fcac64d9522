//! MCP server wiring for the stdio transport.

use anyhow::Result;
use rmcp::ServiceExt;
use std::sync::Arc;

use crate::service::MemoryService;
use crate::tools::MemoryTools;

/// Start the MCP server over stdio, blocking until the client disconnects.
pub async fn serve_stdio(service: MemoryService) -> Result<()> {
    tracing::info!(
        memory_home = %service.memory_home.display(),
        "starting echovault MCP server on stdio"
    );

    let tools = MemoryTools::new(Arc::new(service));
    let transport = rmcp::transport::stdio();

    let server = tools.serve(transport).await?;
    tracing::info!("MCP server running — waiting for client");

    server.waiting().await?;
    tracing::info!("MCP server shut down");

    Ok(())
}
