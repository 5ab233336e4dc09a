//! MCP server exposing the memory tools

use std::future::Future;
use std::sync::Arc;

use memstore_core::{FileConfigCatalog, MemoryStore};
use rmcp::{
    ServerHandler, ServiceExt,
    handler::server::{router::tool::ToolRouter, wrapper::Parameters},
    model::{Implementation, ServerCapabilities, ServerInfo},
    schemars, tool, tool_handler, tool_router,
    transport::streamable_http_server::{
        StreamableHttpServerConfig, StreamableHttpService, session::local::LocalSessionManager,
    },
};
use serde::{Deserialize, Serialize};
use tokio::net::TcpListener;
use tracing::{debug, info};

use crate::error::{McpError, McpResult};
use crate::tools::MemoryTools;

/// Name reported to MCP clients
pub const SERVER_NAME: &str = "memstore";

/// Path the streamable HTTP transport is mounted on
pub const HTTP_PATH: &str = "/mcp";

const BASE_INSTRUCTIONS: &str = "Persistent memory store organised as namespaces of named \
memories. Use ls to explore, read_file to recall, write_file to create or overwrite and \
edit_file to change an existing memory.";

/// Arguments of `ls`
#[derive(Debug, Default, Deserialize, Serialize, schemars::JsonSchema)]
pub struct LsRequest {
    #[schemars(description = "Namespace to list. Empty or omitted lists all namespaces")]
    #[serde(default)]
    pub path: Option<String>,
}

/// Arguments of `read_file`
#[derive(Debug, Deserialize, Serialize, schemars::JsonSchema)]
pub struct ReadRequest {
    #[schemars(description = "Memory namespace, e.g. \"programming-style\"")]
    pub namespace: String,
    #[schemars(description = "Memory key within the namespace")]
    pub key: String,
}

/// Arguments of `write_file` and `edit_file`
#[derive(Debug, Deserialize, Serialize, schemars::JsonSchema)]
pub struct WriteRequest {
    #[schemars(description = "Memory namespace, e.g. \"preferences\"")]
    pub namespace: String,
    #[schemars(description = "Memory key, e.g. \"python-type-hints\"")]
    pub key: String,
    #[schemars(description = "Content to store")]
    pub content: String,
}

/// Memory MCP server
///
/// Tool results are JSON envelopes rendered as text content; store errors
/// are part of the envelope, never protocol errors.
#[derive(Clone)]
pub struct MemoryMcpServer {
    tools: MemoryTools,
    catalog: Arc<FileConfigCatalog>,
    tool_router: ToolRouter<Self>,
}

#[tool_router(router = tool_router)]
impl MemoryMcpServer {
    pub fn new(store: Arc<MemoryStore>, catalog: FileConfigCatalog) -> Self {
        Self {
            tools: MemoryTools::new(store),
            catalog: Arc::new(catalog),
            tool_router: Self::tool_router(),
        }
    }

    pub fn tools(&self) -> &MemoryTools {
        &self.tools
    }

    pub fn catalog(&self) -> &FileConfigCatalog {
        &self.catalog
    }

    /// Server instructions: the usage summary followed by the configured
    /// files and their read/write/update triggers.
    pub fn instructions(&self) -> String {
        let mut text = BASE_INSTRUCTIONS.to_string();
        if !self.catalog.is_empty() {
            text.push_str(&self.catalog.format_files());
            text.push_str(&self.catalog.format_read_triggers());
            text.push_str(&self.catalog.format_write_triggers());
            text.push_str(&self.catalog.format_update_triggers());
        }
        text
    }

    #[tool(
        name = "ls",
        description = "List memory namespaces, or the memories within one namespace.\n\n\
            With an empty or omitted path, returns every namespace with its file count. \
            With a namespace as path, returns the memories in it (without content).",
        annotations(read_only_hint = true)
    )]
    async fn ls(&self, request: Parameters<LsRequest>) -> String {
        self.tools.ls(request.0.path.as_deref()).await.to_string()
    }

    #[tool(
        name = "read_file",
        description = "Read a memory from the store.\n\n\
            Returns its content, namespace, key, whether it is read-only, and its \
            created_at/updated_at timestamps.",
        annotations(read_only_hint = true)
    )]
    async fn read_file(&self, request: Parameters<ReadRequest>) -> String {
        let ReadRequest { namespace, key } = request.0;
        self.tools.read_file(&namespace, &key).await.to_string()
    }

    #[tool(
        name = "write_file",
        description = "Create or overwrite a memory.\n\n\
            Creates the namespace implicitly and replaces any memory with the same key."
    )]
    async fn write_file(&self, request: Parameters<WriteRequest>) -> String {
        let WriteRequest { namespace, key, content } = request.0;
        self.tools.write_file(&namespace, &key, &content).await.to_string()
    }

    #[tool(
        name = "edit_file",
        description = "Edit an existing memory.\n\n\
            Unlike write_file, fails if the memory does not exist, guarding against \
            typos in key names. The original creation time is kept."
    )]
    async fn edit_file(&self, request: Parameters<WriteRequest>) -> String {
        let WriteRequest { namespace, key, content } = request.0;
        self.tools.edit_file(&namespace, &key, &content).await.to_string()
    }
}

#[tool_handler(router = self.tool_router)]
impl ServerHandler for MemoryMcpServer {
    fn get_info(&self) -> ServerInfo {
        ServerInfo {
            protocol_version: Default::default(),
            capabilities: ServerCapabilities {
                tools: Some(rmcp::model::ToolsCapability::default()),
                ..Default::default()
            },
            server_info: Implementation {
                name: SERVER_NAME.to_string(),
                version: env!("CARGO_PKG_VERSION").to_string(),
                ..Default::default()
            },
            instructions: Some(self.instructions()),
        }
    }
}

impl MemoryMcpServer {
    /// Serve over stdin/stdout until the client disconnects
    pub async fn serve_stdio(self) -> McpResult<()> {
        info!(
            server = SERVER_NAME,
            version = env!("CARGO_PKG_VERSION"),
            configured_files = self.catalog.len(),
            "Starting MCP server on stdio"
        );

        let service = self
            .serve(rmcp::transport::stdio())
            .await
            .map_err(McpError::from_rmcp_error)?;

        debug!("MCP client connected");
        let reason = service.waiting().await.map_err(|e| McpError::ServerError(e.to_string()))?;

        info!(reason = ?reason, "MCP server stopped");
        Ok(())
    }

    /// Router serving the tools over streamable HTTP at [`HTTP_PATH`].
    /// Every session gets a clone of this server sharing one store.
    pub fn http_router(self) -> axum::Router {
        let service = StreamableHttpService::new(
            move || Ok(self.clone()),
            Arc::new(LocalSessionManager::default()),
            StreamableHttpServerConfig::default(),
        );
        axum::Router::new().nest_service(HTTP_PATH, service)
    }

    /// Serve over streamable HTTP on `host:port` until Ctrl-C
    pub async fn serve_http(self, host: &str, port: u16) -> McpResult<()> {
        let listener = TcpListener::bind((host, port)).await?;
        self.serve_http_on(listener, async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                tracing::warn!(error = %e, "Failed to listen for Ctrl-C");
                std::future::pending::<()>().await;
            }
        })
        .await
    }

    /// Serve over streamable HTTP on a bound listener until `shutdown` resolves
    pub async fn serve_http_on<F>(self, listener: TcpListener, shutdown: F) -> McpResult<()>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let addr = listener.local_addr()?;
        info!(
            server = SERVER_NAME,
            version = env!("CARGO_PKG_VERSION"),
            configured_files = self.catalog.len(),
            addr = %addr,
            path = HTTP_PATH,
            "Starting MCP server on streamable HTTP"
        );

        axum::serve(listener, self.http_router())
            .with_graceful_shutdown(shutdown)
            .await?;

        info!("MCP server stopped");
        Ok(())
    }
}
