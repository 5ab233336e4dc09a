//! # Memstore MCP - Model Context Protocol surface
//!
//! Exposes a [`MemoryStore`](memstore_core::MemoryStore) to MCP clients as
//! four tools: `ls`, `read_file`, `write_file` and `edit_file`, over stdio
//! or streamable HTTP.
//!
//! ## Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//!
//! use memstore_core::{AccessPolicy, FileConfigCatalog, InMemoryConnector, MemoryStore, TenantId};
//! use memstore_mcp::MemoryMcpServer;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let store = MemoryStore::new(
//!         Arc::new(InMemoryConnector::new()),
//!         AccessPolicy::permissive(),
//!         TenantId::parse("default")?,
//!     );
//!
//!     let server = MemoryMcpServer::new(Arc::new(store), FileConfigCatalog::empty());
//!     server.serve_stdio().await?;
//!
//!     Ok(())
//! }
//! ```

pub mod error;
pub mod server;
pub mod tools;

pub use error::{ErrorType, McpError, McpResult, ToolKind};
pub use server::{HTTP_PATH, LsRequest, MemoryMcpServer, ReadRequest, SERVER_NAME, WriteRequest};
pub use tools::MemoryTools;
