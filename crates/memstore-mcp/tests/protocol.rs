//! Protocol-level tests: a client talks to the memory server over
//! in-process duplex pipes, or over streamable HTTP on a loopback port.

use std::sync::Arc;
use std::time::Duration;

use memstore_core::{AccessPolicy, FileConfigCatalog, InMemoryConnector, MemoryStore, TenantId};
use memstore_mcp::{HTTP_PATH, MemoryMcpServer};
use rmcp::{
    RoleClient, ServiceExt,
    model::{CallToolRequestParams, ClientInfo, Implementation},
    service::RunningService,
    transport::StreamableHttpClientTransport,
};
use serde_json::{Value, json};

type TestClient = RunningService<RoleClient, ClientInfo>;

fn client_info() -> ClientInfo {
    ClientInfo {
        client_info: Implementation {
            name: "memstore-test-client".to_string(),
            version: "0.1.0".to_string(),
            ..Default::default()
        },
        ..Default::default()
    }
}

async fn connect(server: MemoryMcpServer) -> (TestClient, tokio::task::JoinHandle<()>) {
    let (client_read, server_write) = tokio::io::duplex(4096);
    let (server_read, client_write) = tokio::io::duplex(4096);

    let server_transport =
        rmcp::transport::async_rw::AsyncRwTransport::new(server_read, server_write);
    let server_handle = tokio::spawn(async move {
        if let Ok(service) = server.serve(server_transport).await {
            let _ = service.waiting().await;
        }
    });

    tokio::time::sleep(Duration::from_millis(50)).await;

    let client_transport =
        rmcp::transport::async_rw::AsyncRwTransport::new(client_read, client_write);
    let client = client_info()
        .serve(client_transport)
        .await
        .expect("Failed to connect");
    (client, server_handle)
}

fn server() -> MemoryMcpServer {
    let store = MemoryStore::new(
        Arc::new(InMemoryConnector::new()),
        AccessPolicy::from_csv("", "prefs/locked"),
        TenantId::parse("protocol-test").unwrap(),
    );
    MemoryMcpServer::new(Arc::new(store), FileConfigCatalog::empty())
}

async fn call(
    client: &TestClient,
    name: &'static str,
    arguments: Value,
) -> Value {
    let request: CallToolRequestParams =
        serde_json::from_value(json!({ "name": name, "arguments": arguments }))
            .expect("Invalid tool request");
    let result = client
        .peer()
        .call_tool(request)
        .await
        .expect("Tool call failed");

    let text = result
        .content
        .iter()
        .find_map(|c| match &c.raw {
            rmcp::model::RawContent::Text(text) => Some(text.text.clone()),
            _ => None,
        })
        .expect("Tool returned no text content");
    serde_json::from_str(&text).expect("Tool returned invalid JSON")
}

#[tokio::test]
async fn test_lists_four_tools_with_read_only_hints() {
    let (client, server_handle) = connect(server()).await;

    let tools = client
        .peer()
        .list_all_tools()
        .await
        .expect("Failed to list tools");

    let mut names: Vec<&str> = tools.iter().map(|t| t.name.as_ref()).collect();
    names.sort_unstable();
    assert_eq!(names, vec!["edit_file", "ls", "read_file", "write_file"]);

    for tool in &tools {
        let read_only = tool
            .annotations
            .as_ref()
            .and_then(|a| a.read_only_hint)
            .unwrap_or(false);
        let expected = matches!(tool.name.as_ref(), "ls" | "read_file");
        assert_eq!(read_only, expected, "read_only_hint of {}", tool.name);
    }

    server_handle.abort();
}

#[tokio::test]
async fn test_server_info_carries_instructions() {
    let (client, server_handle) = connect(server()).await;

    let info = client.peer().peer_info().expect("Missing server info");
    assert_eq!(info.server_info.name, memstore_mcp::SERVER_NAME);
    assert!(info.instructions.as_deref().unwrap_or_default().contains("read_file"));

    server_handle.abort();
}

#[tokio::test]
async fn test_tool_calls_over_protocol() {
    let (client, server_handle) = connect(server()).await;

    let written = call(
        &client,
        "write_file",
        json!({"namespace": "prefs", "key": "tone", "content": "concise"}),
    )
    .await;
    assert_eq!(written["success"], true);

    let read = call(&client, "read_file", json!({"namespace": "prefs", "key": "tone"})).await;
    assert_eq!(read["content"], "concise");

    let listing = call(&client, "ls", json!({})).await;
    assert_eq!(listing["type"], "namespaces");
    assert_eq!(listing["namespaces"][0]["name"], "prefs");
    assert_eq!(listing["namespaces"][0]["file_count"], 1);

    let locked = call(
        &client,
        "write_file",
        json!({"namespace": "prefs", "key": "locked", "content": "x"}),
    )
    .await;
    assert_eq!(locked["success"], false);
    assert_eq!(locked["type"], "permission_denied");

    let missing = call(
        &client,
        "edit_file",
        json!({"namespace": "prefs", "key": "missing", "content": "x"}),
    )
    .await;
    assert_eq!(missing["type"], "not_found");

    server_handle.abort();
}

#[tokio::test]
async fn test_tool_calls_over_streamable_http() {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let (stop, stopped) = tokio::sync::oneshot::channel::<()>();
    let server_handle = tokio::spawn(server().serve_http_on(listener, async {
        let _ = stopped.await;
    }));

    let transport = StreamableHttpClientTransport::from_uri(format!("http://{addr}{HTTP_PATH}"));
    let client = client_info()
        .serve(transport)
        .await
        .expect("Failed to connect over HTTP");

    let info = client.peer().peer_info().expect("Missing server info");
    assert_eq!(info.server_info.name, memstore_mcp::SERVER_NAME);

    let written = call(
        &client,
        "write_file",
        json!({"namespace": "prefs", "key": "tone", "content": "concise"}),
    )
    .await;
    assert_eq!(written["success"], true);

    let read = call(&client, "read_file", json!({"namespace": "prefs", "key": "tone"})).await;
    assert_eq!(read["content"], "concise");

    let _ = client.cancel().await;
    let _ = stop.send(());
    server_handle.abort();
}
