//! HTTP server implementation using Axum.

use crate::handlers::{handle_health, handle_rpc, method_table, MethodTable};
use axum::{
    routing::{get, post},
    Router,
};
use meshnode_core::Gateway;
use std::net::SocketAddr;
use std::sync::Arc;
use tower::limit::ConcurrencyLimitLayer;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::{debug, error, info};

/// Application state shared across handlers.
pub struct AppState {
    /// Management gateway of the node being served
    pub gateway: Gateway,
    /// Registered RPC methods
    pub methods: MethodTable,
}

/// Build the router serving `/health` and `/rpc`.
pub fn build_router(gateway: Gateway, max_concurrent: usize) -> anyhow::Result<Router> {
    let methods = method_table()?;
    debug!(
        "Registered {} RPC methods: {}",
        methods.len(),
        methods.names().collect::<Vec<_>>().join(", ")
    );
    let state = Arc::new(AppState { gateway, methods });

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Ok(Router::new()
        .route("/health", get(handle_health))
        .route("/rpc", post(handle_rpc))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .layer(ConcurrencyLimitLayer::new(max_concurrent.max(1)))
        .with_state(state))
}

/// Start the JSON-RPC HTTP server.
///
/// Returns the actual address the server is bound to (useful when port=0).
pub async fn start_server(
    gateway: Gateway,
    host: &str,
    port: u16,
    max_concurrent: usize,
) -> anyhow::Result<SocketAddr> {
    let app = build_router(gateway, max_concurrent)?;

    let addr: SocketAddr = format!("{}:{}", host, port).parse()?;
    let listener = tokio::net::TcpListener::bind(addr).await?;
    let actual_addr = listener.local_addr()?;

    info!("Server listening on {}", actual_addr);

    tokio::spawn(async move {
        if let Err(e) = axum::serve(listener, app).await {
            error!("Server error: {}", e);
        }
    });

    Ok(actual_addr)
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::{to_bytes, Body};
    use axum::http::{Request, StatusCode};
    use meshnode_core::{AppConfig, MemoryExecutorFactory, Node, NodeConfig};
    use serde_json::{json, Value};
    use tower::ServiceExt;

    fn gateway() -> Gateway {
        let config = NodeConfig {
            apps: vec![
                AppConfig {
                    app: "foo".into(),
                    version: "1.0".into(),
                    protocol_version: "0.0.1".into(),
                    port: 0,
                    args: vec![],
                    auto_start: false,
                },
                AppConfig {
                    app: "bar".into(),
                    version: "2.0".into(),
                    protocol_version: "0.0.1".into(),
                    port: 0,
                    args: vec![],
                    auto_start: false,
                },
            ],
            ..Default::default()
        };
        let node = Node::standalone(config, Arc::new(MemoryExecutorFactory::new())).unwrap();
        Gateway::new(Arc::new(node))
    }

    async fn call(router: &Router, method: &str, params: Value) -> Value {
        let body = json!({"jsonrpc": "2.0", "method": method, "params": params, "id": 1});
        let request = Request::post("/rpc")
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap();
        let response = router.clone().oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    fn error_code(response: &Value) -> Option<i64> {
        response["error"]["code"].as_i64()
    }

    #[tokio::test]
    async fn test_server_starts() {
        let addr = start_server(gateway(), "127.0.0.1", 0, 8).await.unwrap();
        assert!(addr.port() > 0);
    }

    #[tokio::test]
    async fn test_health() {
        let router = build_router(gateway(), 8).unwrap();
        let request = Request::get("/health").body(Body::empty()).unwrap();
        let response = router.oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_unknown_method() {
        let router = build_router(gateway(), 8).unwrap();
        let response = call(&router, "Reboot", json!({})).await;
        assert_eq!(error_code(&response), Some(-32601));
        assert_eq!(response["id"], 1);
    }

    #[tokio::test]
    async fn test_list_applications_sorted() {
        let router = build_router(gateway(), 8).unwrap();
        let response = call(&router, "ListApplications", Value::Null).await;
        let apps = response["result"].as_array().unwrap();
        assert_eq!(apps[0]["app_name"], "bar");
        assert_eq!(apps[0]["app_version"], "2.0");
        assert_eq!(apps[1]["app_name"], "foo");
    }

    #[tokio::test]
    async fn test_process_round_trip() {
        let router = build_router(gateway(), 8).unwrap();

        let started = call(&router, "StartProcess", json!({"app_name": "foo", "port": 10})).await;
        assert_eq!(started["result"], 1);

        let conflict = call(&router, "StartProcess", json!({"appName": "foo", "port": 10})).await;
        assert_eq!(error_code(&conflict), Some(-32010));
        let message = conflict["error"]["message"].as_str().unwrap();
        assert!(message.contains("port 10"));

        let listed = call(&router, "ListProcesses", json!({})).await;
        assert_eq!(listed["result"][0]["pid"], 1);
        assert_eq!(listed["result"][0]["exec_config"]["bin_loc"], "apps/foo");

        let stopped = call(&router, "StopProcess", json!({"pid": 1})).await;
        assert!(stopped.get("error").is_none());
        assert_eq!(stopped["result"], Value::Null);

        let again = call(&router, "StopProcess", json!({"pid": 1})).await;
        assert_eq!(error_code(&again), Some(-32001));
    }

    #[tokio::test]
    async fn test_invalid_params() {
        let router = build_router(gateway(), 8).unwrap();

        let missing = call(&router, "StartProcess", json!({"port": 1})).await;
        assert_eq!(error_code(&missing), Some(-32602));

        let zero_pid = call(&router, "StopProcess", json!({"pid": 0})).await;
        assert_eq!(error_code(&zero_pid), Some(-32602));

        let bad_id = call(&router, "GetTransport", json!({"id": "nope"})).await;
        assert_eq!(error_code(&bad_id), Some(-32602));

        let bad_rule = call(&router, "AddRoutingRule", json!({"rule": {"type": "teleport"}})).await;
        assert_eq!(error_code(&bad_rule), Some(-32602));
    }

    #[tokio::test]
    async fn test_loops_with_dangling_route_fail() {
        let router = build_router(gateway(), 8).unwrap();
        let rule = json!({
            "type": "app",
            "resp_route_id": 42,
            "remote": "02".repeat(33),
            "remote_port": 2,
            "local_port": 1,
        });
        let added = call(&router, "AddRoutingRule", json!({"rule": rule})).await;
        assert_eq!(added["result"], 1);

        let loops = call(&router, "ListLoops", json!({})).await;
        assert_eq!(error_code(&loops), Some(-32001));

        let summary = call(&router, "GetSummary", json!({})).await;
        assert_eq!(summary["result"]["routes_count"], 1);
    }
}
