//! JSON-RPC request handlers, split by domain.

mod process;
mod routing;
mod status;
mod transports;

use crate::server::AppState;
use axum::{extract::State, http::StatusCode, response::IntoResponse, Json};
use futures::future::BoxFuture;
use meshnode_core::{NodeError, ProcessId};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{debug, error};

// ============================================================================
// JSON-RPC types
// ============================================================================

/// JSON-RPC 2.0 request structure.
#[derive(Debug, Deserialize)]
#[allow(dead_code)]
pub struct JsonRpcRequest {
    pub jsonrpc: String,
    pub method: String,
    #[serde(default)]
    pub params: Option<Value>,
    pub id: Option<Value>,
}

/// JSON-RPC 2.0 response structure.
#[derive(Debug, Serialize)]
pub struct JsonRpcResponse {
    pub jsonrpc: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<JsonRpcError>,
    pub id: Option<Value>,
}

/// JSON-RPC 2.0 error structure.
#[derive(Debug, Serialize)]
pub struct JsonRpcError {
    pub code: i32,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
}

impl JsonRpcResponse {
    pub fn success(id: Option<Value>, result: Value) -> Self {
        Self {
            jsonrpc: "2.0".to_string(),
            result: Some(result),
            error: None,
            id,
        }
    }

    pub fn error(id: Option<Value>, code: i32, message: String) -> Self {
        Self {
            jsonrpc: "2.0".to_string(),
            result: None,
            error: Some(JsonRpcError {
                code,
                message,
                data: None,
            }),
            id,
        }
    }
}

/// JSON-RPC code for an unknown method.
pub const METHOD_NOT_FOUND: i32 = -32601;

// ============================================================================
// Method table
// ============================================================================

pub type HandlerFuture<'a> = BoxFuture<'a, meshnode_core::Result<Value>>;

/// A registered RPC method.
pub type Handler = for<'a> fn(&'a AppState, &'a Value) -> HandlerFuture<'a>;

/// Name to handler mapping, fixed once the server starts.
#[derive(Default)]
pub struct MethodTable {
    methods: BTreeMap<&'static str, Handler>,
}

impl MethodTable {
    pub fn register(&mut self, name: &'static str, handler: Handler) -> anyhow::Result<()> {
        if self.methods.insert(name, handler).is_some() {
            anyhow::bail!("RPC method {} registered twice", name);
        }
        Ok(())
    }

    pub fn get(&self, name: &str) -> Option<Handler> {
        self.methods.get(name).copied()
    }

    pub fn names(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.methods.keys().copied()
    }

    pub fn len(&self) -> usize {
        self.methods.len()
    }

    pub fn is_empty(&self) -> bool {
        self.methods.is_empty()
    }
}

/// Register an async handler under a method name.
macro_rules! register {
    ($table:expr, $name:literal => $handler:path) => {{
        fn call<'a>(state: &'a AppState, params: &'a Value) -> HandlerFuture<'a> {
            Box::pin($handler(state, params))
        }
        $table.register($name, call)?;
    }};
}

/// Build the table of every management method.
pub fn method_table() -> anyhow::Result<MethodTable> {
    let mut table = MethodTable::default();

    // Node
    register!(table, "GetSummary" => status::get_summary);

    // Applications & processes
    register!(table, "ListApplications" => process::list_applications);
    register!(table, "SetAutoStart" => process::set_auto_start);
    register!(table, "StartProcess" => process::start_process);
    register!(table, "StopProcess" => process::stop_process);
    register!(table, "ListProcesses" => process::list_processes);

    // Transports
    register!(table, "ListTransportTypes" => transports::list_transport_types);
    register!(table, "ListTransports" => transports::list_transports);
    register!(table, "GetTransport" => transports::get_transport);
    register!(table, "CreateTransport" => transports::create_transport);
    register!(table, "DeleteTransport" => transports::delete_transport);

    // Routing
    register!(table, "ListRoutingRules" => routing::list_routing_rules);
    register!(table, "GetRoutingRule" => routing::get_routing_rule);
    register!(table, "AddRoutingRule" => routing::add_routing_rule);
    register!(table, "SetRoutingRule" => routing::set_routing_rule);
    register!(table, "RemoveRoutingRule" => routing::remove_routing_rule);
    register!(table, "ListLoops" => routing::list_loops);

    Ok(table)
}

// ============================================================================
// Parameter extraction helpers
// ============================================================================

fn param<'a>(params: &'a Value, snake: &str, camel: &str) -> Option<&'a Value> {
    params
        .get(snake)
        .or_else(|| params.get(camel))
        .filter(|v| !v.is_null())
}

fn missing(snake: &str) -> NodeError {
    NodeError::invalid(format!("Missing required parameter: {}", snake))
}

/// Extract an optional string parameter, supporting both snake_case and camelCase.
pub(crate) fn get_str_param<'a>(params: &'a Value, snake: &str, camel: &str) -> Option<&'a str> {
    param(params, snake, camel).and_then(|v| v.as_str())
}

/// Extract a required string parameter or return an error.
pub(crate) fn require_str_param(
    params: &Value,
    snake: &str,
    camel: &str,
) -> meshnode_core::Result<String> {
    get_str_param(params, snake, camel)
        .map(String::from)
        .ok_or_else(|| missing(snake))
}

/// Extract an optional bool parameter, supporting both snake_case and camelCase.
pub(crate) fn get_bool_param(params: &Value, snake: &str, camel: &str) -> Option<bool> {
    param(params, snake, camel).and_then(|v| v.as_bool())
}

/// Extract an optional u64 parameter, supporting both snake_case and camelCase.
pub(crate) fn get_u64_param(params: &Value, snake: &str, camel: &str) -> Option<u64> {
    param(params, snake, camel).and_then(|v| v.as_u64())
}

/// Extract a required unsigned integer that must fit in `T`.
pub(crate) fn require_uint_param<T: TryFrom<u64>>(
    params: &Value,
    snake: &str,
    camel: &str,
) -> meshnode_core::Result<T> {
    let raw = get_u64_param(params, snake, camel).ok_or_else(|| missing(snake))?;
    T::try_from(raw).map_err(|_| NodeError::invalid(format!("{} out of range: {}", snake, raw)))
}

/// Extract a required, non-zero process id.
pub(crate) fn require_pid_param(params: &Value) -> meshnode_core::Result<ProcessId> {
    let raw: u16 = require_uint_param(params, "pid", "pid")?;
    ProcessId::try_from(raw)
}

/// Deserialize an optional structured parameter.
pub(crate) fn get_typed_param<T: DeserializeOwned>(
    params: &Value,
    snake: &str,
    camel: &str,
) -> meshnode_core::Result<Option<T>> {
    param(params, snake, camel)
        .map(|v| {
            serde_json::from_value(v.clone())
                .map_err(|e| NodeError::invalid(format!("Invalid parameter {}: {}", snake, e)))
        })
        .transpose()
}

/// Deserialize a required structured parameter.
pub(crate) fn require_typed_param<T: DeserializeOwned>(
    params: &Value,
    snake: &str,
    camel: &str,
) -> meshnode_core::Result<T> {
    get_typed_param(params, snake, camel)?.ok_or_else(|| missing(snake))
}

// ============================================================================
// HTTP endpoints
// ============================================================================

/// Health check endpoint.
pub async fn handle_health() -> impl IntoResponse {
    Json(json!({"status": "ok"}))
}

/// Main JSON-RPC handler.
pub async fn handle_rpc(
    State(state): State<Arc<AppState>>,
    Json(request): Json<JsonRpcRequest>,
) -> impl IntoResponse {
    let method = &request.method;
    let params = request.params.unwrap_or(Value::Object(Default::default()));
    let id = request.id.clone();

    debug!("RPC call: {}({:?})", method, params);

    let Some(handler) = state.methods.get(method) else {
        error!("Unknown RPC method: {}", method);
        return (
            StatusCode::OK,
            Json(JsonRpcResponse::error(
                id,
                METHOD_NOT_FOUND,
                format!("Method not found: {}", method),
            )),
        );
    };

    match handler(&state, &params).await {
        Ok(value) => (StatusCode::OK, Json(JsonRpcResponse::success(id, value))),
        Err(e) => {
            error!("RPC error for {}: {}", method, e);
            let code = e.to_rpc_error_code();
            (
                StatusCode::OK,
                Json(JsonRpcResponse::error(id, code, e.to_string())),
            )
        }
    }
}
