//! Application and process management handlers.

use super::{
    get_typed_param, require_pid_param, require_str_param, require_typed_param,
    require_uint_param,
};
use crate::server::AppState;
use meshnode_core::Port;
use serde_json::{json, Value};
use tracing::info;

pub async fn list_applications(state: &AppState, _params: &Value) -> meshnode_core::Result<Value> {
    Ok(serde_json::to_value(state.gateway.list_apps())?)
}

pub async fn set_auto_start(state: &AppState, params: &Value) -> meshnode_core::Result<Value> {
    let app_name = require_str_param(params, "app_name", "appName")?;
    let auto_start: bool = require_typed_param(params, "auto_start", "autoStart")?;
    state.gateway.set_auto_start(&app_name, auto_start)?;
    Ok(Value::Null)
}

pub async fn start_process(state: &AppState, params: &Value) -> meshnode_core::Result<Value> {
    let app_name = require_str_param(params, "app_name", "appName")?;
    let args: Vec<String> = get_typed_param(params, "args", "args")?.unwrap_or_default();
    let port: Port = require_uint_param(params, "port", "port")?;

    let pid = state.gateway.start_process(&app_name, args, port).await?;
    info!("StartProcess: {} -> pid {} (port {})", app_name, pid, port);
    Ok(json!(pid))
}

pub async fn stop_process(state: &AppState, params: &Value) -> meshnode_core::Result<Value> {
    let pid = require_pid_param(params)?;
    state.gateway.stop_process(pid).await?;
    info!("StopProcess: pid {}", pid);
    Ok(Value::Null)
}

pub async fn list_processes(state: &AppState, _params: &Value) -> meshnode_core::Result<Value> {
    Ok(serde_json::to_value(state.gateway.list_processes())?)
}
