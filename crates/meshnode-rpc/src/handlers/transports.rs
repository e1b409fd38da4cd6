//! Transport management handlers.

use super::{get_bool_param, get_typed_param, get_u64_param, require_str_param};
use crate::server::AppState;
use meshnode_core::{Identity, NodeError};
use serde_json::Value;
use std::time::Duration;
use uuid::Uuid;

fn require_transport_id(params: &Value) -> meshnode_core::Result<Uuid> {
    let raw = require_str_param(params, "id", "id")?;
    raw.parse()
        .map_err(|e| NodeError::invalid(format!("Invalid transport id {}: {}", raw, e)))
}

pub async fn list_transport_types(
    state: &AppState,
    _params: &Value,
) -> meshnode_core::Result<Value> {
    Ok(serde_json::to_value(state.gateway.transport_types())?)
}

pub async fn list_transports(state: &AppState, params: &Value) -> meshnode_core::Result<Value> {
    let filter_types: Option<Vec<String>> =
        get_typed_param(params, "filter_types", "filterTypes")?;
    let filter_identities: Option<Vec<Identity>> =
        get_typed_param(params, "filter_identities", "filterIdentities")?;
    let show_logs = get_bool_param(params, "show_logs", "showLogs").unwrap_or(false);

    let summaries = state.gateway.transports(
        filter_types.as_deref(),
        filter_identities.as_deref(),
        show_logs,
    );
    Ok(serde_json::to_value(summaries)?)
}

pub async fn get_transport(state: &AppState, params: &Value) -> meshnode_core::Result<Value> {
    let id = require_transport_id(params)?;
    Ok(serde_json::to_value(state.gateway.transport(id)?)?)
}

pub async fn create_transport(state: &AppState, params: &Value) -> meshnode_core::Result<Value> {
    let remote: Identity = require_str_param(params, "remote", "remote")?.parse()?;
    let transport_type = require_str_param(params, "transport_type", "transportType")?;
    let public = get_bool_param(params, "public", "public").unwrap_or(false);
    let timeout = get_u64_param(params, "timeout_secs", "timeoutSecs").map(Duration::from_secs);

    let summary = state
        .gateway
        .create_transport(remote, &transport_type, public, timeout)
        .await?;
    Ok(serde_json::to_value(summary)?)
}

pub async fn delete_transport(state: &AppState, params: &Value) -> meshnode_core::Result<Value> {
    let id = require_transport_id(params)?;
    state.gateway.delete_transport(id)?;
    Ok(Value::Null)
}
