//! Routing rule and loop handlers.

use super::{require_typed_param, require_uint_param};
use crate::server::AppState;
use meshnode_core::{RouteId, Rule};
use serde_json::{json, Value};

pub async fn list_routing_rules(state: &AppState, _params: &Value) -> meshnode_core::Result<Value> {
    Ok(serde_json::to_value(state.gateway.routing_rules()?)?)
}

pub async fn get_routing_rule(state: &AppState, params: &Value) -> meshnode_core::Result<Value> {
    let route_id: RouteId = require_uint_param(params, "route_id", "routeId")?;
    Ok(serde_json::to_value(state.gateway.routing_rule(route_id)?)?)
}

pub async fn add_routing_rule(state: &AppState, params: &Value) -> meshnode_core::Result<Value> {
    let rule: Rule = require_typed_param(params, "rule", "rule")?;
    let route_id = state.gateway.add_routing_rule(rule)?;
    Ok(json!(route_id))
}

pub async fn set_routing_rule(state: &AppState, params: &Value) -> meshnode_core::Result<Value> {
    let route_id: RouteId = require_uint_param(params, "route_id", "routeId")?;
    let rule: Rule = require_typed_param(params, "rule", "rule")?;
    state.gateway.set_routing_rule(route_id, rule)?;
    Ok(Value::Null)
}

pub async fn remove_routing_rule(state: &AppState, params: &Value) -> meshnode_core::Result<Value> {
    let route_id: RouteId = require_uint_param(params, "route_id", "routeId")?;
    state.gateway.remove_routing_rule(route_id)?;
    Ok(Value::Null)
}

pub async fn list_loops(state: &AppState, _params: &Value) -> meshnode_core::Result<Value> {
    Ok(serde_json::to_value(state.gateway.loops()?)?)
}
