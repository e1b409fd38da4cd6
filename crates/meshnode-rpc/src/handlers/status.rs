//! Node status handlers.

use crate::server::AppState;
use serde_json::Value;

pub async fn get_summary(state: &AppState, _params: &Value) -> meshnode_core::Result<Value> {
    let summary = state.gateway.summary();
    Ok(serde_json::to_value(summary)?)
}
