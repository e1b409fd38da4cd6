//! Result types returned to the remote manager.

use crate::identity::Identity;
use crate::process::ProcessInfo;
use crate::routing::{RouteId, Rule};
use crate::transport::LogEntry;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Summary of one transport.
///
/// All fields are empty when the transport's remote edge could not be
/// resolved.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransportSummary {
    pub id: Uuid,
    pub local: Identity,
    pub remote: Identity,
    pub transport_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub log: Option<LogEntry>,
}

impl TransportSummary {
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }
}

/// Node health and introspection snapshot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Summary {
    pub local_identity: Identity,
    pub node_version: String,
    pub app_protocol_version: String,
    pub processes: Vec<ProcessInfo>,
    pub transports: Vec<TransportSummary>,
    pub routes_count: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoutingEntry {
    pub route_id: RouteId,
    pub rule: Rule,
}

/// An application rule paired with the forwarding rule it points at.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoopInfo {
    pub app_rule: Rule,
    pub fwd_rule: Rule,
}
