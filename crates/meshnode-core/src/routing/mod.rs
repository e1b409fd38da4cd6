//! Routing table collaborator.
//!
//! Rules are opaque to the control plane apart from their kind and the route
//! id they point at, which is enough to pair application rules with their
//! forwarding rules.

mod memory;

pub use memory::InMemoryRoutingTable;

use crate::error::Result;
use crate::identity::Identity;
use crate::process::Port;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Key of a routing-table entry. Zero is never assigned.
pub type RouteId = u32;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RuleType {
    App,
    Forward,
}

/// One routing-table entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Rule {
    /// Delivers traffic to a local application.
    App {
        /// Route the application's responses leave through.
        resp_route_id: RouteId,
        remote: Identity,
        remote_port: Port,
        local_port: Port,
    },
    /// Forwards traffic to the next hop.
    Forward {
        next_route_id: RouteId,
        next_transport: Uuid,
    },
}

impl Rule {
    pub fn rule_type(&self) -> RuleType {
        match self {
            Rule::App { .. } => RuleType::App,
            Rule::Forward { .. } => RuleType::Forward,
        }
    }

    /// Route id this rule points at.
    pub fn route_id(&self) -> RouteId {
        match self {
            Rule::App { resp_route_id, .. } => *resp_route_id,
            Rule::Forward { next_route_id, .. } => *next_route_id,
        }
    }
}

pub trait RoutingTable: Send + Sync {
    /// Store a rule under a freshly allocated route id.
    fn add_rule(&self, rule: Rule) -> Result<RouteId>;

    /// Store a rule under `route_id`, replacing any previous rule.
    fn set_rule(&self, route_id: RouteId, rule: Rule) -> Result<()>;

    fn rule(&self, route_id: RouteId) -> Result<Rule>;

    /// Remove rules. Ids without a rule are ignored.
    fn delete_rules(&self, route_ids: &[RouteId]) -> Result<()>;

    /// All rules in ascending route-id order.
    fn range_rules(&self) -> Result<Vec<(RouteId, Rule)>>;

    fn count(&self) -> usize;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rule_wire_format() {
        let rule = Rule::Forward {
            next_route_id: 7,
            next_transport: Uuid::nil(),
        };
        let json = serde_json::to_value(&rule).unwrap();
        assert_eq!(json["type"], "forward");
        assert_eq!(json["next_route_id"], 7);
        assert_eq!(rule.route_id(), 7);
        assert_eq!(rule.rule_type(), RuleType::Forward);
    }

    #[test]
    fn test_app_rule_points_at_response_route() {
        let rule: Rule = serde_json::from_value(serde_json::json!({
            "type": "app",
            "resp_route_id": 3,
            "remote": "00".repeat(33),
            "remote_port": 2,
            "local_port": 1,
        }))
        .unwrap();
        assert_eq!(rule.rule_type(), RuleType::App);
        assert_eq!(rule.route_id(), 3);
    }
}
