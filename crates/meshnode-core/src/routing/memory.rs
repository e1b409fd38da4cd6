use super::{RouteId, Rule, RoutingTable};
use crate::error::{NodeError, Result};
use std::collections::BTreeMap;
use std::sync::{Mutex, MutexGuard, PoisonError};
use tracing::debug;

#[derive(Default)]
struct Table {
    next_id: RouteId,
    rules: BTreeMap<RouteId, Rule>,
}

/// Routing table kept in a sorted map.
#[derive(Default)]
pub struct InMemoryRoutingTable {
    table: Mutex<Table>,
}

impl InMemoryRoutingTable {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, Table> {
        self.table.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl RoutingTable for InMemoryRoutingTable {
    fn add_rule(&self, rule: Rule) -> Result<RouteId> {
        let mut table = self.lock();
        let mut candidate = table.next_id.max(1);
        while table.rules.contains_key(&candidate) {
            candidate = candidate
                .checked_add(1)
                .ok_or_else(|| NodeError::Routing("route ids exhausted".into()))?;
        }
        table.next_id = candidate.saturating_add(1);
        table.rules.insert(candidate, rule);
        debug!("Added routing rule {}", candidate);
        Ok(candidate)
    }

    fn set_rule(&self, route_id: RouteId, rule: Rule) -> Result<()> {
        if route_id == 0 {
            return Err(NodeError::invalid("route id must be non-zero"));
        }
        self.lock().rules.insert(route_id, rule);
        debug!("Set routing rule {}", route_id);
        Ok(())
    }

    fn rule(&self, route_id: RouteId) -> Result<Rule> {
        self.lock()
            .rules
            .get(&route_id)
            .cloned()
            .ok_or(NodeError::RouteNotFound { route_id })
    }

    fn delete_rules(&self, route_ids: &[RouteId]) -> Result<()> {
        let mut table = self.lock();
        for id in route_ids {
            table.rules.remove(id);
        }
        debug!("Deleted routing rules {:?}", route_ids);
        Ok(())
    }

    fn range_rules(&self) -> Result<Vec<(RouteId, Rule)>> {
        Ok(self
            .lock()
            .rules
            .iter()
            .map(|(id, rule)| (*id, rule.clone()))
            .collect())
    }

    fn count(&self) -> usize {
        self.lock().rules.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    fn forward(next: RouteId) -> Rule {
        Rule::Forward {
            next_route_id: next,
            next_transport: Uuid::nil(),
        }
    }

    #[test]
    fn test_add_allocates_from_one() {
        let rt = InMemoryRoutingTable::new();
        assert_eq!(rt.add_rule(forward(9)).unwrap(), 1);
        assert_eq!(rt.add_rule(forward(9)).unwrap(), 2);
        assert_eq!(rt.count(), 2);
    }

    #[test]
    fn test_add_skips_ids_taken_by_set() {
        let rt = InMemoryRoutingTable::new();
        rt.set_rule(1, forward(0)).unwrap();
        rt.set_rule(2, forward(0)).unwrap();
        assert_eq!(rt.add_rule(forward(0)).unwrap(), 3);
    }

    #[test]
    fn test_set_replaces_and_rejects_zero() {
        let rt = InMemoryRoutingTable::new();
        let id = rt.add_rule(forward(1)).unwrap();
        rt.set_rule(id, forward(2)).unwrap();
        assert_eq!(rt.rule(id).unwrap(), forward(2));
        assert!(rt.set_rule(0, forward(2)).is_err());
    }

    #[test]
    fn test_missing_rule_is_not_found() {
        let rt = InMemoryRoutingTable::new();
        assert!(rt.rule(5).unwrap_err().is_not_found());
    }

    #[test]
    fn test_range_is_ordered_and_delete_ignores_missing() {
        let rt = InMemoryRoutingTable::new();
        rt.set_rule(30, forward(0)).unwrap();
        rt.set_rule(10, forward(0)).unwrap();
        rt.set_rule(20, forward(0)).unwrap();

        rt.delete_rules(&[20, 99]).unwrap();
        let ids: Vec<RouteId> = rt.range_rules().unwrap().iter().map(|(id, _)| *id).collect();
        assert_eq!(ids, vec![10, 30]);
    }
}
