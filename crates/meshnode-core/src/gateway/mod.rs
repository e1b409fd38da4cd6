//! Management gateway.
//!
//! Translates management requests into calls against the node's process
//! manager and collaborators. Results and collaborator errors flow back
//! unchanged; the only logic here is summary building, transport filtering
//! and loop derivation.

mod filter;
mod types;

pub use filter::{identity_included, type_included};
pub use types::{LoopInfo, RoutingEntry, Summary, TransportSummary};

use crate::config::NodeDefaults;
use crate::error::{NodeError, Result};
use crate::identity::Identity;
use crate::node::Node;
use crate::process::{AppMeta, Port, ProcessId, ProcessInfo};
use crate::routing::{RouteId, Rule, RuleType};
use crate::transport::{ManagedTransport, TransportManager};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};
use uuid::Uuid;

/// Build the summary of one transport.
///
/// An unresolvable remote edge yields an empty summary instead of an error.
pub fn transport_summary(
    tm: &dyn TransportManager,
    tp: &ManagedTransport,
    include_logs: bool,
) -> TransportSummary {
    let Some(remote) = tm.remote(&tp.edges) else {
        warn!("Transport {} has no resolvable remote edge", tp.id);
        return TransportSummary::default();
    };
    TransportSummary {
        id: tp.id,
        local: tm.local(),
        remote,
        transport_type: tp.transport_type.clone(),
        log: include_logs.then_some(tp.log),
    }
}

#[derive(Clone)]
pub struct Gateway {
    node: Arc<Node>,
}

impl Gateway {
    pub fn new(node: Arc<Node>) -> Self {
        Self { node }
    }

    pub fn node(&self) -> &Arc<Node> {
        &self.node
    }

    // ========================================
    // Node summary
    // ========================================

    pub fn summary(&self) -> Summary {
        let tm = self.node.transports();
        let transports = tm
            .transports()
            .iter()
            .map(|tp| transport_summary(tm.as_ref(), tp, false))
            .collect();

        Summary {
            local_identity: self.node.identity(),
            node_version: self.node.version().to_string(),
            app_protocol_version: NodeDefaults::APP_PROTOCOL_VERSION.to_string(),
            processes: self.node.processes().list_processes(),
            transports,
            routes_count: self.node.routing().count(),
        }
    }

    // ========================================
    // Applications and processes
    // ========================================

    pub fn list_apps(&self) -> Vec<AppMeta> {
        self.node.apps()
    }

    pub async fn start_process(
        &self,
        app_name: &str,
        args: Vec<String>,
        port: Port,
    ) -> Result<ProcessId> {
        if app_name.is_empty() {
            return Err(NodeError::invalid("app_name must not be empty"));
        }
        self.node.start_process(app_name, args, port).await
    }

    pub async fn stop_process(&self, pid: ProcessId) -> Result<()> {
        self.node.stop_process(pid).await
    }

    pub fn list_processes(&self) -> Vec<ProcessInfo> {
        self.node.processes().list_processes()
    }

    pub fn set_auto_start(&self, app_name: &str, auto_start: bool) -> Result<()> {
        self.node.set_auto_start(app_name, auto_start)
    }

    // ========================================
    // Transports
    // ========================================

    pub fn transport_types(&self) -> Vec<String> {
        self.node.transports().factories()
    }

    /// Transports passing both filters, in creation order.
    ///
    /// A transport whose remote edge cannot be resolved is skipped and the
    /// walk continues with the next one; it never cuts the listing short.
    pub fn transports(
        &self,
        filter_types: Option<&[String]>,
        filter_identities: Option<&[Identity]>,
        show_logs: bool,
    ) -> Vec<TransportSummary> {
        let tm = self.node.transports();
        let local = tm.local();
        tm.transports()
            .iter()
            .filter(|tp| {
                let Some(remote) = tm.remote(&tp.edges) else {
                    debug!("Skipping transport {} with unresolved remote", tp.id);
                    return false;
                };
                type_included(filter_types, &tp.transport_type)
                    && identity_included(filter_identities, &local, &remote)
            })
            .map(|tp| transport_summary(tm.as_ref(), tp, show_logs))
            .collect()
    }

    pub fn transport(&self, id: Uuid) -> Result<TransportSummary> {
        let tm = self.node.transports();
        let tp = tm
            .transport(id)
            .ok_or(NodeError::TransportNotFound { id })?;
        Ok(transport_summary(tm.as_ref(), &tp, true))
    }

    /// Create a transport, bounded by `timeout` when one is given.
    pub async fn create_transport(
        &self,
        remote: Identity,
        transport_type: &str,
        public: bool,
        timeout: Option<Duration>,
    ) -> Result<TransportSummary> {
        let tm = self.node.transports();
        let create = tm.create_transport(remote, transport_type, public);
        let tp = match timeout.filter(|t| !t.is_zero()) {
            Some(limit) => tokio::time::timeout(limit, create)
                .await
                .map_err(|_| NodeError::Timeout(limit))??,
            None => create.await?,
        };
        Ok(transport_summary(tm.as_ref(), &tp, false))
    }

    pub fn delete_transport(&self, id: Uuid) -> Result<()> {
        self.node.transports().delete_transport(id)
    }

    // ========================================
    // Routing rules
    // ========================================

    pub fn routing_rules(&self) -> Result<Vec<RoutingEntry>> {
        Ok(self
            .node
            .routing()
            .range_rules()?
            .into_iter()
            .map(|(route_id, rule)| RoutingEntry { route_id, rule })
            .collect())
    }

    pub fn routing_rule(&self, route_id: RouteId) -> Result<Rule> {
        self.node.routing().rule(route_id)
    }

    pub fn add_routing_rule(&self, rule: Rule) -> Result<RouteId> {
        self.node.routing().add_rule(rule)
    }

    pub fn set_routing_rule(&self, route_id: RouteId, rule: Rule) -> Result<()> {
        self.node.routing().set_rule(route_id, rule)
    }

    pub fn remove_routing_rule(&self, route_id: RouteId) -> Result<()> {
        self.node.routing().delete_rules(&[route_id])
    }

    // ========================================
    // Loops
    // ========================================

    /// Pair every application rule with the rule its route id points at.
    ///
    /// Fails as a whole if any application rule dangles.
    pub fn loops(&self) -> Result<Vec<LoopInfo>> {
        let rt = self.node.routing();
        rt.range_rules()?
            .into_iter()
            .filter(|(_, rule)| rule.rule_type() == RuleType::App)
            .map(|(_, app_rule)| -> Result<LoopInfo> {
                let fwd_rule = rt.rule(app_rule.route_id())?;
                Ok(LoopInfo { app_rule, fwd_rule })
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{AppConfig, NodeConfig};
    use crate::process::MemoryExecutorFactory;
    use crate::routing::InMemoryRoutingTable;
    use crate::transport::InMemoryTransportManager;

    fn app(name: &str, version: &str) -> AppConfig {
        AppConfig {
            app: name.into(),
            version: version.into(),
            protocol_version: NodeDefaults::APP_PROTOCOL_VERSION.into(),
            port: 0,
            args: vec![],
            auto_start: false,
        }
    }

    struct Fixture {
        gateway: Gateway,
        tm: Arc<InMemoryTransportManager>,
        local: Identity,
    }

    fn fixture(apps: Vec<AppConfig>, dial_delay: Option<Duration>) -> Fixture {
        let local = Identity::generate();
        let mut tm = InMemoryTransportManager::new(local, vec!["messaging".into(), "tcp".into()]);
        if let Some(delay) = dial_delay {
            tm = tm.with_dial_delay(delay);
        }
        let tm = Arc::new(tm);
        let config = NodeConfig {
            local_identity: local,
            apps,
            ..Default::default()
        };
        let node = Node::new(
            config,
            Arc::new(MemoryExecutorFactory::new()),
            tm.clone(),
            Arc::new(InMemoryRoutingTable::new()),
        )
        .unwrap();
        Fixture {
            gateway: Gateway::new(Arc::new(node)),
            tm,
            local,
        }
    }

    fn app_rule(resp_route_id: RouteId) -> Rule {
        Rule::App {
            resp_route_id,
            remote: Identity::generate(),
            remote_port: 2,
            local_port: 1,
        }
    }

    fn fwd_rule() -> Rule {
        Rule::Forward {
            next_route_id: 0,
            next_transport: Uuid::new_v4(),
        }
    }

    #[test]
    fn test_list_apps_sorted() {
        let fx = fixture(vec![app("foo", "1.0"), app("bar", "2.0")], None);
        let apps = fx.gateway.list_apps();
        assert_eq!(apps.len(), 2);
        assert_eq!(apps[0].app_name, "bar");
        assert_eq!(apps[0].app_version, "2.0");
        assert_eq!(apps[1].app_name, "foo");
        assert_eq!(apps[1].app_version, "1.0");
    }

    #[tokio::test]
    async fn test_process_scenario() {
        let fx = fixture(vec![app("foo", "1.0")], None);
        let gw = &fx.gateway;

        let pid = gw.start_process("foo", vec![], 10).await.unwrap();
        assert_eq!(pid.get(), 1);

        let err = gw.start_process("foo", vec![], 10).await.unwrap_err();
        assert!(matches!(err, NodeError::PortConflict { port: 10, .. }));

        let procs = gw.list_processes();
        assert_eq!(procs.len(), 1);
        assert_eq!(procs[0].pid, pid);
        assert_eq!(procs[0].meta.app_name, "foo");

        gw.stop_process(pid).await.unwrap();
        assert!(gw.list_processes().is_empty());

        let again = gw.start_process("foo", vec![], 10).await.unwrap();
        assert_ne!(again, pid);

        assert!(gw.start_process("", vec![], 0).await.is_err());
    }

    #[tokio::test]
    async fn test_transport_filters() {
        let fx = fixture(vec![], None);
        let gw = &fx.gateway;
        let r1 = Identity::generate();
        let r2 = Identity::generate();

        gw.create_transport(r1, "messaging", false, None).await.unwrap();
        gw.create_transport(r2, "tcp", false, None).await.unwrap();

        assert_eq!(gw.transports(None, None, false).len(), 2);

        let tcp = vec!["tcp".to_string()];
        let only_tcp = gw.transports(Some(tcp.as_slice()), None, false);
        assert_eq!(only_tcp.len(), 1);
        assert_eq!(only_tcp[0].remote, r2);

        let only_r1 = gw.transports(None, Some([r1].as_slice()), false);
        assert_eq!(only_r1.len(), 1);
        assert_eq!(only_r1[0].transport_type, "messaging");

        // The local identity matches every transport.
        assert_eq!(gw.transports(None, Some([fx.local].as_slice()), false).len(), 2);

        assert!(gw
            .transports(Some(tcp.as_slice()), Some([r1].as_slice()), false)
            .is_empty());
    }

    #[tokio::test]
    async fn test_transport_logs_and_lookup() {
        let fx = fixture(vec![], None);
        let gw = &fx.gateway;
        let created = gw
            .create_transport(Identity::generate(), "messaging", true, None)
            .await
            .unwrap();
        assert!(created.log.is_none());
        fx.tm.record_traffic(created.id, 5, 7).unwrap();

        let listed = gw.transports(None, None, true);
        assert_eq!(listed[0].log.unwrap().sent_bytes, 5);
        assert!(gw.transports(None, None, false)[0].log.is_none());

        let fetched = gw.transport(created.id).unwrap();
        assert_eq!(fetched.log.unwrap().recv_bytes, 7);

        gw.delete_transport(created.id).unwrap();
        assert!(gw.transport(created.id).unwrap_err().is_not_found());
    }

    #[tokio::test]
    async fn test_unresolved_remote_degrades() {
        let fx = fixture(vec![], None);
        let gw = &fx.gateway;
        gw.create_transport(Identity::generate(), "messaging", false, None)
            .await
            .unwrap();
        let foreign = ManagedTransport::new(
            Uuid::new_v4(),
            Identity::generate(),
            Identity::generate(),
            "messaging",
            false,
        );
        fx.tm.insert(foreign.clone());

        let summary = gw.summary();
        assert_eq!(summary.transports.len(), 2);
        assert!(!summary.transports[0].is_empty());
        assert!(summary.transports[1].is_empty());

        // Listing skips it; a direct lookup returns the empty summary.
        assert_eq!(gw.transports(None, None, false).len(), 1);
        assert!(gw.transport(foreign.id).unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_listing_continues_past_unresolved_remote() {
        let fx = fixture(vec![], None);
        let gw = &fx.gateway;
        fx.tm.insert(ManagedTransport::new(
            Uuid::new_v4(),
            Identity::generate(),
            Identity::generate(),
            "messaging",
            false,
        ));
        let later = gw
            .create_transport(Identity::generate(), "messaging", false, None)
            .await
            .unwrap();

        let listed = gw.transports(None, None, false);
        assert_eq!(listed, vec![later]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_create_transport_timeout() {
        let fx = fixture(vec![], Some(Duration::from_secs(30)));
        let gw = &fx.gateway;

        let err = gw
            .create_transport(
                Identity::generate(),
                "messaging",
                false,
                Some(Duration::from_secs(1)),
            )
            .await
            .unwrap_err();
        assert!(matches!(err, NodeError::Timeout(_)));
        assert!(gw.transports(None, None, false).is_empty());

        // A zero timeout means no deadline.
        gw.create_transport(
            Identity::generate(),
            "messaging",
            false,
            Some(Duration::ZERO),
        )
        .await
        .unwrap();
        assert_eq!(gw.transports(None, None, false).len(), 1);
    }

    #[tokio::test]
    async fn test_create_transport_error_passes_through() {
        let fx = fixture(vec![], None);
        let err = fx
            .gateway
            .create_transport(Identity::generate(), "udp", false, None)
            .await
            .unwrap_err();
        assert!(matches!(err, NodeError::Transport(msg) if msg.contains("udp")));
    }

    #[test]
    fn test_routing_pass_through() {
        let fx = fixture(vec![], None);
        let gw = &fx.gateway;

        let id = gw.add_routing_rule(fwd_rule()).unwrap();
        assert_eq!(id, 1);
        let replacement = fwd_rule();
        gw.set_routing_rule(id, replacement.clone()).unwrap();
        assert_eq!(gw.routing_rule(id).unwrap(), replacement);

        let entries = gw.routing_rules().unwrap();
        assert_eq!(entries, vec![RoutingEntry { route_id: 1, rule: replacement }]);
        assert_eq!(gw.summary().routes_count, 1);

        gw.remove_routing_rule(id).unwrap();
        assert!(gw.routing_rule(id).unwrap_err().is_not_found());
    }

    #[test]
    fn test_loops_join_app_and_forward_rules() {
        let fx = fixture(vec![], None);
        let gw = &fx.gateway;

        let fwd = fwd_rule();
        let fwd_id = gw.add_routing_rule(fwd.clone()).unwrap();
        let app = app_rule(fwd_id);
        gw.add_routing_rule(app.clone()).unwrap();

        let loops = gw.loops().unwrap();
        assert_eq!(loops, vec![LoopInfo { app_rule: app, fwd_rule: fwd }]);
    }

    #[test]
    fn test_loops_fail_on_dangling_route() {
        let fx = fixture(vec![], None);
        let gw = &fx.gateway;

        let fwd_id = gw.add_routing_rule(fwd_rule()).unwrap();
        gw.add_routing_rule(app_rule(fwd_id)).unwrap();
        gw.add_routing_rule(app_rule(999)).unwrap();

        let err = gw.loops().unwrap_err();
        assert!(matches!(err, NodeError::RouteNotFound { route_id: 999 }));
    }

    #[tokio::test]
    async fn test_summary() {
        let fx = fixture(vec![app("foo", "1.0")], None);
        let gw = &fx.gateway;
        gw.start_process("foo", vec![], 3).await.unwrap();

        let summary = gw.summary();
        assert_eq!(summary.local_identity, fx.local);
        assert_eq!(summary.node_version, NodeDefaults::NODE_VERSION);
        assert_eq!(summary.app_protocol_version, "0.0.1");
        assert_eq!(summary.processes.len(), 1);
        assert!(summary.transports.is_empty());
        assert_eq!(summary.routes_count, 0);
    }

    #[tokio::test]
    async fn test_set_auto_start() {
        let fx = fixture(vec![app("foo", "1.0")], None);
        fx.gateway.set_auto_start("foo", true).unwrap();
        assert!(fx.gateway.node().config().app("foo").unwrap().auto_start);
    }
}
