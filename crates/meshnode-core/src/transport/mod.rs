//! Transport manager collaborator.
//!
//! The control plane never dials anything itself. It lists, creates and
//! deletes transports through [`TransportManager`] and resolves which edge of
//! a transport is the remote node.

mod memory;

pub use memory::InMemoryTransportManager;

use crate::error::Result;
use crate::identity::Identity;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Traffic counters of one transport.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogEntry {
    pub sent_bytes: u64,
    pub recv_bytes: u64,
}

/// A transport between two nodes, as tracked by the manager.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ManagedTransport {
    pub id: Uuid,
    /// Both endpoints, ordered so the pair is independent of who dialed.
    pub edges: [Identity; 2],
    pub transport_type: String,
    pub public: bool,
    pub log: LogEntry,
}

impl ManagedTransport {
    pub fn new(id: Uuid, a: Identity, b: Identity, transport_type: &str, public: bool) -> Self {
        Self {
            id,
            edges: sorted_edges(a, b),
            transport_type: transport_type.to_string(),
            public,
            log: LogEntry::default(),
        }
    }
}

/// Order an edge pair.
pub fn sorted_edges(a: Identity, b: Identity) -> [Identity; 2] {
    if a <= b {
        [a, b]
    } else {
        [b, a]
    }
}

#[async_trait]
pub trait TransportManager: Send + Sync {
    /// Identity of this node.
    fn local(&self) -> Identity;

    /// The edge that is not this node, or `None` when this node is on neither side.
    fn remote(&self, edges: &[Identity; 2]) -> Option<Identity> {
        let local = self.local();
        match edges {
            [a, b] if *a == local => Some(*b),
            [a, b] if *b == local => Some(*a),
            _ => None,
        }
    }

    /// Names of the transport types this node can create.
    fn factories(&self) -> Vec<String>;

    /// Snapshot of all transports in creation order.
    fn transports(&self) -> Vec<ManagedTransport>;

    fn transport(&self, id: Uuid) -> Option<ManagedTransport>;

    async fn create_transport(
        &self,
        remote: Identity,
        transport_type: &str,
        public: bool,
    ) -> Result<ManagedTransport>;

    fn delete_transport(&self, id: Uuid) -> Result<()>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sorted_edges_is_symmetric() {
        let a = Identity::generate();
        let b = Identity::generate();
        assert_eq!(sorted_edges(a, b), sorted_edges(b, a));
    }
}
