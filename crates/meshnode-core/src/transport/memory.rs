use super::{ManagedTransport, TransportManager};
use crate::error::{NodeError, Result};
use crate::identity::Identity;
use async_trait::async_trait;
use std::sync::{PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};
use std::time::Duration;
use tracing::{debug, info};
use uuid::Uuid;

/// Transport manager that keeps transports in memory.
///
/// Creating a transport only records it; no connection is made. An optional
/// dial delay simulates slow establishment.
pub struct InMemoryTransportManager {
    local: Identity,
    types: Vec<String>,
    dial_delay: Option<Duration>,
    transports: RwLock<Vec<ManagedTransport>>,
}

impl InMemoryTransportManager {
    pub fn new(local: Identity, types: Vec<String>) -> Self {
        Self {
            local,
            types,
            dial_delay: None,
            transports: RwLock::new(Vec::new()),
        }
    }

    pub fn with_dial_delay(mut self, delay: Duration) -> Self {
        self.dial_delay = Some(delay);
        self
    }

    fn read(&self) -> RwLockReadGuard<'_, Vec<ManagedTransport>> {
        self.transports.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, Vec<ManagedTransport>> {
        self.transports.write().unwrap_or_else(PoisonError::into_inner)
    }

    /// Track an externally established transport.
    pub fn insert(&self, transport: ManagedTransport) {
        self.write().push(transport);
    }

    /// Add traffic to a transport's counters.
    pub fn record_traffic(&self, id: Uuid, sent: u64, recv: u64) -> Result<()> {
        let mut transports = self.write();
        let tp = transports
            .iter_mut()
            .find(|t| t.id == id)
            .ok_or(NodeError::TransportNotFound { id })?;
        tp.log.sent_bytes += sent;
        tp.log.recv_bytes += recv;
        Ok(())
    }
}

#[async_trait]
impl TransportManager for InMemoryTransportManager {
    fn local(&self) -> Identity {
        self.local
    }

    fn factories(&self) -> Vec<String> {
        self.types.clone()
    }

    fn transports(&self) -> Vec<ManagedTransport> {
        self.read().clone()
    }

    fn transport(&self, id: Uuid) -> Option<ManagedTransport> {
        self.read().iter().find(|t| t.id == id).cloned()
    }

    async fn create_transport(
        &self,
        remote: Identity,
        transport_type: &str,
        public: bool,
    ) -> Result<ManagedTransport> {
        if !self.types.iter().any(|t| t == transport_type) {
            return Err(NodeError::Transport(format!(
                "transport type {} is not supported",
                transport_type
            )));
        }
        if remote.is_null() || remote == self.local {
            return Err(NodeError::Transport(format!(
                "cannot create transport to {}",
                remote
            )));
        }

        if let Some(delay) = self.dial_delay {
            debug!("Dialing {} over {} ({:?})", remote, transport_type, delay);
            tokio::time::sleep(delay).await;
        }

        let tp = ManagedTransport::new(
            Uuid::new_v4(),
            self.local,
            remote,
            transport_type,
            public,
        );
        self.write().push(tp.clone());
        info!("Created {} transport {} to {}", transport_type, tp.id, remote);
        Ok(tp)
    }

    fn delete_transport(&self, id: Uuid) -> Result<()> {
        let mut transports = self.write();
        let before = transports.len();
        transports.retain(|t| t.id != id);
        if transports.len() == before {
            return Err(NodeError::TransportNotFound { id });
        }
        info!("Deleted transport {}", id);
        Ok(())
    }
}
