//! The node context.
//!
//! A [`Node`] owns everything the control plane operates on: the local
//! identity, the registry of installed applications, the process manager and
//! the transport and routing collaborators.

use crate::config::{protocol_compatible, NodeConfig, NodeDefaults};
use crate::error::{NodeError, Result};
use crate::identity::Identity;
use crate::process::{AppMeta, ExecConfig, ExecutorFactory, Port, ProcessId, ProcessManager};
use crate::routing::{InMemoryRoutingTable, RoutingTable};
use crate::transport::{InMemoryTransportManager, TransportManager};
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::{Arc, PoisonError, RwLock};
use tracing::{info, warn};

pub struct Node {
    identity: Identity,
    config: RwLock<NodeConfig>,
    config_path: Option<PathBuf>,
    apps: BTreeMap<String, AppMeta>,
    procs: ProcessManager,
    executors: Arc<dyn ExecutorFactory>,
    transports: Arc<dyn TransportManager>,
    routing: Arc<dyn RoutingTable>,
}

impl Node {
    /// Build a node from its configuration and collaborators.
    ///
    /// A null identity in `config` is replaced by a generated one.
    pub fn new(
        mut config: NodeConfig,
        executors: Arc<dyn ExecutorFactory>,
        transports: Arc<dyn TransportManager>,
        routing: Arc<dyn RoutingTable>,
    ) -> Result<Self> {
        config.validate()?;
        if config.local_identity.is_null() {
            config.local_identity = Identity::generate();
        }
        let identity = config.local_identity;

        let apps = config
            .apps
            .iter()
            .map(|app| {
                let meta = AppMeta {
                    app_name: app.app.clone(),
                    app_version: app.version.clone(),
                    protocol_version: app.protocol_version.clone(),
                    host: identity,
                };
                (app.app.clone(), meta)
            })
            .collect();

        Ok(Self {
            identity,
            config: RwLock::new(config),
            config_path: None,
            apps,
            procs: ProcessManager::new(),
            executors,
            transports,
            routing,
        })
    }

    /// Node with in-memory transport and routing collaborators.
    pub fn standalone(config: NodeConfig, executors: Arc<dyn ExecutorFactory>) -> Result<Self> {
        let mut config = config;
        if config.local_identity.is_null() {
            config.local_identity = Identity::generate();
        }
        let transports = Arc::new(InMemoryTransportManager::new(
            config.local_identity,
            config.transport_types.clone(),
        ));
        Self::new(
            config,
            executors,
            transports,
            Arc::new(InMemoryRoutingTable::new()),
        )
    }

    /// Persist configuration changes to `path`.
    pub fn with_config_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.config_path = Some(path.into());
        self
    }

    pub fn identity(&self) -> Identity {
        self.identity
    }

    pub fn version(&self) -> &'static str {
        NodeDefaults::NODE_VERSION
    }

    pub fn processes(&self) -> &ProcessManager {
        &self.procs
    }

    pub fn transports(&self) -> &Arc<dyn TransportManager> {
        &self.transports
    }

    pub fn routing(&self) -> &Arc<dyn RoutingTable> {
        &self.routing
    }

    /// Installed applications, sorted by name.
    pub fn apps(&self) -> Vec<AppMeta> {
        self.apps.values().cloned().collect()
    }

    /// Start an instance of an installed application.
    pub async fn start_process(
        &self,
        app_name: &str,
        args: Vec<String>,
        port: Port,
    ) -> Result<ProcessId> {
        let meta = self.apps.get(app_name).ok_or_else(|| NodeError::AppNotFound {
            name: app_name.to_string(),
        })?;
        if !protocol_compatible(&meta.protocol_version)? {
            return Err(NodeError::invalid(format!(
                "{} speaks protocol {}, node supports {}",
                app_name,
                meta.protocol_version,
                NodeDefaults::APP_PROTOCOL_VERSION
            )));
        }

        let exec_config = {
            let config = self.read_config();
            ExecConfig {
                bin_loc: config.apps_dir.join(app_name),
                work_dir: config.local_dir.join(app_name),
                args,
            }
        };
        let executor = self.executors.create(meta, &exec_config)?;
        let process = self.procs.run_process(port, executor).await?;
        Ok(process.pid())
    }

    pub async fn stop_process(&self, pid: ProcessId) -> Result<()> {
        self.procs.stop_process(pid).await
    }

    /// Start every application flagged for auto-start. Returns how many started.
    pub async fn start_auto_apps(&self) -> usize {
        let auto: Vec<_> = self
            .read_config()
            .apps
            .iter()
            .filter(|a| a.auto_start)
            .cloned()
            .collect();

        let mut started = 0;
        for app in auto {
            match self.start_process(&app.app, app.args.clone(), app.port).await {
                Ok(pid) => {
                    info!("Auto-started {} as pid {} on port {}", app.app, pid, app.port);
                    started += 1;
                }
                Err(e) => warn!("Failed to auto-start {}: {}", app.app, e),
            }
        }
        started
    }

    /// Change an application's auto-start flag and persist it.
    ///
    /// The file is written under the config lock; memory only changes once
    /// the write succeeds.
    pub fn set_auto_start(&self, app_name: &str, auto_start: bool) -> Result<()> {
        {
            let mut config = self.config.write().unwrap_or_else(PoisonError::into_inner);
            let mut updated = config.clone();
            let app = updated
                .apps
                .iter_mut()
                .find(|a| a.app == app_name)
                .ok_or_else(|| NodeError::AppNotFound {
                    name: app_name.to_string(),
                })?;
            app.auto_start = auto_start;
            updated.validate()?;
            if let Some(path) = &self.config_path {
                updated.save(path)?;
            }
            *config = updated;
        }
        info!("Set auto_start={} for {}", auto_start, app_name);
        Ok(())
    }

    /// Current configuration.
    pub fn config(&self) -> NodeConfig {
        self.read_config().clone()
    }

    /// Stop every running process.
    pub async fn shutdown(&self) {
        let stopped = self.procs.stop_all().await;
        info!("Node shut down, stopped {} processes", stopped);
    }

    fn read_config(&self) -> std::sync::RwLockReadGuard<'_, NodeConfig> {
        self.config.read().unwrap_or_else(PoisonError::into_inner)
    }
}
