//! Process identifier allocation and lifecycle tracking.
//!
//! All bookkeeping lives behind one mutex. The lock is only held for the
//! short reserve/commit/lookup steps; executor start and stop run outside it
//! so a slow application never stalls unrelated calls.

use super::executor::Executor;
use super::types::{Port, ProcessContext, ProcessId, ProcessInfo};
use crate::error::{NodeError, Result};
use std::collections::{BTreeMap, HashMap};
use std::ops::RangeInclusive;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tracing::{debug, info, warn};

/// Number of distinct non-zero process identifiers.
pub const MAX_PROCESSES: usize = u16::MAX as usize;

/// Ports handed out by [`ProcessManager::alloc_port`].
pub const EPHEMERAL_PORTS: RangeInclusive<Port> = 49152..=u16::MAX;

/// Handle to a process started by the manager.
#[derive(Clone)]
pub struct AppProcess {
    pid: ProcessId,
    port: Port,
    executor: Arc<dyn Executor>,
}

impl AppProcess {
    pub fn pid(&self) -> ProcessId {
        self.pid
    }

    pub fn port(&self) -> Port {
        self.port
    }

    pub fn executor(&self) -> &Arc<dyn Executor> {
        &self.executor
    }

    fn info(&self) -> ProcessInfo {
        ProcessInfo {
            pid: self.pid,
            port: self.port,
            exec_config: self.executor.config().clone(),
            meta: self.executor.meta().clone(),
        }
    }
}

impl std::fmt::Debug for AppProcess {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppProcess")
            .field("pid", &self.pid)
            .field("port", &self.port)
            .field("app", &self.executor.meta().app_name)
            .finish()
    }
}

/// Lifecycle of one record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProcessState {
    /// Identifier and port reserved, executor still starting.
    Starting,
    Running,
    /// Stop requested, waiting for the executor to acknowledge.
    Stopping,
    Stopped,
}

impl ProcessState {
    /// Whether the record still claims its identifier and port.
    fn is_live(self) -> bool {
        !matches!(self, ProcessState::Stopped)
    }

    /// Whether the record is visible to listings and lookups.
    fn is_listed(self) -> bool {
        matches!(self, ProcessState::Running | ProcessState::Stopping)
    }
}

struct ProcessRecord {
    process: AppProcess,
    state: ProcessState,
    /// Ephemeral ports allocated to the process after it started.
    extra_ports: Vec<Port>,
}

#[derive(Default)]
struct Inner {
    last_pid: u16,
    last_ephemeral: Port,
    records: BTreeMap<ProcessId, ProcessRecord>,
    ports: HashMap<Port, ProcessId>,
}

impl Inner {
    fn is_live(&self, pid: ProcessId) -> bool {
        self.records
            .get(&pid)
            .map(|r| r.state.is_live())
            .unwrap_or(false)
    }

    /// Live process currently bound to `port`, if any.
    fn port_owner(&self, port: Port) -> Option<ProcessId> {
        let pid = *self.ports.get(&port)?;
        self.records
            .get(&pid)
            .filter(|r| {
                r.state.is_live() && (r.process.port == port || r.extra_ports.contains(&port))
            })
            .map(|_| pid)
    }

    /// Cyclic scan of the ephemeral range for a port nobody holds.
    fn next_free_port(&mut self) -> Result<Port> {
        let (first, last) = (*EPHEMERAL_PORTS.start(), *EPHEMERAL_PORTS.end());
        let span = usize::from(last - first) + 1;
        let mut candidate = self.last_ephemeral;
        for _ in 0..span {
            candidate = if candidate < first || candidate >= last {
                first
            } else {
                candidate + 1
            };
            if self.port_owner(candidate).is_none() {
                self.last_ephemeral = candidate;
                return Ok(candidate);
            }
        }
        Err(NodeError::PortsExhausted(span))
    }

    /// Cyclic scan from the last issued identifier, skipping zero and live ids.
    fn next_free_pid(&mut self) -> Result<ProcessId> {
        let mut candidate = self.last_pid;
        for _ in 0..MAX_PROCESSES {
            candidate = candidate.wrapping_add(1);
            if candidate == 0 {
                candidate = 1;
            }
            if let Some(pid) = ProcessId::new(candidate) {
                if !self.is_live(pid) {
                    self.last_pid = candidate;
                    return Ok(pid);
                }
            }
        }
        Err(NodeError::CapacityExhausted(MAX_PROCESSES))
    }

    fn release(&mut self, pid: ProcessId, port: Port) {
        self.records.remove(&pid);
        if port != 0 && self.ports.get(&port) == Some(&pid) {
            self.ports.remove(&port);
        }
    }
}

/// Tracks application processes running on the node.
#[derive(Clone, Default)]
pub struct ProcessManager {
    inner: Arc<Mutex<Inner>>,
}

impl ProcessManager {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Allocate an identifier, bind `port` and start `executor`.
    ///
    /// Fails with [`NodeError::PortConflict`] when a live process holds a
    /// non-zero `port`, and with [`NodeError::CapacityExhausted`] when every
    /// identifier is taken. Nothing is committed unless the executor starts.
    pub async fn run_process(&self, port: Port, executor: Arc<dyn Executor>) -> Result<AppProcess> {
        let process = {
            let mut inner = self.lock();
            if port != 0 {
                if let Some(owner) = inner.port_owner(port) {
                    return Err(NodeError::PortConflict { port, owner });
                }
            }
            let pid = inner.next_free_pid()?;
            let process = AppProcess {
                pid,
                port,
                executor,
            };
            inner.records.insert(
                pid,
                ProcessRecord {
                    process: process.clone(),
                    state: ProcessState::Starting,
                    extra_ports: Vec::new(),
                },
            );
            if port != 0 {
                inner.ports.insert(port, pid);
            }
            process
        };

        // The start runs on its own task so a cancelled caller cannot leave
        // the reservation dangling.
        let (pid, app) = (process.pid, process.executor.meta().app_name.clone());
        let manager = self.clone();
        let task = tokio::spawn(async move {
            let ctx = ProcessContext {
                pid: process.pid,
                port: process.port,
            };
            let started = process.executor.start(ctx).await;
            let mut inner = manager.lock();
            match started {
                Ok(()) => {
                    if let Some(record) = inner.records.get_mut(&process.pid) {
                        record.state = ProcessState::Running;
                    }
                    info!(
                        "Started process {} (app={}, port={})",
                        process.pid,
                        process.executor.meta().app_name,
                        process.port
                    );
                    Ok(process)
                }
                Err(e) => {
                    warn!(
                        "Failed to start {} as pid {}: {}",
                        process.executor.meta().app_name,
                        process.pid,
                        e
                    );
                    inner.release(process.pid, process.port);
                    Err(e)
                }
            }
        });

        match task.await {
            Ok(started) => started,
            Err(e) => {
                warn!("Start of {} as pid {} aborted: {}", app, pid, e);
                self.lock().release(pid, port);
                Err(NodeError::Executor {
                    app,
                    message: format!("process start task failed: {}", e),
                })
            }
        }
    }

    /// Stop a running process and wait for its executor to acknowledge.
    ///
    /// The identifier stays claimed by the stopped record until the allocator
    /// selects it again; the port is free as soon as this returns `Ok`.
    pub async fn stop_process(&self, pid: ProcessId) -> Result<()> {
        let executor = {
            let mut inner = self.lock();
            let record = inner
                .records
                .get_mut(&pid)
                .filter(|r| r.state == ProcessState::Running)
                .ok_or(NodeError::ProcessNotRunning { pid })?;
            record.state = ProcessState::Stopping;
            record.process.executor.clone()
        };

        let app = executor.meta().app_name.clone();
        let manager = self.clone();
        let task = tokio::spawn(async move {
            let stopped = executor.stop().await;
            let mut inner = manager.lock();
            let record = inner.records.get_mut(&pid);
            match (stopped, record) {
                (Ok(()), Some(record)) => {
                    record.state = ProcessState::Stopped;
                    info!("Stopped process {} (app={})", pid, executor.meta().app_name);
                    Ok(())
                }
                (Ok(()), None) => Ok(()),
                (Err(e), Some(record)) => {
                    record.state = ProcessState::Running;
                    warn!("Executor failed to stop process {}: {}", pid, e);
                    Err(e)
                }
                (Err(e), None) => Err(e),
            }
        });

        match task.await {
            Ok(stopped) => stopped,
            Err(e) => {
                warn!("Stop of process {} aborted: {}", pid, e);
                if let Some(record) = self.lock().records.get_mut(&pid) {
                    if record.state == ProcessState::Stopping {
                        record.state = ProcessState::Running;
                    }
                }
                Err(NodeError::Executor {
                    app,
                    message: format!("process stop task failed: {}", e),
                })
            }
        }
    }

    /// Snapshot of every process that has not been stopped, ordered by id.
    pub fn list_processes(&self) -> Vec<ProcessInfo> {
        let inner = self.lock();
        inner
            .records
            .values()
            .filter(|r| r.state.is_listed())
            .map(|r| r.process.info())
            .collect()
    }

    /// Look up a process that has not been stopped.
    pub fn process(&self, pid: ProcessId) -> Option<AppProcess> {
        let inner = self.lock();
        inner
            .records
            .get(&pid)
            .filter(|r| r.state.is_listed())
            .map(|r| r.process.clone())
    }

    /// Process currently bound to `port`.
    pub fn process_of_port(&self, port: Port) -> Option<AppProcess> {
        if port == 0 {
            return None;
        }
        let inner = self.lock();
        let pid = inner.port_owner(port)?;
        inner
            .records
            .get(&pid)
            .filter(|r| r.state.is_listed())
            .map(|r| r.process.clone())
    }

    /// Current lifecycle state of `pid`, including stopped records.
    pub fn state(&self, pid: ProcessId) -> Option<ProcessState> {
        self.lock().records.get(&pid).map(|r| r.state)
    }

    /// Number of processes that have not been stopped.
    pub fn running_count(&self) -> usize {
        self.lock()
            .records
            .values()
            .filter(|r| r.state.is_listed())
            .count()
    }

    /// Bind a free ephemeral port to a running process.
    ///
    /// The port stays bound until the process stops.
    pub fn alloc_port(&self, pid: ProcessId) -> Result<Port> {
        let mut inner = self.lock();
        if !inner
            .records
            .get(&pid)
            .is_some_and(|r| r.state == ProcessState::Running)
        {
            return Err(NodeError::ProcessNotRunning { pid });
        }
        let port = inner.next_free_port()?;
        inner.ports.insert(port, pid);
        if let Some(record) = inner.records.get_mut(&pid) {
            record.extra_ports.push(port);
        }
        debug!("Allocated ephemeral port {} to process {}", port, pid);
        Ok(port)
    }

    /// Identifiers of every process that has not been stopped, ascending.
    pub fn range_pids(&self) -> Vec<ProcessId> {
        self.lock()
            .records
            .iter()
            .filter(|(_, r)| r.state.is_listed())
            .map(|(pid, _)| *pid)
            .collect()
    }

    /// Every bound port with the process holding it, ordered by port.
    pub fn range_ports(&self) -> Vec<(Port, ProcessId)> {
        let inner = self.lock();
        let mut ports: Vec<(Port, ProcessId)> = inner
            .ports
            .keys()
            .filter_map(|&port| inner.port_owner(port).map(|pid| (port, pid)))
            .filter(|(_, pid)| inner.records.get(pid).is_some_and(|r| r.state.is_listed()))
            .collect();
        ports.sort_unstable();
        ports
    }

    /// Forward an application-protocol call to the process' executor.
    pub async fn call_process(&self, pid: ProcessId, request: &[u8]) -> Result<Vec<u8>> {
        let process = self
            .process(pid)
            .ok_or(NodeError::ProcessNotRunning { pid })?;
        debug!("Forwarding {} byte call to process {}", request.len(), pid);
        process.executor.call(request).await
    }

    /// Stop every running process. Returns how many were stopped.
    pub async fn stop_all(&self) -> usize {
        let pids: Vec<ProcessId> = {
            let inner = self.lock();
            inner
                .records
                .iter()
                .filter(|(_, r)| r.state == ProcessState::Running)
                .map(|(pid, _)| *pid)
                .collect()
        };

        info!("stop_all: stopping {} processes", pids.len());
        let mut stopped = 0;
        for pid in pids {
            match self.stop_process(pid).await {
                Ok(()) => stopped += 1,
                Err(e) => warn!("Failed to stop process {}: {}", pid, e),
            }
        }
        stopped
    }
}
