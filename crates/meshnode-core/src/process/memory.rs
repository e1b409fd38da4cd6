//! In-process executor.
//!
//! Runs each application as a tokio task that idles until asked to stop.
//! Used by `--dry-run` nodes and throughout the test suites, where it also
//! records lifecycle events and can be told to fail on demand.

use super::executor::{Executor, ExecutorFactory};
use super::types::{AppMeta, ExecConfig, ProcessContext, ProcessId};
use crate::error::{NodeError, Result};
use async_trait::async_trait;
use std::collections::HashSet;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tracing::debug;

/// Lifecycle event observed by a [`MemoryExecutorFactory`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExecutorEvent {
    Started { app: String, pid: ProcessId },
    Stopped { app: String, pid: ProcessId },
}

#[derive(Default)]
struct Behavior {
    fail_start: HashSet<String>,
    fail_stop: HashSet<String>,
    start_delay: Option<Duration>,
    events: Vec<ExecutorEvent>,
}

fn lock(behavior: &Mutex<Behavior>) -> MutexGuard<'_, Behavior> {
    behavior.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Factory handing out [`MemoryExecutor`]s that share one behavior table.
#[derive(Default)]
pub struct MemoryExecutorFactory {
    behavior: Arc<Mutex<Behavior>>,
}

impl MemoryExecutorFactory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every start of `app` fail.
    pub fn fail_start(&self, app: &str) {
        lock(&self.behavior).fail_start.insert(app.to_string());
    }

    /// Make every stop of `app` fail.
    pub fn fail_stop(&self, app: &str) {
        lock(&self.behavior).fail_stop.insert(app.to_string());
    }

    pub fn clear_failures(&self) {
        let mut behavior = lock(&self.behavior);
        behavior.fail_start.clear();
        behavior.fail_stop.clear();
    }

    /// Delay applied to every start before it succeeds.
    pub fn set_start_delay(&self, delay: Duration) {
        lock(&self.behavior).start_delay = Some(delay);
    }

    /// Events recorded so far, oldest first.
    pub fn events(&self) -> Vec<ExecutorEvent> {
        lock(&self.behavior).events.clone()
    }
}

impl ExecutorFactory for MemoryExecutorFactory {
    fn create(&self, meta: &AppMeta, config: &ExecConfig) -> Result<Arc<dyn Executor>> {
        Ok(Arc::new(MemoryExecutor {
            meta: meta.clone(),
            config: config.clone(),
            behavior: self.behavior.clone(),
            running: tokio::sync::Mutex::new(None),
        }))
    }
}

struct RunningTask {
    pid: ProcessId,
    stop_tx: oneshot::Sender<()>,
    handle: JoinHandle<()>,
}

/// Executor whose application is a parked tokio task.
pub struct MemoryExecutor {
    meta: AppMeta,
    config: ExecConfig,
    behavior: Arc<Mutex<Behavior>>,
    running: tokio::sync::Mutex<Option<RunningTask>>,
}

impl MemoryExecutor {
    fn fail(&self, message: &str) -> NodeError {
        NodeError::Executor {
            app: self.meta.app_name.clone(),
            message: message.to_string(),
        }
    }
}

#[async_trait]
impl Executor for MemoryExecutor {
    async fn start(&self, ctx: ProcessContext) -> Result<()> {
        let delay = {
            let behavior = lock(&self.behavior);
            if behavior.fail_start.contains(&self.meta.app_name) {
                return Err(self.fail("start refused"));
            }
            behavior.start_delay
        };
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        let mut running = self.running.lock().await;
        if running.is_some() {
            return Err(self.fail("already running"));
        }

        let (stop_tx, stop_rx) = oneshot::channel();
        let app = self.meta.app_name.clone();
        let handle = tokio::spawn(async move {
            let _ = stop_rx.await;
            debug!("{} (pid {}) acknowledged stop", app, ctx.pid);
        });
        *running = Some(RunningTask {
            pid: ctx.pid,
            stop_tx,
            handle,
        });

        lock(&self.behavior).events.push(ExecutorEvent::Started {
            app: self.meta.app_name.clone(),
            pid: ctx.pid,
        });
        Ok(())
    }

    async fn stop(&self) -> Result<()> {
        if lock(&self.behavior).fail_stop.contains(&self.meta.app_name) {
            return Err(self.fail("stop refused"));
        }

        let task = self
            .running
            .lock()
            .await
            .take()
            .ok_or_else(|| self.fail("not running"))?;
        let _ = task.stop_tx.send(());
        task.handle
            .await
            .map_err(|e| self.fail(&format!("task ended abnormally: {}", e)))?;

        lock(&self.behavior).events.push(ExecutorEvent::Stopped {
            app: self.meta.app_name.clone(),
            pid: task.pid,
        });
        Ok(())
    }

    fn config(&self) -> &ExecConfig {
        &self.config
    }

    fn meta(&self) -> &AppMeta {
        &self.meta
    }

    /// Echoes the request back.
    async fn call(&self, request: &[u8]) -> Result<Vec<u8>> {
        if self.running.lock().await.is_none() {
            return Err(self.fail("not running"));
        }
        Ok(request.to_vec())
    }
}
