//! Executor backed by an operating-system child process.

use super::executor::{Executor, ExecutorFactory};
use super::types::{AppMeta, ExecConfig, ProcessContext};
use crate::config::NodeDefaults;
use crate::error::{NodeError, Result};
use async_trait::async_trait;
use std::process::Stdio;
use std::sync::Arc;
use std::time::Duration;
use tokio::process::{Child, Command};
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

/// Environment variable carrying the node-assigned process id.
pub const ENV_PID: &str = "MESHNODE_PID";
/// Environment variable carrying the bound application port.
pub const ENV_PORT: &str = "MESHNODE_PORT";

/// Creates [`ChildExecutor`]s with a shared stop grace period.
#[derive(Debug, Clone)]
pub struct ChildExecutorFactory {
    grace: Duration,
}

impl ChildExecutorFactory {
    pub fn new(grace: Duration) -> Self {
        Self { grace }
    }
}

impl Default for ChildExecutorFactory {
    fn default() -> Self {
        Self::new(NodeDefaults::STOP_GRACE)
    }
}

impl ExecutorFactory for ChildExecutorFactory {
    fn create(&self, meta: &AppMeta, config: &ExecConfig) -> Result<Arc<dyn Executor>> {
        Ok(Arc::new(ChildExecutor {
            meta: meta.clone(),
            config: config.clone(),
            grace: self.grace,
            child: Mutex::new(None),
        }))
    }
}

/// Runs one application binary as a child process.
pub struct ChildExecutor {
    meta: AppMeta,
    config: ExecConfig,
    grace: Duration,
    child: Mutex<Option<Child>>,
}

impl ChildExecutor {
    fn fail(&self, message: impl Into<String>) -> NodeError {
        NodeError::Executor {
            app: self.meta.app_name.clone(),
            message: message.into(),
        }
    }

    /// Ask the child to exit, then wait out the grace period.
    async fn terminate(&self, child: &mut Child) -> Result<()> {
        #[cfg(unix)]
        {
            use nix::sys::signal::{kill, Signal};
            use nix::unistd::Pid;

            if let Some(id) = child.id() {
                debug!("Sending SIGTERM to {} (os pid {})", self.meta.app_name, id);
                if let Err(e) = kill(Pid::from_raw(id as i32), Signal::SIGTERM) {
                    if e != nix::errno::Errno::ESRCH {
                        warn!("Failed to send SIGTERM to {}: {}", id, e);
                    }
                }
            }
        }

        match tokio::time::timeout(self.grace, child.wait()).await {
            Ok(status) => {
                let status = status.map_err(|e| self.fail(e.to_string()))?;
                debug!("{} exited with {}", self.meta.app_name, status);
                Ok(())
            }
            Err(_) => {
                warn!(
                    "{} did not exit within {:?}, killing",
                    self.meta.app_name, self.grace
                );
                child.kill().await.map_err(|e| self.fail(e.to_string()))
            }
        }
    }
}

#[async_trait]
impl Executor for ChildExecutor {
    async fn start(&self, ctx: ProcessContext) -> Result<()> {
        let mut slot = self.child.lock().await;
        if slot.is_some() {
            return Err(self.fail("already running"));
        }

        tokio::fs::create_dir_all(&self.config.work_dir)
            .await
            .map_err(|e| self.fail(format!("work dir {:?}: {}", self.config.work_dir, e)))?;

        let child = Command::new(&self.config.bin_loc)
            .args(&self.config.args)
            .current_dir(&self.config.work_dir)
            .env(ENV_PID, ctx.pid.to_string())
            .env(ENV_PORT, ctx.port.to_string())
            .stdin(Stdio::null())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| self.fail(format!("spawn {:?}: {}", self.config.bin_loc, e)))?;

        info!(
            "Spawned {} (pid {}, os pid {:?})",
            self.meta.app_name,
            ctx.pid,
            child.id()
        );
        *slot = Some(child);
        Ok(())
    }

    async fn stop(&self) -> Result<()> {
        let mut slot = self.child.lock().await;
        let mut child = slot.take().ok_or_else(|| self.fail("not running"))?;
        if let Err(e) = self.terminate(&mut child).await {
            *slot = Some(child);
            return Err(e);
        }
        Ok(())
    }

    fn config(&self) -> &ExecConfig {
        &self.config
    }

    fn meta(&self) -> &AppMeta {
        &self.meta
    }
}
