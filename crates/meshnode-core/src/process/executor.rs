//! Executor collaborator interface.
//!
//! An executor runs the code of exactly one application instance. The process
//! manager never spawns anything itself; it only drives executors through
//! this trait.

use super::types::{AppMeta, ExecConfig, ProcessContext};
use crate::error::{NodeError, Result};
use async_trait::async_trait;
use std::sync::Arc;

/// Runs one application instance.
#[async_trait]
pub trait Executor: Send + Sync {
    /// Begin running the application bound to `ctx`.
    ///
    /// Returns once the application is started; the application then keeps
    /// running concurrently until [`Executor::stop`] is called.
    async fn start(&self, ctx: ProcessContext) -> Result<()>;

    /// Request a cooperative stop and wait until the application acknowledges it.
    async fn stop(&self) -> Result<()>;

    /// Configuration the executor was created with.
    fn config(&self) -> &ExecConfig;

    /// Metadata of the application being run.
    fn meta(&self) -> &AppMeta;

    /// Entry point for the application's own inter-process protocol.
    async fn call(&self, request: &[u8]) -> Result<Vec<u8>> {
        let _ = request;
        Err(NodeError::NotImplemented(format!(
            "app calls for {}",
            self.meta().app_name
        )))
    }
}

/// Creates executors for applications registered on the node.
pub trait ExecutorFactory: Send + Sync {
    fn create(&self, meta: &AppMeta, config: &ExecConfig) -> Result<Arc<dyn Executor>>;
}
