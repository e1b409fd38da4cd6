//! Meshnode Core - Headless control plane for a mesh-networking node.
//!
//! This crate multiplexes independent application processes onto one node,
//! tracks their port and process-id bindings, and exposes node, transport and
//! routing state through the management [`Gateway`]. It has no HTTP/RPC layer
//! of its own; see the `meshnode-rpc` crate for that.
//!
//! # Example
//!
//! ```rust,ignore
//! use meshnode_core::{ChildExecutorFactory, Gateway, Node, NodeConfig};
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> meshnode_core::Result<()> {
//!     let config = NodeConfig::load("meshnode.json")?;
//!     let node = Node::standalone(config, Arc::new(ChildExecutorFactory::default()))?;
//!     let gateway = Gateway::new(Arc::new(node));
//!
//!     let pid = gateway.start_process("chat", vec![], 1).await?;
//!     println!("started chat as {}", pid);
//!     println!("{:?}", gateway.list_processes());
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod error;
pub mod gateway;
pub mod identity;
pub mod node;
pub mod process;
pub mod routing;
pub mod transport;

// Re-export commonly used types
pub use config::{AppConfig, NodeConfig, NodeDefaults};
pub use error::{NodeError, Result};
pub use gateway::{Gateway, LoopInfo, RoutingEntry, Summary, TransportSummary};
pub use identity::Identity;
pub use node::Node;
pub use process::{
    AppMeta, AppProcess, ChildExecutorFactory, ExecConfig, Executor, ExecutorFactory,
    MemoryExecutorFactory, Port, ProcessId, ProcessInfo, ProcessManager,
};
pub use routing::{InMemoryRoutingTable, RouteId, RoutingTable, Rule, RuleType};
pub use transport::{InMemoryTransportManager, LogEntry, ManagedTransport, TransportManager};
