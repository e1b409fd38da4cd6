//! Error types for the mesh node control plane.
//!
//! Every operation exposed to the remote manager fails with exactly one of
//! these variants. Collaborator failures (executor, transport, routing) carry
//! the collaborator's message verbatim.

use std::path::PathBuf;
use thiserror::Error;

use crate::process::{Port, ProcessId};

/// Main error type for the node.
#[derive(Debug, Error)]
pub enum NodeError {
    // Input validation
    #[error("invalid input: {message}")]
    InvalidParams { message: String },

    #[error("not implemented: {0}")]
    NotImplemented(String),

    // Lookups
    #[error("app not found: {name}")]
    AppNotFound { name: String },

    #[error("process not found: {pid}")]
    ProcessNotRunning { pid: ProcessId },

    #[error("transport not found: {id}")]
    TransportNotFound { id: uuid::Uuid },

    #[error("routing rule not found: {route_id}")]
    RouteNotFound { route_id: u32 },

    // Allocation
    #[error("port {port} already allocated to pid {owner}")]
    PortConflict { port: Port, owner: ProcessId },

    #[error("no free process id: all {0} identifiers are in use")]
    CapacityExhausted(usize),

    #[error("no free ephemeral port: all {0} ports are in use")]
    PortsExhausted(usize),

    // Collaborators
    #[error("executor error for {app}: {message}")]
    Executor { app: String, message: String },

    #[error("transport error: {0}")]
    Transport(String),

    #[error("routing error: {0}")]
    Routing(String),

    #[error("operation timed out after {0:?}")]
    Timeout(std::time::Duration),

    // Configuration / plumbing
    #[error("configuration error: {message}")]
    Config { message: String },

    #[error("IO error at {path:?}: {message}")]
    Io {
        message: String,
        path: Option<PathBuf>,
        #[source]
        source: Option<std::io::Error>,
    },

    #[error("JSON error: {message}")]
    Json {
        message: String,
        #[source]
        source: Option<serde_json::Error>,
    },

    #[error("{0}")]
    Other(String),
}

/// Result type alias for node operations.
pub type Result<T> = std::result::Result<T, NodeError>;

impl From<std::io::Error> for NodeError {
    fn from(err: std::io::Error) -> Self {
        NodeError::Io {
            message: err.to_string(),
            path: None,
            source: Some(err),
        }
    }
}

impl From<serde_json::Error> for NodeError {
    fn from(err: serde_json::Error) -> Self {
        NodeError::Json {
            message: err.to_string(),
            source: Some(err),
        }
    }
}

impl NodeError {
    /// Create an IO error with path context.
    pub fn io_with_path(err: std::io::Error, path: impl Into<PathBuf>) -> Self {
        NodeError::Io {
            message: err.to_string(),
            path: Some(path.into()),
            source: Some(err),
        }
    }

    /// Shorthand for an invalid-input error.
    pub fn invalid(message: impl Into<String>) -> Self {
        NodeError::InvalidParams {
            message: message.into(),
        }
    }

    /// Convert to a JSON-RPC error code.
    ///
    /// Standard JSON-RPC error codes:
    /// - -32601: Method not found / not implemented
    /// - -32602: Invalid params
    /// - -32603: Internal error
    ///
    /// Application-defined codes:
    /// - -32001: Resource not found (app, process, transport, rule)
    /// - -32010: Port conflict
    /// - -32011: Process identifiers exhausted
    /// - -32020: Collaborator failure (executor, transport, routing)
    pub fn to_rpc_error_code(&self) -> i32 {
        match self {
            NodeError::InvalidParams { .. } => -32602,

            NodeError::NotImplemented(_) => -32601,

            NodeError::AppNotFound { .. }
            | NodeError::ProcessNotRunning { .. }
            | NodeError::TransportNotFound { .. }
            | NodeError::RouteNotFound { .. } => -32001,

            NodeError::PortConflict { .. } => -32010,

            NodeError::CapacityExhausted(_) | NodeError::PortsExhausted(_) => -32011,

            NodeError::Executor { .. }
            | NodeError::Transport(_)
            | NodeError::Routing(_)
            | NodeError::Timeout(_) => -32020,

            _ => -32603,
        }
    }

    /// Whether this error reports a missing resource.
    pub fn is_not_found(&self) -> bool {
        self.to_rpc_error_code() == -32001
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = NodeError::PortConflict {
            port: 10,
            owner: ProcessId::new(3).unwrap(),
        };
        assert_eq!(err.to_string(), "port 10 already allocated to pid 3");

        let err = NodeError::AppNotFound { name: "bar".into() };
        assert!(err.to_string().contains("not found"));
    }

    #[test]
    fn test_rpc_error_codes() {
        assert_eq!(NodeError::invalid("x").to_rpc_error_code(), -32602);
        assert_eq!(
            NodeError::RouteNotFound { route_id: 4 }.to_rpc_error_code(),
            -32001
        );
        assert_eq!(NodeError::CapacityExhausted(65535).to_rpc_error_code(), -32011);
        assert_eq!(
            NodeError::Executor {
                app: "foo".into(),
                message: "boom".into()
            }
            .to_rpc_error_code(),
            -32020
        );
        assert_eq!(NodeError::Other("x".into()).to_rpc_error_code(), -32603);
    }

    #[test]
    fn test_not_found_kinds() {
        assert!(NodeError::TransportNotFound { id: uuid::Uuid::nil() }.is_not_found());
        assert!(!NodeError::Transport("down".into()).is_not_found());
    }
}
