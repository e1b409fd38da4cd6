//! Value types shared by the process manager and its executors.

use crate::error::NodeError;
use crate::identity::Identity;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::num::NonZeroU16;
use std::path::PathBuf;

/// Logical application port on the node. Zero means unbound.
pub type Port = u16;

/// Identifier of one process instance on the node. Never zero.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "u16", into = "u16")]
pub struct ProcessId(NonZeroU16);

impl ProcessId {
    /// Returns `None` for the reserved value zero.
    pub fn new(raw: u16) -> Option<Self> {
        NonZeroU16::new(raw).map(Self)
    }

    pub fn get(self) -> u16 {
        self.0.get()
    }
}

impl TryFrom<u16> for ProcessId {
    type Error = NodeError;

    fn try_from(raw: u16) -> Result<Self, Self::Error> {
        ProcessId::new(raw).ok_or_else(|| NodeError::invalid("process id must be non-zero"))
    }
}

impl From<ProcessId> for u16 {
    fn from(pid: ProcessId) -> u16 {
        pid.get()
    }
}

impl fmt::Display for ProcessId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Static descriptor of an installed application.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AppMeta {
    pub app_name: String,
    pub app_version: String,
    pub protocol_version: String,
    /// Identity of the node hosting the application.
    #[serde(default)]
    pub host: Identity,
}

/// Everything an executor needs to run one application binary.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExecConfig {
    pub bin_loc: PathBuf,
    pub work_dir: PathBuf,
    #[serde(default)]
    pub args: Vec<String>,
}

/// Binding handed to an executor when its process is started.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProcessContext {
    pub pid: ProcessId,
    pub port: Port,
}

/// Read-only projection of a running process, used for listings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProcessInfo {
    pub pid: ProcessId,
    pub port: Port,
    pub exec_config: ExecConfig,
    pub meta: AppMeta,
}
