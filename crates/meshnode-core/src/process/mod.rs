//! Application process management.
//!
//! The [`ProcessManager`] hands out process identifiers, enforces port
//! uniqueness and drives [`Executor`]s. Two executors are provided:
//! - [`ChildExecutor`]: runs the application binary as a child process
//! - [`MemoryExecutor`]: runs a parked task in-process (dry runs, tests)

mod child;
mod executor;
mod manager;
pub mod memory;
mod types;

pub use child::{ChildExecutor, ChildExecutorFactory, ENV_PID, ENV_PORT};
pub use executor::{Executor, ExecutorFactory};
pub use manager::{AppProcess, ProcessManager, ProcessState, EPHEMERAL_PORTS, MAX_PROCESSES};
pub use memory::{ExecutorEvent, MemoryExecutor, MemoryExecutorFactory};
pub use types::{AppMeta, ExecConfig, Port, ProcessContext, ProcessId, ProcessInfo};
