//! Stdio Runner - supervisor for the gateway's single child process
//!
//! Spawns a shell command with piped stdio, frames its stdout into
//! newline-delimited records, and reports stderr output and exit as events.

mod error;
mod process;

pub use error::{Result, RunnerError};
pub use process::{ChildEvent, ChildHandle, ExitReport, ProcessSupervisor, StdioChild};
