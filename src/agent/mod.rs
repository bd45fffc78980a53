//! Everything about talking to an external coding agent: which command to
//! run, how to run it, and what its failures mean.

pub mod classifier;
#[cfg(test)]
pub mod mock;
pub mod process;
pub mod profile;

pub use classifier::{ErrorClassification, classify};
pub use process::{AgentInvoker, AgentOutput, InvocationRequest, ProcessInvoker};
pub use profile::{AgentKind, CommandSpec};
