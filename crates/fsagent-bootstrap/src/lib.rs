//! Session construction.
//!
//! This crate owns the one-time setup every frontend needs:
//! - preparing the target directory the filesystem server is confined to
//! - launching the MCP server and turning its tools into a registry
//! - wiring model, registry and session service into a [`Runner`]
//!
//! Frontends (`fsagent-repl`, the `fsagent` binary) call [`start_session`]
//! instead of repeating these steps.
//!
//! [`Runner`]: fsagent_core::Runner

pub mod workspace;
pub mod agent;
pub mod session;

pub use workspace::{setup_target_directory, TargetDirError};
pub use agent::AgentBuilder;
pub use session::{start_session, AgentSession, StartError};
