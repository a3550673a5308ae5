//! Frontends over an [`AgentSession`](fsagent_bootstrap::AgentSession).
//!
//! - [`InteractiveSession`] reads queries line by line until `exit`, end of
//!   input, or an interrupt.
//! - [`run_once`] answers a single prompt.
//!
//! Both always shut the tool server down before returning.

pub mod input;
pub mod output;
mod runner;

pub use input::{LineSource, ScriptedLines, StdinLines};
pub use runner::{run_once, InteractiveSession, SessionOutcome};
