mod session;
mod events;
mod agent;
mod runner;
#[cfg(test)]
mod tests;

pub use session::{InMemorySessionService, Session};
pub use events::AgentEvent;
pub use agent::Agent;
pub use runner::Runner;
