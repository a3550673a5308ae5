mod registry;
mod tool;
mod toolset;

pub use registry::{ToolRegistry, ToolSchema};
pub use tool::{Tool, ToolCall, ToolOutput};
pub use toolset::Toolset;
