use async_trait::async_trait;
use serde_json::Value;

/// One tool invocation as requested by the model.
#[derive(Debug, Clone, PartialEq)]
pub struct ToolCall {
    /// Call id chosen by the model, echoed back with the result.
    pub id: String,
    pub name: String,
    /// Argument object; `{}` when the model sent none.
    pub args: Value,
}

/// Text returned to the model for one [`ToolCall`].
#[derive(Debug, Clone)]
pub struct ToolOutput {
    pub call_id: String,
    pub content: String,
    /// Set when the tool refused or failed. The text is still shown to the
    /// model so it can correct itself.
    pub is_error: bool,
}

impl ToolOutput {
    pub fn ok(call_id: impl Into<String>, content: impl Into<String>) -> Self {
        Self::new(call_id, content, false)
    }

    pub fn err(call_id: impl Into<String>, msg: impl Into<String>) -> Self {
        Self::new(call_id, msg, true)
    }

    fn new(call_id: impl Into<String>, content: impl Into<String>, is_error: bool) -> Self {
        Self { call_id: call_id.into(), content: content.into(), is_error }
    }
}

/// An operation the agent can ask to perform, e.g. `read_file`.
///
/// Failures belong in the returned [`ToolOutput`]; `execute` itself never
/// errors so a bad call cannot abort the turn.
#[async_trait]
pub trait Tool: Send + Sync {
    fn name(&self) -> &str;
    fn description(&self) -> &str;
    /// JSON Schema of the argument object.
    fn parameters_schema(&self) -> Value;
    async fn execute(&self, call: &ToolCall) -> ToolOutput;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn output_constructors_set_error_flag() {
        let ok = ToolOutput::ok("c1", "[FILE] a.txt");
        assert_eq!((ok.call_id.as_str(), ok.is_error), ("c1", false));

        let err = ToolOutput::err("c2", "Access denied - path outside allowed directories");
        assert!(err.is_error);
        assert!(err.content.starts_with("Access denied"));
    }
}
