use std::sync::Arc;

use async_trait::async_trait;

use crate::Tool;

/// A named, closeable source of tools backed by an external resource
/// (typically a tool-server subprocess).
///
/// The owner must call [`Toolset::close`] when the session ends.
/// Implementations make `close` idempotent: the underlying resource is
/// released at most once and later calls return `Ok(())`.
#[async_trait]
pub trait Toolset: Send + Sync {
    fn name(&self) -> &str;

    /// Discover the tools this toolset currently exposes.
    async fn tools(&self) -> anyhow::Result<Vec<Arc<dyn Tool>>>;

    /// Release the backing resource.
    async fn close(&self) -> anyhow::Result<()>;
}
