//! Script injection primitive.

use async_trait::async_trait;

use crate::error::Result;

// ============================================================================
// ScriptLoader
// ============================================================================

/// Loads and executes a script file in some sandbox.
///
/// In the background this is `tabs.executeScript` (content scripts); in
/// the content script it is appending a `<script>` element to the page.
/// Resolving only means the load request was accepted. Readiness of the
/// loaded code is signalled separately over a channel.
#[async_trait]
pub trait ScriptLoader: Send + Sync {
    /// Requests that `file` be loaded.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::ScriptLoad`] if the host refuses the request.
    async fn load(&self, file: &str) -> Result<()>;
}
