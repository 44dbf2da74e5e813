//! Per-sandbox context objects.
//!
//! Each sandbox bootstraps exactly one context and passes it by reference.
//! Vendor variants are picked once, from [`crate::RpcConfig`], and the
//! server and client factories return the same instance on every call.
//!
//! | Context | Owns |
//! |---------|------|
//! | [`BackgroundContext`] | background server/client, injection driver |
//! | [`ContentScriptContext`] | relay, middleware, injection state |
//! | [`PageContext`] | page server/client |

// ============================================================================
// Submodules
// ============================================================================

/// Background-process context.
pub mod background;

/// Content-script context.
pub mod content_script;

/// Web-page context.
pub mod page;

// ============================================================================
// Re-exports
// ============================================================================

pub use background::BackgroundContext;
pub use content_script::ContentScriptContext;
pub use page::PageContext;
