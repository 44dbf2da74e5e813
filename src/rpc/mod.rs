//! Remote procedure calls across sandboxes.
//!
//! # Roles
//!
//! | Sandbox | Chromium | Firefox |
//! |---------|----------|---------|
//! | Background server | [`ChromiumBackgroundServer`] | [`FirefoxBackgroundServer`] |
//! | Background client | [`ChromiumBackgroundClient`] | [`FirefoxBackgroundClient`] |
//! | Page server | [`ChromiumPageServer`] | [`FirefoxPageServer`] |
//! | Page client | [`ChromiumPageClient`] | [`FirefoxPageClient`] |
//!
//! # Routes
//!
//! ```text
//! Chromium, background → page:
//!   client ──Tab──► relay ──post──► page server ──External──► client
//!
//! Firefox, background → page:
//!   client ──Tab──► relay ──post──► page server ──post──► relay ──reply──► client
//!
//! Chromium, page → background:
//!   client ──External──► background server ──reply──► client
//!
//! Firefox, page → background:
//!   client ──post──► relay ──Runtime──► background server ──reply──► relay ──post──► client
//! ```

// ============================================================================
// Submodules
// ============================================================================

/// Background-process variants.
pub mod background;

/// Client trait and correlation.
pub mod client;

/// Web-page variants.
pub mod page;

/// Procedure registry.
pub mod registry;

/// Server trait and serving loops.
pub mod server;

// ============================================================================
// Re-exports
// ============================================================================

pub use background::{
    ChromiumBackgroundClient, ChromiumBackgroundServer, FirefoxBackgroundClient,
    FirefoxBackgroundServer,
};
pub use client::{RpcClient, RpcClientExt};
pub use page::{ChromiumPageClient, ChromiumPageServer, FirefoxPageClient, FirefoxPageServer};
pub use registry::{Completion, Procedure, ProcedureFuture, ProcedureRegistry};
pub use server::RpcServer;
