//! WebExtension RPC - procedure calls across browser-extension sandboxes.
//!
//! A browser extension runs code in three isolated sandboxes that can only
//! exchange serialized messages. This library lets them call procedures on
//! one another as ordinary async calls, and drives the one-time injection
//! of a script into the web page.
//!
//! # Architecture
//!
//! ```text
//! ┌────────────────────┐   extension messaging   ┌────────────────────┐   page channel   ┌──────────────┐
//! │     Background     │◄───────────────────────►│   Content script   │◄────────────────►│   Web page   │
//! │  server + client   │                         │  relay+middleware  │                  │server+client │
//! │  injection driver  │                         │  injection state   │                  │              │
//! └────────────────────┘                         └────────────────────┘                  └──────────────┘
//! ```
//!
//! Key design principles:
//!
//! - Every envelope names its receiver; listeners filter, channels broadcast
//! - A listener is always registered before the message it waits for is
//!   triggered
//! - Vendor differences live behind one trait per role ([`RpcServer`],
//!   [`RpcClient`], [`Relay`]), picked once from [`RpcConfig`]
//! - Errors raised inside listeners go to a [`FaultReporter`], never into
//!   the void
//!
//! # Quick Start
//!
//! ```no_run
//! use serde_json::json;
//! use webext_rpc::{
//!     BackgroundContext, Browser, ContentScriptContext, MemoryHost, PageContext, Result,
//!     RpcConfig,
//! };
//!
//! #[tokio::main]
//! async fn main() -> Result<()> {
//!     let host = MemoryHost::new();
//!     let config = RpcConfig::builder().browser(Browser::Firefox).build()?;
//!
//!     let background = BackgroundContext::new(
//!         config.clone(),
//!         host.messaging(),
//!         host.active_tab(),
//!         host.content_scripts(),
//!     );
//!     let content = ContentScriptContext::new(
//!         config.clone(),
//!         host.page_channel(),
//!         host.messaging(),
//!         host.active_tab(),
//!         host.page_scripts(),
//!     );
//!     let page = PageContext::new(config, host.page_channel(), host.messaging())?;
//!     page.procedures()
//!         .register("detect", |_| async { Ok(json!("jQuery,Lodash")) });
//!
//!     host.content_scripts().on_load(move |_| { content.install(); });
//!     host.page_scripts().on_load(move |_| {
//!         page.satisfied().expect("page script initialized once");
//!     });
//!
//!     background.initialize().await?;
//!     background.inject_page_script("/page-script.js").await?;
//!
//!     let libraries = background.client().call("detect", json!({})).await?;
//!     assert_eq!(libraries, json!("jQuery,Lodash"));
//!     Ok(())
//! }
//! ```
//!
//! # Modules
//!
//! | Module | Description |
//! |--------|-------------|
//! | [`channel`] | Physical channels and the in-memory host |
//! | [`config`] | Vendor and configuration |
//! | [`context`] | Per-sandbox context objects |
//! | [`error`] | Error types and [`Result`] alias |
//! | [`fault`] | Visible error path for listener tasks |
//! | [`identifiers`] | Type-safe ID wrappers |
//! | [`lifecycle`] | Page-script injection |
//! | [`protocol`] | Envelopes and lifecycle signals |
//! | [`relay`] | Content-script relay |
//! | [`rpc`] | Registry, servers and clients |

// ============================================================================
// Modules
// ============================================================================

/// Physical channels between sandboxes.
///
/// Traits the host implements, plus [`MemoryHost`] for in-process use.
pub mod channel;

/// Vendor and configuration.
pub mod config;

/// Per-sandbox context objects.
///
/// Each sandbox bootstraps one context; its factories are idempotent.
pub mod context;

/// Error types and result aliases.
///
/// All fallible operations return [`Result<T>`] which uses [`Error`].
pub mod error;

/// Fault reporting for listener tasks.
pub mod fault;

/// Type-safe identifiers.
///
/// Newtype wrappers prevent mixing incompatible IDs at compile time.
pub mod identifiers;

/// Page-script injection lifecycle.
pub mod lifecycle;

/// Cross-sandbox message types.
pub mod protocol;

/// Content-script relay.
pub mod relay;

/// Remote procedure calls.
pub mod rpc;

// ============================================================================
// Re-exports
// ============================================================================

// Channel types
pub use channel::{
    Delivery, Endpoint, ExtensionMessaging, MemoryHost, MemoryLoader, PageBus, PageChannel,
    Reply, ScriptLoader, Subscription,
};

// Configuration types
pub use config::{Browser, ExtensionOrigin, RpcConfig, RpcConfigBuilder};

// Context types
pub use context::{BackgroundContext, ContentScriptContext, PageContext};

// Error types
pub use error::{Error, Result};

// Fault types
pub use fault::{Fault, FaultReporter};

// Identifier types
pub use identifiers::{ExtensionId, ReceiverTag, SubscriptionId, TabId};

// Lifecycle types
pub use lifecycle::{InjectionState, PageScriptInjector};

// Protocol types
pub use protocol::{Envelope, InjectionOutcome, LifecycleSignal};

// Relay types
pub use relay::{ChromiumRelay, FirefoxRelay, Relay};

// RPC types
pub use rpc::{ProcedureRegistry, RpcClient, RpcClientExt, RpcServer};
