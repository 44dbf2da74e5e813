//! Physical channels between sandboxes.
//!
//! The RPC layer never touches browser APIs directly. It talks to these
//! traits, which the hosting environment implements.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────┐  ExtensionMessaging   ┌────────────────┐   PageChannel   ┌──────────────┐
//! │  Background  │◄─────────────────────►│ Content Script │◄───────────────►│   Web Page   │
//! │              │  runtime / tabs msgs  │    (relay)     │   postMessage   │              │
//! └──────┬───────┘                       └────────────────┘                 └──────▲───────┘
//!        │            ExtensionMessaging (External, Chromium only)                │
//!        └────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Modules
//!
//! | Module | Description |
//! |--------|-------------|
//! | `bus` | Fan-out listener registry |
//! | `page` | Page broadcast channel |
//! | `messaging` | Extension messaging with replies |
//! | `loader` | Script injection primitive |
//! | `memory` | In-process host implementing all of the above |

// ============================================================================
// Submodules
// ============================================================================

/// Fan-out listener registry.
pub mod bus;

/// Script injection primitive.
pub mod loader;

/// In-process host.
pub mod memory;

/// Extension messaging channel.
pub mod messaging;

/// Page broadcast channel.
pub mod page;

// ============================================================================
// Re-exports
// ============================================================================

pub use bus::{Bus, Subscription};
pub use loader::ScriptLoader;
pub use memory::{LoadHook, MemoryHost, MemoryLoader};
pub use messaging::{Delivery, Endpoint, ExtensionMessaging, Reply};
pub use page::{PageBus, PageChannel};
