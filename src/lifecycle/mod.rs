//! Page-script injection lifecycle.
//!
//! # Modules
//!
//! | Module | Runs in | Description |
//! |--------|---------|-------------|
//! | `state` | content script | `unset → in-progress → satisfied` slot |
//! | `injector` | content script | Loads the page script once, re-announces after |
//! | `middleware` | content script | Relay + `inject-page-script` listener |
//! | `driver` | background | Loads the middleware, requests injection |

// ============================================================================
// Imports
// ============================================================================

use crate::channel::Subscription;
use crate::error::{Error, Result};
use crate::protocol::LifecycleSignal;
use crate::rpc::client::Inbound;

// ============================================================================
// Submodules
// ============================================================================

/// Background injection driver.
pub mod driver;

/// Page-script injector.
pub mod injector;

/// Content-script middleware.
pub mod middleware;

/// Injection state machine.
pub mod state;

// ============================================================================
// Re-exports
// ============================================================================

pub use driver::BackgroundInjectionDriver;
pub use injector::PageScriptInjector;
pub use middleware::ContentScriptMiddleware;
pub use state::{Begin, InjectionSlot, InjectionState};

// ============================================================================
// Helpers
// ============================================================================

/// Waits on `messages` until `signal` arrives.
pub(crate) async fn wait_for_signal<T: Inbound>(
    messages: &mut Subscription<T>,
    signal: LifecycleSignal,
) -> Result<()> {
    while let Some(item) = messages.recv().await {
        if signal.matches(item.message()) {
            return Ok(());
        }
    }
    Err(Error::ChannelClosed)
}
