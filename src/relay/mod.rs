//! Content-script relay between the page channel and extension messaging.
//!
//! The relay answers to `content-script-relay` and re-addresses what it
//! forwards, so a forwarded envelope can never come back to it.
//!
//! | Direction | Chromium | Firefox |
//! |-----------|----------|---------|
//! | background → page | yes | yes, with reply capture |
//! | page → background | no (page messages the background directly) | yes |
//!
//! # Example
//!
//! ```ignore
//! let relay = FirefoxRelay::new(page, messaging, tab_id, faults);
//! relay.install();
//! relay.install(); // no-op
//! ```

// ============================================================================
// Imports
// ============================================================================

use crate::identifiers::ReceiverTag;

// ============================================================================
// Submodules
// ============================================================================

/// Vendor relays.
pub mod content_script;

mod forward;

// ============================================================================
// Re-exports
// ============================================================================

pub use content_script::{ChromiumRelay, FirefoxRelay};

// ============================================================================
// Relay
// ============================================================================

static RELAY_TAG: ReceiverTag = ReceiverTag::CONTENT_SCRIPT_RELAY;

/// Relay role of the content script.
pub trait Relay: Send + Sync {
    /// Tag the relay answers to.
    fn receiver(&self) -> &ReceiverTag {
        &RELAY_TAG
    }

    /// Installs the relay's listeners.
    ///
    /// Only the first call installs anything; later calls return `false`.
    fn install(&self) -> bool;

    /// Returns `true` once installed.
    fn is_installed(&self) -> bool;
}
