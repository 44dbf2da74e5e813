//! Bare lifecycle signals.
//!
//! Signals are plain JSON strings, never envelopes. They announce progress
//! through the middleware/page-script initialization protocol.
//!
//! | Signal | Sent by | Channel |
//! |--------|---------|---------|
//! | `content-script-middleware-satisfied` | content script | extension messaging |
//! | `page-script-satisfied` | page | page broadcast |
//! | `page-injection-complete` | content script | extension messaging |

// ============================================================================
// Imports
// ============================================================================

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;

// ============================================================================
// LifecycleSignal
// ============================================================================

/// A bare progress signal exchanged over a channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum LifecycleSignal {
    /// The content-script middleware is installed.
    ContentScriptMiddlewareSatisfied,
    /// The injected page script finished initializing.
    PageScriptSatisfied,
    /// The content script observed the page script becoming ready.
    PageInjectionComplete,
}

impl LifecycleSignal {
    /// Returns the wire string.
    #[inline]
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::ContentScriptMiddlewareSatisfied => "content-script-middleware-satisfied",
            Self::PageScriptSatisfied => "page-script-satisfied",
            Self::PageInjectionComplete => "page-injection-complete",
        }
    }

    /// Parses a channel message as a signal.
    #[must_use]
    pub fn from_message(message: &Value) -> Option<Self> {
        match message.as_str()? {
            "content-script-middleware-satisfied" => Some(Self::ContentScriptMiddlewareSatisfied),
            "page-script-satisfied" => Some(Self::PageScriptSatisfied),
            "page-injection-complete" => Some(Self::PageInjectionComplete),
            _ => None,
        }
    }

    /// Returns `true` if `message` is this signal.
    #[inline]
    #[must_use]
    pub fn matches(&self, message: &Value) -> bool {
        message.as_str() == Some(self.as_str())
    }

    /// Returns the signal as a channel message.
    #[inline]
    #[must_use]
    pub fn to_value(&self) -> Value {
        Value::String(self.as_str().to_string())
    }
}

impl fmt::Display for LifecycleSignal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ============================================================================
// Tests
// ============================================================================
