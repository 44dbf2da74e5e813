//! Cross-sandbox message types.
//!
//! This module defines what travels over the page broadcast channel and
//! the extension messaging channel.
//!
//! # Protocol Overview
//!
//! | Message Type | Shape | Purpose |
//! |--------------|-------|---------|
//! | `Envelope` (request) | object, no `returnValue` | Procedure call |
//! | `Envelope` (response) | object with `returnValue` | Procedure result |
//! | `LifecycleSignal` | bare string | Initialization progress |
//! | `inject-page-script` | request envelope | Ask the middleware to inject a page script |
//! | `InjectionOutcome` | `returnValue` of the reply | How that injection ended |
//!
//! # Modules
//!
//! | Module | Description |
//! |--------|-------------|
//! | `envelope` | Request/response envelope and addressing test |
//! | `signal` | Lifecycle signal vocabulary |

// ============================================================================
// Submodules
// ============================================================================

/// RPC envelope and addressing.
pub mod envelope;

/// Lifecycle signals.
pub mod signal;

// ============================================================================
// Imports
// ============================================================================

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{Error, Result};
use crate::identifiers::ReceiverTag;

// ============================================================================
// Re-exports
// ============================================================================

pub use envelope::Envelope;
pub use signal::LifecycleSignal;

// ============================================================================
// InjectPageScript
// ============================================================================

/// Procedure name understood by the content-script middleware.
pub const INJECT_PAGE_SCRIPT: &str = "inject-page-script";

/// Arguments of an `inject-page-script` request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InjectPageScript {
    /// Extension-relative path of the page script.
    pub file_name: String,
}

// ============================================================================
// InjectionOutcome
// ============================================================================

/// How an `inject-page-script` request ended, sent back through the
/// request's reply slot.
///
/// ```json
/// { "outcome": "in-progress", "pending": "/a.js", "requested": "/b.js" }
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "kebab-case", rename_all_fields = "camelCase")]
pub enum InjectionOutcome {
    /// The page script is in place.
    Complete {
        /// Injected script.
        file_name: String,
    },
    /// Another injection was pending; this one was refused.
    InProgress {
        /// Script whose injection is pending.
        pending: String,
        /// Script of the refused request.
        requested: String,
    },
    /// The host refused to load the script.
    LoadFailed {
        /// Script that failed to load.
        file_name: String,
        /// Reason reported by the host.
        message: String,
    },
    /// Anything else.
    Failed {
        /// Error text.
        message: String,
    },
}

impl InjectionOutcome {
    /// Captures the result of injecting `file`.
    #[must_use]
    pub fn from_result(file: &str, result: &Result<()>) -> Self {
        match result {
            Ok(()) => Self::Complete {
                file_name: file.to_string(),
            },
            Err(Error::InjectionInProgress { pending, requested }) => Self::InProgress {
                pending: pending.clone(),
                requested: requested.clone(),
            },
            Err(Error::ScriptLoad { file, message }) => Self::LoadFailed {
                file_name: file.clone(),
                message: message.clone(),
            },
            Err(e) => Self::Failed {
                message: e.to_string(),
            },
        }
    }

    /// Converts the outcome back into the caller-facing result.
    ///
    /// # Errors
    ///
    /// - [`Error::InjectionInProgress`] if the request was refused
    /// - [`Error::ScriptLoad`] if the load failed
    /// - [`Error::Procedure`] for any other failure
    pub fn into_result(self) -> Result<()> {
        match self {
            Self::Complete { .. } => Ok(()),
            Self::InProgress { pending, requested } => {
                Err(Error::injection_in_progress(pending, requested))
            }
            Self::LoadFailed { file_name, message } => Err(Error::script_load(file_name, message)),
            Self::Failed { message } => Err(Error::procedure(INJECT_PAGE_SCRIPT, message)),
        }
    }

    /// Builds the reply envelope for the background.
    ///
    /// Failures also fill the envelope's `error` field.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Json`] if the outcome cannot be serialized.
    pub fn to_envelope(&self) -> Result<Envelope> {
        let value = serde_json::to_value(self)?;
        let error = self.clone().into_result().err().map(|e| e.to_string());
        Ok(Envelope {
            error,
            ..Envelope::response(ReceiverTag::BACKGROUND_CLIENT, INJECT_PAGE_SCRIPT, value)
        })
    }

    /// Reads the outcome out of a reply envelope.
    ///
    /// A bare failure envelope, with no outcome in `returnValue`, reads as
    /// [`InjectionOutcome::Failed`].
    ///
    /// # Errors
    ///
    /// - [`Error::Protocol`] if the envelope is a request
    /// - [`Error::Json`] if `returnValue` is not an outcome
    pub fn from_envelope(envelope: Envelope) -> Result<Self> {
        match (envelope.return_value, envelope.error) {
            (Some(value), _) if !value.is_null() => Ok(serde_json::from_value(value)?),
            (_, Some(message)) => Ok(Self::Failed { message }),
            _ => Err(Error::protocol(format!(
                "Expected a response for '{}' but got a request",
                envelope.procedure_name
            ))),
        }
    }
}

// ============================================================================
// Tests
// ============================================================================
