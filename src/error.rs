//! Error types for extension RPC.
//!
//! This module defines all error types used throughout the crate.
//!
//! # Usage
//!
//! All fallible operations return [`Result<T>`] which uses [`Error`]:
//!
//! ```ignore
//! use webext_rpc::{Result, RpcClient};
//!
//! async fn detect(client: &dyn RpcClient) -> Result<()> {
//!     let libraries = client.call("detect", serde_json::json!({})).await?;
//!     println!("{libraries}");
//!     Ok(())
//! }
//! ```
//!
//! # Error Categories
//!
//! | Category | Variants |
//! |----------|----------|
//! | Environment | [`Error::UnsupportedBrowser`], [`Error::InvalidOrigin`], [`Error::Config`] |
//! | Dispatch | [`Error::UnregisteredProcedure`], [`Error::Procedure`], [`Error::CallInFlight`] |
//! | Relay | [`Error::UndefinedReply`], [`Error::Unreachable`], [`Error::ChannelClosed`] |
//! | Lifecycle | [`Error::InjectionInProgress`], [`Error::InvalidTransition`], [`Error::ScriptLoad`], [`Error::AlreadyInitialized`] |
//! | Execution | [`Error::CallTimeout`], [`Error::Protocol`] |
//! | External | [`Error::Json`], [`Error::Canceled`] |

// ============================================================================
// Imports
// ============================================================================

use std::result::Result as StdResult;

use thiserror::Error;
use tokio::sync::oneshot::error::RecvError;

// ============================================================================
// Result Alias
// ============================================================================

/// Result type alias using crate [`enum@Error`].
///
/// All fallible operations in this crate return this type.
pub type Result<T> = StdResult<T, Error>;

// ============================================================================
// Error Enum
// ============================================================================

/// Main error type for the crate.
///
/// Each variant includes relevant context for debugging.
#[derive(Error, Debug)]
pub enum Error {
    // ========================================================================
    // Environment Errors
    // ========================================================================
    /// Unrecognized browser vendor descriptor.
    ///
    /// Fatal at initialization; there is no degraded mode.
    #[error("Unexpected browser: '{descriptor}'. Expected either 'chromium' or 'firefox'")]
    UnsupportedBrowser {
        /// The descriptor that was supplied.
        descriptor: String,
    },

    /// Extension origin URL could not be understood.
    #[error("Invalid extension origin: {url}")]
    InvalidOrigin {
        /// The URL that failed to parse.
        url: String,
    },

    /// Configuration error.
    ///
    /// Returned when RPC configuration is invalid.
    #[error("Configuration error: {message}")]
    Config {
        /// Description of the configuration error.
        message: String,
    },

    // ========================================================================
    // Dispatch Errors
    // ========================================================================
    /// No handler registered under the requested name.
    #[error("No procedure was registered with the name '{procedure}'")]
    UnregisteredProcedure {
        /// The requested procedure name.
        procedure: String,
    },

    /// A registered handler failed.
    #[error("Procedure '{procedure}' failed: {message}")]
    Procedure {
        /// The procedure name.
        procedure: String,
        /// Failure message from the handler.
        message: String,
    },

    /// A call to the same procedure is already outstanding on this client.
    ///
    /// Replies are correlated by procedure name, so a second concurrent
    /// call would be resolved by the first call's reply.
    #[error("A call to '{procedure}' is already in flight on this client")]
    CallInFlight {
        /// The procedure name.
        procedure: String,
    },

    // ========================================================================
    // Relay Errors
    // ========================================================================
    /// A relayed call completed without a value.
    ///
    /// Indicates a wiring defect: the destination never received the message
    /// or nobody answered it.
    #[error(
        "Got an undefined return value from the extension messaging system for an RPC request for '{procedure}'"
    )]
    UndefinedReply {
        /// The procedure name.
        procedure: String,
    },

    /// No listener exists at the messaging endpoint.
    #[error("Could not establish connection. Receiving end does not exist: {endpoint}")]
    Unreachable {
        /// Endpoint description.
        endpoint: String,
    },

    /// A channel subscription ended before the awaited message arrived.
    #[error("Channel closed")]
    ChannelClosed,

    // ========================================================================
    // Lifecycle Errors
    // ========================================================================
    /// A page script injection was started while another is in progress.
    #[error(
        "Injection of '{pending}' is already in progress. Refusing to inject '{requested}' concurrently"
    )]
    InjectionInProgress {
        /// The file whose injection is pending.
        pending: String,
        /// The file requested by the rejected call.
        requested: String,
    },

    /// A sandbox bootstrap ran a second time.
    #[error("The {sandbox} was already initialized")]
    AlreadyInitialized {
        /// Sandbox that refused the second bootstrap.
        sandbox: &'static str,
    },

    /// The injection state machine was driven along an edge it does not have.
    #[error("Invalid injection transition: {from} -> {to}")]
    InvalidTransition {
        /// State before the attempted transition.
        from: &'static str,
        /// Attempted target state.
        to: &'static str,
    },

    /// The host refused to load a script.
    #[error("Failed to load script '{file}': {message}")]
    ScriptLoad {
        /// The script file.
        file: String,
        /// Reason reported by the host.
        message: String,
    },

    // ========================================================================
    // Execution Errors
    // ========================================================================
    /// A call exceeded the configured timeout.
    #[error("Call to '{procedure}' timed out after {timeout_ms}ms")]
    CallTimeout {
        /// The procedure name.
        procedure: String,
        /// Milliseconds waited before timeout.
        timeout_ms: u64,
    },

    /// Malformed message on a channel.
    #[error("Protocol error: {message}")]
    Protocol {
        /// Description of the protocol violation.
        message: String,
    },

    // ========================================================================
    // External Errors
    // ========================================================================
    /// JSON serialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Completion channel dropped before it resolved.
    #[error("Completion canceled")]
    Canceled(#[from] RecvError),
}

// ============================================================================
// Error Constructors
// ============================================================================

impl Error {
    /// Creates an unsupported browser error.
    #[inline]
    pub fn unsupported_browser(descriptor: impl Into<String>) -> Self {
        Self::UnsupportedBrowser {
            descriptor: descriptor.into(),
        }
    }

    /// Creates an invalid origin error.
    #[inline]
    pub fn invalid_origin(url: impl Into<String>) -> Self {
        Self::InvalidOrigin { url: url.into() }
    }

    /// Creates a configuration error.
    #[inline]
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
        }
    }

    /// Creates an unregistered procedure error.
    #[inline]
    pub fn unregistered_procedure(procedure: impl Into<String>) -> Self {
        Self::UnregisteredProcedure {
            procedure: procedure.into(),
        }
    }

    /// Creates a procedure failure error.
    #[inline]
    pub fn procedure(procedure: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Procedure {
            procedure: procedure.into(),
            message: message.into(),
        }
    }

    /// Creates a call in flight error.
    #[inline]
    pub fn call_in_flight(procedure: impl Into<String>) -> Self {
        Self::CallInFlight {
            procedure: procedure.into(),
        }
    }

    /// Creates an undefined reply error.
    #[inline]
    pub fn undefined_reply(procedure: impl Into<String>) -> Self {
        Self::UndefinedReply {
            procedure: procedure.into(),
        }
    }

    /// Creates an unreachable endpoint error.
    #[inline]
    pub fn unreachable(endpoint: impl ToString) -> Self {
        Self::Unreachable {
            endpoint: endpoint.to_string(),
        }
    }

    /// Creates an injection in progress error.
    #[inline]
    pub fn injection_in_progress(pending: impl Into<String>, requested: impl Into<String>) -> Self {
        Self::InjectionInProgress {
            pending: pending.into(),
            requested: requested.into(),
        }
    }

    /// Creates an already initialized error.
    #[inline]
    pub fn already_initialized(sandbox: &'static str) -> Self {
        Self::AlreadyInitialized { sandbox }
    }

    /// Creates an invalid transition error.
    #[inline]
    pub fn invalid_transition(from: &'static str, to: &'static str) -> Self {
        Self::InvalidTransition { from, to }
    }

    /// Creates a script load error.
    #[inline]
    pub fn script_load(file: impl Into<String>, message: impl Into<String>) -> Self {
        Self::ScriptLoad {
            file: file.into(),
            message: message.into(),
        }
    }

    /// Creates a call timeout error.
    #[inline]
    pub fn call_timeout(procedure: impl Into<String>, timeout_ms: u64) -> Self {
        Self::CallTimeout {
            procedure: procedure.into(),
            timeout_ms,
        }
    }

    /// Creates a protocol error.
    #[inline]
    pub fn protocol(message: impl Into<String>) -> Self {
        Self::Protocol {
            message: message.into(),
        }
    }
}

// ============================================================================
// Error Predicates
// ============================================================================

impl Error {
    /// Returns `true` if this error points at broken wiring rather than
    /// a failing procedure.
    ///
    /// These are the errors that must never be swallowed inside a listener.
    #[inline]
    #[must_use]
    pub fn is_wiring_defect(&self) -> bool {
        matches!(
            self,
            Self::UnregisteredProcedure { .. }
                | Self::UndefinedReply { .. }
                | Self::Unreachable { .. }
                | Self::InjectionInProgress { .. }
                | Self::InvalidTransition { .. }
                | Self::AlreadyInitialized { .. }
        )
    }

    /// Returns `true` if this is an environment error.
    #[inline]
    #[must_use]
    pub fn is_environment_error(&self) -> bool {
        matches!(
            self,
            Self::UnsupportedBrowser { .. } | Self::InvalidOrigin { .. } | Self::Config { .. }
        )
    }

    /// Returns `true` if this is a timeout error.
    #[inline]
    #[must_use]
    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::CallTimeout { .. })
    }

    /// Returns the procedure name this error concerns, if any.
    #[must_use]
    pub fn procedure_name(&self) -> Option<&str> {
        match self {
            Self::UnregisteredProcedure { procedure }
            | Self::Procedure { procedure, .. }
            | Self::CallInFlight { procedure }
            | Self::UndefinedReply { procedure }
            | Self::CallTimeout { procedure, .. } => Some(procedure),
            _ => None,
        }
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = Error::unregistered_procedure("detect");
        assert_eq!(
            err.to_string(),
            "No procedure was registered with the name 'detect'"
        );
    }

    #[test]
    fn test_unsupported_browser_display() {
        let err = Error::unsupported_browser("safari");
        assert_eq!(
            err.to_string(),
            "Unexpected browser: 'safari'. Expected either 'chromium' or 'firefox'"
        );
    }

    #[test]
    fn test_is_wiring_defect() {
        assert!(Error::undefined_reply("detect").is_wiring_defect());
        assert!(Error::unregistered_procedure("detect").is_wiring_defect());
        assert!(Error::injection_in_progress("a.js", "b.js").is_wiring_defect());
        assert!(!Error::procedure("detect", "boom").is_wiring_defect());
        assert!(!Error::config("test").is_wiring_defect());
    }

    #[test]
    fn test_injection_in_progress_names_both_files() {
        let err = Error::injection_in_progress("/a.js", "/b.js");
        assert_eq!(
            err.to_string(),
            "Injection of '/a.js' is already in progress. Refusing to inject '/b.js' concurrently"
        );
    }

    #[test]
    fn test_is_environment_error() {
        assert!(Error::unsupported_browser("safari").is_environment_error());
        assert!(Error::invalid_origin("https://example.com").is_environment_error());
        assert!(!Error::ChannelClosed.is_environment_error());
    }

    #[test]
    fn test_procedure_name() {
        assert_eq!(
            Error::call_timeout("sum", 100).procedure_name(),
            Some("sum")
        );
        assert_eq!(Error::ChannelClosed.procedure_name(), None);
    }

    #[test]
    fn test_from_json_error() {
        let json_err = serde_json::from_str::<String>("invalid").unwrap_err();
        let err: Error = json_err.into();
        assert!(matches!(err, Error::Json(_)));
    }
}
