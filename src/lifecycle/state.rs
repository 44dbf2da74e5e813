//! Injection state machine.
//!
//! ```text
//!  ┌───────┐  begin   ┌─────────────┐  satisfy  ┌───────────┐
//!  │ Unset │────────►│ In progress │─────────►│ Satisfied │
//!  └───────┘          └──────┬──────┘           └─────┬─────┘
//!      ▲                     │                         │
//!      └──── abort ──────────┤                         │
//!                      begin │ (rejected)        begin │ (already satisfied)
//!                            ▼                         ▼
//!                 InjectionInProgress           re-announce, resolve
//! ```
//!
//! `abort` is taken when the pending injection fails, so the tab can be
//! retried.

// ============================================================================
// Imports
// ============================================================================

use std::fmt;

use parking_lot::Mutex;
use tracing::debug;

use crate::error::{Error, Result};

// ============================================================================
// InjectionState
// ============================================================================

/// State of one page-script injection slot.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum InjectionState {
    /// Nothing requested yet.
    #[default]
    Unset,
    /// Script requested; waiting for its readiness signal.
    InProgress {
        /// Script being injected.
        file: String,
    },
    /// Script signaled readiness. Terminal.
    Satisfied {
        /// Script that was injected.
        file: String,
    },
}

impl InjectionState {
    /// Returns the state name.
    #[must_use]
    pub const fn name(&self) -> &'static str {
        match self {
            Self::Unset => "unset",
            Self::InProgress { .. } => "in-progress",
            Self::Satisfied { .. } => "satisfied",
        }
    }

    /// Returns `true` in the terminal state.
    #[inline]
    #[must_use]
    pub const fn is_satisfied(&self) -> bool {
        matches!(self, Self::Satisfied { .. })
    }
}

impl fmt::Display for InjectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

// ============================================================================
// Begin
// ============================================================================

/// What an injection request must do.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Begin {
    /// First request: load the script.
    Inject,
    /// Already done: re-announce only.
    AlreadySatisfied,
}

// ============================================================================
// InjectionSlot
// ============================================================================

/// Owned injection state with validated transitions.
#[derive(Debug, Default)]
pub struct InjectionSlot {
    state: Mutex<InjectionState>,
}

impl InjectionSlot {
    /// Creates an unset slot.
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns a snapshot of the current state.
    #[must_use]
    pub fn state(&self) -> InjectionState {
        self.state.lock().clone()
    }

    /// Starts an injection of `file`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InjectionInProgress`] if an injection is pending.
    pub fn begin(&self, file: &str) -> Result<Begin> {
        let mut state = self.state.lock();
        match &*state {
            InjectionState::Unset => {
                *state = InjectionState::InProgress {
                    file: file.to_string(),
                };
                debug!(file, "Injection started");
                Ok(Begin::Inject)
            }
            InjectionState::InProgress { file: pending } => {
                Err(Error::injection_in_progress(pending.clone(), file))
            }
            InjectionState::Satisfied { .. } => Ok(Begin::AlreadySatisfied),
        }
    }

    /// Marks the pending injection satisfied.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidTransition`] unless an injection is pending.
    pub fn satisfy(&self) -> Result<()> {
        let mut state = self.state.lock();
        match std::mem::take(&mut *state) {
            InjectionState::InProgress { file } => {
                debug!(file = %file, "Injection satisfied");
                *state = InjectionState::Satisfied { file };
                Ok(())
            }
            other => {
                let from = other.name();
                *state = other;
                Err(Error::invalid_transition(from, "satisfied"))
            }
        }
    }

    /// Returns a pending injection to unset after it failed.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidTransition`] unless an injection is pending.
    pub fn abort(&self) -> Result<()> {
        let mut state = self.state.lock();
        match &*state {
            InjectionState::InProgress { file } => {
                debug!(file = %file, "Injection aborted");
                *state = InjectionState::Unset;
                Ok(())
            }
            other => Err(Error::invalid_transition(other.name(), "unset")),
        }
    }
}

// ============================================================================
// Tests
// ============================================================================
