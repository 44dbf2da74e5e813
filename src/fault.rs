//! Guaranteed-visible error path for listener tasks.
//!
//! Errors raised inside a message listener have no caller to return to,
//! and extension hosts drop exceptions thrown there. Listener code hands
//! such errors to a [`FaultReporter`] instead: each fault is logged at
//! error level, kept in a short history and broadcast to subscribers.

// ============================================================================
// Imports
// ============================================================================

use std::collections::VecDeque;
use std::sync::Arc;

use parking_lot::Mutex;
use tracing::error;

use crate::channel::{Bus, Subscription};
use crate::error::Error;

// ============================================================================
// Constants
// ============================================================================

/// Faults retained for [`FaultReporter::recent`].
const MAX_RECENT_FAULTS: usize = 32;

// ============================================================================
// Fault
// ============================================================================

/// An error raised where nobody could receive it.
#[derive(Debug)]
pub struct Fault {
    /// Component that raised the error.
    pub component: &'static str,
    /// The error itself.
    pub error: Error,
}

// ============================================================================
// FaultReporter
// ============================================================================

/// Shared sink for listener-side errors.
///
/// Cloning yields another handle to the same sink.
#[derive(Clone, Default)]
pub struct FaultReporter {
    bus: Bus<Arc<Fault>>,
    recent: Arc<Mutex<VecDeque<Arc<Fault>>>>,
}

impl FaultReporter {
    /// Creates an empty reporter.
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Reports a fault.
    pub fn report(&self, component: &'static str, error: Error) -> Arc<Fault> {
        error!(component, error = %error, "Fault raised inside a listener");

        let fault = Arc::new(Fault { component, error });

        {
            let mut recent = self.recent.lock();
            if recent.len() == MAX_RECENT_FAULTS {
                recent.pop_front();
            }
            recent.push_back(Arc::clone(&fault));
        }

        self.bus.publish(Arc::clone(&fault));
        fault
    }

    /// Subscribes to faults reported from now on.
    #[must_use]
    pub fn subscribe(&self) -> Subscription<Arc<Fault>> {
        self.bus.subscribe()
    }

    /// Returns the most recent faults, oldest first.
    #[must_use]
    pub fn recent(&self) -> Vec<Arc<Fault>> {
        self.recent.lock().iter().cloned().collect()
    }
}

// ============================================================================
// Tests
// ============================================================================
