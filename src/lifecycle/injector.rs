//! Page-script injector, run by the content script.

// ============================================================================
// Imports
// ============================================================================

use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::channel::{Endpoint, ExtensionMessaging, PageChannel, ScriptLoader};
use crate::error::Result;
use crate::protocol::LifecycleSignal;

use super::state::{Begin, InjectionSlot, InjectionState};
use super::wait_for_signal;

// ============================================================================
// PageScriptInjector
// ============================================================================

/// Injects one page script into the tab, exactly once.
///
/// On readiness, the injector announces `page-injection-complete` to the
/// background. Repeated requests after that only re-announce.
///
/// A load that fails, or a wait that is cut short, returns the slot to
/// unset so the injection can be requested again.
pub struct PageScriptInjector {
    slot: InjectionSlot,
    page: Arc<dyn PageChannel>,
    messaging: Arc<dyn ExtensionMessaging>,
    loader: Arc<dyn ScriptLoader>,
}

impl PageScriptInjector {
    /// Creates an injector with an unset slot.
    #[must_use]
    pub fn new(
        page: Arc<dyn PageChannel>,
        messaging: Arc<dyn ExtensionMessaging>,
        loader: Arc<dyn ScriptLoader>,
    ) -> Self {
        Self {
            slot: InjectionSlot::new(),
            page,
            messaging,
            loader,
        }
    }

    /// Returns the current injection state.
    #[must_use]
    pub fn state(&self) -> InjectionState {
        self.slot.state()
    }

    /// Injects `file` and waits until it signals readiness.
    ///
    /// # Errors
    ///
    /// - [`crate::Error::InjectionInProgress`] if an injection is pending
    /// - [`crate::Error::ScriptLoad`] if the host refuses the load
    pub async fn inject(&self, file: &str) -> Result<()> {
        if self.slot.begin(file)? == Begin::AlreadySatisfied {
            debug!(file, "Page script already satisfied");
            self.announce_complete();
            return Ok(());
        }

        let pending = Pending::new(&self.slot);

        // Listen before injecting: the script may signal during the load.
        let mut page_messages = self.page.subscribe();
        self.loader.load(file).await?;

        wait_for_signal(&mut page_messages, LifecycleSignal::PageScriptSatisfied).await?;
        pending.complete()?;
        info!(file, "Page script injected");

        self.announce_complete();
        Ok(())
    }

    fn announce_complete(&self) {
        let signal = LifecycleSignal::PageInjectionComplete;
        match self.messaging.send(Endpoint::Runtime, signal.to_value()) {
            Ok(reply) => drop(reply),
            // Nobody in the background is waiting; that is allowed.
            Err(e) => warn!(error = %e, %signal, "Signal not delivered"),
        }
    }
}

// ============================================================================
// Pending
// ============================================================================

/// Aborts the pending injection unless it completes.
struct Pending<'a> {
    slot: &'a InjectionSlot,
    armed: bool,
}

impl<'a> Pending<'a> {
    fn new(slot: &'a InjectionSlot) -> Self {
        Self { slot, armed: true }
    }

    fn complete(mut self) -> Result<()> {
        self.armed = false;
        self.slot.satisfy()
    }
}

impl Drop for Pending<'_> {
    fn drop(&mut self) {
        if !self.armed {
            return;
        }
        match self.slot.abort() {
            Ok(()) => warn!("Page script injection failed; slot reset"),
            Err(e) => warn!(error = %e, "Could not reset injection slot"),
        }
    }
}

// ============================================================================
// Tests
// ============================================================================
