//! Background side of the injection protocol.
//!
//! # Sequence
//!
//! ```text
//! Background                     Content script                Page
//!     │ listen(Runtime)               │                          │
//!     │ load middleware script ──────►│ install                  │
//!     │◄── middleware-satisfied ──────│                          │
//!     │ listen(Runtime)               │                          │
//!     │ inject-page-script ──────────►│ listen(page)             │
//!     │                               │ load page script ───────►│
//!     │                               │◄── page-script-satisfied │
//!     │◄── page-injection-complete ───│                          │
//!     │◄── reply: InjectionOutcome ───│                          │
//! ```
//!
//! The reply to `inject-page-script` carries an [`InjectionOutcome`], so a
//! refused or failed injection reaches the background as an error instead
//! of a completion signal that never comes.

// ============================================================================
// Imports
// ============================================================================

use std::sync::Arc;

use tracing::{debug, error, info};

use crate::channel::{Endpoint, ExtensionMessaging, ScriptLoader};
use crate::error::{Error, Result};
use crate::identifiers::{ReceiverTag, TabId};
use crate::protocol::{
    Envelope, INJECT_PAGE_SCRIPT, InjectPageScript, InjectionOutcome, LifecycleSignal,
};

use super::wait_for_signal;

// ============================================================================
// BackgroundInjectionDriver
// ============================================================================

/// Drives middleware and page-script injection from the background.
pub struct BackgroundInjectionDriver {
    messaging: Arc<dyn ExtensionMessaging>,
    content_scripts: Arc<dyn ScriptLoader>,
    tab_id: TabId,
    middleware_script: String,
}

impl BackgroundInjectionDriver {
    /// Creates a driver for `tab_id`.
    #[must_use]
    pub fn new(
        messaging: Arc<dyn ExtensionMessaging>,
        content_scripts: Arc<dyn ScriptLoader>,
        tab_id: TabId,
        middleware_script: impl Into<String>,
    ) -> Self {
        Self {
            messaging,
            content_scripts,
            tab_id,
            middleware_script: middleware_script.into(),
        }
    }

    /// Loads the content-script middleware and waits for it to announce
    /// itself.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::ScriptLoad`] if the host refuses the load.
    pub async fn initialize_middleware(&self) -> Result<()> {
        let mut runtime = self.messaging.listen(Endpoint::Runtime);

        debug!(tab_id = %self.tab_id, script = %self.middleware_script, "Loading middleware");
        self.content_scripts.load(&self.middleware_script).await?;

        wait_for_signal(&mut runtime, LifecycleSignal::ContentScriptMiddlewareSatisfied).await?;
        info!(tab_id = %self.tab_id, "Middleware ready");
        Ok(())
    }

    /// Asks the middleware to inject `file` and waits for completion.
    ///
    /// Safe to repeat: once the page script is in place, the middleware
    /// answers again without reloading it.
    ///
    /// # Errors
    ///
    /// - [`Error::Unreachable`] if no middleware listens in the tab
    /// - [`Error::InjectionInProgress`] if another injection is pending
    /// - [`Error::ScriptLoad`] if the content script could not load `file`
    /// - [`Error::UndefinedReply`] if the middleware went away unanswered
    pub async fn inject_page_script(&self, file: &str) -> Result<()> {
        let mut runtime = self.messaging.listen(Endpoint::Runtime);

        let args = serde_json::to_value(InjectPageScript {
            file_name: file.to_string(),
        })?;
        let request =
            Envelope::request(ReceiverTag::CONTENT_SCRIPT_MIDDLEWARE, INJECT_PAGE_SCRIPT, args);
        let reply = self
            .messaging
            .send(Endpoint::Tab(self.tab_id), request.to_value())?;

        let Some(value) = reply.await else {
            error!(tab_id = %self.tab_id, file, "Middleware dropped the injection request");
            return Err(Error::undefined_reply(INJECT_PAGE_SCRIPT));
        };
        InjectionOutcome::from_envelope(Envelope::from_value(value)?)?.into_result()?;

        // Announced before the reply, so already buffered.
        wait_for_signal(&mut runtime, LifecycleSignal::PageInjectionComplete).await?;
        info!(tab_id = %self.tab_id, file, "Page script ready");
        Ok(())
    }
}
