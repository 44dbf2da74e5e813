//! In-process host: one tab, its page channel, extension messaging and
//! script loaders.
//!
//! Used to run all three sandboxes inside one tokio runtime, e.g. in tests
//! and demos. A WebAssembly build would implement the same traits over the
//! real browser APIs instead.
//!
//! # Example
//!
//! ```ignore
//! let host = MemoryHost::new();
//! let page = host.page_channel();
//! let messaging = host.messaging();
//!
//! host.page_scripts().on_load(|file| println!("page script requested: {file}"));
//! ```

// ============================================================================
// Imports
// ============================================================================

use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::Value;
use tracing::{debug, trace};

use crate::error::{Error, Result};
use crate::identifiers::TabId;

use super::bus::{Bus, Subscription};
use super::loader::ScriptLoader;
use super::messaging::{Delivery, Endpoint, ExtensionMessaging, Reply};
use super::page::{PageBus, PageChannel};

// ============================================================================
// Types
// ============================================================================

/// Callback run synchronously when a script load is requested.
pub type LoadHook = Arc<dyn Fn(&str) + Send + Sync>;

// ============================================================================
// MemoryHost
// ============================================================================

/// In-process browser with a single active tab.
pub struct MemoryHost {
    tab_id: TabId,
    page: PageBus,
    runtime: Bus<Delivery>,
    external: Bus<Delivery>,
    tab: Bus<Delivery>,
    content_scripts: Arc<MemoryLoader>,
    page_scripts: Arc<MemoryLoader>,
}

impl MemoryHost {
    /// Creates a host whose active tab is tab 1.
    #[must_use]
    pub fn new() -> Arc<Self> {
        Self::with_tab(TabId::FIRST)
    }

    /// Creates a host with a specific active tab.
    #[must_use]
    pub fn with_tab(tab_id: TabId) -> Arc<Self> {
        Arc::new(Self {
            tab_id,
            page: PageBus::new(),
            runtime: Bus::new(),
            external: Bus::new(),
            tab: Bus::new(),
            content_scripts: Arc::new(MemoryLoader::new()),
            page_scripts: Arc::new(MemoryLoader::new()),
        })
    }

    /// Returns the active tab.
    #[inline]
    #[must_use]
    pub fn active_tab(&self) -> TabId {
        self.tab_id
    }

    /// Returns a handle to the tab's page channel.
    #[must_use]
    pub fn page_channel(&self) -> Arc<dyn PageChannel> {
        Arc::new(self.page.clone())
    }

    /// Returns a handle to extension messaging.
    #[must_use]
    pub fn messaging(self: &Arc<Self>) -> Arc<dyn ExtensionMessaging> {
        Arc::clone(self) as Arc<dyn ExtensionMessaging>
    }

    /// Loader used by the background to run content scripts.
    #[must_use]
    pub fn content_scripts(&self) -> Arc<MemoryLoader> {
        Arc::clone(&self.content_scripts)
    }

    /// Loader used by the content script to inject page scripts.
    #[must_use]
    pub fn page_scripts(&self) -> Arc<MemoryLoader> {
        Arc::clone(&self.page_scripts)
    }

    /// Returns the number of page channel listeners.
    #[inline]
    #[must_use]
    pub fn page_listener_count(&self) -> usize {
        self.page.listener_count()
    }

    /// Returns the number of listeners at `endpoint`.
    #[must_use]
    pub fn listener_count(&self, endpoint: Endpoint) -> usize {
        self.bus(endpoint).map_or(0, Bus::listener_count)
    }

    fn bus(&self, endpoint: Endpoint) -> Option<&Bus<Delivery>> {
        match endpoint {
            Endpoint::Runtime => Some(&self.runtime),
            Endpoint::External => Some(&self.external),
            Endpoint::Tab(tab_id) if tab_id == self.tab_id => Some(&self.tab),
            Endpoint::Tab(_) => None,
        }
    }
}

impl ExtensionMessaging for MemoryHost {
    fn send(&self, endpoint: Endpoint, message: Value) -> Result<Reply> {
        let bus = self.bus(endpoint).ok_or_else(|| Error::unreachable(endpoint))?;

        let (delivery, reply) = Delivery::new(message);
        let delivered = bus.publish(delivery);
        if delivered == 0 {
            debug!(%endpoint, "No listener at endpoint");
            return Err(Error::unreachable(endpoint));
        }

        trace!(%endpoint, delivered, "Extension message sent");
        Ok(reply)
    }

    fn listen(&self, endpoint: Endpoint) -> Subscription<Delivery> {
        match self.bus(endpoint) {
            Some(bus) => bus.subscribe(),
            // Never receives anything: nothing can be sent to an unknown tab.
            None => Bus::new().subscribe(),
        }
    }
}

// ============================================================================
// MemoryLoader
// ============================================================================

/// [`ScriptLoader`] that records requests and runs a hook.
#[derive(Default)]
pub struct MemoryLoader {
    loads: Mutex<Vec<String>>,
    hook: Mutex<Option<LoadHook>>,
}

impl MemoryLoader {
    /// Creates a loader with no hook.
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the hook that plays the loaded script.
    pub fn on_load(&self, hook: impl Fn(&str) + Send + Sync + 'static) {
        *self.hook.lock() = Some(Arc::new(hook));
    }

    /// Returns every file requested so far, in order.
    #[must_use]
    pub fn loads(&self) -> Vec<String> {
        self.loads.lock().clone()
    }

    /// Returns how many times `file` was requested.
    #[must_use]
    pub fn load_count(&self, file: &str) -> usize {
        self.loads.lock().iter().filter(|f| *f == file).count()
    }
}

#[async_trait]
impl ScriptLoader for MemoryLoader {
    async fn load(&self, file: &str) -> Result<()> {
        if file.is_empty() {
            return Err(Error::script_load(file, "empty file name"));
        }

        self.loads.lock().push(file.to_string());
        debug!(file, "Script load requested");

        let hook = self.hook.lock().clone();
        if let Some(hook) = hook {
            hook(file);
        }

        Ok(())
    }
}

// ============================================================================
// Tests
// ============================================================================
