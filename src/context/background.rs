//! Background-process context.

// ============================================================================
// Imports
// ============================================================================

use std::sync::{Arc, OnceLock};

use crate::channel::{ExtensionMessaging, ScriptLoader};
use crate::config::{Browser, RpcConfig};
use crate::error::Result;
use crate::fault::FaultReporter;
use crate::identifiers::TabId;
use crate::lifecycle::BackgroundInjectionDriver;
use crate::rpc::{
    ChromiumBackgroundClient, ChromiumBackgroundServer, FirefoxBackgroundClient,
    FirefoxBackgroundServer, ProcedureRegistry, RpcClient, RpcServer,
};

// ============================================================================
// BackgroundContext
// ============================================================================

/// Everything the background process owns for one tab.
///
/// # Example
///
/// ```ignore
/// let background = BackgroundContext::new(config, messaging, tab_id, content_scripts);
/// background.procedures().register("version", |_| async { Ok(json!("1.0")) });
/// background.server().listen();
///
/// background.initialize().await?;
/// background.inject_page_script("/page-script.js").await?;
/// let libraries = background.client().call("detect", json!({})).await?;
/// ```
pub struct BackgroundContext {
    config: RpcConfig,
    messaging: Arc<dyn ExtensionMessaging>,
    tab_id: TabId,
    procedures: ProcedureRegistry,
    faults: FaultReporter,
    driver: BackgroundInjectionDriver,
    server: OnceLock<Arc<dyn RpcServer>>,
    client: OnceLock<Arc<dyn RpcClient>>,
}

impl BackgroundContext {
    /// Creates the context for `tab_id`.
    #[must_use]
    pub fn new(
        config: RpcConfig,
        messaging: Arc<dyn ExtensionMessaging>,
        tab_id: TabId,
        content_scripts: Arc<dyn ScriptLoader>,
    ) -> Self {
        let driver = BackgroundInjectionDriver::new(
            Arc::clone(&messaging),
            content_scripts,
            tab_id,
            config.middleware_script(),
        );

        Self {
            config,
            messaging,
            tab_id,
            procedures: ProcedureRegistry::new(),
            faults: FaultReporter::new(),
            driver,
            server: OnceLock::new(),
            client: OnceLock::new(),
        }
    }

    /// Returns the configuration.
    #[inline]
    #[must_use]
    pub fn config(&self) -> &RpcConfig {
        &self.config
    }

    /// Procedures served to the page.
    #[inline]
    #[must_use]
    pub fn procedures(&self) -> &ProcedureRegistry {
        &self.procedures
    }

    /// Faults raised by this context's listeners.
    #[inline]
    #[must_use]
    pub fn faults(&self) -> &FaultReporter {
        &self.faults
    }

    /// Returns the background server, creating it on first use.
    pub fn server(&self) -> Arc<dyn RpcServer> {
        let server = self.server.get_or_init(|| -> Arc<dyn RpcServer> {
            match self.config.browser() {
                Browser::Chromium => Arc::new(ChromiumBackgroundServer::new(
                    Arc::clone(&self.messaging),
                    self.procedures.clone(),
                    self.faults.clone(),
                )),
                Browser::Firefox => Arc::new(FirefoxBackgroundServer::new(
                    Arc::clone(&self.messaging),
                    self.procedures.clone(),
                    self.faults.clone(),
                )),
            }
        });
        Arc::clone(server)
    }

    /// Returns the client calling the page, creating it on first use.
    pub fn client(&self) -> Arc<dyn RpcClient> {
        let client = self.client.get_or_init(|| -> Arc<dyn RpcClient> {
            let messaging = Arc::clone(&self.messaging);
            let call_timeout = self.config.call_timeout();
            match self.config.browser() {
                Browser::Chromium => Arc::new(ChromiumBackgroundClient::new(
                    messaging,
                    self.tab_id,
                    call_timeout,
                )),
                Browser::Firefox => Arc::new(FirefoxBackgroundClient::new(
                    messaging,
                    self.tab_id,
                    call_timeout,
                )),
            }
        });
        Arc::clone(client)
    }

    /// Loads the content-script middleware into the tab.
    ///
    /// # Errors
    ///
    /// See [`BackgroundInjectionDriver::initialize_middleware`].
    pub async fn initialize(&self) -> Result<()> {
        self.driver.initialize_middleware().await
    }

    /// Injects `file` into the page and waits until it is ready.
    ///
    /// # Errors
    ///
    /// See [`BackgroundInjectionDriver::inject_page_script`].
    pub async fn inject_page_script(&self, file: &str) -> Result<()> {
        self.driver.inject_page_script(file).await
    }
}
