//! Shared harness for integration tests.
//!
//! Wires all three sandboxes onto one [`MemoryHost`]: loading the
//! middleware script installs the content script, loading the page script
//! marks the page satisfied.

#![allow(dead_code)]

// ============================================================================
// Imports
// ============================================================================

use std::sync::Arc;

use serde::Deserialize;
use serde_json::json;
use tracing_subscriber::EnvFilter;
use webext_rpc::{
    BackgroundContext, Browser, ContentScriptContext, MemoryHost, PageContext, RpcConfig,
};

// ============================================================================
// Constants
// ============================================================================

pub const PAGE_SCRIPT: &str = "/page-script.js";

// ============================================================================
// Types
// ============================================================================

#[derive(Debug, Deserialize)]
pub struct SumArgs {
    pub a: i64,
    pub b: i64,
}

/// One tab with all three sandboxes bootstrapped.
pub struct Sandboxes {
    pub host: Arc<MemoryHost>,
    pub background: BackgroundContext,
    pub content: Arc<ContentScriptContext>,
    pub page: Arc<PageContext>,
}

impl Sandboxes {
    /// Bootstraps the sandboxes. Nothing is loaded yet.
    ///
    /// The page serves `detect` and `sum`; the background serves `version`.
    pub fn new(browser: Browser) -> Self {
        init_tracing();

        let config = config(browser);
        let host = MemoryHost::new();

        let background = BackgroundContext::new(
            config.clone(),
            host.messaging(),
            host.active_tab(),
            host.content_scripts(),
        );
        background
            .procedures()
            .register("version", |_| async { Ok(json!("1.0.0")) });
        background.server().listen();

        let content = Arc::new(ContentScriptContext::new(
            config.clone(),
            host.page_channel(),
            host.messaging(),
            host.active_tab(),
            host.page_scripts(),
        ));

        let page = Arc::new(
            PageContext::new(config, host.page_channel(), host.messaging()).expect("page context"),
        );
        page.procedures()
            .register("detect", |_| async { Ok(json!("jQuery,Lodash")) });
        page.procedures()
            .register_typed("sum", |args: SumArgs| async move { Ok(args.a + args.b) });

        let content_script = Arc::clone(&content);
        host.content_scripts().on_load(move |_| {
            content_script.install();
        });
        let page_script = Arc::clone(&page);
        host.page_scripts().on_load(move |_| {
            page_script.satisfied().expect("page script initialized once");
        });

        Self {
            host,
            background,
            content,
            page,
        }
    }

    /// Loads the middleware and injects the page script.
    pub async fn ready(browser: Browser) -> Self {
        let sandboxes = Self::new(browser);
        sandboxes
            .background
            .initialize()
            .await
            .expect("initialize middleware");
        sandboxes
            .background
            .inject_page_script(PAGE_SCRIPT)
            .await
            .expect("inject page script");
        sandboxes
    }
}

// ============================================================================
// Functions
// ============================================================================

/// Configuration for `browser`.
pub fn config(browser: Browser) -> RpcConfig {
    let builder = RpcConfig::builder().browser(browser);
    match browser {
        Browser::Chromium => builder.extension_id("abcdefghijklmnopabcdefghijklmnop"),
        Browser::Firefox => builder,
    }
    .build()
    .expect("valid config")
}

/// Initialize tracing for tests, once.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}
