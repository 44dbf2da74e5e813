//! Library detection across all three sandboxes.
//!
//! Demonstrates:
//! - Bootstrapping background, content-script and page contexts
//! - Loading the middleware and injecting the page script
//! - Calling a page procedure from the background
//! - Calling a background procedure from the page
//! - Re-injecting an already injected page script
//!
//! Usage:
//!   cargo run --example detect_libraries
//!   cargo run --example detect_libraries -- --chromium
//!   cargo run --example detect_libraries -- --debug

// ============================================================================
// Imports
// ============================================================================

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing_subscriber::EnvFilter;
use webext_rpc::{
    BackgroundContext, Browser, ContentScriptContext, MemoryHost, PageContext, Result,
    RpcClientExt, RpcConfig,
};

// ============================================================================
// Constants
// ============================================================================

const EXTENSION_ORIGIN: &str = "chrome-extension://abcdefghijklmnopabcdefghijklmnop/";
const PAGE_SCRIPT: &str = "/page-script.js";

// ============================================================================
// Types
// ============================================================================

#[derive(Debug, Clone)]
struct Args {
    debug: bool,
    chromium: bool,
}

impl Args {
    fn parse() -> Self {
        let args: Vec<String> = std::env::args().collect();
        Self {
            debug: args.iter().any(|a| a == "--debug"),
            chromium: args.iter().any(|a| a == "--chromium"),
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
struct Greeting {
    name: String,
}

// ============================================================================
// Main
// ============================================================================

#[tokio::main]
async fn main() {
    let args = Args::parse();
    init_logging(args.debug);

    if let Err(e) = run(args).await {
        eprintln!("\n[ERROR] {e}");
        std::process::exit(1);
    }
}

async fn run(args: Args) -> Result<()> {
    println!("=== Detect Libraries ===\n");

    let browser = if args.chromium {
        Browser::Chromium
    } else {
        Browser::Firefox
    };

    let mut builder = RpcConfig::builder().browser(browser);
    if browser == Browser::Chromium {
        builder = builder.origin(webext_rpc::ExtensionOrigin::parse(EXTENSION_ORIGIN)?);
    }
    let config = builder.build()?;
    println!("[1] Browser: {browser}\n");

    // ========================================================================
    // Sandboxes
    // ========================================================================

    let host = MemoryHost::new();

    let background = BackgroundContext::new(
        config.clone(),
        host.messaging(),
        host.active_tab(),
        host.content_scripts(),
    );
    background
        .procedures()
        .register_typed("greet", |greeting: Greeting| async move {
            Ok(format!("Hello, {}!", greeting.name))
        });
    background.server().listen();

    let content = Arc::new(ContentScriptContext::new(
        config.clone(),
        host.page_channel(),
        host.messaging(),
        host.active_tab(),
        host.page_scripts(),
    ));

    let page = Arc::new(PageContext::new(config, host.page_channel(), host.messaging())?);
    page.procedures()
        .register("detect", |_| async { Ok(json!("jQuery,Lodash")) });

    // Loading a script runs its bootstrap.
    let content_script = Arc::clone(&content);
    host.content_scripts().on_load(move |_| {
        content_script.install();
    });
    let page_script = Arc::clone(&page);
    host.page_scripts().on_load(move |_| {
        if let Err(e) = page_script.satisfied() {
            eprintln!("    ✗ {e}");
        }
    });

    // ========================================================================
    // Injection
    // ========================================================================

    println!("[2] Initializing content-script middleware...");
    background.initialize().await?;
    println!("    ✓ Middleware ready\n");

    println!("[3] Injecting {PAGE_SCRIPT}...");
    background.inject_page_script(PAGE_SCRIPT).await?;
    println!("    ✓ Page script ready ({})\n", content.injection_state());

    // ========================================================================
    // Calls
    // ========================================================================

    println!("[4] background → page: detect");
    let libraries = background.client().call("detect", json!({})).await?;
    println!("    ✓ {libraries}\n");

    println!("[5] page → background: greet");
    let greeting: String = page
        .client()
        .call_as("greet", &Greeting { name: "page".into() })
        .await?;
    println!("    ✓ {greeting}\n");

    println!("[6] Re-injecting {PAGE_SCRIPT}...");
    background.inject_page_script(PAGE_SCRIPT).await?;
    println!(
        "    ✓ Resolved without reloading (loads: {})\n",
        host.page_scripts().load_count(PAGE_SCRIPT)
    );

    println!("=== Done ===");
    Ok(())
}

// ============================================================================
// Functions
// ============================================================================

fn init_logging(debug: bool) {
    let filter = if debug {
        "webext_rpc=debug"
    } else {
        "webext_rpc=info"
    };

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(filter))
        .with_target(false)
        .init();
}
