//! Web-page servers and clients.

// ============================================================================
// Imports
// ============================================================================

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;
use tracing::trace;

use crate::channel::{Endpoint, ExtensionMessaging, PageChannel};
use crate::error::Result;
use crate::fault::FaultReporter;
use crate::identifiers::{ExtensionId, ReceiverTag};
use crate::protocol::Envelope;

use super::client::{ClientCore, RpcClient, await_response, decode_reply};
use super::registry::ProcedureRegistry;
use super::server::{RpcServer, ServerCore, serve_page};

// ============================================================================
// ChromiumPageServer
// ============================================================================

/// Page server that answers the background directly over `External`.
pub struct ChromiumPageServer {
    core: ServerCore,
    page: Arc<dyn PageChannel>,
    messaging: Arc<dyn ExtensionMessaging>,
}

impl ChromiumPageServer {
    /// Creates a server answering to `web-page-server`.
    #[must_use]
    pub fn new(
        page: Arc<dyn PageChannel>,
        messaging: Arc<dyn ExtensionMessaging>,
        procedures: ProcedureRegistry,
        faults: FaultReporter,
    ) -> Self {
        Self {
            core: ServerCore::new(ReceiverTag::WEB_PAGE_SERVER, procedures, faults),
            page,
            messaging,
        }
    }
}

impl RpcServer for ChromiumPageServer {
    fn receiver(&self) -> &ReceiverTag {
        self.core.receiver()
    }

    fn procedures(&self) -> &ProcedureRegistry {
        self.core.procedures()
    }

    fn listen(&self) -> bool {
        self.core.start(|| {
            let messages = self.page.subscribe();
            let messaging = Arc::clone(&self.messaging);
            let faults = self.core.faults().clone();

            let respond = move |response: Envelope| {
                match messaging.send(Endpoint::External, response.to_value()) {
                    // The background client reads the response as a message.
                    Ok(reply) => drop(reply),
                    Err(e) => {
                        faults.report("page-server", e);
                    }
                }
            };

            tokio::spawn(serve_page(
                messages,
                self.core.receiver().clone(),
                ReceiverTag::BACKGROUND_CLIENT,
                self.core.procedures().clone(),
                respond,
            ))
        })
    }

    fn is_listening(&self) -> bool {
        self.core.is_listening()
    }

    fn shutdown(&self) {
        self.core.shutdown();
    }
}

// ============================================================================
// FirefoxPageServer
// ============================================================================

/// Page server that answers the relay on the page channel.
pub struct FirefoxPageServer {
    core: ServerCore,
    page: Arc<dyn PageChannel>,
}

impl FirefoxPageServer {
    /// Creates a server answering to `web-page-server`.
    #[must_use]
    pub fn new(
        page: Arc<dyn PageChannel>,
        procedures: ProcedureRegistry,
        faults: FaultReporter,
    ) -> Self {
        Self {
            core: ServerCore::new(ReceiverTag::WEB_PAGE_SERVER, procedures, faults),
            page,
        }
    }
}

impl RpcServer for FirefoxPageServer {
    fn receiver(&self) -> &ReceiverTag {
        self.core.receiver()
    }

    fn procedures(&self) -> &ProcedureRegistry {
        self.core.procedures()
    }

    fn listen(&self) -> bool {
        self.core.start(|| {
            let messages = self.page.subscribe();
            let page = Arc::clone(&self.page);

            tokio::spawn(serve_page(
                messages,
                self.core.receiver().clone(),
                ReceiverTag::CONTENT_SCRIPT_RELAY,
                self.core.procedures().clone(),
                move |response| page.post(response.to_value()),
            ))
        })
    }

    fn is_listening(&self) -> bool {
        self.core.is_listening()
    }

    fn shutdown(&self) {
        self.core.shutdown();
    }
}

// ============================================================================
// ChromiumPageClient
// ============================================================================

/// Page client that messages the background server directly.
pub struct ChromiumPageClient {
    core: ClientCore,
    messaging: Arc<dyn ExtensionMessaging>,
    extension_id: ExtensionId,
}

impl ChromiumPageClient {
    /// Creates a client calling the background of `extension_id`.
    #[must_use]
    pub fn new(
        messaging: Arc<dyn ExtensionMessaging>,
        extension_id: ExtensionId,
        call_timeout: Option<Duration>,
    ) -> Self {
        Self {
            core: ClientCore::new(
                ReceiverTag::BACKGROUND_SERVER,
                ReceiverTag::WEB_PAGE_CLIENT,
                false,
                call_timeout,
            ),
            messaging,
            extension_id,
        }
    }

    /// Returns the extension this client talks to.
    #[inline]
    #[must_use]
    pub fn extension_id(&self) -> &ExtensionId {
        &self.extension_id
    }
}

#[async_trait]
impl RpcClient for ChromiumPageClient {
    fn target(&self) -> &ReceiverTag {
        self.core.target()
    }

    async fn call(&self, procedure: &str, args: Value) -> Result<Value> {
        self.core
            .run(procedure, async move {
                let request = self.core.request(procedure, args);
                trace!(extension_id = %self.extension_id, procedure, "Messaging extension");
                let reply = self.messaging.send(Endpoint::External, request.to_value())?;

                decode_reply(procedure, reply.await)
            })
            .await
    }
}

// ============================================================================
// FirefoxPageClient
// ============================================================================

/// Page client that goes through the content-script relay.
pub struct FirefoxPageClient {
    core: ClientCore,
    page: Arc<dyn PageChannel>,
}

impl FirefoxPageClient {
    /// Creates a client posting to the relay on `page`.
    #[must_use]
    pub fn new(page: Arc<dyn PageChannel>, call_timeout: Option<Duration>) -> Self {
        Self {
            core: ClientCore::new(
                ReceiverTag::CONTENT_SCRIPT_RELAY,
                ReceiverTag::WEB_PAGE_CLIENT,
                false,
                call_timeout,
            ),
            page,
        }
    }
}

#[async_trait]
impl RpcClient for FirefoxPageClient {
    fn target(&self) -> &ReceiverTag {
        self.core.target()
    }

    async fn call(&self, procedure: &str, args: Value) -> Result<Value> {
        self.core
            .run(procedure, async move {
                let mut replies = self.page.subscribe();

                let request = self.core.request(procedure, args);
                self.page.post(request.to_value());

                await_response(&mut replies, self.core.reply_to(), procedure).await
            })
            .await
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    use serde_json::json;

    use crate::channel::MemoryHost;

    #[tokio::test]
    async fn test_firefox_page_server_answers_relay() {
        let host = MemoryHost::new();
        let page = host.page_channel();
        let procedures = ProcedureRegistry::new();
        procedures.register("detect", |_| async { Ok(json!("jQuery,Lodash")) });

        let server = FirefoxPageServer::new(Arc::clone(&page), procedures, FaultReporter::new());
        server.listen();

        let mut observer = page.subscribe();
        page.post(Envelope::request(ReceiverTag::WEB_PAGE_SERVER, "detect", json!({})).to_value());

        let value = await_response(&mut observer, &ReceiverTag::CONTENT_SCRIPT_RELAY, "detect")
            .await
            .expect("response");
        assert_eq!(value, json!("jQuery,Lodash"));
    }

    #[tokio::test]
    async fn test_page_server_intake() {
        let host = MemoryHost::new();
        let server =
            FirefoxPageServer::new(host.page_channel(), ProcedureRegistry::new(), FaultReporter::new());

        let request = Envelope::request(ReceiverTag::WEB_PAGE_SERVER, "x", Value::Null);
        let response = Envelope::response(ReceiverTag::WEB_PAGE_SERVER, "x", Value::Null);
        let foreign = Envelope::request(ReceiverTag::BACKGROUND_SERVER, "x", Value::Null);

        assert!(server.intake(&request.to_value()));
        assert!(!server.intake(&response.to_value()));
        assert!(!server.intake(&foreign.to_value()));
        assert!(!server.intake(&json!("page-script-satisfied")));
    }

    #[tokio::test]
    async fn test_chromium_page_client_direct_round_trip() {
        let host = MemoryHost::new();
        let procedures = ProcedureRegistry::new();
        procedures.register("version", |_| async { Ok(json!("2.1")) });

        let server = crate::rpc::ChromiumBackgroundServer::new(
            host.messaging(),
            procedures,
            FaultReporter::new(),
        );
        server.listen();

        let client = ChromiumPageClient::new(host.messaging(), ExtensionId::new("abcdef"), None);
        assert_eq!(client.call("version", Value::Null).await.expect("call"), json!("2.1"));
        assert_eq!(client.extension_id().as_str(), "abcdef");
    }
}
