//! Background-process servers and clients.

// ============================================================================
// Imports
// ============================================================================

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;

use crate::channel::{Endpoint, ExtensionMessaging};
use crate::error::Result;
use crate::fault::FaultReporter;
use crate::identifiers::{ReceiverTag, TabId};

use super::client::{ClientCore, RpcClient, await_response, decode_reply};
use super::registry::ProcedureRegistry;
use super::server::{RpcServer, ServerCore, serve_deliveries};

// ============================================================================
// ChromiumBackgroundServer
// ============================================================================

/// Background server reached by the page directly over `External`.
pub struct ChromiumBackgroundServer {
    core: ServerCore,
    messaging: Arc<dyn ExtensionMessaging>,
}

impl ChromiumBackgroundServer {
    /// Creates a server answering to `background-server`.
    #[must_use]
    pub fn new(
        messaging: Arc<dyn ExtensionMessaging>,
        procedures: ProcedureRegistry,
        faults: FaultReporter,
    ) -> Self {
        Self {
            core: ServerCore::new(ReceiverTag::BACKGROUND_SERVER, procedures, faults),
            messaging,
        }
    }
}

impl RpcServer for ChromiumBackgroundServer {
    fn receiver(&self) -> &ReceiverTag {
        self.core.receiver()
    }

    fn procedures(&self) -> &ProcedureRegistry {
        self.core.procedures()
    }

    fn listen(&self) -> bool {
        self.core.start(|| {
            let deliveries = self.messaging.listen(Endpoint::External);
            tokio::spawn(serve_deliveries(
                deliveries,
                self.core.receiver().clone(),
                ReceiverTag::WEB_PAGE_CLIENT,
                self.core.procedures().clone(),
                self.core.faults().clone(),
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
// FirefoxBackgroundServer
// ============================================================================

/// Background server reached through the content-script relay over
/// `Runtime`.
pub struct FirefoxBackgroundServer {
    core: ServerCore,
    messaging: Arc<dyn ExtensionMessaging>,
}

impl FirefoxBackgroundServer {
    /// Creates a server answering to `background-server`.
    #[must_use]
    pub fn new(
        messaging: Arc<dyn ExtensionMessaging>,
        procedures: ProcedureRegistry,
        faults: FaultReporter,
    ) -> Self {
        Self {
            core: ServerCore::new(ReceiverTag::BACKGROUND_SERVER, procedures, faults),
            messaging,
        }
    }
}

impl RpcServer for FirefoxBackgroundServer {
    fn receiver(&self) -> &ReceiverTag {
        self.core.receiver()
    }

    fn procedures(&self) -> &ProcedureRegistry {
        self.core.procedures()
    }

    fn listen(&self) -> bool {
        self.core.start(|| {
            let deliveries = self.messaging.listen(Endpoint::Runtime);
            tokio::spawn(serve_deliveries(
                deliveries,
                self.core.receiver().clone(),
                ReceiverTag::CONTENT_SCRIPT_RELAY,
                self.core.procedures().clone(),
                self.core.faults().clone(),
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
// ChromiumBackgroundClient
// ============================================================================

/// Background client whose replies come back from the page server as
/// separate `External` messages.
pub struct ChromiumBackgroundClient {
    core: ClientCore,
    messaging: Arc<dyn ExtensionMessaging>,
    tab_id: TabId,
}

impl ChromiumBackgroundClient {
    /// Creates a client calling the page in `tab_id` through the relay.
    #[must_use]
    pub fn new(
        messaging: Arc<dyn ExtensionMessaging>,
        tab_id: TabId,
        call_timeout: Option<Duration>,
    ) -> Self {
        Self {
            core: ClientCore::new(
                ReceiverTag::CONTENT_SCRIPT_RELAY,
                ReceiverTag::BACKGROUND_CLIENT,
                false,
                call_timeout,
            ),
            messaging,
            tab_id,
        }
    }
}

#[async_trait]
impl RpcClient for ChromiumBackgroundClient {
    fn target(&self) -> &ReceiverTag {
        self.core.target()
    }

    async fn call(&self, procedure: &str, args: Value) -> Result<Value> {
        self.core
            .run(procedure, async move {
                let mut replies = self.messaging.listen(Endpoint::External);

                let request = self.core.request(procedure, args);
                // The relay does not answer on the tab channel.
                drop(self.messaging.send(Endpoint::Tab(self.tab_id), request.to_value())?);

                await_response(&mut replies, self.core.reply_to(), procedure).await
            })
            .await
    }
}

// ============================================================================
// FirefoxBackgroundClient
// ============================================================================

/// Background client whose replies come back through the relay's native
/// reply slot.
pub struct FirefoxBackgroundClient {
    core: ClientCore,
    messaging: Arc<dyn ExtensionMessaging>,
    tab_id: TabId,
}

impl FirefoxBackgroundClient {
    /// Creates a client calling the page in `tab_id` through the relay.
    #[must_use]
    pub fn new(
        messaging: Arc<dyn ExtensionMessaging>,
        tab_id: TabId,
        call_timeout: Option<Duration>,
    ) -> Self {
        Self {
            core: ClientCore::new(
                ReceiverTag::CONTENT_SCRIPT_RELAY,
                ReceiverTag::BACKGROUND_CLIENT,
                true,
                call_timeout,
            ),
            messaging,
            tab_id,
        }
    }
}

#[async_trait]
impl RpcClient for FirefoxBackgroundClient {
    fn target(&self) -> &ReceiverTag {
        self.core.target()
    }

    async fn call(&self, procedure: &str, args: Value) -> Result<Value> {
        self.core
            .run(procedure, async move {
                let request = self.core.request(procedure, args);
                let reply = self
                    .messaging
                    .send(Endpoint::Tab(self.tab_id), request.to_value())?;

                decode_reply(procedure, reply.await)
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
    use crate::error::Error;
    use crate::protocol::Envelope;

    #[tokio::test]
    async fn test_firefox_server_replies_to_relay() {
        let host = MemoryHost::new();
        let procedures = ProcedureRegistry::new();
        procedures.register("version", |_| async { Ok(json!("1.0")) });

        let server =
            FirefoxBackgroundServer::new(host.messaging(), procedures, FaultReporter::new());
        assert!(server.listen());
        assert!(!server.listen());
        assert_eq!(host.listener_count(Endpoint::Runtime), 1);

        let request = Envelope::request(ReceiverTag::BACKGROUND_SERVER, "version", Value::Null);
        let reply = host
            .messaging()
            .send(Endpoint::Runtime, request.to_value())
            .expect("send")
            .await
            .expect("reply");

        let response = Envelope::from_value(reply).expect("envelope");
        assert_eq!(response.target_receiver, ReceiverTag::CONTENT_SCRIPT_RELAY);
        assert_eq!(response.into_outcome().expect("outcome"), json!("1.0"));
    }

    #[tokio::test]
    async fn test_chromium_server_reports_unregistered_procedure() {
        let host = MemoryHost::new();
        let server = ChromiumBackgroundServer::new(
            host.messaging(),
            ProcedureRegistry::new(),
            FaultReporter::new(),
        );
        server.listen();

        let request = Envelope::request(ReceiverTag::BACKGROUND_SERVER, "missing", Value::Null);
        let reply = host
            .messaging()
            .send(Endpoint::External, request.to_value())
            .expect("send")
            .await
            .expect("reply");

        let response = Envelope::from_value(reply).expect("envelope");
        assert_eq!(response.target_receiver, ReceiverTag::WEB_PAGE_CLIENT);
        let err = response.into_outcome().unwrap_err();
        assert!(err.to_string().contains("missing"));
    }

    #[tokio::test]
    async fn test_shutdown_removes_listener() {
        let host = MemoryHost::new();
        let server = FirefoxBackgroundServer::new(
            host.messaging(),
            ProcedureRegistry::new(),
            FaultReporter::new(),
        );
        server.listen();
        assert!(server.is_listening());

        server.shutdown();
        assert!(!server.is_listening());
        tokio::task::yield_now().await;
        assert_eq!(host.listener_count(Endpoint::Runtime), 0);
    }

    #[tokio::test]
    async fn test_firefox_client_without_relay_is_unreachable() {
        let host = MemoryHost::new();
        let client = FirefoxBackgroundClient::new(host.messaging(), host.active_tab(), None);

        let err = client.call("detect", json!({})).await.unwrap_err();
        assert!(matches!(err, Error::Unreachable { .. }));
    }

    #[tokio::test]
    async fn test_firefox_client_undefined_reply() {
        let host = MemoryHost::new();
        let mut silent = host.listen(Endpoint::Tab(host.active_tab()));

        let client = FirefoxBackgroundClient::new(host.messaging(), host.active_tab(), None);
        let call = tokio::spawn(async move { client.call("detect", json!({})).await });

        drop(silent.recv().await);
        let err = call.await.expect("join").unwrap_err();
        assert!(matches!(err, Error::UndefinedReply { .. }));
    }
}
