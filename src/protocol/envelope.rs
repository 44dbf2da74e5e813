//! RPC envelope: the addressed request/response message.
//!
//! # Format
//!
//! Request:
//! ```json
//! {
//!   "targetReceiver": "web-page-server",
//!   "procedureName": "detect",
//!   "procedureArgs": { ... },
//!   "captureReturnValue": false
//! }
//! ```
//!
//! Response:
//! ```json
//! {
//!   "targetReceiver": "background-client",
//!   "procedureName": "detect",
//!   "returnValue": "jQuery,Lodash",
//!   "captureReturnValue": false
//! }
//! ```
//!
//! The presence of the `returnValue` key, not its value, makes a message a
//! response. `"returnValue": null` is a response whose value is null.

// ============================================================================
// Imports
// ============================================================================

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};
use tracing::{trace, warn};

use crate::error::{Error, Result};
use crate::identifiers::ReceiverTag;

// ============================================================================
// Envelope
// ============================================================================

/// The unit of RPC communication across sandboxes.
///
/// A request has no `return_value`; a response has one. The two states are
/// the two arms of an `Option`, so an envelope cannot be both.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Envelope {
    /// Component the envelope is addressed to.
    pub target_receiver: ReceiverTag,

    /// Name of the remote procedure.
    pub procedure_name: String,

    /// Opaque JSON arguments (requests only).
    #[serde(default, skip_serializing_if = "Value::is_null")]
    pub procedure_args: Value,

    /// Procedure result (responses only).
    #[serde(
        default,
        deserialize_with = "deserialize_present",
        skip_serializing_if = "Option::is_none"
    )]
    pub return_value: Option<Value>,

    /// Failure message when the procedure rejected (responses only).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,

    /// Whether a relay hop must hold its reply channel open for the answer.
    #[serde(default)]
    pub capture_return_value: bool,
}

/// Maps a present key to `Some`, even when its value is `null`.
fn deserialize_present<'de, D>(deserializer: D) -> std::result::Result<Option<Value>, D::Error>
where
    D: Deserializer<'de>,
{
    Value::deserialize(deserializer).map(Some)
}

// ============================================================================
// Envelope - Constructors
// ============================================================================

impl Envelope {
    /// Creates a request envelope.
    #[inline]
    #[must_use]
    pub fn request(target: ReceiverTag, procedure: impl Into<String>, args: Value) -> Self {
        Self {
            target_receiver: target,
            procedure_name: procedure.into(),
            procedure_args: args,
            return_value: None,
            error: None,
            capture_return_value: false,
        }
    }

    /// Creates a successful response envelope.
    #[inline]
    #[must_use]
    pub fn response(target: ReceiverTag, procedure: impl Into<String>, value: Value) -> Self {
        Self {
            target_receiver: target,
            procedure_name: procedure.into(),
            procedure_args: Value::Null,
            return_value: Some(value),
            error: None,
            capture_return_value: false,
        }
    }

    /// Creates a response envelope for a rejected procedure.
    #[inline]
    #[must_use]
    pub fn failure(target: ReceiverTag, procedure: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            error: Some(message.into()),
            ..Self::response(target, procedure, Value::Null)
        }
    }

    /// Creates the response to `self` from a dispatch outcome.
    #[must_use]
    pub fn reply(&self, target: ReceiverTag, outcome: &Result<Value>) -> Self {
        match outcome {
            Ok(value) => Self::response(target, &self.procedure_name, value.clone()),
            Err(e) => Self::failure(target, &self.procedure_name, e.to_string()),
        }
    }
}

// ============================================================================
// Envelope - Addressing
// ============================================================================

impl Envelope {
    /// Returns the envelope carried by `message` if it is addressed to
    /// `receiver`.
    ///
    /// Anything else (another tag, a bare string signal, a malformed
    /// object) yields `None` and never panics.
    #[must_use]
    pub fn addressed_to(message: &Value, receiver: &ReceiverTag) -> Option<Self> {
        let target = message.as_object()?.get("targetReceiver")?.as_str()?;

        if target != receiver.as_str() {
            trace!(%receiver, target, "Envelope for another receiver");
            return None;
        }

        match Self::deserialize(message) {
            Ok(envelope) => Some(envelope),
            Err(e) => {
                warn!(%receiver, error = %e, "Malformed envelope ignored");
                None
            }
        }
    }

    /// Parses a reply value that must be an envelope.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Json`] if the value is not an envelope.
    pub fn from_value(value: Value) -> Result<Self> {
        Ok(serde_json::from_value(value)?)
    }

    /// Returns `true` if this is a request.
    #[inline]
    #[must_use]
    pub fn is_request(&self) -> bool {
        self.return_value.is_none()
    }

    /// Returns `true` if this is a response.
    #[inline]
    #[must_use]
    pub fn is_response(&self) -> bool {
        self.return_value.is_some()
    }

    /// Returns `true` if this is a response to `procedure`.
    #[inline]
    #[must_use]
    pub fn answers(&self, procedure: &str) -> bool {
        self.is_response() && self.procedure_name == procedure
    }

    /// Re-addresses the envelope for the next hop.
    #[inline]
    #[must_use]
    pub fn readdressed(mut self, target: ReceiverTag) -> Self {
        self.target_receiver = target;
        self
    }

    /// Sets the capture flag.
    #[inline]
    #[must_use]
    pub fn with_capture(mut self, capture: bool) -> Self {
        self.capture_return_value = capture;
        self
    }

    /// Converts a response into the caller-facing outcome.
    ///
    /// # Errors
    ///
    /// - [`Error::Procedure`] if the remote procedure rejected
    /// - [`Error::Protocol`] if the envelope is a request
    pub fn into_outcome(self) -> Result<Value> {
        if let Some(message) = self.error {
            return Err(Error::procedure(self.procedure_name, message));
        }

        self.return_value.ok_or_else(|| {
            Error::protocol(format!(
                "Expected a response for '{}' but got a request",
                self.procedure_name
            ))
        })
    }

    /// Serializes the envelope into a channel message.
    #[must_use]
    pub fn to_value(&self) -> Value {
        let mut map = Map::new();
        map.insert(
            "targetReceiver".into(),
            Value::String(self.target_receiver.as_str().to_string()),
        );
        map.insert(
            "procedureName".into(),
            Value::String(self.procedure_name.clone()),
        );
        if !self.procedure_args.is_null() {
            map.insert("procedureArgs".into(), self.procedure_args.clone());
        }
        if let Some(value) = &self.return_value {
            map.insert("returnValue".into(), value.clone());
        }
        if let Some(error) = &self.error {
            map.insert("error".into(), Value::String(error.clone()));
        }
        map.insert(
            "captureReturnValue".into(),
            Value::Bool(self.capture_return_value),
        );
        Value::Object(map)
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    use proptest::prelude::*;
    use serde_json::json;

    #[test]
    fn test_request_serialization() {
        let request = Envelope::request(ReceiverTag::WEB_PAGE_SERVER, "detect", json!({}));
        let value = request.to_value();

        assert_eq!(value["targetReceiver"], "web-page-server");
        assert_eq!(value["procedureName"], "detect");
        assert!(value.get("returnValue").is_none());
        assert_eq!(value["captureReturnValue"], false);
    }

    #[test]
    fn test_to_value_matches_serde() {
        let response = Envelope::response(ReceiverTag::BACKGROUND_CLIENT, "sum", json!(5));
        assert_eq!(
            response.to_value(),
            serde_json::to_value(&response).expect("serialize")
        );
    }

    #[test]
    fn test_null_return_value_is_a_response() {
        let value = json!({
            "targetReceiver": "background-client",
            "procedureName": "lookup",
            "returnValue": null
        });

        let envelope =
            Envelope::addressed_to(&value, &ReceiverTag::BACKGROUND_CLIENT).expect("addressed");
        assert!(envelope.is_response());
        assert_eq!(envelope.into_outcome().expect("outcome"), Value::Null);
    }

    #[test]
    fn test_falsy_return_values_are_responses() {
        for falsy in [json!(false), json!(0), json!("")] {
            let value = json!({
                "targetReceiver": "web-page-client",
                "procedureName": "check",
                "returnValue": falsy.clone()
            });
            let envelope =
                Envelope::addressed_to(&value, &ReceiverTag::WEB_PAGE_CLIENT).expect("addressed");
            assert!(envelope.is_response());
            assert_eq!(envelope.return_value, Some(falsy));
        }
    }

    #[test]
    fn test_addressed_to_ignores_other_shapes() {
        let tag = ReceiverTag::BACKGROUND_SERVER;

        assert!(Envelope::addressed_to(&json!("page-script-satisfied"), &tag).is_none());
        assert!(Envelope::addressed_to(&json!(42), &tag).is_none());
        assert!(Envelope::addressed_to(&json!(null), &tag).is_none());
        assert!(Envelope::addressed_to(&json!({"procedureName": "x"}), &tag).is_none());
        // Right tag, but procedureName missing.
        assert!(Envelope::addressed_to(&json!({"targetReceiver": "background-server"}), &tag).is_none());
    }

    #[test]
    fn test_failure_into_outcome() {
        let failure = Envelope::failure(ReceiverTag::WEB_PAGE_CLIENT, "detect", "boom");
        assert!(failure.is_response());

        let err = failure.into_outcome().unwrap_err();
        assert!(matches!(err, Error::Procedure { ref procedure, .. } if procedure == "detect"));
    }

    #[test]
    fn test_reply_preserves_procedure_name() {
        let request = Envelope::request(ReceiverTag::WEB_PAGE_SERVER, "sum", json!({"a": 1}));
        let reply = request.reply(ReceiverTag::CONTENT_SCRIPT_RELAY, &Ok(json!(3)));

        assert!(reply.answers("sum"));
        assert_eq!(reply.target_receiver, ReceiverTag::CONTENT_SCRIPT_RELAY);
        assert_eq!(reply.procedure_args, Value::Null);
    }

    #[test]
    fn test_request_into_outcome_is_protocol_error() {
        let request = Envelope::request(ReceiverTag::WEB_PAGE_SERVER, "sum", json!({}));
        assert!(matches!(request.into_outcome(), Err(Error::Protocol { .. })));
    }

    fn arb_json() -> impl Strategy<Value = Value> {
        prop_oneof![
            Just(Value::Null),
            any::<bool>().prop_map(Value::Bool),
            any::<i64>().prop_map(|n| json!(n)),
            "[a-zA-Z0-9 ,]{0,16}".prop_map(Value::String),
        ]
    }

    proptest! {
        #[test]
        fn prop_addressing_filter(
            own in "[a-z-]{1,24}",
            target in "[a-z-]{1,24}",
            name in "[a-z]{1,12}",
        ) {
            let own = ReceiverTag::new(own);
            let message = json!({ "targetReceiver": target.clone(), "procedureName": name });
            let accepted = Envelope::addressed_to(&message, &own).is_some();
            prop_assert_eq!(accepted, own.as_str() == target);
        }

        #[test]
        fn prop_request_response_duality(
            value in proptest::option::of(arb_json()),
            args in arb_json(),
        ) {
            let mut message = json!({
                "targetReceiver": "web-page-server",
                "procedureName": "p",
                "procedureArgs": args,
            });
            if let Some(v) = &value {
                message["returnValue"] = v.clone();
            }

            let envelope = Envelope::addressed_to(&message, &ReceiverTag::WEB_PAGE_SERVER)
                .expect("addressed");
            prop_assert_ne!(envelope.is_request(), envelope.is_response());
            prop_assert_eq!(envelope.is_response(), value.is_some());

            let round_trip = Envelope::from_value(envelope.to_value()).expect("parse");
            prop_assert_eq!(round_trip.is_response(), value.is_some());
        }
    }
}
