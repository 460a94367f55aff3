//! The envelope: unit of exchange between a service and its remote parties.

use std::fmt;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::errors::EnvelopeError;
use crate::fields;
use crate::kind::{EnvelopeType, ErrorKind, ServiceEvent};
use crate::value::{Value, ValueMap};

/// Opaque identifier assigned to every constructed envelope.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EnvelopeId(String);

impl EnvelopeId {
    /// Generates a fresh random identifier.
    #[must_use]
    pub fn generate() -> Self {
        Self(Uuid::new_v4().simple().to_string())
    }

    /// Returns the identifier text.
    #[must_use]
    pub fn as_str(&self) -> &str {
        self.0.as_str()
    }
}

impl fmt::Display for EnvelopeId {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter.write_str(&self.0)
    }
}

impl From<&str> for EnvelopeId {
    fn from(value: &str) -> Self {
        Self(value.to_owned())
    }
}

/// Message exchanged with a remote party.
///
/// Responses are correlated to their request through [`Envelope::response_id`],
/// which always equals the request's [`Envelope::id`]. Payload data lives in
/// [`Envelope::values`], an insertion-ordered map of named [`Value`]s.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct Envelope {
    #[serde(rename = "Type", default)]
    kind: EnvelopeType,
    #[serde(default)]
    sub_type: i32,
    #[serde(rename = "ID", default = "EnvelopeId::generate")]
    id: EnvelopeId,
    #[serde(
        rename = "ResponseID",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    response_id: Option<EnvelopeId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    sender: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    target: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    tag: Option<String>,
    #[serde(default, skip_serializing_if = "ValueMap::is_empty")]
    values: ValueMap,
}

impl Envelope {
    /// Creates an envelope of the given type with a fresh identifier.
    #[must_use]
    pub fn new(kind: EnvelopeType) -> Self {
        Self {
            kind,
            sub_type: 0,
            id: EnvelopeId::generate(),
            response_id: None,
            sender: None,
            target: None,
            tag: None,
            values: ValueMap::new(),
        }
    }

    /// Creates a request envelope with a type-specific sub type.
    #[must_use]
    pub fn request(kind: EnvelopeType, sub_type: i32) -> Self {
        let mut envelope = Self::new(kind);
        envelope.sub_type = sub_type;
        envelope
    }

    /// Creates a response to `original`.
    ///
    /// The response is addressed to the original sender, carries the
    /// original identifier as its response identifier, and echoes the tag.
    #[must_use]
    pub fn response_to(original: &Self, kind: EnvelopeType) -> Self {
        let mut response = Self::new(kind);
        response.target.clone_from(&original.sender);
        response.response_id = Some(original.id.clone());
        response.tag.clone_from(&original.tag);
        response
    }

    /// Creates an Error envelope carrying `reason` and its classification.
    ///
    /// When `original` is supplied the error follows the response rule of
    /// [`Envelope::response_to`].
    #[must_use]
    pub fn error_for(reason: impl Into<String>, kind: ErrorKind, original: Option<&Self>) -> Self {
        let mut error = match original {
            Some(original) => Self::response_to(original, EnvelopeType::Error),
            None => Self::new(EnvelopeType::Error),
        };
        error.insert(fields::ERROR_MESSAGE, reason.into());
        error.insert(fields::ERROR_KIND, kind.to_string());
        error
    }

    /// Creates an unaddressed notification announcing `event`.
    #[must_use]
    pub fn notification(event: ServiceEvent) -> Self {
        let mut notification = Self::new(EnvelopeType::Notification);
        notification.insert(fields::SERVICE_EVENT, event.to_string());
        notification.insert(fields::DESCRIPTION, event.description());
        notification
    }

    /// Message type.
    #[must_use]
    pub fn kind(&self) -> EnvelopeType {
        self.kind
    }

    /// Type-specific sub type.
    #[must_use]
    pub fn sub_type(&self) -> i32 {
        self.sub_type
    }

    /// Sets the type-specific sub type.
    pub fn set_sub_type(&mut self, sub_type: i32) {
        self.sub_type = sub_type;
    }

    /// Unique identifier of this envelope.
    #[must_use]
    pub fn id(&self) -> &EnvelopeId {
        &self.id
    }

    /// Identifier of the envelope this one answers.
    #[must_use]
    pub fn response_id(&self) -> Option<&EnvelopeId> {
        self.response_id.as_ref()
    }

    /// Identity of the sending party, when known.
    #[must_use]
    pub fn sender(&self) -> Option<&str> {
        self.sender.as_deref()
    }

    /// Sets the sending identity.
    pub fn set_sender(&mut self, sender: impl Into<String>) {
        self.sender = Some(sender.into());
    }

    /// Identity of the receiving party, when set.
    #[must_use]
    pub fn target(&self) -> Option<&str> {
        self.target.as_deref()
    }

    /// Sets the receiving identity.
    pub fn set_target(&mut self, target: impl Into<String>) {
        self.target = Some(target.into());
    }

    /// Builder form of [`Envelope::set_target`].
    #[must_use]
    pub fn with_target(mut self, target: impl Into<String>) -> Self {
        self.set_target(target);
        self
    }

    /// Opaque caller-defined tag.
    #[must_use]
    pub fn tag(&self) -> Option<&str> {
        self.tag.as_deref()
    }

    /// Sets the caller-defined tag.
    pub fn set_tag(&mut self, tag: impl Into<String>) {
        self.tag = Some(tag.into());
    }

    /// Payload values.
    #[must_use]
    pub fn values(&self) -> &ValueMap {
        &self.values
    }

    /// Mutable payload values.
    pub fn values_mut(&mut self) -> &mut ValueMap {
        &mut self.values
    }

    /// Inserts or replaces a payload value.
    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<Value>) {
        self.values.insert(key, value);
    }

    /// Builder form of [`Envelope::insert`].
    #[must_use]
    pub fn with_value(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.insert(key, value);
        self
    }

    /// Looks up a payload value.
    #[must_use]
    pub fn value(&self, key: &str) -> Option<&Value> {
        self.values.get(key)
    }

    /// Looks up a string payload value.
    #[must_use]
    pub fn string_value(&self, key: &str) -> Option<&str> {
        self.value(key).and_then(Value::as_str)
    }

    /// Classification carried by an Error envelope.
    #[must_use]
    pub fn error_kind(&self) -> Option<ErrorKind> {
        self.string_value(fields::ERROR_KIND)
            .and_then(|text| text.parse().ok())
    }

    /// Failure reason carried by an Error envelope.
    #[must_use]
    pub fn error_message(&self) -> Option<&str> {
        self.string_value(fields::ERROR_MESSAGE)
    }

    /// Copies this envelope for delivery to `target` under a fresh identifier.
    #[must_use]
    pub fn copy_for(&self, target: impl Into<String>) -> Self {
        let mut copy = self.clone();
        copy.id = EnvelopeId::generate();
        copy.target = Some(target.into());
        copy
    }

    /// Checks that the envelope can be handed to a transport.
    ///
    /// # Errors
    ///
    /// Returns [`EnvelopeError::MissingTarget`] when the target is absent or
    /// blank.
    pub fn validate_outbound(&self) -> Result<(), EnvelopeError> {
        match self.target.as_deref().map(str::trim) {
            Some(target) if !target.is_empty() => Ok(()),
            _ => Err(EnvelopeError::missing_target(&self.id)),
        }
    }

    /// Encodes the envelope as JSON text.
    ///
    /// # Errors
    ///
    /// Returns [`EnvelopeError::Encode`] if serialisation fails.
    pub fn encode(&self) -> Result<String, EnvelopeError> {
        serde_json::to_string(self).map_err(|source| EnvelopeError::Encode { source })
    }

    /// Decodes an envelope from JSON text.
    ///
    /// # Errors
    ///
    /// Returns [`EnvelopeError::Malformed`] when the text is not a valid
    /// envelope.
    pub fn decode(text: &str) -> Result<Self, EnvelopeError> {
        serde_json::from_str(text.trim()).map_err(|source| EnvelopeError::Malformed { source })
    }
}

#[cfg(test)]
mod tests {
    use rstest::{fixture, rstest};

    use super::*;

    #[fixture]
    fn request() -> Envelope {
        let mut envelope = Envelope::request(EnvelopeType::Ping, 7);
        envelope.set_sender("client@example.org/desk");
        envelope.set_target("service@example.org");
        envelope.set_tag("req-42");
        envelope
    }

    #[test]
    fn identifiers_are_unique_per_instance() {
        let first = Envelope::new(EnvelopeType::Ping);
        let second = Envelope::new(EnvelopeType::Ping);
        assert_ne!(first.id(), second.id());
    }

    #[rstest]
    #[case(EnvelopeType::PingResponse)]
    #[case(EnvelopeType::CommandResponse)]
    #[case(EnvelopeType::Error)]
    fn responses_correlate_with_original(request: Envelope, #[case] kind: EnvelopeType) {
        let response = Envelope::response_to(&request, kind);

        assert_eq!(response.kind(), kind);
        assert_eq!(response.response_id(), Some(request.id()));
        assert_eq!(response.target(), request.sender());
        assert_eq!(response.tag(), request.tag());
        assert_ne!(response.id(), request.id());
    }

    #[rstest]
    fn error_envelopes_carry_reason_and_kind(request: Envelope) {
        let error = Envelope::error_for("no such command", ErrorKind::UnknownCommand, Some(&request));

        assert_eq!(error.kind(), EnvelopeType::Error);
        assert_eq!(error.response_id(), Some(request.id()));
        assert_eq!(error.error_message(), Some("no such command"));
        assert_eq!(error.error_kind(), Some(ErrorKind::UnknownCommand));
    }

    #[test]
    fn unanchored_errors_have_no_correlation() {
        let error = Envelope::error_for("boom", ErrorKind::Diagnostic, None);
        assert!(error.response_id().is_none());
        assert!(error.target().is_none());
    }

    #[rstest]
    #[case(None)]
    #[case(Some(""))]
    #[case(Some("   "))]
    fn outbound_validation_requires_target(#[case] target: Option<&str>) {
        let mut envelope = Envelope::new(EnvelopeType::Ping);
        if let Some(target) = target {
            envelope.set_target(target);
        }
        assert!(matches!(
            envelope.validate_outbound(),
            Err(EnvelopeError::MissingTarget { .. })
        ));
    }

    #[rstest]
    fn encoding_uses_wire_field_names(request: Envelope) {
        let response = Envelope::response_to(&request, EnvelopeType::PingResponse)
            .with_value("Answer", 42_i64);
        let text = response.encode().expect("encode");

        assert!(text.contains(r#""Type":"PingResponse""#));
        assert!(text.contains(r#""ResponseID":""#));
        assert!(text.contains(r#""Target":"client@example.org/desk""#));
        assert!(text.contains(r#""Values":{"Answer":42}"#));

        let decoded = Envelope::decode(&text).expect("decode");
        assert_eq!(decoded, response);
    }

    #[test]
    fn decoding_tolerates_sparse_payloads() {
        let envelope = Envelope::decode(r#"{"Type":"Ping"}"#).expect("decode");
        assert_eq!(envelope.kind(), EnvelopeType::Ping);
        assert!(!envelope.id().as_str().is_empty());
        assert!(envelope.sender().is_none());
    }

    #[rstest]
    #[case("")]
    #[case("not json")]
    #[case(r#"{"Type":"Bogus"}"#)]
    fn decoding_rejects_malformed_payloads(#[case] text: &str) {
        let error = Envelope::decode(text).expect_err("decode should fail");
        assert_eq!(error.kind(), ErrorKind::DeserializationFailure);
    }

    #[rstest]
    fn copies_receive_fresh_identifiers(request: Envelope) {
        let copy = request.copy_for("other@example.org");
        assert_ne!(copy.id(), request.id());
        assert_eq!(copy.target(), Some("other@example.org"));
        assert_eq!(copy.values(), request.values());
    }

    #[test]
    fn notifications_name_their_event() {
        let notification = Envelope::notification(ServiceEvent::Stopping);
        assert_eq!(notification.kind(), EnvelopeType::Notification);
        assert_eq!(
            notification.string_value(fields::SERVICE_EVENT),
            Some("Stopping")
        );
        assert_eq!(
            notification.string_value(fields::DESCRIPTION),
            Some("Service stopping")
        );
    }
}
