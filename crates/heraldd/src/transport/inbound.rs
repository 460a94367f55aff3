//! Framing of envelopes inside raw transport messages.

use herald_types::{Envelope, EnvelopeError};

/// Subject line that marks a raw message as carrying an envelope.
pub const MESSAGE_SUBJECT: &str = "herald.message";

/// Message as delivered by the transport, before decoding.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawMessage {
    /// Address the transport received the message from.
    pub from: String,
    /// Subject line, when the transport carries one.
    pub subject: Option<String>,
    /// Message body.
    pub body: String,
}

impl RawMessage {
    /// Creates a raw message.
    pub fn new(from: impl Into<String>, subject: Option<&str>, body: impl Into<String>) -> Self {
        Self {
            from: from.into(),
            subject: subject.map(str::to_owned),
            body: body.into(),
        }
    }

    /// Frames an encoded envelope as a raw message from `from`.
    ///
    /// # Errors
    ///
    /// Returns [`EnvelopeError::Encode`] when the envelope cannot be encoded.
    pub fn for_envelope(from: impl Into<String>, envelope: &Envelope) -> Result<Self, EnvelopeError> {
        Ok(Self {
            from: from.into(),
            subject: Some(MESSAGE_SUBJECT.to_owned()),
            body: envelope.encode()?,
        })
    }

    fn carries_envelope(&self) -> bool {
        self.subject
            .as_deref()
            .is_some_and(|subject| subject.trim() == MESSAGE_SUBJECT)
    }
}

/// Decodes the envelope carried by `raw`.
///
/// Returns `Ok(None)` for messages that do not carry an envelope. An envelope
/// without a sender inherits the raw message's address.
///
/// # Errors
///
/// Returns [`EnvelopeError::Malformed`] when the body cannot be decoded.
pub fn decode_inbound(raw: &RawMessage) -> Result<Option<Envelope>, EnvelopeError> {
    if !raw.carries_envelope() {
        return Ok(None);
    }
    let mut envelope = Envelope::decode(&raw.body)?;
    if envelope.sender().is_none_or(|sender| sender.trim().is_empty()) {
        envelope.set_sender(raw.from.clone());
    }
    Ok(Some(envelope))
}

#[cfg(test)]
mod tests {
    use herald_types::{EnvelopeType, ErrorKind};
    use rstest::rstest;

    use super::*;

    #[test]
    fn inherits_sender_from_the_raw_address() {
        let ping = Envelope::new(EnvelopeType::Ping);
        let raw = RawMessage::for_envelope("client@example.org/desk", &ping).expect("frame");

        let decoded = decode_inbound(&raw).expect("decode").expect("envelope");

        assert_eq!(decoded.sender(), Some("client@example.org/desk"));
        assert_eq!(decoded.id(), ping.id());
    }

    #[test]
    fn keeps_an_explicit_sender() {
        let mut ping = Envelope::new(EnvelopeType::Ping);
        ping.set_sender("origin@example.org");
        let raw = RawMessage::for_envelope("relay@example.org", &ping).expect("frame");

        let decoded = decode_inbound(&raw).expect("decode").expect("envelope");

        assert_eq!(decoded.sender(), Some("origin@example.org"));
    }

    #[rstest]
    #[case(None)]
    #[case(Some("chat"))]
    fn ignores_messages_without_the_envelope_subject(#[case] subject: Option<&str>) {
        let raw = RawMessage::new("client@example.org", subject, "hello there");

        assert!(decode_inbound(&raw).expect("not an error").is_none());
    }

    #[test]
    fn reports_malformed_bodies() {
        let raw = RawMessage::new("client@example.org", Some(MESSAGE_SUBJECT), "{not json");

        let error = decode_inbound(&raw).expect_err("malformed body");

        assert_eq!(error.kind(), ErrorKind::DeserializationFailure);
    }
}
