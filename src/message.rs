//! Envelope construction for the cast channel.
//!
//! Every frame on the wire is a `CastMessage` protobuf. The builder fills in
//! the fixed protocol version and guarantees that exactly one payload variant
//! is populated, consistent with the payload type.

use serde::Serialize;

use crate::proto::{CastMessage, CastMessage_PayloadType, CastMessage_ProtocolVersion};

pub const NAMESPACE_CONNECTION: &str = "urn:x-cast:com.google.cast.tp.connection";
pub const NAMESPACE_DEVICEAUTH: &str = "urn:x-cast:com.google.cast.tp.deviceauth";
pub const NAMESPACE_HEARTBEAT: &str = "urn:x-cast:com.google.cast.tp.heartbeat";
pub const NAMESPACE_MEDIA: &str = "urn:x-cast:com.google.cast.media";
pub const NAMESPACE_MULTIZONE: &str = "urn:x-cast:com.google.cast.multizone";
pub const NAMESPACE_RECEIVER: &str = "urn:x-cast:com.google.cast.receiver";

/// Fixed destination for device-level operations.
pub const PLATFORM_DESTINATION_ID: &str = "receiver-0";
/// Fixed source for transport-layer messages (device auth, heartbeat).
pub const PLATFORM_SENDER_ID: &str = "sender-0";

pub const DEFAULT_MEDIA_RECEIVER_APP_ID: &str = "CC1AD845";
pub const BACKDROP_APP_ID: &str = "E8C28D3C";
pub const YOUTUBE_APP_ID: &str = "233637DE";

/// Default TCP port cast devices listen on.
pub const DEFAULT_PORT: u16 = 8009;

const NAMESPACE_PREFIX: &str = "urn:x-cast:";
const NAMESPACE_MAX_LENGTH: usize = 128;

/// A namespace must be `urn:x-cast:` followed by a non-empty suffix and fit
/// in 128 characters.
pub fn valid_namespace(namespace: &str) -> bool {
    namespace.len() <= NAMESPACE_MAX_LENGTH
        && namespace.starts_with(NAMESPACE_PREFIX)
        && namespace.len() > NAMESPACE_PREFIX.len()
}

#[derive(Debug)]
enum Payload {
    String(String),
    Binary(Vec<u8>),
}

#[derive(Debug, Default)]
pub(crate) struct MessageBuilder<'a> {
    namespace: Option<&'a str>,
    source: Option<&'a str>,
    destination: Option<&'a str>,
    payload: Option<Payload>,
}

impl<'a> MessageBuilder<'a> {
    pub fn namespace(mut self, namespace: &'a str) -> Self {
        debug_assert!(valid_namespace(namespace));
        self.namespace = Some(namespace);
        self
    }

    pub fn source(mut self, source: &'a str) -> Self {
        self.source = Some(source);
        self
    }

    pub fn destination(mut self, destination: &'a str) -> Self {
        self.destination = Some(destination);
        self
    }

    pub fn payload<T: Serialize>(mut self, payload: &T) -> Self {
        if let Ok(payload) = serde_json::to_string(payload) {
            self.payload = Some(Payload::String(payload));
        }
        self
    }

    pub fn payload_json(mut self, payload: String) -> Self {
        self.payload = Some(Payload::String(payload));
        self
    }

    pub fn payload_binary(mut self, payload: Vec<u8>) -> Self {
        self.payload = Some(Payload::Binary(payload));
        self
    }

    pub fn into_message(mut self) -> CastMessage {
        let mut message = CastMessage::new();
        message.set_protocol_version(CastMessage_ProtocolVersion::CASTV2_1_0);
        if let Some(source) = self.source.take() {
            message.set_source_id(source.to_owned());
        }
        if let Some(destination) = self.destination.take() {
            message.set_destination_id(destination.to_owned());
        }
        if let Some(namespace) = self.namespace.take() {
            message.set_namespace(namespace.to_owned());
        }
        match self.payload.take() {
            Some(Payload::String(payload)) => {
                message.set_payload_type(CastMessage_PayloadType::STRING);
                message.set_payload_utf8(payload);
            }
            Some(Payload::Binary(payload)) => {
                message.set_payload_type(CastMessage_PayloadType::BINARY);
                message.set_payload_binary(payload);
            }
            None => {}
        }
        message
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn string_payload_sets_exactly_one_variant() {
        let message = MessageBuilder::default()
            .namespace(NAMESPACE_HEARTBEAT)
            .source(PLATFORM_SENDER_ID)
            .destination(PLATFORM_DESTINATION_ID)
            .payload_json(r#"{"type":"PING"}"#.to_owned())
            .into_message();
        assert_eq!(CastMessage_PayloadType::STRING, message.get_payload_type());
        assert!(message.has_payload_utf8());
        assert!(!message.has_payload_binary());
    }

    #[test]
    fn binary_payload_sets_exactly_one_variant() {
        let message = MessageBuilder::default()
            .namespace(NAMESPACE_DEVICEAUTH)
            .source(PLATFORM_SENDER_ID)
            .destination(PLATFORM_DESTINATION_ID)
            .payload_binary(vec![0x08, 0x01])
            .into_message();
        assert_eq!(CastMessage_PayloadType::BINARY, message.get_payload_type());
        assert!(message.has_payload_binary());
        assert!(!message.has_payload_utf8());
    }

    #[test]
    fn namespace_validation() {
        assert!(valid_namespace(NAMESPACE_MEDIA));
        assert!(valid_namespace("urn:x-cast:com.example.app"));
        assert!(!valid_namespace("urn:x-cast:"));
        assert!(!valid_namespace("urn:x-other:com.example.app"));
        let long = format!("urn:x-cast:{}", "a".repeat(128));
        assert!(!valid_namespace(&long));
    }
}
