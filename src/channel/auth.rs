//! Device authentication handshake.
//!
//! Immediately after the TLS handshake, and before CONNECT, the sender
//! transmits a binary `DeviceAuthMessage` carrying an empty `AuthChallenge`
//! and reads exactly one binary frame back. Trust in the device's
//! self-signed TLS certificate rests on this exchange; the response's
//! signature and certificate chain are accepted as-is.

use futures::future;
use futures::prelude::*;
use protobuf::Message;

use crate::channel::Transport;
use crate::error::{AuthErrorType, Error};
use crate::message::{
    MessageBuilder, NAMESPACE_DEVICEAUTH, PLATFORM_DESTINATION_ID, PLATFORM_SENDER_ID,
};
use crate::proto;

pub(crate) fn handshake(transport: Transport) -> impl Future<Item = Transport, Error = Error> {
    future::result(challenge())
        .and_then(move |message| {
            debug!("sending device auth challenge");
            transport.send(message).map_err(Error::Io)
        })
        .and_then(|transport| transport.into_future().map_err(|(err, _)| Error::Io(err)))
        .and_then(|(frame, transport)| match frame {
            Some(frame) => verify(&frame).map(|_| transport),
            None => Err(Error::Disconnected),
        })
}

fn challenge() -> Result<proto::CastMessage, Error> {
    let mut auth = proto::DeviceAuthMessage::new();
    auth.set_challenge(proto::AuthChallenge::new());
    let payload = auth
        .write_to_bytes()
        .map_err(|err| Error::Protocol(format!("failed to encode auth challenge: {}", err)))?;
    Ok(MessageBuilder::default()
        .namespace(NAMESPACE_DEVICEAUTH)
        .source(PLATFORM_SENDER_ID)
        .destination(PLATFORM_DESTINATION_ID)
        .payload_binary(payload)
        .into_message())
}

fn verify(frame: &proto::CastMessage) -> Result<(), Error> {
    if frame.get_namespace() != NAMESPACE_DEVICEAUTH
        || frame.get_payload_type() != proto::CastMessage_PayloadType::BINARY
    {
        return Err(Error::Protocol(format!(
            "unexpected frame in namespace {} during device auth",
            frame.get_namespace()
        )));
    }
    let auth = protobuf::parse_from_bytes::<proto::DeviceAuthMessage>(frame.get_payload_binary())
        .map_err(|err| Error::Protocol(format!("malformed device auth response: {}", err)))?;
    if auth.has_error() {
        let error_type = AuthErrorType::from(auth.get_error().get_error_type());
        warn!("device rejected auth challenge: {}", error_type);
        return Err(Error::AuthenticationFailed(error_type));
    }
    debug!("device auth accepted");
    Ok(())
}

#[cfg(test)]
mod tests {
    use protobuf::Message;

    use super::{challenge, verify};
    use crate::error::{AuthErrorType, Error};
    use crate::message::{MessageBuilder, NAMESPACE_DEVICEAUTH, NAMESPACE_RECEIVER};
    use crate::proto;

    fn auth_frame(auth: &proto::DeviceAuthMessage) -> proto::CastMessage {
        MessageBuilder::default()
            .namespace(NAMESPACE_DEVICEAUTH)
            .source("receiver-0")
            .destination("sender-0")
            .payload_binary(auth.write_to_bytes().unwrap())
            .into_message()
    }

    #[test]
    fn challenge_is_binary_on_the_deviceauth_namespace() {
        let message = challenge().unwrap();
        assert_eq!(NAMESPACE_DEVICEAUTH, message.get_namespace());
        assert_eq!(
            proto::CastMessage_PayloadType::BINARY,
            message.get_payload_type()
        );
        let auth =
            protobuf::parse_from_bytes::<proto::DeviceAuthMessage>(message.get_payload_binary())
                .unwrap();
        assert!(auth.has_challenge());
        assert!(!auth.has_response());
    }

    #[test]
    fn response_without_error_is_accepted() {
        let mut auth = proto::DeviceAuthMessage::new();
        let mut response = proto::AuthResponse::new();
        response.set_signature(vec![1, 2, 3]);
        response.set_client_auth_certificate(vec![4, 5, 6]);
        auth.set_response(response);
        assert!(verify(&auth_frame(&auth)).is_ok());
    }

    #[test]
    fn error_response_fails_authentication() {
        let mut auth = proto::DeviceAuthMessage::new();
        let mut error = proto::AuthError::new();
        error.set_error_type(proto::AuthError_ErrorType::SIGNATURE_ALGORITHM_UNAVAILABLE);
        auth.set_error(error);
        match verify(&auth_frame(&auth)) {
            Err(Error::AuthenticationFailed(AuthErrorType::SignatureAlgorithmUnavailable)) => {}
            result => panic!("unexpected result: {:?}", result),
        }
    }

    #[test]
    fn frame_on_another_namespace_is_a_protocol_violation() {
        let frame = MessageBuilder::default()
            .namespace(NAMESPACE_RECEIVER)
            .source("receiver-0")
            .destination("sender-0")
            .payload_json(r#"{"type":"RECEIVER_STATUS"}"#.to_owned())
            .into_message();
        match verify(&frame) {
            Err(Error::Protocol(_)) => {}
            result => panic!("unexpected result: {:?}", result),
        }
    }
}
