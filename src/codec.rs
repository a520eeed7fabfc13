use std::convert::TryInto;
use std::io;

use byteorder::{BigEndian, ByteOrder};
use bytes::{Buf, BufMut, BytesMut, IntoBuf};
use protobuf::{CodedOutputStream, Message};
use tokio_codec::{Decoder, Encoder};

use crate::proto;

/// Frame header is a big endian u32.
const CAST_MESSAGE_HEADER_LENGTH: usize = 4;
/// Max message size is [64KB](https://developers.google.com/cast/docs/reference/messages).
const CAST_MESSAGE_PROTOBUF_MAX_LENGTH: usize = 64 << 10;

/// `CastMessageCodec` decodes a length-prefixed protobuf. This enum represents
/// the phase of the decoding. Keep track of the decode phase to ensure the
/// decoder does not drop bytes from the `BytesMut`.
#[derive(Debug)]
enum DecodeState {
    /// Waiting to read a u32 representing the size of the next protobuf.
    Header,
    /// Reading a protobuf with a given length.
    Payload(usize),
}

impl Default for DecodeState {
    fn default() -> Self {
        DecodeState::Header
    }
}

#[derive(Debug, Default)]
pub(crate) struct CastMessageCodec {
    state: DecodeState,
    decoded_frames: u64,
    encoded_frames: u64,
}

impl Encoder for CastMessageCodec {
    type Item = proto::CastMessage;
    type Error = io::Error;

    fn encode(&mut self, item: Self::Item, dst: &mut BytesMut) -> Result<(), Self::Error> {
        self.encoded_frames += 1;
        trace!(
            "codec encoding frame {} in namespace {}",
            self.encoded_frames,
            item.get_namespace()
        );

        let mut buf = Vec::new();
        let mut output = CodedOutputStream::new(&mut buf);
        item.write_to(&mut output)
            .and_then(|_| output.flush())
            .map_err(|err| io::Error::new(io::ErrorKind::Other, err))?;

        if buf.len() > CAST_MESSAGE_PROTOBUF_MAX_LENGTH {
            return Err(io::Error::new(
                io::ErrorKind::InvalidData,
                format!(
                    "encoded message of length {} exceeds the max frame length {}",
                    buf.len(),
                    CAST_MESSAGE_PROTOBUF_MAX_LENGTH
                ),
            ));
        }

        // Cast wire protocol is a 4-byte big endian length-prefixed protobuf.
        // The frame is assembled in one reserved region so the header and
        // payload stay contiguous on the wire.
        let header = &mut [0; 4];
        let msg_size = buf
            .len()
            .try_into()
            .map_err(|err| io::Error::new(io::ErrorKind::Other, err))?;
        BigEndian::write_u32(header, msg_size);

        dst.reserve(CAST_MESSAGE_HEADER_LENGTH + buf.len());
        dst.put_slice(header);
        dst.put_slice(&buf);
        Ok(())
    }
}

impl CastMessageCodec {
    /// At least 4 bytes are required to decode the next frame. Read the
    /// length of the following protobuf and reserve that much capacity in the
    /// `BytesMut`.
    fn decode_header(&mut self, src: &mut BytesMut) -> Result<Option<usize>, io::Error> {
        if src.len() < CAST_MESSAGE_HEADER_LENGTH {
            return Ok(None);
        }
        let header = src.split_to(4);
        let length = {
            let mut header = header.into_buf();
            header.get_u32_be() as usize
        };
        if length > CAST_MESSAGE_PROTOBUF_MAX_LENGTH {
            return Err(io::Error::new(
                io::ErrorKind::InvalidData,
                format!(
                    "frame of length {} exceeds the max frame length {}",
                    length, CAST_MESSAGE_PROTOBUF_MAX_LENGTH
                ),
            ));
        }
        src.reserve(length);
        Ok(Some(length))
    }

    fn decode_payload(&self, n: usize, src: &mut BytesMut) -> Option<BytesMut> {
        if src.len() < n {
            return None;
        }
        Some(src.split_to(n))
    }
}

impl Decoder for CastMessageCodec {
    type Item = proto::CastMessage;
    type Error = io::Error;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        let n = match self.state {
            DecodeState::Header => match self.decode_header(src)? {
                Some(n) => n,
                None => return Ok(None),
            },
            DecodeState::Payload(n) => n,
        };
        self.state = DecodeState::Payload(n);
        if let Some(src) = self.decode_payload(n, src) {
            self.state = DecodeState::Header;
            let message = protobuf::parse_from_bytes::<proto::CastMessage>(&src)
                .map_err(|err| io::Error::new(io::ErrorKind::InvalidData, err))?;
            self.decoded_frames += 1;
            trace!(
                "codec decoded frame {} in namespace {}",
                self.decoded_frames,
                message.get_namespace()
            );
            Ok(Some(message))
        } else {
            Ok(None)
        }
    }
}

#[cfg(test)]
mod tests {
    use byteorder::{BigEndian, ByteOrder};
    use bytes::BytesMut;
    use protobuf::Message;
    use tokio_codec::{Decoder, Encoder};

    use super::{CastMessageCodec, CAST_MESSAGE_HEADER_LENGTH};
    use crate::message::{
        MessageBuilder, NAMESPACE_HEARTBEAT, PLATFORM_DESTINATION_ID, PLATFORM_SENDER_ID,
    };

    fn ping() -> crate::proto::CastMessage {
        MessageBuilder::default()
            .namespace(NAMESPACE_HEARTBEAT)
            .source(PLATFORM_SENDER_ID)
            .destination(PLATFORM_DESTINATION_ID)
            .payload_json(r#"{"type":"PING"}"#.to_owned())
            .into_message()
    }

    #[test]
    fn encode_prefixes_big_endian_length() {
        let message = ping();
        let body_len = message.compute_size() as usize;

        let mut codec = CastMessageCodec::default();
        let mut buf = BytesMut::new();
        codec.encode(message, &mut buf).unwrap();

        assert_eq!(CAST_MESSAGE_HEADER_LENGTH + body_len, buf.len());
        assert_eq!(body_len, BigEndian::read_u32(&buf[..4]) as usize);
    }

    #[test]
    fn decode_round_trips_encoded_frame() {
        let message = ping();
        let mut codec = CastMessageCodec::default();
        let mut buf = BytesMut::new();
        codec.encode(message.clone(), &mut buf).unwrap();

        let decoded = codec.decode(&mut buf).unwrap().unwrap();
        assert_eq!(message, decoded);
        assert!(buf.is_empty());
    }

    #[test]
    fn decode_waits_for_full_header_and_payload() {
        let message = ping();
        let mut codec = CastMessageCodec::default();
        let mut wire = BytesMut::new();
        codec.encode(message.clone(), &mut wire).unwrap();
        let wire = wire.freeze();

        // Drip the frame into the decoder a few bytes at a time. Short reads
        // are partial I/O, not EOF.
        let mut buf = BytesMut::new();
        let mut decoded = None;
        for chunk in wire.chunks(3) {
            assert!(decoded.is_none());
            buf.extend_from_slice(chunk);
            decoded = codec.decode(&mut buf).unwrap();
        }
        assert_eq!(Some(message), decoded);
    }

    #[test]
    fn decode_rejects_oversized_frame() {
        let mut codec = CastMessageCodec::default();
        let mut buf = BytesMut::new();
        let header = &mut [0; 4];
        BigEndian::write_u32(header, (64 << 10) + 1);
        buf.extend_from_slice(header);
        assert!(codec.decode(&mut buf).is_err());
    }

    #[test]
    fn decode_consumes_consecutive_frames() {
        let message = ping();
        let mut codec = CastMessageCodec::default();
        let mut buf = BytesMut::new();
        codec.encode(message.clone(), &mut buf).unwrap();
        codec.encode(message.clone(), &mut buf).unwrap();

        assert_eq!(Some(message.clone()), codec.decode(&mut buf).unwrap());
        assert_eq!(Some(message), codec.decode(&mut buf).unwrap());
        assert_eq!(None, codec.decode(&mut buf).unwrap());
    }
}
