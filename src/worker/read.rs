use std::io;
use std::sync::Arc;

use futures::future;
use futures::prelude::*;
use serde_json::Value;

use crate::channel::{Channel, Liveness};
use crate::event::{CustomMessage, CustomPayload, Event};
use crate::message::{
    MessageBuilder, NAMESPACE_HEARTBEAT, PLATFORM_DESTINATION_ID, PLATFORM_SENDER_ID,
};
use crate::payload::{self, heartbeat, Response};
use crate::proto;

/// Per-channel state for the reader task: the channel handle for registry
/// and session lookups, the liveness tracker, and a pre-built PONG envelope
/// so answering a PING never allocates a payload.
#[derive(Clone, Debug)]
pub(crate) struct Reader {
    channel: Channel,
    liveness: Arc<Liveness>,
    pong: proto::CastMessage,
}

impl Reader {
    pub fn new(channel: Channel, liveness: Arc<Liveness>) -> Self {
        let pong = MessageBuilder::default()
            .namespace(NAMESPACE_HEARTBEAT)
            .source(PLATFORM_SENDER_ID)
            .destination(PLATFORM_DESTINATION_ID)
            .payload(&heartbeat::Request::Pong)
            .into_message();
        Self {
            channel,
            liveness,
            pong,
        }
    }

    fn dispatch(
        &self,
        mut message: proto::CastMessage,
    ) -> Box<dyn Future<Item = (), Error = io::Error> + Send> {
        let namespace = message.get_namespace().to_owned();
        let source = message.get_source_id().to_owned();
        let destination = message.get_destination_id().to_owned();

        if message.get_payload_type() == proto::CastMessage_PayloadType::BINARY {
            self.channel.emit(Event::Custom(CustomMessage {
                source,
                destination,
                namespace,
                payload: CustomPayload::Binary(message.take_payload_binary()),
            }));
            return Box::new(future::ok(()));
        }

        let raw = message.take_payload_utf8();
        if raw.trim().is_empty() {
            debug!("ignoring empty payload in namespace {}", namespace);
            return Box::new(future::ok(()));
        }

        if namespace == NAMESPACE_HEARTBEAT {
            self.heartbeat(&raw);
            return Box::new(future::ok(()));
        }

        let value = match payload::adjust(&raw) {
            Ok(value) => value,
            Err(err) => {
                warn!(
                    "discarding malformed JSON payload in namespace {}: {}",
                    namespace, err
                );
                return Box::new(future::ok(()));
            }
        };

        let request_id = payload::request_id(&value);
        if request_id > 0 {
            let this = self.clone();
            return Box::new(
                self.channel
                    .registry()
                    .complete(request_id, value.clone())
                    .then(move |delivered| -> Box<dyn Future<Item = (), Error = io::Error> + Send> {
                        if let Ok(true) = delivered {
                            Box::new(future::ok(()))
                        } else {
                            // No waiter (or it gave up): fall through to the
                            // spontaneous-event path.
                            this.fan_out(source, destination, namespace, raw, value)
                        }
                    }),
            );
        }
        self.fan_out(source, destination, namespace, raw, value)
    }

    fn fan_out(
        &self,
        source: String,
        destination: String,
        namespace: String,
        raw: String,
        value: Value,
    ) -> Box<dyn Future<Item = (), Error = io::Error> + Send> {
        if !payload::is_known_response(&value) {
            self.channel.emit(Event::Custom(CustomMessage {
                source,
                destination,
                namespace,
                payload: CustomPayload::String(raw),
            }));
            return Box::new(future::ok(()));
        }
        if payload::response_type(&value) == Some("CLOSE") {
            return self.peer_close(source);
        }
        match Response::from_value(value) {
            Ok(response) => {
                if let Some(event) = event_for(response) {
                    self.channel.emit(event);
                }
            }
            Err(err) => warn!(
                "discarding undecodable payload in namespace {}: {}",
                namespace, err
            ),
        }
        Box::new(future::ok(()))
    }

    /// A CLOSE from an application transport tears down just that virtual
    /// connection; a CLOSE from the platform receiver tears down the channel.
    fn peer_close(&self, source: String) -> Box<dyn Future<Item = (), Error = io::Error> + Send> {
        let channel = self.channel.clone();
        Box::new(
            channel
                .clone()
                .forget_session(source.clone())
                .then(move |removed| {
                    if let Ok(true) = removed {
                        debug!("peer closed virtual connection to {}", source);
                        channel.emit(Event::SessionClosed { peer: source });
                    } else {
                        debug!("peer closed the platform connection");
                        channel.emit(Event::Closed);
                        tokio_executor::spawn(
                            channel
                                .close()
                                .map_err(|err| warn!("close after peer CLOSE: {}", err)),
                        );
                    }
                    Ok(())
                }),
        )
    }

    fn heartbeat(&self, raw: &str) {
        let response = payload::adjust(raw)
            .ok()
            .and_then(|value| serde_json::from_value::<heartbeat::Response>(value).ok());
        match response {
            Some(heartbeat::Response::Ping) => {
                trace!("heartbeat got PING");
                if self.channel.send(self.pong.clone()).is_err() {
                    warn!("failed to enqueue PONG");
                }
            }
            Some(heartbeat::Response::Pong) => {
                trace!("heartbeat got PONG");
                self.liveness.record();
            }
            None => trace!("ignoring unrecognized heartbeat payload"),
        }
    }
}

fn event_for(response: Response) -> Option<Event> {
    match response {
        Response::ReceiverStatus { status, .. } => Some(Event::ReceiverStatus(status)),
        Response::MediaStatus { status, .. } => Some(Event::MediaStatus(status)),
        Response::GetAppAvailability { availability, .. } => {
            Some(Event::Availability(availability))
        }
        Response::MultizoneStatus { status } => Some(Event::MultizoneStatus(status)),
        Response::DeviceAdded { device } => Some(Event::DeviceAdded(device)),
        Response::DeviceUpdated { device } => Some(Event::DeviceUpdated(device)),
        Response::DeviceRemoved { device_id } => Some(Event::DeviceRemoved { device_id }),
        // Request errors carry no meaning outside a request context;
        // heartbeat and CLOSE are handled before fan-out.
        _ => None,
    }
}

/// Drive the reader over the source stream. Any I/O error or EOF closes the
/// channel; errors raised while handling a single frame are logged by the
/// dispatch path and do not stop the reader.
pub(crate) fn task(
    source: impl Stream<Item = proto::CastMessage, Error = io::Error>,
    reader: Reader,
) -> impl Future<Item = (), Error = ()> {
    let channel = reader.channel.clone();
    source
        .for_each(move |message| reader.dispatch(message))
        .then(move |result| {
            match result {
                Ok(()) => debug!("reader for {} finished", channel.name()),
                Err(ref err) => warn!("reader I/O error on {}: {}", channel.name(), err),
            }
            tokio_executor::spawn(
                channel
                    .close()
                    .map_err(|err| warn!("close after reader exit: {}", err)),
            );
            Ok(())
        })
}
