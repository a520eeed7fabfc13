//! The cast channel: TLS transport, device auth, heartbeat, request/response
//! correlation, and event fan-out over one long-lived connection.
//!
//! A [`Channel`] is a cheap-to-clone handle over the shared connection
//! state. Four tasks service it while it is open: a reader owning the read
//! half, a writer owning the write half (which serializes frames so the
//! length prefix and payload stay contiguous), a heartbeat timer, and an
//! event dispatcher. Closing the channel tears all four down.
//!
//! [`Channel`]: struct.Channel.html

use std::collections::{HashMap, HashSet};
use std::io;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicI64, AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex as StdMutex};
use std::time::{Duration, Instant};

use futures::future::{self, Either};
use futures::prelude::*;
use futures::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};
use futures::sync::oneshot;
use futures_locks::Mutex;
use rand::distributions::Alphanumeric;
use rand::{thread_rng, Rng};
use serde_json::Value;
use tokio_codec::Framed;
use tokio_tcp::TcpStream;
use tokio_timer::Timeout;
use tokio_tls::TlsStream;

use crate::codec::CastMessageCodec;
use crate::error::Error;
use crate::event::{Event, EventType};
use crate::message::{self, MessageBuilder};
use crate::payload::{connection, media, receiver, Response};
use crate::proto;
use crate::shutdown::{self, Cancelable, Drainable, Trigger, Valve};
use crate::worker;

mod auth;
pub(crate) mod listeners;
pub(crate) mod registry;

use self::listeners::Listeners;
use self::registry::Registry;

pub(crate) type Transport = Framed<TlsStream<TcpStream>, CastMessageCodec>;

/// Default timeout for synchronous requests.
pub const DEFAULT_RESPONSE_TIMEOUT: Duration = Duration::from_secs(30);

/// Cadence of outgoing PINGs. The channel is considered dead after two
/// intervals without a PONG.
pub(crate) const PING_INTERVAL: Duration = Duration::from_secs(10);

const STATE_OPEN: usize = 0;
const STATE_CLOSING: usize = 1;
const STATE_CLOSED: usize = 2;

/// Options for opening a channel to a device.
#[derive(Clone, Debug)]
pub struct Config {
    pub addr: SocketAddr,
    /// Display name of the device, used in log messages.
    pub name: String,
    /// Sender identity stamped on outgoing envelopes. Generated as
    /// `sender-<10 alphanumerics>` when absent.
    pub sender_id: Option<String>,
    pub response_timeout: Duration,
}

impl Config {
    pub fn new(addr: SocketAddr, name: &str) -> Self {
        Self {
            addr,
            name: name.to_owned(),
            sender_id: None,
            response_timeout: DEFAULT_RESPONSE_TIMEOUT,
        }
    }
}

pub(crate) fn generate_sender_id() -> String {
    let mut rng = thread_rng();
    let suffix: String = rng.sample_iter(&Alphanumeric).take(10).collect();
    format!("sender-{}", suffix)
}

fn seed_request_id() -> i64 {
    thread_rng().gen_range(1, 65_537)
}

/// Tracks when the device last answered a PING.
#[derive(Debug)]
pub(crate) struct Liveness {
    epoch: Instant,
    last_pong_ms: AtomicU64,
}

impl Liveness {
    fn new() -> Self {
        Self {
            epoch: Instant::now(),
            last_pong_ms: AtomicU64::new(0),
        }
    }

    pub fn record(&self) {
        let elapsed = self.epoch.elapsed().as_millis() as u64;
        self.last_pong_ms.store(elapsed, Ordering::SeqCst);
    }

    pub fn age(&self) -> Duration {
        let now = self.epoch.elapsed().as_millis() as u64;
        let last = self.last_pong_ms.load(Ordering::SeqCst);
        Duration::from_millis(now.saturating_sub(last))
    }
}

#[derive(Debug)]
struct Shared {
    addr: SocketAddr,
    name: String,
    sender_id: String,
    response_timeout: Duration,
    request_id: AtomicI64,
    state: AtomicUsize,
    registry: Registry,
    sessions: Mutex<HashSet<String>>,
    listeners: Listeners,
    command: UnboundedSender<proto::CastMessage>,
    events: UnboundedSender<Event>,
    shutdown: StdMutex<Option<Trigger>>,
}

/// Handle to an open cast channel. Clones are cheap and drive the same
/// connection.
#[derive(Clone, Debug)]
pub struct Channel {
    shared: Arc<Shared>,
}

/// Open a channel: TCP, TLS, device auth, then the channel-level CONNECT.
/// The reader, writer, heartbeat, and dispatcher tasks are spawned onto the
/// current executor only once auth has succeeded.
///
/// Cast devices present self-signed certificates, so certificate and
/// hostname verification are switched off at the TLS layer; trust is pinned
/// by the in-protocol device auth exchange instead.
pub fn connect(config: Config) -> impl Future<Item = Channel, Error = Error> {
    let Config {
        addr,
        name,
        sender_id,
        response_timeout,
    } = config;
    let sender_id = sender_id.unwrap_or_else(generate_sender_id);
    let tls = native_tls::TlsConnector::builder()
        .danger_accept_invalid_certs(true)
        .danger_accept_invalid_hostnames(true)
        .build()
        .map(tokio_tls::TlsConnector::from)
        .map_err(|err| Error::Protocol(format!("TLS setup for {}: {}", name, err)));

    let tls_name = name.clone();
    future::result(tls)
        .and_then(move |tls| {
            TcpStream::connect(&addr)
                .map_err(Error::Io)
                .and_then(move |socket| {
                    info!("securing connection to {} ({})", tls_name, addr);
                    tls.connect(&addr.ip().to_string(), socket)
                        .map_err(|err| Error::Io(io::Error::new(io::ErrorKind::Other, err)))
                })
        })
        .and_then(|socket| auth::handshake(Framed::new(socket, CastMessageCodec::default())))
        .and_then(move |transport| {
            let connect = MessageBuilder::default()
                .namespace(message::NAMESPACE_CONNECTION)
                .source(&sender_id)
                .destination(message::PLATFORM_DESTINATION_ID)
                .payload(&connection::Request::connect())
                .into_message();
            transport
                .send(connect)
                .map_err(Error::Io)
                .map(move |transport| (transport, sender_id))
        })
        .map(move |(transport, sender_id)| {
            Channel::start(addr, name, sender_id, response_timeout, transport)
        })
}

impl Channel {
    fn start(
        addr: SocketAddr,
        name: String,
        sender_id: String,
        response_timeout: Duration,
        transport: Transport,
    ) -> Self {
        let (sink, source) = transport.split();
        let (command_tx, command_rx) = mpsc::unbounded();
        let (events_tx, events_rx) = mpsc::unbounded();
        let (trigger, valve) = shutdown::valve();
        let listeners = Listeners::new();
        let liveness = Arc::new(Liveness::new());

        let shared = Arc::new(Shared {
            addr,
            name,
            sender_id,
            response_timeout,
            request_id: AtomicI64::new(seed_request_id()),
            state: AtomicUsize::new(STATE_OPEN),
            registry: Registry::new(),
            sessions: Mutex::new(HashSet::new()),
            listeners: listeners.clone(),
            command: command_tx,
            events: events_tx,
            shutdown: StdMutex::new(Some(trigger)),
        });
        let channel = Channel { shared };

        tokio_executor::spawn(worker::write(sink, command_rx.drain(valve.clone())));
        tokio_executor::spawn(worker::read(
            source.cancel(valve.clone()),
            worker::Reader::new(channel.clone(), Arc::clone(&liveness)),
        ));
        tokio_executor::spawn(worker::heartbeat(
            valve.clone(),
            channel.clone(),
            liveness,
        ));
        tokio_executor::spawn(worker::dispatch(events_rx.drain(valve), listeners));

        info!(
            "cast channel to {} ({}) open as {}",
            channel.shared.name, channel.shared.addr, channel.shared.sender_id
        );
        channel.emit(Event::Connected(true));
        channel
    }

    pub fn addr(&self) -> SocketAddr {
        self.shared.addr
    }

    pub fn name(&self) -> &str {
        &self.shared.name
    }

    pub fn sender_id(&self) -> &str {
        &self.shared.sender_id
    }

    pub fn is_connected(&self) -> bool {
        self.shared.state.load(Ordering::SeqCst) == STATE_OPEN
    }

    /// Subscribe to events fanned out by the dispatcher. `None` receives
    /// every event type.
    pub fn subscribe(&self, filter: Option<&[EventType]>) -> UnboundedReceiver<Event> {
        self.shared.listeners.subscribe(filter)
    }

    /// Close the channel: stop the heartbeat, stop the reader, fail every
    /// outstanding waiter with `Disconnected`, forget all virtual
    /// connections, and emit one `Connected(false)` event. Idempotent.
    pub fn close(&self) -> Box<dyn Future<Item = (), Error = Error> + Send> {
        let swapped = self.shared.state.compare_exchange(
            STATE_OPEN,
            STATE_CLOSING,
            Ordering::SeqCst,
            Ordering::SeqCst,
        );
        if swapped.is_err() {
            return Box::new(future::ok(()));
        }
        info!("closing cast channel to {}", self.shared.name);
        self.emit(Event::Connected(false));
        if let Ok(mut slot) = self.shared.shutdown.lock() {
            if let Some(trigger) = slot.take() {
                trigger.terminate();
            }
        }
        let shared = Arc::clone(&self.shared);
        let cleanup = shared
            .registry
            .fail_all()
            .join(shared.sessions.lock().map(|mut sessions| sessions.clear()));
        Box::new(cleanup.then(move |_| {
            shared.state.store(STATE_CLOSED, Ordering::SeqCst);
            debug!("cast channel to {} closed", shared.name);
            Ok(())
        }))
    }

    pub(crate) fn next_request_id(&self) -> i64 {
        self.shared.request_id.fetch_add(1, Ordering::SeqCst) + 1
    }

    pub(crate) fn registry(&self) -> &Registry {
        &self.shared.registry
    }

    pub(crate) fn emit(&self, event: Event) {
        if self.shared.events.unbounded_send(event).is_err() {
            trace!("event dropped: dispatcher has shut down");
        }
    }

    /// Queue a frame for the writer task.
    pub(crate) fn send(&self, message: proto::CastMessage) -> Result<(), Error> {
        if !self.is_connected() {
            return Err(Error::Disconnected);
        }
        self.shared
            .command
            .unbounded_send(message)
            .map_err(|_| Error::Disconnected)
    }

    /// Open a virtual connection to `destination` if none exists yet. Every
    /// non-heartbeat message addressed past the platform receiver must be
    /// preceded by this inner CONNECT.
    pub(crate) fn ensure_connection(
        &self,
        destination: &str,
    ) -> Box<dyn Future<Item = (), Error = Error> + Send> {
        if destination == message::PLATFORM_DESTINATION_ID {
            return Box::new(future::ok(()));
        }
        let this = self.clone();
        let destination = destination.to_owned();
        Box::new(
            self.shared
                .sessions
                .lock()
                .map_err(|_| Error::Disconnected)
                .and_then(move |mut sessions| {
                    if sessions.contains(&destination) {
                        return Ok(());
                    }
                    debug!("opening virtual connection to {}", destination);
                    let connect = MessageBuilder::default()
                        .namespace(message::NAMESPACE_CONNECTION)
                        .source(this.sender_id())
                        .destination(&destination)
                        .payload(&connection::Request::connect())
                        .into_message();
                    this.send(connect)?;
                    sessions.insert(destination);
                    Ok(())
                }),
        )
    }

    /// Drop `destination` from the session set. Returns whether it was
    /// present.
    pub(crate) fn forget_session(
        &self,
        destination: String,
    ) -> impl Future<Item = bool, Error = ()> {
        self.shared
            .sessions
            .lock()
            .map(move |mut sessions| sessions.remove(&destination))
    }

    /// Register a waiter under `request_id`, write the frame, and suspend
    /// until the response, the timeout, or the optional cancellation signal.
    pub(crate) fn request(
        &self,
        request_id: i64,
        message: proto::CastMessage,
        cancel: Option<Valve>,
    ) -> Box<dyn Future<Item = Response, Error = Error> + Send> {
        if !self.is_connected() {
            return Box::new(future::err(Error::Disconnected));
        }
        let (waiter, response) = oneshot::channel();
        let sender = self.clone();
        // The waiter must be parked before the frame is written so a
        // response racing the write still finds it.
        let send = self
            .shared
            .registry
            .register(request_id, waiter)
            .and_then(move |()| sender.send(message));
        let response = response.map_err(|_| Error::Disconnected);
        let response: Box<dyn Future<Item = Value, Error = Error> + Send> = match cancel {
            Some(cancel) => Box::new(response.select2(cancel).then(|result| match result {
                Ok(Either::A((value, _))) => Ok(value),
                Ok(Either::B(_)) | Err(Either::B(_)) => Err(Error::Cancelled),
                Err(Either::A((err, _))) => Err(err),
            })),
            None => Box::new(response),
        };
        let wait = Timeout::new(
            send.and_then(move |()| response),
            self.shared.response_timeout,
        )
        .map_err(|err| {
            if err.is_elapsed() {
                Error::Timeout
            } else if let Some(inner) = err.into_inner() {
                inner
            } else {
                Error::Disconnected
            }
        });
        let cleanup = self.clone();
        Box::new(wait.then(move |result| match result {
            Ok(value) => {
                let response = Response::from_value(value)
                    .map_err(|err| Error::Protocol(format!("malformed response: {}", err)))
                    .and_then(Response::into_result);
                Either::A(future::result(response))
            }
            Err(err) => Either::B(
                cleanup
                    .registry()
                    .abandon(request_id)
                    .then(move |_| Err(err)),
            ),
        }))
    }

    /// `GET_STATUS` against the platform receiver.
    pub fn receiver_status(&self) -> Box<dyn Future<Item = receiver::Status, Error = Error> + Send> {
        let request_id = self.next_request_id();
        let message = self.receiver_message(&receiver::Request::GetStatus { request_id });
        Box::new(
            self.request(request_id, message, None)
                .and_then(expect_receiver_status),
        )
    }

    /// `GET_APP_AVAILABILITY` for a set of app ids.
    pub fn app_availability(
        &self,
        app_ids: &[&str],
    ) -> Box<dyn Future<Item = HashMap<String, receiver::AppAvailability>, Error = Error> + Send>
    {
        let request_id = self.next_request_id();
        let payload = receiver::Request::GetAppAvailability {
            app_id: app_ids.iter().map(|id| (*id).to_owned()).collect(),
            request_id,
        };
        let message = self.receiver_message(&payload);
        Box::new(
            self.request(request_id, message, None)
                .and_then(expect_availability),
        )
    }

    /// `LAUNCH` an application and wait for the resulting receiver status.
    pub fn launch(&self, app_id: &str) -> Box<dyn Future<Item = receiver::Status, Error = Error> + Send> {
        let request_id = self.next_request_id();
        let payload = receiver::Request::Launch {
            app_id: app_id.to_owned(),
            request_id,
        };
        let message = self.receiver_message(&payload);
        Box::new(
            self.request(request_id, message, None)
                .and_then(expect_receiver_status),
        )
    }

    /// Receiver-level `STOP` of a running application session.
    pub fn stop_app(
        &self,
        session_id: &str,
    ) -> Box<dyn Future<Item = receiver::Status, Error = Error> + Send> {
        let request_id = self.next_request_id();
        let payload = receiver::Request::Stop {
            session_id: session_id.to_owned(),
            request_id,
        };
        let message = self.receiver_message(&payload);
        Box::new(
            self.request(request_id, message, None)
                .and_then(expect_receiver_status),
        )
    }

    /// Device-level `SET_VOLUME` (distinct from the media-stream volume).
    pub fn set_receiver_volume(
        &self,
        volume: receiver::Volume,
    ) -> Box<dyn Future<Item = receiver::Status, Error = Error> + Send> {
        let request_id = self.next_request_id();
        let payload = receiver::Request::SetVolume { volume, request_id };
        let message = self.receiver_message(&payload);
        Box::new(
            self.request(request_id, message, None)
                .and_then(expect_receiver_status),
        )
    }

    /// Fire-and-forget variant of a platform receiver request.
    pub(crate) fn receiver_fire(&self, payload: &receiver::Request) -> Result<(), Error> {
        let message = self.receiver_message(payload);
        self.send(message)
    }

    fn receiver_message(&self, payload: &receiver::Request) -> proto::CastMessage {
        MessageBuilder::default()
            .namespace(message::NAMESPACE_RECEIVER)
            .source(self.sender_id())
            .destination(message::PLATFORM_DESTINATION_ID)
            .payload(payload)
            .into_message()
    }

    /// Media-namespace request against an application transport, opening the
    /// virtual connection first when needed.
    pub(crate) fn media_request(
        &self,
        destination: &str,
        request_id: i64,
        payload: media::Request,
    ) -> Box<dyn Future<Item = Vec<media::Status>, Error = Error> + Send> {
        let message = self.media_message(destination, &payload);
        let this = self.clone();
        Box::new(
            self.ensure_connection(destination)
                .and_then(move |()| this.request(request_id, message, None))
                .and_then(expect_media_status),
        )
    }

    /// Fire-and-forget media request.
    pub(crate) fn media_fire(
        &self,
        destination: &str,
        payload: media::Request,
    ) -> Box<dyn Future<Item = (), Error = Error> + Send> {
        let message = self.media_message(destination, &payload);
        let this = self.clone();
        Box::new(
            self.ensure_connection(destination)
                .and_then(move |()| this.send(message)),
        )
    }

    fn media_message(&self, destination: &str, payload: &media::Request) -> proto::CastMessage {
        MessageBuilder::default()
            .namespace(message::NAMESPACE_MEDIA)
            .source(self.sender_id())
            .destination(destination)
            .payload(payload)
            .into_message()
    }

    /// Send an application-defined JSON payload on a custom namespace.
    pub fn custom_message(
        &self,
        namespace: &str,
        destination: &str,
        payload: &Value,
    ) -> Box<dyn Future<Item = (), Error = Error> + Send> {
        if !message::valid_namespace(namespace) {
            return Box::new(future::err(Error::Protocol(format!(
                "invalid namespace {:?}",
                namespace
            ))));
        }
        let message = MessageBuilder::default()
            .namespace(namespace)
            .source(self.sender_id())
            .destination(destination)
            .payload(payload)
            .into_message();
        let this = self.clone();
        Box::new(
            self.ensure_connection(destination)
                .and_then(move |()| this.send(message)),
        )
    }
}

fn expect_receiver_status(response: Response) -> Result<receiver::Status, Error> {
    match response {
        Response::ReceiverStatus { status, .. } => Ok(status),
        response => Err(Error::Protocol(format!(
            "expected RECEIVER_STATUS, got {:?}",
            response
        ))),
    }
}

fn expect_media_status(response: Response) -> Result<Vec<media::Status>, Error> {
    match response {
        Response::MediaStatus { status, .. } => Ok(status),
        response => Err(Error::Protocol(format!(
            "expected MEDIA_STATUS, got {:?}",
            response
        ))),
    }
}

fn expect_availability(
    response: Response,
) -> Result<HashMap<String, receiver::AppAvailability>, Error> {
    match response {
        Response::GetAppAvailability { availability, .. } => Ok(availability),
        response => Err(Error::Protocol(format!(
            "expected GET_APP_AVAILABILITY, got {:?}",
            response
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn generated_sender_ids_are_unique_and_well_formed() {
        let a = generate_sender_id();
        let b = generate_sender_id();
        assert_ne!(a, b);
        for id in &[a, b] {
            assert!(id.starts_with("sender-"));
            let suffix = &id["sender-".len()..];
            assert_eq!(10, suffix.len());
            assert!(suffix.chars().all(|c| c.is_ascii_alphanumeric()));
        }
    }

    #[test]
    fn request_id_seed_is_in_range() {
        for _ in 0..1000 {
            let seed = seed_request_id();
            assert!(seed >= 1 && seed <= 65_536);
        }
    }

    #[test]
    fn liveness_age_shrinks_on_record() {
        let liveness = Liveness::new();
        std::thread::sleep(Duration::from_millis(15));
        let before = liveness.age();
        liveness.record();
        let after = liveness.age();
        assert!(after < before);
    }

    #[test]
    fn expect_helpers_reject_mismatched_variants() {
        let response = Response::Close;
        assert!(expect_receiver_status(response).is_err());
        let response = Response::Close;
        assert!(expect_media_status(response).is_err());
        let response = Response::Close;
        assert!(expect_availability(response).is_err());
    }
}
