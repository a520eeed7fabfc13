//! Sender-side client for Google Cast receivers.
//!
//! The heart of the crate is the cast channel: a TLS connection carrying
//! length-prefixed `CastMessage` protobufs that multiplex JSON dialects by
//! namespace. [`connect`] performs the TLS handshake, the in-protocol device
//! auth exchange, and the channel-level CONNECT, then spawns the worker
//! tasks (reader, writer, heartbeat, event dispatcher) onto the current
//! tokio executor. [`Device`] wraps a channel with the application-scoped
//! API (launch, status, volume) and hands out [`Session`]s for media
//! control.
//!
//! [`connect`]: fn.connect.html
//! [`Device`]: device/struct.Device.html
//! [`Session`]: session/struct.Session.html

#[macro_use]
extern crate log;
#[macro_use]
extern crate nom;

mod codec;
mod message;
#[allow(clippy::all, clippy::pedantic)]
mod proto;
mod shutdown;
mod worker;

pub mod channel;
pub mod device;
pub mod discovery;
pub mod error;
pub mod event;
pub mod payload;
pub mod session;

pub use crate::channel::{connect, Channel, Config, DEFAULT_RESPONSE_TIMEOUT};
pub use crate::device::{CastDevice, Device};
pub use crate::error::{AuthErrorType, Error};
pub use crate::event::{CustomMessage, CustomPayload, Event, EventType};
pub use crate::message::{
    valid_namespace, BACKDROP_APP_ID, DEFAULT_MEDIA_RECEIVER_APP_ID, DEFAULT_PORT,
    NAMESPACE_CONNECTION, NAMESPACE_DEVICEAUTH, NAMESPACE_HEARTBEAT, NAMESPACE_MEDIA,
    NAMESPACE_MULTIZONE, NAMESPACE_RECEIVER, PLATFORM_DESTINATION_ID, PLATFORM_SENDER_ID,
    YOUTUBE_APP_ID,
};
pub use crate::session::Session;
