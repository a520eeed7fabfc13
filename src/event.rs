//! Events fanned out to channel subscribers.
//!
//! The reader enqueues every decoded event onto one internal queue; a
//! dispatcher task delivers them to subscribers in arrival order. Subscribers
//! can filter by [`EventType`] at registration.
//!
//! [`EventType`]: enum.EventType.html

use std::collections::HashMap;

use crate::payload::{media, multizone, receiver};

/// A spontaneous or fanned-out message from the cast device.
#[derive(Clone, Debug)]
pub enum Event {
    /// The channel opened (`true`) or was torn down (`false`).
    Connected(bool),
    /// The peer closed the channel-level virtual connection.
    Closed,
    /// Device status push or unmatched `RECEIVER_STATUS` response.
    ReceiverStatus(receiver::Status),
    /// Media status push or unmatched `MEDIA_STATUS` response.
    MediaStatus(Vec<media::Status>),
    /// Unmatched app availability response.
    Availability(HashMap<String, receiver::AppAvailability>),
    /// The peer closed the virtual connection to one application session.
    SessionClosed {
        /// Transport id of the application whose connection closed.
        peer: String,
    },
    MultizoneStatus(multizone::Status),
    DeviceAdded(multizone::Device),
    DeviceUpdated(multizone::Device),
    DeviceRemoved {
        device_id: String,
    },
    /// A message this library does not model: binary payloads and unknown
    /// application-defined JSON types.
    Custom(CustomMessage),
}

impl Event {
    pub fn kind(&self) -> EventType {
        match *self {
            Event::Connected(_) => EventType::Connected,
            Event::Closed => EventType::Closed,
            Event::ReceiverStatus(_) => EventType::ReceiverStatus,
            Event::MediaStatus(_) => EventType::MediaStatus,
            Event::Availability(_) => EventType::Availability,
            Event::SessionClosed { .. } => EventType::SessionClosed,
            Event::MultizoneStatus(_) => EventType::MultizoneStatus,
            Event::DeviceAdded(_) => EventType::DeviceAdded,
            Event::DeviceUpdated(_) => EventType::DeviceUpdated,
            Event::DeviceRemoved { .. } => EventType::DeviceRemoved,
            Event::Custom(_) => EventType::Custom,
        }
    }
}

/// Filter key for event subscriptions.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub enum EventType {
    Connected,
    Closed,
    ReceiverStatus,
    MediaStatus,
    Availability,
    SessionClosed,
    MultizoneStatus,
    DeviceAdded,
    DeviceUpdated,
    DeviceRemoved,
    Custom,
}

/// An application-defined message surfaced verbatim.
#[derive(Clone, Debug)]
pub struct CustomMessage {
    pub source: String,
    pub destination: String,
    pub namespace: String,
    pub payload: CustomPayload,
}

#[derive(Clone, Debug)]
pub enum CustomPayload {
    String(String),
    Binary(Vec<u8>),
}
