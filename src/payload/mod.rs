//! Inner JSON payloads carried by the cast channel.
//!
//! The cast protocol splits messages across namespaces, which act like
//! distinct communication channels. Each namespace module defines the
//! requests this sender can emit. Incoming payloads share a single tagged
//! taxonomy: the wire tags both directions with a `type` field, so ingress
//! payloads are re-tagged as `responseType` before dispatch to keep request
//! and response variants with colliding `type` strings (receiver `STOP` vs
//! media `STOP`, and likewise `SET_VOLUME`) apart.

use std::collections::HashMap;

use serde_derive::Deserialize;
use serde_json::Value;

pub mod connection;
pub mod heartbeat;
pub mod media;
pub mod multizone;
pub mod receiver;

use crate::error::Error;

const KEY_TYPE: &str = "type";
const KEY_RESPONSE_TYPE: &str = "responseType";
const KEY_REQUEST_ID: &str = "requestId";
const KEY_STATUS: &str = "status";

const KNOWN_RESPONSE_TYPES: &[&str] = &[
    "PING",
    "PONG",
    "CLOSE",
    "RECEIVER_STATUS",
    "MEDIA_STATUS",
    "GET_APP_AVAILABILITY",
    "LAUNCH_ERROR",
    "INVALID_PLAYER_STATE",
    "INVALID_REQUEST",
    "LOAD_FAILED",
    "LOAD_CANCELLED",
    "MULTIZONE_STATUS",
    "DEVICE_ADDED",
    "DEVICE_UPDATED",
    "DEVICE_REMOVED",
];

/// Parse an incoming string payload and rename its `type` tag to
/// `responseType` so it can be dispatched against [`Response`].
///
/// [`Response`]: enum.Response.html
pub(crate) fn adjust(payload: &str) -> Result<Value, serde_json::Error> {
    let mut value: Value = serde_json::from_str(payload)?;
    if let Some(map) = value.as_object_mut() {
        if !map.contains_key(KEY_RESPONSE_TYPE) {
            if let Some(tag) = map.remove(KEY_TYPE) {
                map.insert(KEY_RESPONSE_TYPE.to_owned(), tag);
            }
        }
    }
    Ok(value)
}

/// `requestId` of an adjusted payload. `0` marks a spontaneous event.
pub(crate) fn request_id(value: &Value) -> i64 {
    value
        .get(KEY_REQUEST_ID)
        .and_then(Value::as_i64)
        .unwrap_or(0)
}

pub(crate) fn response_type(value: &Value) -> Option<&str> {
    value.get(KEY_RESPONSE_TYPE).and_then(Value::as_str)
}

/// Whether an adjusted payload carries one of the response types this
/// library understands. Anything else is an application-defined message and
/// is surfaced verbatim.
pub(crate) fn is_known_response(value: &Value) -> bool {
    match response_type(value) {
        Some(tag) => KNOWN_RESPONSE_TYPES.contains(&tag),
        None => false,
    }
}

/// Incoming payloads across all namespaces, dispatched on `responseType`.
#[derive(Clone, Debug, Deserialize)]
#[serde(tag = "responseType", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Response {
    Ping,
    Pong,
    Close,
    #[serde(rename_all = "camelCase")]
    ReceiverStatus {
        #[serde(default)]
        request_id: i64,
        status: receiver::Status,
    },
    #[serde(rename_all = "camelCase")]
    MediaStatus {
        #[serde(default)]
        request_id: i64,
        #[serde(default)]
        status: Vec<media::Status>,
    },
    #[serde(rename_all = "camelCase")]
    GetAppAvailability {
        #[serde(default)]
        request_id: i64,
        #[serde(default)]
        availability: HashMap<String, receiver::AppAvailability>,
    },
    #[serde(rename_all = "camelCase")]
    LaunchError {
        #[serde(default)]
        request_id: i64,
        reason: Option<String>,
    },
    #[serde(rename_all = "camelCase")]
    InvalidPlayerState {
        #[serde(default)]
        request_id: i64,
    },
    #[serde(rename_all = "camelCase")]
    InvalidRequest {
        #[serde(default)]
        request_id: i64,
        reason: Option<String>,
    },
    #[serde(rename_all = "camelCase")]
    LoadFailed {
        #[serde(default)]
        request_id: i64,
    },
    #[serde(rename_all = "camelCase")]
    LoadCancelled {
        #[serde(default)]
        request_id: i64,
        item_id: Option<i64>,
    },
    MultizoneStatus {
        status: multizone::Status,
    },
    DeviceAdded {
        device: multizone::Device,
    },
    DeviceUpdated {
        device: multizone::Device,
    },
    #[serde(rename_all = "camelCase")]
    DeviceRemoved {
        device_id: String,
    },
}

impl Response {
    /// Decode an adjusted payload. `MEDIA_STATUS` is normalized first: the
    /// `status` field may be absent (the top-level object is then itself the
    /// single status), a bare object, or an array.
    pub fn from_value(value: Value) -> Result<Self, serde_json::Error> {
        let value = normalize_media_status(value);
        serde_json::from_value(value)
    }

    /// Split device-reported failures out of the response taxonomy so
    /// request callers see them as errors.
    pub(crate) fn into_result(self) -> Result<Self, Error> {
        match self {
            Response::InvalidRequest { reason, .. } => Err(Error::InvalidRequest(reason)),
            Response::InvalidPlayerState { .. } => Err(Error::InvalidPlayerState),
            Response::LaunchError { reason, .. } => Err(Error::LaunchError(reason)),
            Response::LoadFailed { .. } => Err(Error::LoadFailed),
            Response::LoadCancelled { item_id, .. } => Err(Error::LoadCancelled(item_id)),
            response => Ok(response),
        }
    }
}

fn normalize_media_status(mut value: Value) -> Value {
    if response_type(&value) != Some("MEDIA_STATUS") {
        return value;
    }
    let normalized = match value.get(KEY_STATUS).cloned() {
        Some(Value::Array(_)) => return value,
        Some(status @ Value::Object(_)) => Value::Array(vec![status]),
        _ => {
            // No status field: the envelope itself is the single status.
            let mut status = value.clone();
            if let Some(map) = status.as_object_mut() {
                map.remove(KEY_RESPONSE_TYPE);
                map.remove(KEY_REQUEST_ID);
                map.remove(KEY_STATUS);
            }
            Value::Array(vec![status])
        }
    };
    if let Some(map) = value.as_object_mut() {
        map.insert(KEY_STATUS.to_owned(), normalized);
    }
    value
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn adjust_renames_type_to_response_type() {
        let value = adjust(r#"{"type":"PONG"}"#).unwrap();
        assert_eq!(Some("PONG"), response_type(&value));
        assert!(value.get("type").is_none());
    }

    #[test]
    fn adjust_keeps_existing_response_type() {
        let value = adjust(r#"{"responseType":"PING","type":"shadowed"}"#).unwrap();
        assert_eq!(Some("PING"), response_type(&value));
    }

    #[test]
    fn request_id_defaults_to_spontaneous() {
        let value = adjust(r#"{"type":"RECEIVER_STATUS"}"#).unwrap();
        assert_eq!(0, request_id(&value));
        let value = adjust(r#"{"type":"RECEIVER_STATUS","requestId":17}"#).unwrap();
        assert_eq!(17, request_id(&value));
    }

    #[test]
    fn unknown_response_type_is_an_application_event() {
        let value = adjust(r#"{"type":"com.example.PLAYLIST","data":[1,2]}"#).unwrap();
        assert!(!is_known_response(&value));
        let value = adjust(r#"{"type":"MEDIA_STATUS"}"#).unwrap();
        assert!(is_known_response(&value));
    }

    #[test]
    fn media_status_accepts_bare_object() {
        let value = adjust(
            r#"{"type":"MEDIA_STATUS","requestId":4,
                "status":{"mediaSessionId":2,"playerState":"PLAYING","currentTime":1.5}}"#,
        )
        .unwrap();
        match Response::from_value(value).unwrap() {
            Response::MediaStatus { request_id, status } => {
                assert_eq!(4, request_id);
                assert_eq!(1, status.len());
                assert_eq!(2, status[0].media_session_id);
            }
            response => panic!("unexpected response: {:?}", response),
        }
    }

    #[test]
    fn media_status_accepts_array() {
        let value = adjust(
            r#"{"type":"MEDIA_STATUS","status":[
                {"mediaSessionId":1,"playerState":"IDLE"},
                {"mediaSessionId":2,"playerState":"PAUSED"},
                {"mediaSessionId":3,"playerState":"BUFFERING"}]}"#,
        )
        .unwrap();
        match Response::from_value(value).unwrap() {
            Response::MediaStatus { status, .. } => assert_eq!(3, status.len()),
            response => panic!("unexpected response: {:?}", response),
        }
    }

    #[test]
    fn media_status_accepts_flattened_object() {
        let value = adjust(
            r#"{"type":"MEDIA_STATUS","requestId":9,
                "mediaSessionId":42,"playerState":"BUFFERING","currentTime":0.0}"#,
        )
        .unwrap();
        match Response::from_value(value).unwrap() {
            Response::MediaStatus { request_id, status } => {
                assert_eq!(9, request_id);
                assert_eq!(1, status.len());
                assert_eq!(42, status[0].media_session_id);
            }
            response => panic!("unexpected response: {:?}", response),
        }
    }

    #[test]
    fn availability_response_decodes_literal_payload() {
        let value = adjust(
            r#"{"responseType":"GET_APP_AVAILABILITY","requestId":2,
                "availability":{"CC1AD845":"APP_AVAILABLE"}}"#,
        )
        .unwrap();
        match Response::from_value(value).unwrap() {
            Response::GetAppAvailability {
                request_id,
                availability,
            } => {
                assert_eq!(2, request_id);
                assert_eq!(
                    Some(&receiver::AppAvailability::AppAvailable),
                    availability.get("CC1AD845")
                );
            }
            response => panic!("unexpected response: {:?}", response),
        }
    }

    #[test]
    fn device_error_responses_become_errors() {
        let value = adjust(r#"{"type":"INVALID_REQUEST","requestId":3,"reason":"INVALID_COMMAND"}"#)
            .unwrap();
        let err = Response::from_value(value).unwrap().into_result().unwrap_err();
        match err {
            crate::Error::InvalidRequest(Some(reason)) => assert_eq!("INVALID_COMMAND", reason),
            err => panic!("unexpected error: {:?}", err),
        }

        let value = adjust(r#"{"type":"LOAD_CANCELLED","requestId":5,"itemId":7}"#).unwrap();
        let err = Response::from_value(value).unwrap().into_result().unwrap_err();
        match err {
            crate::Error::LoadCancelled(Some(7)) => {}
            err => panic!("unexpected error: {:?}", err),
        }
    }

    #[test]
    fn multizone_member_events_decode() {
        let value = adjust(&json!({
            "type": "DEVICE_UPDATED",
            "device": {"deviceId": "abc", "name": "Den", "capabilities": 4,
                       "volume": {"level": 0.4, "muted": false}}
        })
        .to_string())
        .unwrap();
        match Response::from_value(value).unwrap() {
            Response::DeviceUpdated { device } => {
                assert_eq!(Some("abc"), device.device_id.as_ref().map(String::as_str));
            }
            response => panic!("unexpected response: {:?}", response),
        }
    }
}
