//! Media playback control (`urn:x-cast:com.google.cast.media`).
//!
//! Requests here are addressed to a running application's transport id, not
//! to the platform receiver. `STOP` and `SET_VOLUME` share their `type`
//! strings with receiver-level requests; the namespace keeps them apart.

use serde::de;
use serde_derive::{Deserialize, Serialize};
use serde_json::Value;

use crate::payload::receiver::Volume;

pub const METADATA_TYPE_GENERIC: u32 = 0;
pub const METADATA_TYPE_MOVIE: u32 = 1;
pub const METADATA_TYPE_TV_SHOW: u32 = 2;
pub const METADATA_TYPE_MUSIC_TRACK: u32 = 3;
pub const METADATA_TYPE_PHOTO: u32 = 4;

#[derive(Serialize, Debug)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
#[allow(clippy::large_enum_variant)]
pub enum Request {
    #[serde(rename_all = "camelCase")]
    Load {
        request_id: i64,
        session_id: String,
        media: Media,
        #[serde(skip_serializing_if = "Option::is_none")]
        autoplay: Option<bool>,
        #[serde(skip_serializing_if = "Option::is_none")]
        current_time: Option<f64>,
        #[serde(skip_serializing_if = "Option::is_none")]
        custom_data: Option<Value>,
    },
    #[serde(rename_all = "camelCase")]
    Play {
        media_session_id: i64,
        request_id: i64,
    },
    #[serde(rename_all = "camelCase")]
    Pause {
        media_session_id: i64,
        request_id: i64,
    },
    #[serde(rename_all = "camelCase")]
    Seek {
        media_session_id: i64,
        request_id: i64,
        #[serde(skip_serializing_if = "Option::is_none")]
        resume_state: Option<ResumeState>,
        #[serde(skip_serializing_if = "Option::is_none")]
        current_time: Option<f64>,
    },
    #[serde(rename_all = "camelCase")]
    Stop {
        media_session_id: i64,
        request_id: i64,
    },
    #[serde(rename_all = "camelCase")]
    GetStatus {
        #[serde(skip_serializing_if = "Option::is_none")]
        media_session_id: Option<i64>,
        request_id: i64,
    },
    #[serde(rename_all = "camelCase")]
    SetVolume {
        media_session_id: i64,
        request_id: i64,
        volume: Volume,
    },
}

#[derive(Serialize, Deserialize, Clone, Copy, Debug, Eq, PartialEq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ResumeState {
    PlaybackStart,
    PlaybackPause,
}

/// Content to load on the device.
#[derive(Serialize, Deserialize, Clone, Debug)]
#[serde(rename_all = "camelCase")]
pub struct Media {
    /// URL of the content, or an application-defined opaque id.
    pub content_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content_url: Option<String>,
    pub stream_type: StreamType,
    pub content_type: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metadata: Option<Metadata>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub duration: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tracks: Option<Vec<Track>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub text_track_style: Option<Value>,
}

impl Media {
    /// Buffered content identified by URL, the common case for LOAD.
    pub fn from_url(url: &str, content_type: &str) -> Self {
        Media {
            content_id: url.to_owned(),
            content_url: None,
            stream_type: StreamType::Buffered,
            content_type: content_type.to_owned(),
            metadata: None,
            duration: None,
            tracks: None,
            text_track_style: None,
        }
    }
}

/// How the receiver should treat the stream. Parsed case-insensitively,
/// emitted in the canonical upper-case spelling.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum StreamType {
    Buffered,
    Live,
    None,
}

impl StreamType {
    fn as_str(self) -> &'static str {
        match self {
            StreamType::Buffered => "BUFFERED",
            StreamType::Live => "LIVE",
            StreamType::None => "NONE",
        }
    }
}

impl serde::Serialize for StreamType {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> serde::Deserialize<'de> for StreamType {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw: String = serde::Deserialize::deserialize(deserializer)?;
        match raw.to_ascii_uppercase().as_str() {
            "BUFFERED" => Ok(StreamType::Buffered),
            "LIVE" => Ok(StreamType::Live),
            "NONE" => Ok(StreamType::None),
            _ => Err(de::Error::unknown_variant(
                &raw,
                &["BUFFERED", "LIVE", "NONE"],
            )),
        }
    }
}

#[derive(Serialize, Deserialize, Clone, Debug, Default)]
#[serde(rename_all = "camelCase")]
pub struct Metadata {
    pub metadata_type: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub series_title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub album_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub subtitle: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub album_artist: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub artist: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub composer: Option<String>,
    #[serde(default)]
    pub images: Vec<Image>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub release_date: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub studio: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub season: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub episode: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub track_number: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub disc_number: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub width: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub height: Option<u32>,
}

impl Metadata {
    pub fn music_default() -> Self {
        Self {
            metadata_type: METADATA_TYPE_MUSIC_TRACK,
            ..Self::default()
        }
    }
}

#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct Image {
    pub url: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub width: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub height: Option<u32>,
}

/// Side-loaded track (captions, alternate audio).
#[derive(Serialize, Deserialize, Clone, Debug)]
#[serde(rename_all = "camelCase")]
pub struct Track {
    pub track_id: i64,
    #[serde(rename = "type")]
    pub track_type: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub track_content_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub track_content_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub subtype: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub language: Option<String>,
}

/// One entry of a `MEDIA_STATUS` report.
#[derive(Deserialize, Clone, Debug)]
#[serde(rename_all = "camelCase")]
pub struct Status {
    pub media_session_id: i64,
    #[serde(default)]
    pub media: Option<Media>,
    #[serde(default)]
    pub playback_rate: Option<f64>,
    pub player_state: PlayerState,
    #[serde(default)]
    pub idle_reason: Option<IdleReason>,
    #[serde(default)]
    pub current_time: Option<f64>,
    #[serde(default)]
    pub volume: Option<Volume>,
    #[serde(default)]
    pub items: Option<Vec<QueueItem>>,
    #[serde(default)]
    pub current_item_id: Option<i64>,
    #[serde(default)]
    pub supported_media_commands: Option<u64>,
    #[serde(default)]
    pub repeat_mode: Option<String>,
}

#[derive(Deserialize, Clone, Debug)]
#[serde(rename_all = "camelCase")]
pub struct QueueItem {
    #[serde(default)]
    pub item_id: Option<i64>,
    #[serde(default)]
    pub media: Option<Media>,
    #[serde(default)]
    pub autoplay: Option<bool>,
    #[serde(default)]
    pub start_time: Option<f64>,
    #[serde(default)]
    pub preload_time: Option<f64>,
}

/// Parsed case-insensitively; emitted in the canonical upper-case spelling.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum PlayerState {
    Idle,
    Playing,
    Paused,
    Buffering,
    Loading,
}

impl PlayerState {
    fn as_str(self) -> &'static str {
        match self {
            PlayerState::Idle => "IDLE",
            PlayerState::Playing => "PLAYING",
            PlayerState::Paused => "PAUSED",
            PlayerState::Buffering => "BUFFERING",
            PlayerState::Loading => "LOADING",
        }
    }
}

impl serde::Serialize for PlayerState {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> serde::Deserialize<'de> for PlayerState {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw: String = serde::Deserialize::deserialize(deserializer)?;
        match raw.to_ascii_uppercase().as_str() {
            "IDLE" => Ok(PlayerState::Idle),
            "PLAYING" => Ok(PlayerState::Playing),
            "PAUSED" => Ok(PlayerState::Paused),
            "BUFFERING" => Ok(PlayerState::Buffering),
            "LOADING" => Ok(PlayerState::Loading),
            _ => Err(de::Error::unknown_variant(
                &raw,
                &["IDLE", "PLAYING", "PAUSED", "BUFFERING", "LOADING"],
            )),
        }
    }
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum IdleReason {
    Cancelled,
    Interrupted,
    Finished,
    Error,
}

impl IdleReason {
    fn as_str(self) -> &'static str {
        match self {
            IdleReason::Cancelled => "CANCELLED",
            IdleReason::Interrupted => "INTERRUPTED",
            IdleReason::Finished => "FINISHED",
            IdleReason::Error => "ERROR",
        }
    }
}

impl serde::Serialize for IdleReason {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> serde::Deserialize<'de> for IdleReason {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw: String = serde::Deserialize::deserialize(deserializer)?;
        match raw.to_ascii_uppercase().as_str() {
            "CANCELLED" => Ok(IdleReason::Cancelled),
            "INTERRUPTED" => Ok(IdleReason::Interrupted),
            "FINISHED" => Ok(IdleReason::Finished),
            "ERROR" => Ok(IdleReason::Error),
            _ => Err(de::Error::unknown_variant(
                &raw,
                &["CANCELLED", "INTERRUPTED", "FINISHED", "ERROR"],
            )),
        }
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn load_payload_matches_wire_shape() {
        let request = Request::Load {
            request_id: 7,
            session_id: "s1".to_owned(),
            media: Media::from_url("http://example.com/a.mp3", "audio/mpeg"),
            autoplay: Some(true),
            current_time: Some(0.0),
            custom_data: None,
        };
        let value = serde_json::to_value(&request).unwrap();
        assert_eq!(
            json!({
                "type": "LOAD",
                "requestId": 7,
                "sessionId": "s1",
                "media": {
                    "contentId": "http://example.com/a.mp3",
                    "streamType": "BUFFERED",
                    "contentType": "audio/mpeg"
                },
                "autoplay": true,
                "currentTime": 0.0
            }),
            value
        );
    }

    #[test]
    fn stop_carries_media_session_id() {
        let value = serde_json::to_value(&Request::Stop {
            media_session_id: 42,
            request_id: 9,
        })
        .unwrap();
        assert_eq!(
            json!({"type": "STOP", "mediaSessionId": 42, "requestId": 9}),
            value
        );
    }

    #[test]
    fn stream_type_parses_case_insensitively() {
        let parsed: StreamType = serde_json::from_str(r#""buffered""#).unwrap();
        assert_eq!(StreamType::Buffered, parsed);
        assert_eq!(r#""BUFFERED""#, serde_json::to_string(&parsed).unwrap());
    }

    #[test]
    fn player_state_parses_extended_loading() {
        let parsed: PlayerState = serde_json::from_str(r#""loading""#).unwrap();
        assert_eq!(PlayerState::Loading, parsed);
    }

    #[test]
    fn status_parses_idle_reason_and_large_session_id() {
        let status: Status = serde_json::from_str(
            r#"{"mediaSessionId":8589934592,"playerState":"IDLE",
                "idleReason":"FINISHED","currentTime":12.25,"playbackRate":1.0}"#,
        )
        .unwrap();
        assert_eq!(8_589_934_592, status.media_session_id);
        assert_eq!(Some(IdleReason::Finished), status.idle_reason);
    }

    #[test]
    fn seek_omits_unset_optionals() {
        let payload = serde_json::to_string(&Request::Seek {
            media_session_id: 1,
            request_id: 2,
            resume_state: None,
            current_time: Some(30.0),
        })
        .unwrap();
        assert_eq!(
            r#"{"type":"SEEK","mediaSessionId":1,"requestId":2,"currentTime":30.0}"#,
            payload
        );
    }
}
