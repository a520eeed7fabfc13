//! Platform receiver operations (`urn:x-cast:com.google.cast.receiver`):
//! application launch and stop, device status, app availability, and
//! device-level volume.

use std::fmt;
use std::str::FromStr;

use serde::de;
use serde_derive::{Deserialize, Serialize};

use crate::message::{BACKDROP_APP_ID, DEFAULT_MEDIA_RECEIVER_APP_ID, YOUTUBE_APP_ID};

#[derive(Serialize, Debug)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Request {
    #[serde(rename_all = "camelCase")]
    Launch { app_id: String, request_id: i64 },
    #[serde(rename_all = "camelCase")]
    GetStatus { request_id: i64 },
    #[serde(rename_all = "camelCase")]
    GetAppAvailability {
        app_id: Vec<String>,
        request_id: i64,
    },
    #[serde(rename_all = "camelCase")]
    Stop { session_id: String, request_id: i64 },
    #[serde(rename_all = "camelCase")]
    SetVolume { volume: Volume, request_id: i64 },
}

/// Well-known receiver applications, with an escape hatch for custom app
/// ids. Parses both app ids and short aliases (`default`, `backdrop`,
/// `youtube`).
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum CastDeviceApp {
    DefaultMediaReceiver,
    Backdrop,
    YouTube,
    Custom(String),
}

impl CastDeviceApp {
    pub fn app_id(&self) -> &str {
        match *self {
            CastDeviceApp::DefaultMediaReceiver => DEFAULT_MEDIA_RECEIVER_APP_ID,
            CastDeviceApp::Backdrop => BACKDROP_APP_ID,
            CastDeviceApp::YouTube => YOUTUBE_APP_ID,
            CastDeviceApp::Custom(ref app_id) => app_id,
        }
    }
}

impl FromStr for CastDeviceApp {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let app = match s {
            DEFAULT_MEDIA_RECEIVER_APP_ID | "default" => CastDeviceApp::DefaultMediaReceiver,
            BACKDROP_APP_ID | "backdrop" => CastDeviceApp::Backdrop,
            YOUTUBE_APP_ID | "youtube" => CastDeviceApp::YouTube,
            custom => CastDeviceApp::Custom(custom.to_owned()),
        };
        Ok(app)
    }
}

impl fmt::Display for CastDeviceApp {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(self.app_id())
    }
}

/// Device status as reported in `RECEIVER_STATUS`.
#[derive(Deserialize, Clone, Debug, Default)]
#[serde(rename_all = "camelCase")]
pub struct Status {
    #[serde(default)]
    pub applications: Vec<Application>,
    #[serde(default)]
    pub is_active_input: bool,
    #[serde(default)]
    pub is_stand_by: bool,
    #[serde(default)]
    pub volume: Volume,
}

/// An application running on the device. `transport_id` is the destination
/// for a virtual connection to the app; `session_id` identifies the run.
#[derive(Deserialize, Clone, Debug)]
#[serde(rename_all = "camelCase")]
pub struct Application {
    pub app_id: String,
    pub session_id: String,
    pub transport_id: String,
    #[serde(default)]
    pub namespaces: Vec<Namespace>,
    #[serde(default)]
    pub display_name: String,
    #[serde(default)]
    pub status_text: String,
    #[serde(default)]
    pub icon_url: Option<String>,
}

#[derive(Deserialize, Clone, Debug)]
pub struct Namespace {
    pub name: String,
}

#[derive(Deserialize, Clone, Copy, Debug, Eq, PartialEq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AppAvailability {
    AppAvailable,
    AppUnavailable,
}

/// Device or stream volume. All fields are optional on the wire; a
/// `SET_VOLUME` request carries only the fields it wants to change.
#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Volume {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub level: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub muted: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub control_type: Option<VolumeControlType>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub step_interval: Option<f64>,
}

impl From<f64> for Volume {
    fn from(level: f64) -> Self {
        Volume {
            level: Some(level),
            ..Volume::default()
        }
    }
}

impl From<bool> for Volume {
    fn from(muted: bool) -> Self {
        Volume {
            muted: Some(muted),
            ..Volume::default()
        }
    }
}

/// How the device's volume can be driven. Devices report the lower-case
/// spellings; parsing is case-insensitive and the canonical upper-case form
/// is emitted.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum VolumeControlType {
    Attenuation,
    Fixed,
    Master,
}

impl VolumeControlType {
    fn as_str(self) -> &'static str {
        match self {
            VolumeControlType::Attenuation => "ATTENUATION",
            VolumeControlType::Fixed => "FIXED",
            VolumeControlType::Master => "MASTER",
        }
    }
}

impl fmt::Display for VolumeControlType {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl serde::Serialize for VolumeControlType {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> serde::Deserialize<'de> for VolumeControlType {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw: String = serde::Deserialize::deserialize(deserializer)?;
        match raw.to_ascii_uppercase().as_str() {
            "ATTENUATION" => Ok(VolumeControlType::Attenuation),
            "FIXED" => Ok(VolumeControlType::Fixed),
            "MASTER" => Ok(VolumeControlType::Master),
            _ => Err(de::Error::unknown_variant(
                &raw,
                &["ATTENUATION", "FIXED", "MASTER"],
            )),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn launch_payload_is_wire_exact() {
        let payload = serde_json::to_string(&Request::Launch {
            app_id: "233637DE".to_owned(),
            request_id: 1,
        })
        .unwrap();
        assert_eq!(r#"{"type":"LAUNCH","appId":"233637DE","requestId":1}"#, payload);
    }

    #[test]
    fn availability_payload_is_wire_exact() {
        let payload = serde_json::to_string(&Request::GetAppAvailability {
            app_id: vec!["CC1AD845".to_owned()],
            request_id: 2,
        })
        .unwrap();
        assert_eq!(
            r#"{"type":"GET_APP_AVAILABILITY","appId":["CC1AD845"],"requestId":2}"#,
            payload
        );
    }

    #[test]
    fn set_volume_serializes_only_populated_fields() {
        let payload = serde_json::to_string(&Request::SetVolume {
            volume: Volume::from(0.5),
            request_id: 3,
        })
        .unwrap();
        assert_eq!(
            r#"{"type":"SET_VOLUME","volume":{"level":0.5},"requestId":3}"#,
            payload
        );
    }

    #[test]
    fn status_parses_applications_and_volume() {
        let status: Status = serde_json::from_str(
            r#"{"applications":[{"appId":"233637DE","sessionId":"s1",
                 "transportId":"t1","displayName":"YouTube","statusText":"",
                 "namespaces":[{"name":"urn:x-cast:com.google.cast.media"}]}],
                "isActiveInput":true,
                "volume":{"level":0.35,"muted":false,"controlType":"attenuation",
                          "stepInterval":0.05}}"#,
        )
        .unwrap();
        assert_eq!(1, status.applications.len());
        let app = &status.applications[0];
        assert_eq!("233637DE", app.app_id);
        assert_eq!("t1", app.transport_id);
        assert_eq!(
            Some(VolumeControlType::Attenuation),
            status.volume.control_type
        );
    }

    #[test]
    fn control_type_round_trips_in_canonical_case() {
        let parsed: VolumeControlType = serde_json::from_str(r#""master""#).unwrap();
        assert_eq!(VolumeControlType::Master, parsed);
        assert_eq!(r#""MASTER""#, serde_json::to_string(&parsed).unwrap());
    }

    #[test]
    fn app_aliases_resolve_to_app_ids() {
        assert_eq!(
            CastDeviceApp::YouTube,
            "youtube".parse::<CastDeviceApp>().unwrap()
        );
        assert_eq!(
            CastDeviceApp::DefaultMediaReceiver,
            "CC1AD845".parse::<CastDeviceApp>().unwrap()
        );
        assert_eq!("233637DE", CastDeviceApp::YouTube.app_id());
        match "0F5096E8".parse::<CastDeviceApp>().unwrap() {
            CastDeviceApp::Custom(ref id) => assert_eq!("0F5096E8", id),
            app => panic!("unexpected app: {:?}", app),
        }
    }

    #[test]
    fn status_tolerates_missing_fields() {
        let status: Status = serde_json::from_str(r#"{"volume":{"level":1.0}}"#).unwrap();
        assert!(status.applications.is_empty());
        assert!(!status.is_active_input);
    }
}
