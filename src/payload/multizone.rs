//! Multizone group membership reports (`urn:x-cast:com.google.cast.multizone`).
//!
//! Group leaders push `DEVICE_ADDED` / `DEVICE_UPDATED` / `DEVICE_REMOVED`
//! events and answer status requests with a `MULTIZONE_STATUS` snapshot.

use serde_derive::Deserialize;

use crate::payload::receiver::Volume;

#[derive(Deserialize, Clone, Debug, Default)]
#[serde(rename_all = "camelCase")]
pub struct Status {
    #[serde(default)]
    pub devices: Vec<Device>,
}

/// A member device of a multizone group.
#[derive(Deserialize, Clone, Debug)]
#[serde(rename_all = "camelCase")]
pub struct Device {
    #[serde(default)]
    pub device_id: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub capabilities: Option<u32>,
    #[serde(default)]
    pub volume: Option<Volume>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_parses_member_list() {
        let status: Status = serde_json::from_str(
            r#"{"devices":[
                {"deviceId":"a","name":"Kitchen","capabilities":4,
                 "volume":{"level":0.2,"muted":false}},
                {"deviceId":"b","name":"Den"}]}"#,
        )
        .unwrap();
        assert_eq!(2, status.devices.len());
        assert_eq!(Some(0.2), status.devices[0].volume.as_ref().and_then(|v| v.level));
        assert!(status.devices[1].volume.is_none());
    }
}
