//! Types for consuming DNS-SD discovery records.
//!
//! Cast devices announce themselves as `_googlecast._tcp.local` and describe
//! themselves through `key=value` pairs in the TXT record. The mDNS querier
//! itself lives outside this crate; it hands a [`ServiceRecord`] to
//! [`CastDevice::from_record`].
//!
//! [`ServiceRecord`]: struct.ServiceRecord.html
//! [`CastDevice::from_record`]: ../device/struct.CastDevice.html#method.from_record

use std::collections::HashMap;
use std::fmt;
use std::net::{Ipv4Addr, Ipv6Addr};

/// Google Cast multicast service identifier.
pub const SERVICE_NAME: &str = "_googlecast._tcp.local";

/// TXT record key for the device's unique id.
pub const TXT_KEY_ID: &str = "id";
/// TXT record key for the capabilities bitmask (decimal string).
pub const TXT_KEY_CAPABILITIES: &str = "ca";
/// TXT record key for the friendly name.
pub const TXT_KEY_FRIENDLY_NAME: &str = "fn";
/// TXT record key for the model name.
pub const TXT_KEY_MODEL_NAME: &str = "md";
/// TXT record key for the protocol version.
pub const TXT_KEY_VERSION: &str = "ve";
/// TXT record key for the icon path.
pub const TXT_KEY_ICON: &str = "ic";

/// Split one TXT entry at the first `=`. Cast TXT keys are short ASCII
/// alphanumeric tags (`id`, `ca`, `fn`, ...); the value may itself contain
/// `=` and is taken whole.
fn split_entry(entry: &str) -> Option<(&str, &str)> {
    let mut parts = entry.splitn(2, '=');
    let key = parts.next()?;
    let value = parts.next()?;
    if key.is_empty() || !key.bytes().all(|b| b.is_ascii_alphanumeric()) {
        return None;
    }
    Some((key, value))
}

/// Collect a TXT record's `key=value` entries into a map. Entries without a
/// `=` or with a malformed key are skipped; a repeated key keeps the last
/// value seen, matching how resolvers merge records.
pub fn dns_txt<T: AsRef<str>>(txt: &[T]) -> HashMap<String, String> {
    txt.iter()
        .filter_map(|entry| split_entry(entry.as_ref()))
        .map(|(key, value)| (key.to_owned(), value.to_owned()))
        .collect()
}

/// Capability bitmask advertised in the `ca` TXT key.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub struct Capabilities(u32);

impl Capabilities {
    pub const NONE: u32 = 0;
    pub const VIDEO_OUT: u32 = 1;
    pub const VIDEO_IN: u32 = 1 << 1;
    pub const AUDIO_OUT: u32 = 1 << 2;
    pub const AUDIO_IN: u32 = 1 << 3;
    pub const MULTIZONE_GROUP: u32 = 1 << 5;
    pub const MASTER_VOLUME: u32 = 1 << 11;
    pub const ATTENUATION_VOLUME: u32 = 1 << 12;

    pub fn new(mask: u32) -> Self {
        Capabilities(mask)
    }

    /// Parse the decimal `ca` value. Missing or non-numeric input means no
    /// advertised capabilities, not an error.
    pub fn from_txt(value: Option<&str>) -> Self {
        value
            .and_then(|raw| raw.trim().parse().ok())
            .map_or_else(Capabilities::default, Capabilities)
    }

    pub fn mask(self) -> u32 {
        self.0
    }

    pub fn has(self, capability: u32) -> bool {
        self.0 & capability != 0
    }
}

impl fmt::Display for Capabilities {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let mut names = Vec::new();
        for &(bit, name) in &[
            (Self::VIDEO_OUT, "video-out"),
            (Self::VIDEO_IN, "video-in"),
            (Self::AUDIO_OUT, "audio-out"),
            (Self::AUDIO_IN, "audio-in"),
            (Self::MULTIZONE_GROUP, "multizone-group"),
            (Self::MASTER_VOLUME, "master-volume"),
            (Self::ATTENUATION_VOLUME, "attenuation-volume"),
        ] {
            if self.has(bit) {
                names.push(name);
            }
        }
        if names.is_empty() {
            write!(f, "none")
        } else {
            write!(f, "{}", names.join("|"))
        }
    }
}

/// Parse the `ve` TXT value. Missing, empty, or non-numeric input yields
/// `-1`, meaning unknown.
pub fn protocol_version(value: Option<&str>) -> i32 {
    value.and_then(|raw| raw.trim().parse().ok()).unwrap_or(-1)
}

/// A resolved DNS-SD announcement, as supplied by the mDNS collaborator.
#[derive(Clone, Debug)]
pub struct ServiceRecord {
    pub dns_name: String,
    pub ipv4: Option<Ipv4Addr>,
    pub ipv6: Option<Ipv6Addr>,
    pub port: u16,
    pub txt: HashMap<String, String>,
}

impl ServiceRecord {
    pub fn txt_value(&self, key: &str) -> Option<&str> {
        self.txt.get(key).map(String::as_str)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dns_txt_collects_cast_keys() {
        let parsed = dns_txt(&[
            "id=f1e2d3c4",
            "ca=4101",
            "ve=05",
            "md=Google Home Mini",
            "ic=/setup/icon.png",
        ]);
        assert_eq!(5, parsed.len());
        assert_eq!("f1e2d3c4", parsed[TXT_KEY_ID]);
        assert_eq!("4101", parsed[TXT_KEY_CAPABILITIES]);
        assert_eq!("Google Home Mini", parsed[TXT_KEY_MODEL_NAME]);
        assert_eq!(None, parsed.get(TXT_KEY_FRIENDLY_NAME));
    }

    #[test]
    fn dns_txt_splits_at_the_first_equals_only() {
        let parsed = dns_txt(&["fn=Den=Upstairs", "ve="]);
        assert_eq!("Den=Upstairs", parsed[TXT_KEY_FRIENDLY_NAME]);
        assert_eq!("", parsed[TXT_KEY_VERSION]);
    }

    #[test]
    fn dns_txt_skips_malformed_entries_and_keeps_last_duplicate() {
        let parsed = dns_txt(&["bare", "=orphan", "f n=spaced key", "ve=04", "ve=05"]);
        assert_eq!(1, parsed.len());
        assert_eq!("05", parsed[TXT_KEY_VERSION]);
    }

    #[test]
    fn capabilities_default_to_none() {
        assert_eq!(Capabilities::new(0), Capabilities::from_txt(None));
        assert_eq!(Capabilities::new(0), Capabilities::from_txt(Some("junk")));
        let caps = Capabilities::from_txt(Some("4101"));
        assert!(caps.has(Capabilities::VIDEO_OUT));
        assert!(caps.has(Capabilities::AUDIO_OUT));
        assert!(caps.has(Capabilities::ATTENUATION_VOLUME));
        assert!(!caps.has(Capabilities::AUDIO_IN));
    }

    #[test]
    fn protocol_version_defaults_to_unknown() {
        assert_eq!(-1, protocol_version(None));
        assert_eq!(-1, protocol_version(Some("")));
        assert_eq!(-1, protocol_version(Some("x05")));
        assert_eq!(5, protocol_version(Some("05")));
    }

    #[test]
    fn capabilities_display_names_set_bits() {
        let caps = Capabilities::new(Capabilities::AUDIO_OUT | Capabilities::MULTIZONE_GROUP);
        assert_eq!("audio-out|multizone-group", caps.to_string());
        assert_eq!("none", Capabilities::default().to_string());
    }
}
