//! Virtual connection management (`urn:x-cast:com.google.cast.tp.connection`).
//!
//! A CONNECT must be sent to a destination before any other namespace is
//! addressed to it; CLOSE tears the virtual connection down again.

use serde_derive::Serialize;
use serde_json::{Map, Value};

#[derive(Serialize, Debug)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Request {
    #[serde(rename_all = "camelCase")]
    Connect {
        user_agent: Option<String>,
        origin: Map<String, Value>,
    },
    Close,
}

impl Request {
    /// The CONNECT payload the platform receiver expects.
    pub fn connect() -> Self {
        Request::Connect {
            user_agent: None,
            origin: Map::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn connect_payload_is_wire_exact() {
        let payload = serde_json::to_string(&Request::connect()).unwrap();
        assert_eq!(r#"{"type":"CONNECT","userAgent":null,"origin":{}}"#, payload);
    }

    #[test]
    fn close_payload_is_wire_exact() {
        let payload = serde_json::to_string(&Request::Close).unwrap();
        assert_eq!(r#"{"type":"CLOSE"}"#, payload);
    }
}
