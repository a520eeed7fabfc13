//! Keepalive messages (`urn:x-cast:com.google.cast.tp.heartbeat`).

use serde_derive::{Deserialize, Serialize};

#[derive(Serialize, Debug)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Request {
    Ping,
    Pong,
}

#[derive(Deserialize, Debug, Eq, PartialEq)]
#[serde(tag = "responseType", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Response {
    Ping,
    Pong,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::payload::adjust;

    #[test]
    fn ping_round_trip() {
        let payload = serde_json::to_string(&Request::Ping).unwrap();
        assert_eq!(r#"{"type":"PING"}"#, payload);
        let value = adjust(&payload).unwrap();
        let response: Response = serde_json::from_value(value).unwrap();
        assert_eq!(Response::Ping, response);
    }

    #[test]
    fn pong_round_trip() {
        let payload = serde_json::to_string(&Request::Pong).unwrap();
        assert_eq!(r#"{"type":"PONG"}"#, payload);
        let value = adjust(&payload).unwrap();
        let response: Response = serde_json::from_value(value).unwrap();
        assert_eq!(Response::Pong, response);
    }
}
