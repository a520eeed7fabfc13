//! Correlation of outgoing requests with their responses.
//!
//! Callers register a oneshot waiter under the request id before the frame
//! is written, so a response racing the write still finds its waiter. The
//! reader completes waiters with the raw adjusted payload; typed decoding
//! happens on the caller side.

use std::collections::HashMap;

use futures::prelude::*;
use futures::sync::oneshot;
use futures_locks::Mutex;
use serde_json::Value;

use crate::error::Error;

pub(crate) type Waiter = oneshot::Sender<Value>;

#[derive(Clone, Debug)]
pub(crate) struct Registry {
    waiters: Mutex<HashMap<i64, Waiter>>,
}

impl Registry {
    pub fn new() -> Self {
        Self {
            waiters: Mutex::new(HashMap::new()),
        }
    }

    /// Park a waiter under `request_id`. Ids come from a monotonic counter,
    /// so a live entry under the same id means a bug upstream; the stale
    /// waiter is dropped, failing its caller.
    pub fn register(&self, request_id: i64, waiter: Waiter) -> impl Future<Item = (), Error = Error> {
        self.waiters
            .lock()
            .map_err(|_| Error::Disconnected)
            .map(move |mut waiters| {
                if waiters.insert(request_id, waiter).is_some() {
                    warn!("replaced pending waiter for request {}", request_id);
                }
            })
    }

    /// Hand a response to the waiter for `request_id`, removing it. Returns
    /// whether a waiter was found and still listening.
    pub fn complete(&self, request_id: i64, value: Value) -> impl Future<Item = bool, Error = ()> {
        self.waiters.lock().map(move |mut waiters| {
            match waiters.remove(&request_id) {
                Some(waiter) => waiter.send(value).is_ok(),
                None => false,
            }
        })
    }

    /// Drop the waiter for `request_id`, if any. Used on timeout and
    /// cancellation so the registry holds only live waiters.
    pub fn abandon(&self, request_id: i64) -> impl Future<Item = (), Error = ()> {
        self.waiters.lock().map(move |mut waiters| {
            waiters.remove(&request_id);
        })
    }

    /// Drop every pending waiter. Receivers observe the drop and surface it
    /// as `Disconnected`.
    pub fn fail_all(&self) -> impl Future<Item = (), Error = ()> {
        self.waiters.lock().map(|mut waiters| {
            if !waiters.is_empty() {
                debug!("failing {} outstanding request(s)", waiters.len());
            }
            waiters.clear();
        })
    }
}

#[cfg(test)]
mod tests {
    use futures::sync::oneshot;
    use futures::Future;
    use serde_json::json;

    use super::Registry;

    #[test]
    fn complete_delivers_to_registered_waiter() {
        let registry = Registry::new();
        let (tx, rx) = oneshot::channel();
        registry.register(7, tx).wait().unwrap();

        let delivered = registry.complete(7, json!({"requestId": 7})).wait().unwrap();
        assert!(delivered);
        assert_eq!(json!({"requestId": 7}), rx.wait().unwrap());
    }

    #[test]
    fn complete_without_waiter_reports_undelivered() {
        let registry = Registry::new();
        let delivered = registry.complete(7, json!({})).wait().unwrap();
        assert!(!delivered);
    }

    #[test]
    fn abandoned_waiter_is_not_completed() {
        let registry = Registry::new();
        let (tx, rx) = oneshot::channel();
        registry.register(3, tx).wait().unwrap();
        registry.abandon(3).wait().unwrap();

        assert!(!registry.complete(3, json!({})).wait().unwrap());
        assert!(rx.wait().is_err());
    }

    #[test]
    fn fail_all_drops_every_waiter() {
        let registry = Registry::new();
        let (tx_a, rx_a) = oneshot::channel();
        let (tx_b, rx_b) = oneshot::channel();
        registry.register(1, tx_a).wait().unwrap();
        registry.register(2, tx_b).wait().unwrap();

        registry.fail_all().wait().unwrap();
        assert!(rx_a.wait().is_err());
        assert!(rx_b.wait().is_err());
    }
}
