//! Subscriber registry for event fan-out.
//!
//! Subscribers receive events over their own unbounded queue, which keeps a
//! slow consumer from stalling the dispatcher or the reader. A subscriber
//! that drops its receiver is pruned on the next broadcast.

use std::collections::HashSet;
use std::sync::{Arc, Mutex};

use futures::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};

use crate::event::{Event, EventType};

#[derive(Debug)]
struct Subscriber {
    filter: Option<HashSet<EventType>>,
    tx: UnboundedSender<Event>,
}

impl Subscriber {
    fn wants(&self, kind: EventType) -> bool {
        match self.filter {
            Some(ref filter) => filter.contains(&kind),
            None => true,
        }
    }
}

#[derive(Clone, Debug)]
pub(crate) struct Listeners {
    subscribers: Arc<Mutex<Vec<Subscriber>>>,
}

impl Listeners {
    pub fn new() -> Self {
        Self {
            subscribers: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Register a subscriber. `None` subscribes to every event type.
    pub fn subscribe(&self, filter: Option<&[EventType]>) -> UnboundedReceiver<Event> {
        let (tx, rx) = mpsc::unbounded();
        let subscriber = Subscriber {
            filter: filter.map(|kinds| kinds.iter().cloned().collect()),
            tx,
        };
        if let Ok(mut subscribers) = self.subscribers.lock() {
            subscribers.push(subscriber);
        }
        rx
    }

    /// Deliver an event to every interested subscriber, pruning the ones
    /// whose receiver is gone.
    pub fn broadcast(&self, event: &Event) {
        let kind = event.kind();
        if let Ok(mut subscribers) = self.subscribers.lock() {
            subscribers.retain(|subscriber| {
                if !subscriber.wants(kind) {
                    return !subscriber.tx.is_closed();
                }
                subscriber.tx.unbounded_send(event.clone()).is_ok()
            });
        }
    }
}

#[cfg(test)]
mod tests {
    use futures::{Future, Stream};

    use super::Listeners;
    use crate::event::{Event, EventType};

    #[test]
    fn unfiltered_subscriber_sees_every_event() {
        let listeners = Listeners::new();
        let rx = listeners.subscribe(None);

        listeners.broadcast(&Event::Connected(true));
        listeners.broadcast(&Event::Closed);
        drop(listeners);

        let events = rx.collect().wait().unwrap();
        assert_eq!(2, events.len());
    }

    #[test]
    fn filter_excludes_other_event_types() {
        let listeners = Listeners::new();
        let rx = listeners.subscribe(Some(&[EventType::SessionClosed]));

        listeners.broadcast(&Event::Connected(true));
        listeners.broadcast(&Event::SessionClosed {
            peer: "transport-1".to_owned(),
        });
        drop(listeners);

        let events = rx.collect().wait().unwrap();
        assert_eq!(1, events.len());
        match events[0] {
            Event::SessionClosed { ref peer } => assert_eq!("transport-1", peer),
            ref event => panic!("unexpected event: {:?}", event),
        }
    }

    #[test]
    fn dropped_subscriber_is_pruned() {
        let listeners = Listeners::new();
        let rx = listeners.subscribe(None);
        drop(rx);

        // Must not fail or grow; the dead subscriber is discarded.
        listeners.broadcast(&Event::Connected(false));
        listeners.broadcast(&Event::Closed);
    }
}
