use futures::prelude::*;

use crate::channel::listeners::Listeners;
use crate::event::Event;

/// Deliver decoded events to subscribers in arrival order. Running this on
/// its own task decouples subscriber latency from reader throughput.
pub(crate) fn task(
    events: impl Stream<Item = Event, Error = ()>,
    listeners: Listeners,
) -> impl Future<Item = (), Error = ()> {
    events.for_each(move |event| {
        trace!("dispatching {:?} event", event.kind());
        listeners.broadcast(&event);
        Ok(())
    })
}
