//! Shutdown signalling for the channel's worker tasks.
//!
//! A [`Trigger`]/[`Valve`] pair is a one-shot broadcast: terminating the
//! trigger resolves every cloned valve. The reader and heartbeat streams are
//! wrapped with [`cancel`], which short-circuits them as soon as the valve
//! resolves. The write and event queues are wrapped with [`drain`], which
//! closes the underlying receiver but still yields messages already queued,
//! so a teardown event enqueued just before the trigger fires is delivered.
//!
//! [`Trigger`]: struct.Trigger.html
//! [`Valve`]: struct.Valve.html
//! [`cancel`]: trait.Cancelable.html#method.cancel
//! [`drain`]: trait.Drainable.html#method.drain

use futures::future::Shared;
use futures::prelude::*;
use futures::sync::mpsc::UnboundedReceiver;
use futures::sync::oneshot;

/// Remote trigger for a set of [`Valve`]s. Dropping the trigger fires it.
///
/// [`Valve`]: struct.Valve.html
#[derive(Debug)]
pub struct Trigger(Option<oneshot::Sender<()>>);

impl Trigger {
    /// Consume the trigger and resolve every linked valve.
    pub fn terminate(self) {
        drop(self);
    }
}

impl Drop for Trigger {
    fn drop(&mut self) {
        if let Some(trigger) = self.0.take() {
            let _ = trigger.send(());
        }
    }
}

/// Cloneable future that resolves once the linked [`Trigger`] fires.
///
/// [`Trigger`]: struct.Trigger.html
#[derive(Clone, Debug)]
pub struct Valve(Shared<oneshot::Receiver<()>>);

impl Future for Valve {
    type Item = ();
    type Error = ();

    fn poll(&mut self) -> Poll<Self::Item, Self::Error> {
        match self.0.poll() {
            Ok(Async::Ready(_)) | Err(_) => Ok(Async::Ready(())),
            Ok(Async::NotReady) => Ok(Async::NotReady),
        }
    }
}

/// Create a matching [`Trigger`] and [`Valve`].
///
/// [`Trigger`]: struct.Trigger.html
/// [`Valve`]: struct.Valve.html
pub fn valve() -> (Trigger, Valve) {
    let (trigger, valve) = oneshot::channel();
    (Trigger(Some(trigger)), Valve(valve.shared()))
}

/// Stream adapter that terminates the inner stream once `until` resolves.
#[derive(Debug)]
pub struct Cancel<S> {
    stream: S,
    until: Valve,
}

impl<S> Stream for Cancel<S>
where
    S: Stream,
{
    type Item = S::Item;
    type Error = S::Error;

    fn poll(&mut self) -> Poll<Option<Self::Item>, Self::Error> {
        if let Ok(Async::Ready(_)) = self.until.poll() {
            return Ok(Async::Ready(None));
        }
        self.stream.poll()
    }
}

/// Extension trait adding [`cancel`] to any stream.
///
/// [`cancel`]: #method.cancel
pub trait Cancelable: Stream {
    /// Yield items from the stream until `valve` resolves, then end the
    /// stream without polling the inner stream again.
    fn cancel(self, valve: Valve) -> Cancel<Self>
    where
        Self: Sized,
    {
        Cancel {
            stream: self,
            until: valve,
        }
    }
}

impl<S> Cancelable for S where S: Stream {}

#[derive(Debug, Eq, PartialEq)]
enum DrainState {
    Active,
    Draining,
}

/// Receiver adapter that closes the channel once `until` resolves but keeps
/// yielding messages that were already queued.
#[derive(Debug)]
pub struct Drain<T> {
    receiver: UnboundedReceiver<T>,
    until: Valve,
    state: DrainState,
}

impl<T> Stream for Drain<T> {
    type Item = T;
    type Error = ();

    fn poll(&mut self) -> Poll<Option<Self::Item>, Self::Error> {
        if self.state == DrainState::Active {
            if let Ok(Async::Ready(_)) = self.until.poll() {
                self.receiver.close();
                self.state = DrainState::Draining;
            }
        }
        self.receiver.poll()
    }
}

/// Extension trait adding [`drain`] to an unbounded receiver.
///
/// [`drain`]: #method.drain
pub trait Drainable<T> {
    /// Yield messages until `valve` resolves, then close the receiver and
    /// yield whatever is still queued before ending the stream.
    fn drain(self, valve: Valve) -> Drain<T>;
}

impl<T> Drainable<T> for UnboundedReceiver<T> {
    fn drain(self, valve: Valve) -> Drain<T> {
        Drain {
            receiver: self,
            until: valve,
            state: DrainState::Active,
        }
    }
}

#[cfg(test)]
mod tests {
    use futures::sync::mpsc;
    use futures::{Future, Stream};

    use super::{valve, Cancelable, Drainable};

    #[test]
    fn drain_yields_queued_messages_after_terminate() {
        let (trigger, valve) = valve();
        let (sender, receiver) = mpsc::unbounded::<u32>();

        sender.unbounded_send(1).unwrap();
        sender.unbounded_send(2).unwrap();
        trigger.terminate();

        let drained = receiver.drain(valve).collect().wait().unwrap();
        assert_eq!(vec![1, 2], drained);
    }

    #[test]
    fn cancel_discards_queued_messages_after_terminate() {
        let (trigger, valve) = valve();
        let (sender, receiver) = mpsc::unbounded::<u32>();

        sender.unbounded_send(1).unwrap();
        trigger.terminate();

        let received = receiver.cancel(valve).collect().wait().unwrap();
        assert!(received.is_empty());
    }

    #[test]
    fn dropped_trigger_resolves_valve() {
        let valve = {
            let (_trigger, valve) = valve();
            valve
        };
        let (sender, receiver) = mpsc::unbounded::<u32>();
        sender.unbounded_send(1).unwrap();

        let received = receiver.cancel(valve).collect().wait().unwrap();
        assert!(received.is_empty());
    }

    #[test]
    fn valve_is_not_ready_while_trigger_is_live() {
        let (trigger, valve) = valve();
        let (sender, receiver) = mpsc::unbounded::<u32>();

        sender.unbounded_send(7).unwrap();
        drop(sender);

        let received = receiver.drain(valve).collect().wait().unwrap();
        assert_eq!(vec![7], received);
        trigger.terminate();
    }
}
