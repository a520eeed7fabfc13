use std::sync::Arc;

use futures::prelude::*;
use tokio_timer::Interval;

use crate::channel::{Channel, Liveness, PING_INTERVAL};
use crate::message::{
    MessageBuilder, NAMESPACE_HEARTBEAT, PLATFORM_DESTINATION_ID, PLATFORM_SENDER_ID,
};
use crate::payload::heartbeat::Request;
use crate::shutdown::{Cancelable, Valve};

/// Send a PING every interval. If the device has not answered for two
/// consecutive intervals the channel is considered dead and closed.
pub(crate) fn task(
    valve: Valve,
    channel: Channel,
    liveness: Arc<Liveness>,
) -> impl Future<Item = (), Error = ()> {
    let ping = MessageBuilder::default()
        .namespace(NAMESPACE_HEARTBEAT)
        .source(PLATFORM_SENDER_ID)
        .destination(PLATFORM_DESTINATION_ID)
        .payload(&Request::Ping)
        .into_message();
    Interval::new_interval(PING_INTERVAL)
        .cancel(valve)
        .map_err(|err| warn!("error on heartbeat interval: {:?}", err))
        .for_each(move |_| {
            // The tick at t = 2*interval is the end of the second silent
            // interval, so the comparison must not be strict.
            if liveness.age() >= PING_INTERVAL * 2 {
                warn!(
                    "no PONG from {} for two heartbeat intervals; closing channel",
                    channel.name()
                );
                tokio_executor::spawn(
                    channel
                        .close()
                        .map_err(|err| warn!("close after heartbeat loss: {}", err)),
                );
                return Err(());
            }
            channel
                .send(ping.clone())
                .map_err(|err| warn!("failed to enqueue PING: {}", err))
        })
}
