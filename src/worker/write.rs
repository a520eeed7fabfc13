use std::io;

use futures::prelude::*;

use crate::proto;

/// Forward queued frames to the socket. A single writer owns the sink, so
/// each frame's length prefix and payload reach the wire contiguously and
/// frames never interleave.
pub(crate) fn task(
    sink: impl Sink<SinkItem = proto::CastMessage, SinkError = io::Error>,
    command: impl Stream<Item = proto::CastMessage, Error = ()>,
) -> impl Future<Item = (), Error = ()> {
    command
        .forward(sink.sink_map_err(|err| warn!("error on sink write: {:?}", err)))
        .map(|_| ())
        .or_else(|()| {
            // Write failures surface through the reader's EOF as well; the
            // writer just stops.
            Ok(())
        })
}
