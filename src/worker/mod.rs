//! The tasks that service an open channel: reader, writer, heartbeat, and
//! event dispatcher. All four are spawned by `Channel::start` and wound down
//! together through the shutdown valve.

mod dispatch;
mod heartbeat;
mod read;
mod write;

pub(crate) use self::dispatch::task as dispatch;
pub(crate) use self::heartbeat::task as heartbeat;
pub(crate) use self::read::{task as read, Reader};
pub(crate) use self::write::task as write;
